use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use thumbro::config::{self, Config};
use thumbro::hooks::{Thumbro, TransformHooks, locate_tools};
use thumbro::output;
use thumbro::scaling::{Dimensions, build_commands, find_rule, fit_to_width, fit_within};
use thumbro::types::{SourceFile, TransformOutcome, TransformRequest};
use tracing_subscriber::EnvFilter;

/// Source image and thumbnail target shared by `transform` and `check`.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Source image
    source: PathBuf,

    /// Thumbnail width in pixels
    #[arg(long)]
    width: u32,

    /// Bounding height; without it the height follows the aspect ratio
    #[arg(long)]
    height: Option<u32>,

    /// Thumbnail path (default: <source-stem>-<width>px.<ext> next to the source)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Public URL reported for the thumbnail (default: the output path)
    #[arg(long)]
    url: Option<String>,

    /// Comment embedded with exiv2 when the matching rule asks for it
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Parser)]
#[command(name = "thumbro")]
#[command(about = "Rule-driven thumbnailing through external image tools")]
#[command(long_about = "\
Rule-driven thumbnailing through external image tools

Each request is matched against an ordered rule table. The first enabled rule
whose output type, source area and shrink factor conditions hold decides which
tool runs and with which load/save options. Requests no rule claims are
reported as not handled.

Run 'thumbro gen-config' to generate a documented thumbro.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file, layered over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create one thumbnail
    Transform {
        #[command(flatten)]
        target: TargetArgs,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the rule and command a transform would use, without running it
    Check(TargetArgs),
    /// Print detected tool versions and where the tools resolve
    SoftwareInfo {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock thumbro.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Transform { target, json } => {
            let config = config::load_config(cli.config.as_deref())?;
            let request = build_request(&config, &target)?;
            let outcome = Thumbro::new(config).on_before_transform(&request);
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                output::print_outcome(&outcome);
            }
            if let TransformOutcome::Failed(_) = outcome {
                std::process::exit(1);
            }
        }
        Command::Check(target) => {
            let config = config::load_config(cli.config.as_deref())?;
            let request = build_request(&config, &target)?;
            let matched = if config.enabled {
                find_rule(
                    &config,
                    &request.source,
                    &request.dest_mime_type,
                    Some(request.physical),
                )
            } else {
                println!("Disabled in configuration");
                None
            };
            let commands = matched
                .as_ref()
                .map(|m| build_commands(&request, m))
                .unwrap_or_default();
            output::print_check(&request, matched.as_ref(), &commands);
        }
        Command::SoftwareInfo { json } => {
            let config = config::load_config(cli.config.as_deref())?;
            let tools = locate_tools(&config);
            let versions = Thumbro::new(config).on_software_info();
            if json {
                let report = serde_json::json!({ "versions": versions, "tools": tools });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_software_info(&versions, &tools);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr fmt subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "thumbro=warn",
        1 => "thumbro=debug",
        _ => "thumbro=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Identify the source and derive the thumbnail request for `target`.
fn build_request(
    config: &Config,
    target: &TargetArgs,
) -> Result<TransformRequest, Box<dyn std::error::Error>> {
    let ext = target
        .source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime_type = config::mime_for_extension(ext)
        .ok_or_else(|| format!("{}: unrecognised image type", target.source.display()))?;
    let (width, height) = image::image_dimensions(&target.source)?;
    let source_size = Dimensions::new(width, height);

    let physical = match target.height {
        Some(h) => fit_within(source_size, Dimensions::new(target.width, h)),
        None => fit_to_width(source_size, target.width),
    };

    let (thumb_ext, dest_mime_type) = config.thumb_type(mime_type);
    let dest_path = target
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&target.source, physical.width, &thumb_ext));
    let dest_url = target
        .url
        .clone()
        .unwrap_or_else(|| dest_path.display().to_string());

    Ok(TransformRequest {
        source: SourceFile {
            path: target.source.clone(),
            mime_type: mime_type.to_string(),
            width,
            height,
            multipage: false,
            rotation: 0,
        },
        dest_mime_type,
        physical,
        client: physical,
        dest_path,
        dest_url,
        comment: target.comment.clone(),
    })
}

fn default_output_path(source: &Path, width: u32, ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumb".to_string());
    source.with_file_name(format!("{stem}-{width}px.{ext}"))
}
