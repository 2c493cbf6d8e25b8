//! External command construction.
//!
//! [`build_commands`] turns a request and its matched rule into the chain of
//! [`Command`]s to execute. Construction is pure: no process is spawned and no
//! file is touched. The chain model lets a command read the temporary output
//! of an earlier one ([`CommandInput::Previous`]); built-in rules only ever
//! produce a single command.

use super::matcher::MatchedRule;
use super::options::OptionMap;
use crate::types::TransformRequest;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Where a command reads its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    Path(PathBuf),
    /// Output of the command at this index in the same chain. The consuming
    /// command owns that file and the chain deletes it once consumed.
    Previous(usize),
}

/// Where a command writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Path(PathBuf),
    /// A fresh temporary file with this extension (e.g. `"v"`).
    Temp { extension: String },
}

/// One invocation of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Label used in logs and error messages.
    pub name: String,
    pub program: String,
    /// Rendered as `--key` (empty value) or `--key=value`.
    pub args: OptionMap,
    pub input: CommandInput,
    pub input_options: OptionMap,
    pub output: CommandOutput,
    pub output_options: OptionMap,
}

impl Command {
    pub fn new(name: &str, program: &str, input: CommandInput, output: CommandOutput) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: OptionMap::new(),
            input,
            input_options: OptionMap::new(),
            output,
            output_options: OptionMap::new(),
        }
    }

    /// Flag arguments in order.
    pub fn flag_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    format!("--{key}")
                } else {
                    format!("--{key}={value}")
                }
            })
            .collect()
    }

    /// Full argument vector (program excluded) once input and output paths
    /// are known: `input[opts] --flags... -o output[opts]`.
    pub fn argv(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 3);
        argv.push(with_suffix(input, &self.input_options));
        argv.extend(self.flag_args().into_iter().map(OsString::from));
        argv.push(OsString::from("-o"));
        argv.push(with_suffix(output, &self.output_options));
        argv
    }
}

fn with_suffix(path: &Path, options: &OptionMap) -> OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push(options.to_suffix());
    arg
}

/// Save options injected for a destination subtype before the rule's own.
pub fn default_output_options(dest_mime: &str) -> OptionMap {
    let mut options = OptionMap::new();
    if let Some(("image", "png")) = dest_mime.split_once('/') {
        options.set("strip", "true");
        options.set("filter", "VIPS_FOREIGN_PNG_FILTER_ALL");
    }
    options
}

/// Build the command chain for a matched request.
///
/// Returns an empty chain when the source is not a raster image.
pub fn build_commands(request: &TransformRequest, matched: &MatchedRule<'_>) -> Vec<Command> {
    let major = request
        .source
        .mime_type
        .split_once('/')
        .map(|(major, _)| major);
    if major != Some("image") {
        return Vec::new();
    }

    let mut command = Command::new(
        &matched.rule.library,
        matched.command,
        CommandInput::Path(request.source.path.clone()),
        CommandOutput::Path(request.dest_path.clone()),
    );
    command.args.set("size", request.physical.to_string());
    command.input_options = matched.input_options.cloned().unwrap_or_default();
    command.output_options =
        default_output_options(&request.dest_mime_type).merged_with(&matched.rule.output_options);

    vec![command]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::find_rule;
    use crate::test_helpers::{png_rule, sample_request, single_rule_config};

    fn output_arg(cmd: &Command) -> String {
        let argv = cmd.argv(Path::new("/src/in.png"), Path::new("/thumb/out.png"));
        argv.last().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn example_png_request_builds_size_and_png_defaults() {
        let config = single_rule_config(png_rule());
        let request = sample_request();
        let matched = find_rule(&config, &request.source, "image/png", None).unwrap();

        let commands = build_commands(&request, &matched);
        assert_eq!(commands.len(), 1);
        let cmd = &commands[0];
        assert_eq!(cmd.program, "vipsthumbnail");
        assert_eq!(cmd.flag_args(), vec!["--size=100x50".to_string()]);
        assert_eq!(
            output_arg(cmd),
            "/thumb/out.png[strip=true,filter=VIPS_FOREIGN_PNG_FILTER_ALL]"
        );
    }

    #[test]
    fn argv_layout() {
        let config = single_rule_config(png_rule());
        let request = sample_request();
        let matched = find_rule(&config, &request.source, "image/png", None).unwrap();
        let cmd = &build_commands(&request, &matched)[0];

        let argv: Vec<String> = cmd
            .argv(&request.source.path, &request.dest_path)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            argv,
            vec![
                "/src/in.png".to_string(),
                "--size=100x50".to_string(),
                "-o".to_string(),
                "/thumb/out.png[strip=true,filter=VIPS_FOREIGN_PNG_FILTER_ALL]".to_string(),
            ]
        );
    }

    #[test]
    fn rule_output_options_override_defaults() {
        let mut rule = png_rule();
        rule.output_options.set("strip", "false");
        rule.output_options.set("compression", "9");
        let config = single_rule_config(rule);
        let request = sample_request();
        let matched = find_rule(&config, &request.source, "image/png", None).unwrap();

        let cmd = &build_commands(&request, &matched)[0];
        assert_eq!(
            output_arg(cmd),
            "/thumb/out.png[strip=false,filter=VIPS_FOREIGN_PNG_FILTER_ALL,compression=9]"
        );
    }

    #[test]
    fn non_png_without_options_has_bare_output() {
        let mut rule = png_rule();
        rule.mime_type = "image/avif".into();
        let config = single_rule_config(rule);
        let mut request = sample_request();
        request.dest_mime_type = "image/avif".into();
        let matched = find_rule(&config, &request.source, "image/avif", None).unwrap();

        let cmd = &build_commands(&request, &matched)[0];
        assert_eq!(output_arg(cmd), "/thumb/out.png");
    }

    #[test]
    fn input_options_suffix_input_argument() {
        let mut rule = png_rule();
        rule.input_options.set("access", "sequential");
        let config = single_rule_config(rule);
        let request = sample_request();
        let matched = find_rule(&config, &request.source, "image/png", None).unwrap();

        let cmd = &build_commands(&request, &matched)[0];
        let argv = cmd.argv(Path::new("/src/in.png"), Path::new("/o.png"));
        assert_eq!(argv[0].to_string_lossy(), "/src/in.png[access=sequential]");
    }

    #[test]
    fn loader_options_follow_source_type_not_output_rule() {
        let mut avif = png_rule();
        avif.mime_type = "image/avif".into();
        avif.input_options.set("shrink", "2");
        let mut jpeg = png_rule();
        jpeg.mime_type = "image/jpeg".into();
        jpeg.input_options.set("shrink", "2");
        let mut config = single_rule_config(avif);
        config.rules.push(jpeg);

        // PNG → AVIF: the AVIF rule's loader options must not reach the PNG
        let mut request = sample_request();
        request.dest_mime_type = "image/avif".into();
        let matched = find_rule(&config, &request.source, "image/avif", None).unwrap();
        let cmd = &build_commands(&request, &matched)[0];
        let argv = cmd.argv(&request.source.path, &request.dest_path);
        assert_eq!(argv[0].to_string_lossy(), "/src/in.png");

        // JPEG → AVIF: the JPEG rule supplies them
        request.source.path = "/src/in.jpg".into();
        request.source.mime_type = "image/jpeg".into();
        let matched = find_rule(&config, &request.source, "image/avif", None).unwrap();
        let cmd = &build_commands(&request, &matched)[0];
        let argv = cmd.argv(&request.source.path, &request.dest_path);
        assert_eq!(argv[0].to_string_lossy(), "/src/in.jpg[shrink=2]");
    }

    #[test]
    fn non_image_source_builds_nothing() {
        let config = single_rule_config(png_rule());
        let mut request = sample_request();
        let matched = find_rule(&config, &request.source, "image/png", None).unwrap();
        request.source.mime_type = "application/pdf".into();
        assert!(build_commands(&request, &matched).is_empty());
    }

    #[test]
    fn empty_flag_value_renders_bare_flag() {
        let mut cmd = Command::new(
            "libvips",
            "vipsthumbnail",
            CommandInput::Path("/a".into()),
            CommandOutput::Path("/b".into()),
        );
        cmd.args.set("size", "10x10");
        cmd.args.set("linear", "");
        assert_eq!(cmd.flag_args(), vec!["--size=10x10", "--linear"]);
    }
}
