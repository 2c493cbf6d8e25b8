//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Transform
//!
//! ```text
//! Thumbnail 120x80
//!     Path: /thumbs/a.avif
//!     URL: /thumbs/a.avif
//! ```
//!
//! ```text
//! Failed (command 0)
//!     vipsthumbnail: unable to load "a.jpg"
//!     Error code: 1
//! ```
//!
//! ## Check
//!
//! ```text
//! Source: a.jpg (image/jpeg, 4000x3000)
//! Thumbnail: image/avif 120x90
//! Rule 002 image/avif via libvips
//!     "vipsthumbnail" "a.jpg" "--size=120x90" "-o" "a.avif[Q=60]"
//! ```
//!
//! ## Software info
//!
//! ```text
//! libvips 8.15.1 (https://www.libvips.org)
//! Tools
//!     libvips: vipsthumbnail → /usr/bin/vipsthumbnail
//!     exiv2: exiv2 → not found
//! ```
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::hooks::{SoftwareVersion, ToolLocation};
use crate::scaling::{Command, CommandInput, CommandOutput, Invocation, MatchedRule};
use crate::types::{TransformOutcome, TransformRequest};
use std::path::PathBuf;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Transform
// ============================================================================

pub fn format_outcome(outcome: &TransformOutcome) -> Vec<String> {
    match outcome {
        TransformOutcome::NotHandled => {
            vec!["Not handled: no enabled rule matched, host scaler applies".to_string()]
        }
        TransformOutcome::Thumbnail(thumb) => vec![
            format!("Thumbnail {}x{}", thumb.width, thumb.height),
            format!("{}Path: {}", indent(1), thumb.path.display()),
            format!("{}URL: {}", indent(1), thumb.url),
        ],
        TransformOutcome::Failed(err) => {
            let mut lines = vec![format!("Failed (command {})", err.command_index)];
            lines.extend(
                err.to_string()
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| format!("{}{}", indent(1), l)),
            );
            lines
        }
    }
}

pub fn print_outcome(outcome: &TransformOutcome) {
    for line in format_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Check (dry run)
// ============================================================================

/// Describe what a transform would do without running anything.
pub fn format_check(
    request: &TransformRequest,
    matched: Option<&MatchedRule<'_>>,
    commands: &[Command],
) -> Vec<String> {
    let source = &request.source;
    let mut lines = vec![
        format!(
            "Source: {} ({}, {}x{})",
            source.path.display(),
            source.mime_type,
            source.width,
            source.height
        ),
        format!("Thumbnail: {} {}", request.dest_mime_type, request.physical),
    ];

    let Some(matched) = matched else {
        lines.push("No rule matched".to_string());
        return lines;
    };
    lines.push(format!(
        "Rule {} {} via {}",
        format_index(matched.index + 1),
        matched.rule.mime_type,
        matched.rule.library
    ));
    if commands.is_empty() {
        lines.push(format!("{}(not a raster image, nothing to run)", indent(1)));
    }
    for command in commands {
        let argv = command.argv(&describe_input(&command.input), &describe_output(&command.output));
        let invocation = Invocation::new(command.program.as_str()).args(argv);
        lines.push(format!("{}{}", indent(1), invocation.display()));
    }
    if matched.rule.set_comment && request.comment.as_deref().is_some_and(|c| !c.is_empty()) {
        lines.push(format!("{}+ comment via exiv2", indent(1)));
    }
    lines
}

pub fn print_check(
    request: &TransformRequest,
    matched: Option<&MatchedRule<'_>>,
    commands: &[Command],
) {
    for line in format_check(request, matched, commands) {
        println!("{}", line);
    }
}

fn describe_input(input: &CommandInput) -> PathBuf {
    match input {
        CommandInput::Path(path) => path.clone(),
        CommandInput::Previous(i) => PathBuf::from(format!("<output of command {i}>")),
    }
}

fn describe_output(output: &CommandOutput) -> PathBuf {
    match output {
        CommandOutput::Path(path) => path.clone(),
        CommandOutput::Temp { extension } => PathBuf::from(format!("<temp>.{extension}")),
    }
}

// ============================================================================
// Software info
// ============================================================================

pub fn format_software_info(versions: &[SoftwareVersion], tools: &[ToolLocation]) -> Vec<String> {
    let mut lines: Vec<String> = if versions.is_empty() {
        vec!["No library version detected".to_string()]
    } else {
        versions
            .iter()
            .map(|v| match &v.url {
                Some(url) => format!("{} {} ({})", v.name, v.version, url),
                None => format!("{} {}", v.name, v.version),
            })
            .collect()
    };

    if !tools.is_empty() {
        lines.push("Tools".to_string());
        for tool in tools {
            let location = match &tool.path {
                Some(path) => path.display().to_string(),
                None => "not found".to_string(),
            };
            lines.push(format!(
                "{}{}: {} → {}",
                indent(1),
                tool.role,
                tool.program,
                location
            ));
        }
    }
    lines
}

pub fn print_software_info(versions: &[SoftwareVersion], tools: &[ToolLocation]) {
    for line in format_software_info(versions, tools) {
        println!("{}", line);
    }
}
