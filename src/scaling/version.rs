//! libvips version detection for diagnostics.
//!
//! `vips -v` prints something like `vips-8.7.4-Sat Nov 21 16:50:57 UTC 2020`.
//! The version is the second hyphen-delimited segment. Nothing gates on it.

use super::executor::{CommandExecutor, Invocation};
use regex::Regex;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version regex must compile"));

/// Extract `major.minor.patch` from `vips -v` output.
///
/// ```
/// # use thumbro::scaling::parse_version;
/// assert_eq!(parse_version("vips-8.7.4-Sat Nov 21 16:50:57 UTC 2020").as_deref(), Some("8.7.4"));
/// assert_eq!(parse_version("command not found"), None);
/// ```
pub fn parse_version(output: &str) -> Option<String> {
    let segment = output.split('-').nth(1)?.trim();
    VERSION_RE.is_match(segment).then(|| segment.to_string())
}

/// Run `<program> -v` and parse its version. `None` if the tool is missing,
/// exits non-zero, or prints something unrecognised.
pub fn query_version(executor: &impl CommandExecutor, program: &str) -> Option<String> {
    let invocation = Invocation::new(program).arg("-v");
    match executor.execute(&invocation) {
        Ok(out) if out.success() => parse_version(&out.output),
        Ok(out) => {
            tracing::debug!(program, exit_code = out.exit_code, "version query failed");
            None
        }
        Err(e) => {
            tracing::debug!(program, "version query failed: {e}");
            None
        }
    }
}
