//! Comment embedding via exiv2.
//!
//! Runs `exiv2 mo -c <comment> <file>` on a finished thumbnail. Best-effort:
//! a failure is logged and the thumbnail is still returned.

use super::executor::{CommandExecutor, Invocation};
use std::path::Path;

/// Embed `comment` into `path`. Returns whether exiv2 reported success.
pub fn set_comment(
    executor: &impl CommandExecutor,
    exiv2: &str,
    path: &Path,
    comment: &str,
) -> bool {
    let invocation = Invocation::new(exiv2)
        .args(["mo", "-c", comment])
        .arg(path.as_os_str());
    match executor.execute(&invocation) {
        Ok(out) if out.success() => true,
        Ok(out) => {
            tracing::warn!(
                path = %path.display(),
                exit_code = out.exit_code,
                output = %out.output.trim(),
                "could not set comment"
            );
            false
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not set comment: {e}");
            false
        }
    }
}
