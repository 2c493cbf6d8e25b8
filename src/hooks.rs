//! Host adapter.
//!
//! A host (wiki engine, image server, the bundled CLI) raises three events.
//! [`TransformHooks`] has one method per event and [`Thumbro`] implements it
//! by calling into the pure matcher/builder and the runner.
//!
//! ```text
//! on_before_transform   request → match → build → run → (comment) → outcome
//! on_check_image_area   source  → match (no target size yet) → bool
//! on_software_info      run `vips -v` → versions
//! ```

use crate::config::Config;
use crate::scaling::{
    CommandExecutor, ShellExecutor, build_commands, find_rule, query_version, run_chain,
    set_comment,
};
use crate::types::{SourceFile, ThumbnailOutput, TransformOutcome, TransformRequest};
use serde::Serialize;
use std::path::PathBuf;

/// One entry of diagnostic software information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareVersion {
    /// Library name as configured (e.g. `libvips`).
    pub name: String,
    /// Homepage from the library's `url`, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub version: String,
}

/// An external program the configuration refers to, and where it resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolLocation {
    /// What the program is used for, e.g. `libvips` or `exiv2`.
    pub role: String,
    pub program: String,
    /// `None` when the program is not on `PATH`.
    pub path: Option<PathBuf>,
}

/// Resolve every configured program on `PATH`.
pub fn locate_tools(config: &Config) -> Vec<ToolLocation> {
    let mut programs: Vec<(String, &str)> = Vec::new();
    for (name, lib) in &config.libraries {
        programs.push((name.clone(), lib.command.as_str()));
        if let Some(version_command) = &lib.version_command {
            programs.push((format!("{name} (version)"), version_command.as_str()));
        }
    }
    programs.push(("exiv2".to_string(), config.exiv2_command.as_str()));

    programs
        .into_iter()
        .filter(|(_, program)| !program.trim().is_empty())
        .map(|(role, program)| ToolLocation {
            role,
            program: program.to_string(),
            path: which::which(program).ok(),
        })
        .collect()
}

/// Events a host raises during thumbnailing.
pub trait TransformHooks {
    /// Offer a thumbnail request. `NotHandled` means use the default scaler.
    fn on_before_transform(&self, request: &TransformRequest) -> TransformOutcome;

    /// Whether thumbnails of `source` would be produced externally, in which
    /// case the host's own maximum image area does not apply.
    fn on_check_image_area(&self, source: &SourceFile) -> bool;

    /// Versions of external software, for diagnostics pages.
    fn on_software_info(&self) -> Vec<SoftwareVersion>;
}

/// The external scaler, bound to a configuration and an executor.
pub struct Thumbro<E: CommandExecutor = ShellExecutor> {
    config: Config,
    executor: E,
}

impl Thumbro<ShellExecutor> {
    pub fn new(config: Config) -> Self {
        Self::with_executor(config, ShellExecutor::new())
    }
}

impl<E: CommandExecutor> Thumbro<E> {
    pub fn with_executor(config: Config, executor: E) -> Self {
        Self { config, executor }
    }

    #[cfg(test)]
    pub(crate) fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: CommandExecutor> TransformHooks for Thumbro<E> {
    fn on_before_transform(&self, request: &TransformRequest) -> TransformOutcome {
        if !self.config.enabled {
            return TransformOutcome::NotHandled;
        }

        let Some(matched) = find_rule(
            &self.config,
            &request.source,
            &request.dest_mime_type,
            Some(request.physical),
        ) else {
            tracing::debug!(
                source = %request.source.path.display(),
                dest_mime = %request.dest_mime_type,
                "no rule matched, falling back"
            );
            return TransformOutcome::NotHandled;
        };

        let commands = build_commands(request, &matched);
        if commands.is_empty() {
            return TransformOutcome::NotHandled;
        }

        tracing::debug!(
            source = %request.source.path.display(),
            rule = matched.index,
            "creating thumbnail using {}",
            matched.rule.library
        );

        let path = match run_chain(
            &self.executor,
            &commands,
            self.config.limits.max_file_size_kib,
        ) {
            Ok(path) => path,
            Err(error) => return TransformOutcome::Failed(error),
        };

        if matched.rule.set_comment {
            if let Some(comment) = request.comment.as_deref().filter(|c| !c.is_empty()) {
                set_comment(&self.executor, &self.config.exiv2_command, &path, comment);
            }
        }

        TransformOutcome::Thumbnail(ThumbnailOutput {
            path,
            url: request.dest_url.clone(),
            width: request.client.width,
            height: request.client.height,
        })
    }

    fn on_check_image_area(&self, source: &SourceFile) -> bool {
        if !self.config.enabled {
            return false;
        }
        let (_, dest_mime) = self.config.thumb_type(&source.mime_type);
        let handled = find_rule(&self.config, source, &dest_mime, None).is_some();
        if handled {
            tracing::debug!(source = %source.path.display(), "overriding max image area");
        }
        handled
    }

    fn on_software_info(&self) -> Vec<SoftwareVersion> {
        self.config
            .libraries
            .iter()
            .filter_map(|(name, lib)| {
                let program = lib.version_command.as_deref()?;
                let version = query_version(&self.executor, program)?;
                Some(SoftwareVersion {
                    name: name.clone(),
                    url: lib.url.clone(),
                    version,
                })
            })
            .collect()
    }
}
