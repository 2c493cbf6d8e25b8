//! # Thumbro
//!
//! Hands image thumbnailing to external command-line tools (`vipsthumbnail`
//! from libvips) under configurable rules, falling back to the host's own
//! scaler whenever no rule applies.
//!
//! # Architecture: One Request, Five Steps
//!
//! ```text
//! 1. Match     rules × source × target  →  first eligible rule   (pure)
//! 2. Build     request × rule           →  command chain          (pure)
//! 3. Run       command chain            →  output file | error    (processes)
//! 4. Comment   output file              →  exiv2, best-effort     (process)
//! 5. Report    outcome                  →  NotHandled | Thumbnail | Failed
//! ```
//!
//! Matching and building never touch the filesystem, so they are unit tested
//! as plain functions. Everything that spawns a process goes through the
//! [`scaling::CommandExecutor`] trait, which tests replace with a recording
//! mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `thumbro.toml` loading, merging over stock defaults, validation |
//! | [`scaling`] | Rule matching, command construction, process execution, version query |
//! | [`hooks`] | [`hooks::TransformHooks`] adapter a host calls into |
//! | [`types`] | Requests, outcomes and errors exchanged with the host |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Rules Are Ordered, First Match Wins
//!
//! The rule table is a list, not a map keyed by MIME type. Several rules may
//! target the same output type with different area or shrink-factor windows
//! (e.g. sequential access for huge sources, different quality for heavy
//! downscales). Evaluation stops at the first rule whose conditions all hold.
//!
//! ## Falling Back Is Not Failing
//!
//! A request no rule claims is handed back as
//! [`types::TransformOutcome::NotHandled`] so the host's built-in scaler runs.
//! Only a command that actually ran and exited non-zero produces
//! [`types::TransformOutcome::Failed`], carrying the tool's own output.
//!
//! ## Serial, Size-Capped Children
//!
//! Each tool runs with `VIPS_CONCURRENCY=1` and, on Unix, an `RLIMIT_FSIZE`
//! ceiling taken from `limits.max_file_size_kib`. Hosts already thumbnail many
//! files in parallel; a tool that spawns its own thread pool per request, or
//! writes an unbounded file, would starve the machine.

pub mod config;
pub mod hooks;
pub mod output;
pub mod scaling;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
