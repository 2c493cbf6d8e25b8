//! External scaling: rule matching, command construction and execution.
//!
//! | Step | Function |
//! |---|---|
//! | **Match** | [`find_rule`]: first rule whose conditions hold |
//! | **Build** | [`build_commands`]: `vipsthumbnail` argv with option suffixes |
//! | **Run** | [`run_chain`]: sequential, short-circuiting, cleans intermediates |
//! | **Comment** | [`set_comment`]: exiv2, best-effort |
//! | **Version** | [`query_version`]: `vips -v`, diagnostics only |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for area, shrink factor and fit math
//! - **Options**: Ordered option bags and dimensions
//! - **Executor**: [`CommandExecutor`] trait + [`ShellExecutor`]
//! - **Matcher / Command / Runner**: the pipeline itself

mod calculations;
pub mod command;
mod comment;
pub mod executor;
pub mod matcher;
mod options;
pub mod runner;
mod version;

pub use calculations::{fit_to_width, fit_within, shrink_factor};
pub use command::{Command, CommandInput, CommandOutput, build_commands, default_output_options};
pub use comment::set_comment;
pub use executor::{CommandExecutor, ExecError, ExecOutput, Invocation, ShellExecutor};
pub use matcher::{MatchedRule, SkipReason, evaluate_rule, find_rule, input_options_for};
pub use options::{Dimensions, OptionMap};
pub use runner::run_chain;
pub use version::{parse_version, query_version};
