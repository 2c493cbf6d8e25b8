//! Sequential execution of a command chain.
//!
//! Commands run strictly in order. The first failure stops the chain: its
//! partial output is removed, later commands never run, and the captured
//! process output is returned verbatim. Temporary intermediates are deleted
//! as soon as the command that consumes them has finished, whatever its exit
//! status, and any left over are deleted before returning. The final output
//! belongs to the caller and is never deleted on success.

use super::command::{Command, CommandInput, CommandOutput};
use super::executor::{CommandExecutor, ExecError, Invocation};
use crate::types::TransformError;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Exit code reported when the tool could not be started at all.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Exit code reported for failures that happen before any process runs.
pub const EXIT_INTERNAL: i32 = -1;

/// Prefix of temporary intermediate files.
const TEMP_PREFIX: &str = "thumbro_";

/// Run `commands` in order, returning the final output path.
pub fn run_chain(
    executor: &impl CommandExecutor,
    commands: &[Command],
    max_file_size_kib: u64,
) -> Result<PathBuf, TransformError> {
    let mut temps: Vec<Option<TempPath>> = Vec::with_capacity(commands.len());
    let mut outputs: Vec<PathBuf> = Vec::with_capacity(commands.len());

    for (index, command) in commands.iter().enumerate() {
        let input = match &command.input {
            CommandInput::Path(path) => path.clone(),
            CommandInput::Previous(i) if *i < index => outputs[*i].clone(),
            CommandInput::Previous(i) => {
                return Err(internal_error(
                    index,
                    format!("command {index} reads the output of command {i}, which has not run"),
                ));
            }
        };

        let (output, temp) = match &command.output {
            CommandOutput::Path(path) => (path.clone(), None),
            CommandOutput::Temp { extension } => {
                let temp = make_temp(extension).map_err(|e| {
                    internal_error(index, format!("could not create temporary file: {e}"))
                })?;
                (temp.to_path_buf(), Some(temp))
            }
        };

        let invocation = Invocation::new(command.program.as_str())
            .args(command.argv(&input, &output))
            .serial()
            .max_file_size_kib(max_file_size_kib);
        let result = executor.execute(&invocation);

        if let CommandInput::Previous(i) = command.input {
            release(&mut temps[i]);
        }

        let failure = match result {
            Ok(out) if out.success() => None,
            Ok(out) => Some(TransformError {
                text: out.output,
                exit_code: out.exit_code,
                command_index: index,
            }),
            Err(e) => Some(TransformError {
                exit_code: match e {
                    ExecError::Spawn { .. } => EXIT_SPAWN_FAILED,
                    ExecError::Wait { .. } => EXIT_INTERNAL,
                },
                text: e.to_string(),
                command_index: index,
            }),
        };

        if let Some(error) = failure {
            tracing::debug!(
                name = %command.name,
                exit_code = error.exit_code,
                "command failed"
            );
            match temp {
                Some(temp) => drop(temp),
                None => remove_partial(&output),
            }
            return Err(error);
        }

        temps.push(temp);
        outputs.push(output);
    }

    let Some(final_output) = outputs.pop() else {
        return Err(internal_error(0, "empty command chain".to_string()));
    };
    // A temporary final output is handed to the caller.
    if let Some(temp) = temps.pop().flatten() {
        if let Err(e) = temp.keep() {
            return Err(internal_error(
                commands.len() - 1,
                format!("could not keep output file: {e}"),
            ));
        }
    }
    Ok(final_output)
}

fn make_temp(extension: &str) -> std::io::Result<TempPath> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    Ok(tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile()?
        .into_temp_path())
}

fn release(slot: &mut Option<TempPath>) {
    if let Some(temp) = slot.take() {
        let path = temp.to_path_buf();
        if let Err(e) = temp.close() {
            tracing::warn!(path = %path.display(), "could not delete intermediate file: {e}");
        }
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "could not delete partial output: {e}");
        }
    }
}

fn internal_error(command_index: usize, text: String) -> TransformError {
    TransformError {
        text,
        exit_code: EXIT_INTERNAL,
        command_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::executor::tests::{MockExecutor, fail, ok, output_path};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn vips(input: CommandInput, output: CommandOutput) -> Command {
        let mut cmd = Command::new("libvips", "vipsthumbnail", input, output);
        cmd.args.set("size", "100x50");
        cmd
    }

    #[test]
    fn single_command_success_returns_output() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.png");
        let exec = MockExecutor::succeeding();
        let chain = [vips(
            CommandInput::Path("/src/in.png".into()),
            CommandOutput::Path(dest.clone()),
        )];

        let result = run_chain(&exec, &chain, 409_600).unwrap();
        assert_eq!(result, dest);
        assert!(dest.exists(), "final output must survive");

        let invocations = exec.get_invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].max_file_size_kib, Some(409_600));
        assert!(
            invocations[0]
                .env
                .contains(&("VIPS_CONCURRENCY".to_string(), "1".to_string()))
        );
    }

    #[test]
    fn failure_reports_text_and_code_and_removes_partial_output() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.png");
        let exec = MockExecutor::with_results(vec![fail(1, "bad input")]);
        let chain = [vips(
            CommandInput::Path("/src/in.png".into()),
            CommandOutput::Path(dest.clone()),
        )];

        let err = run_chain(&exec, &chain, 1024).unwrap_err();
        assert_eq!(err.exit_code, 1);
        assert_eq!(err.text, "bad input");
        assert_eq!(err.command_index, 0);
        assert!(!dest.exists());
    }

    #[test]
    fn chain_passes_intermediate_and_deletes_it() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.png");
        let exec = MockExecutor::succeeding();
        let chain = [
            vips(
                CommandInput::Path("/src/in.tif".into()),
                CommandOutput::Temp {
                    extension: "v".into(),
                },
            ),
            vips(CommandInput::Previous(0), CommandOutput::Path(dest.clone())),
        ];

        run_chain(&exec, &chain, 1024).unwrap();

        let invocations = exec.get_invocations();
        assert_eq!(invocations.len(), 2);
        let intermediate = output_path(&invocations[0]).unwrap();
        assert_eq!(invocations[1].args[0], intermediate.clone().into_os_string());
        assert!(
            intermediate
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("thumbro_")
        );
        assert_eq!(intermediate.extension().unwrap(), "v");
        assert!(!intermediate.exists(), "intermediate must be deleted");
        assert!(dest.exists());
    }

    #[test]
    fn first_failure_short_circuits_chain() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.png");
        let exec = MockExecutor::with_results(vec![fail(2, "boom"), ok()]);
        let chain = [
            vips(
                CommandInput::Path("/src/in.tif".into()),
                CommandOutput::Temp {
                    extension: "v".into(),
                },
            ),
            vips(CommandInput::Previous(0), CommandOutput::Path(dest.clone())),
        ];

        let err = run_chain(&exec, &chain, 1024).unwrap_err();
        assert_eq!(err.exit_code, 2);
        assert_eq!(err.command_index, 0);

        let invocations = exec.get_invocations();
        assert_eq!(invocations.len(), 1, "second command must not run");
        let intermediate = output_path(&invocations[0]).unwrap();
        assert!(!intermediate.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn consumer_failure_still_deletes_intermediate() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.png");
        let exec = MockExecutor::with_results(vec![ok(), fail(1, "bad")]);
        let chain = [
            vips(
                CommandInput::Path("/src/in.tif".into()),
                CommandOutput::Temp {
                    extension: "v".into(),
                },
            ),
            vips(CommandInput::Previous(0), CommandOutput::Path(dest.clone())),
        ];

        let err = run_chain(&exec, &chain, 1024).unwrap_err();
        assert_eq!(err.command_index, 1);
        let intermediate = output_path(&exec.get_invocations()[0]).unwrap();
        assert!(!intermediate.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn forward_reference_is_rejected_before_running() {
        let exec = MockExecutor::succeeding();
        let chain = [vips(
            CommandInput::Previous(0),
            CommandOutput::Path("/tmp/never.png".into()),
        )];
        let err = run_chain(&exec, &chain, 1024).unwrap_err();
        assert_eq!(err.exit_code, EXIT_INTERNAL);
        assert!(exec.get_invocations().is_empty());
    }

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failure_log_names_the_command_once() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::with_results(vec![fail(3, "bad")]);
        let chain = [vips(
            CommandInput::Path("/src/in.png".into()),
            CommandOutput::Path(tmp.path().join("out.png")),
        )];
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer({
                let writer = writer.clone();
                move || writer.clone()
            })
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            run_chain(&exec, &chain, 1024).unwrap_err();
        });

        let log = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("command failed"), "log was:\n{log}");
        assert!(log.contains("exit_code=3"), "log was:\n{log}");
        assert_eq!(log.matches("libvips").count(), 1, "log was:\n{log}");
    }

    #[test]
    fn empty_chain_is_an_error() {
        let exec = MockExecutor::succeeding();
        assert!(run_chain(&exec, &[], 1024).is_err());
    }
}
