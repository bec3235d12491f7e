use std::path::PathBuf;

use progout_config::Config;
use progout_core::{CommandSpec, ResultCache};
use tracing::{debug, warn};

/// Input parameters for the Run command strategy.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub config: Config,
    /// A single command string, or a program followed by its arguments
    pub command: Vec<String>,
    pub shell: bool,
    pub hide_standard_error: bool,
    pub working_directory: Option<PathBuf>,
}

impl RunInput {
    /// One token is a command string; several are an argv sequence, unless a
    /// shell was requested, which always takes a single string.
    fn to_spec(&self) -> CommandSpec {
        let spec = match self.command.as_slice() {
            [text] if self.shell => CommandSpec::shell(text.as_str()),
            [text] => CommandSpec::from_string(text.as_str()),
            tokens if self.shell => CommandSpec::shell(tokens.join(" ")),
            tokens => CommandSpec::from_sequence(tokens.iter().cloned()),
        };
        let spec = spec.with_hidden_standard_error(self.hide_standard_error);
        match &self.working_directory {
            Some(dir) => spec.with_working_directory(dir),
            None => spec,
        }
    }
}

/// Strategy for running one command and printing its captured output.
///
/// Returns the child's exit code so the CLI can pass it on.
#[derive(Debug, Clone, Copy)]
pub struct RunStrategy;

impl super::CommandStrategy for RunStrategy {
    type Input = RunInput;
    type Output = i32;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<i32> {
        let spec = input.to_spec();
        let runner = input.config.runner.build_runner();
        let cache = ResultCache::new();

        debug!("Running {spec}");
        let result = cache.get_or_execute(&spec, &runner).await?;

        if !result.output.is_empty() {
            println!("{}", result.output);
        }
        if !result.success() {
            warn!("Command exited with code {}: {spec}", result.exit_code);
        }
        Ok(result.exit_code)
    }
}
