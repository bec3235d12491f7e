//! Run a file of command directives concurrently through one cache.
//!
//! Directives that describe the same command are executed once; the rest
//! of the requests reuse the stored result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use progout_config::Config;
use progout_core::{CommandSpec, DirectiveRecord, ExecutionResult, ProcessRunner, ResultCache};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Input parameters for the Batch command strategy.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub config: Config,
    pub file: PathBuf,
}

/// One entry of a batch file.
#[derive(Debug, Clone, Deserialize)]
struct BatchDirective {
    command: String,
    #[serde(default)]
    use_shell: bool,
    #[serde(default)]
    hide_standard_error: bool,
    /// Relative to the batch file's directory; defaults to that directory.
    #[serde(default)]
    working_directory: Option<PathBuf>,
    #[serde(default)]
    extra_arguments: Option<String>,
    #[serde(default)]
    expected_exit_code: i32,
}

impl BatchDirective {
    fn to_record(&self, base_dir: &Path) -> DirectiveRecord {
        let working_directory = self
            .working_directory
            .as_ref()
            .map_or_else(|| base_dir.to_path_buf(), |dir| base_dir.join(dir));
        DirectiveRecord {
            command: self.command.clone(),
            use_shell: self.use_shell,
            hide_standard_error: self.hide_standard_error,
            working_directory,
            extra_arguments: self.extra_arguments.clone(),
        }
    }
}

fn load_directives(file: &Path) -> anyhow::Result<Vec<BatchDirective>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Cannot read batch file {}: {e}", file.display()))?;
    let directives = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid batch file {}: {e}", file.display()))?;
    Ok(directives)
}

/// Strategy for running a batch of directives.
///
/// Prints one JSON line per directive, in file order, and returns 1 when
/// any directive could not be run.
#[derive(Debug, Clone, Copy)]
pub struct BatchStrategy;

impl super::CommandStrategy for BatchStrategy {
    type Input = BatchInput;
    type Output = i32;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<i32> {
        let directives = load_directives(&input.file)?;
        let base_dir = std::path::absolute(&input.file)?
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);

        let runner = Arc::new(input.config.runner.build_runner());
        let cache = Arc::new(ResultCache::new());
        let outcomes = run_all(&directives, &base_dir, &runner, &cache).await?;

        let mut failures = 0;
        for (directive, (spec, outcome)) in directives.iter().zip(&outcomes) {
            let line = match outcome {
                Ok(result) => {
                    if result.exit_code != directive.expected_exit_code {
                        warn!(
                            "Unexpected return code {} from command {spec} (expected {})",
                            result.exit_code, directive.expected_exit_code
                        );
                    }
                    json!({
                        "command": spec.command().to_string(),
                        "exit_code": result.exit_code,
                        "output": result.output,
                    })
                }
                Err(e) => {
                    failures += 1;
                    warn!("Command failed: {spec}: {e}");
                    json!({
                        "command": spec.command().to_string(),
                        "error": e,
                    })
                }
            };
            println!("{line}");
        }

        info!(
            "Ran {} directive(s), {} distinct command(s) executed, {} failure(s)",
            directives.len(),
            cache.len(),
            failures
        );
        Ok(i32::from(failures > 0))
    }
}

type Outcome = (CommandSpec, Result<Arc<ExecutionResult>, String>);

async fn run_all(
    directives: &[BatchDirective],
    base_dir: &Path,
    runner: &Arc<ProcessRunner>,
    cache: &Arc<ResultCache>,
) -> anyhow::Result<Vec<Outcome>> {
    let mut tasks = JoinSet::new();
    for (index, directive) in directives.iter().enumerate() {
        let spec = CommandSpec::from_directive(&directive.to_record(base_dir));
        let runner = Arc::clone(runner);
        let cache = Arc::clone(cache);
        tasks.spawn(async move {
            let result = cache
                .get_or_execute(&spec, runner.as_ref())
                .await
                .map_err(|e| e.to_string());
            (index, (spec, result))
        });
    }

    let mut outcomes: Vec<Option<Outcome>> = vec![None; directives.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        outcomes[index] = Some(outcome);
    }
    Ok(outcomes.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_defaults_to_batch_directory() {
        let directive: BatchDirective =
            serde_json::from_str(r#"{"command": "echo spam"}"#).unwrap();
        let record = directive.to_record(Path::new("/docs"));
        assert_eq!(record.working_directory, PathBuf::from("/docs"));
        assert!(!record.use_shell);
        assert_eq!(directive.expected_exit_code, 0);
    }

    #[test]
    fn test_directive_resolves_relative_directory() {
        let directive: BatchDirective = serde_json::from_str(
            r#"{"command": "ls", "working_directory": "sub", "extra_arguments": "-la"}"#,
        )
        .unwrap();
        let record = directive.to_record(Path::new("/docs"));
        assert_eq!(record.working_directory, PathBuf::from("/docs/sub"));
        assert_eq!(
            CommandSpec::from_directive(&record).command().as_text(),
            Some("ls -la")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_all_deduplicates_equal_directives() {
        let tmpdir = tempfile::tempdir().unwrap();
        let marker = tmpdir.path().join("runs");
        let command = format!("echo x >> '{}'; echo spam", marker.display());
        let directives: Vec<BatchDirective> = serde_json::from_value(json!([
            {"command": command, "use_shell": true},
            {"command": command, "use_shell": true, "working_directory": "."},
            {"command": "echo eggs"},
        ]))
        .unwrap();

        let runner = Arc::new(ProcessRunner::new());
        let cache = Arc::new(ResultCache::new());
        let outcomes = run_all(&directives, tmpdir.path(), &runner, &cache)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        let outputs: Vec<&str> = outcomes
            .iter()
            .map(|(_, result)| result.as_ref().unwrap().output.as_str())
            .collect();
        assert_eq!(outputs, ["spam", "spam", "eggs"]);
        assert_eq!(cache.len(), 2);
        assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 1);
    }
}
