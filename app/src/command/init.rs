use progout_config::Config;

/// Strategy for initializing the configuration.
///
/// This strategy creates the default configuration file at `~/progout/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();
    type Output = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config_path = Config::create_config()?;

        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Configuration options:");
        println!("   - runner.shell: program that interprets --shell commands");
        println!("   - runner.shell_args: arguments placed before the command string");
        println!("   - runner.timeout_secs: kill commands that run longer (null = no limit)");
        println!("   - logging.level: trace, debug, info, warn or error");
        Ok(())
    }
}
