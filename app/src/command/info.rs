use progout_config::Config;

/// Strategy for displaying configuration information.
///
/// Shows where the configuration lives and the effective runner settings,
/// which are the defaults when no file exists.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = Config;
    type Output = ();

    async fn execute(&self, config: Self::Input) -> anyhow::Result<()> {
        println!("=== progout Configuration ===\n");

        let config_path = Config::config_path()?;
        println!("Config File:");
        if config_path.exists() {
            println!("  Path: {}", config_path.display());
        } else {
            println!("  Path: {} (not found, using defaults)", config_path.display());
        }
        println!();

        let runner = config.runner.build_runner();
        println!("Runner:");
        println!(
            "  Shell: {} {}",
            runner.shell().program,
            runner.shell().args.join(" ")
        );
        match runner.timeout() {
            Some(timeout) => println!("  Timeout: {}s", timeout.as_secs()),
            None => println!("  Timeout: (none)"),
        }
        println!();

        println!("Logging:");
        println!("  Level: {}", config.logging.level);

        Ok(())
    }
}
