/// Strategy for displaying version information.
#[derive(Debug, Clone, Copy)]
pub struct VersionStrategy;

impl super::CommandStrategy for VersionStrategy {
    type Input = ();
    type Output = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        println!("progout {}", env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}
