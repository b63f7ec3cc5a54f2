use clap::Parser;
use color_eyre::Result;
use flux_client::{Cli, run};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let started = chrono::Local::now();
    let cli = Cli::parse();
    color_eyre::install()?;
    pretty_env_logger::init();
    run(cli, started).await
}
