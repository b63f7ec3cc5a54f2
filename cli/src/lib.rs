use std::{
    env,
    io::{IsTerminal, stdin},
};

use chrono::{DateTime, Local};
use color_eyre::Result;
use flux_engine::{
    BflClient,
    config::{self, Settings},
    job,
    prompt::PromptInput,
};
use log::info;

pub mod cli;
pub use cli::Cli;

/// Runs one generation with the real service, prompt from stdin
pub async fn run(cli: Cli, started: DateTime<Local>) -> Result<()> {
    config::load_dotenv();
    let settings = Settings::load()?;
    let service = BflClient::new(settings.api_base());
    info!("Using {}", service.api_base());

    let stdin = stdin();
    let interactive = stdin.is_terminal();
    let artifacts = job::execute(
        &cli.args,
        &settings,
        |name| env::var(name).ok(),
        PromptInput::new(stdin.lock(), interactive),
        &service,
        started,
    )
    .await?;

    info!(
        "Wrote {}, {} and {}",
        artifacts.request.display(),
        artifacts.result.display(),
        artifacts.image.display()
    );
    Ok(())
}
