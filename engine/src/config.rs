use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{
    Result,
    eyre::{bail, eyre},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{APP_NAME, DEFAULT_API_BASE, FluxError, OUTPUT_DIR_NAME, args::Args};

pub const API_KEY_VAR: &str = "BFL_API_KEY";
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Optional overrides read from `flux_client.ron` in the local config dir.
///
/// ```ron
/// (
///     api_key: Some("..."),
///     api_base: Some("https://api.bfl.ml"),
///     output_dir: Some("/home/me/Pictures/flux"),
///     timeout_secs: Some(300),
/// )
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    pub fn path() -> Result<PathBuf> {
        Ok(dirs::config_local_dir()
            .ok_or(eyre!("Couldn't get config dir"))?
            .join(format!("{APP_NAME}.ron")))
    }

    /// Loads the settings file, or the empty settings if there is none
    pub fn load() -> Result<Self> {
        let Ok(path) = Self::path() else {
            debug!("No config dir, using default settings");
            return Ok(Self::default());
        };
        if !path.exists() {
            Ok(Self::default())
        } else {
            Self::load_from(&path)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path).map_err(|e| FluxError::io(path, e))?;
        match ron::from_str(&src) {
            Ok(settings) => {
                debug!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) => bail!(FluxError::configuration(format!(
                "invalid settings file {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }
}

/// Loads `.env` files into the process environment.
///
/// The one in the home directory goes first, then the first one found walking
/// up from the working directory. Variables that are already set are kept.
pub fn load_dotenv() {
    if let Some(home_env) = dirs::home_dir().map(|home| home.join(".env")) {
        if home_env.is_file() {
            match dotenvy::from_path(&home_env) {
                Ok(()) => debug!("Loaded {}", home_env.display()),
                Err(e) => warn!("Couldn't load {}: {e}", home_env.display()),
            }
        }
    }

    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Couldn't load .env: {e}"),
    }
}

/// Process-wide configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub verbose: bool,
}

impl Config {
    /// Command line beats environment beats settings file.
    ///
    /// `env` looks up environment variables, the binary passes
    /// `std::env::var`.
    pub fn resolve(
        args: &Args,
        settings: &Settings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = env(API_KEY_VAR)
            .or_else(|| settings.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FluxError::configuration(format!(
                    "API key not found, set {API_KEY_VAR} in the environment or a .env file"
                ))
            })?;

        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| settings.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(OUTPUT_DIR_NAME));

        let timeout = args
            .timeout
            .or(settings.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self {
            api_key,
            output_dir,
            poll_interval: POLL_INTERVAL,
            timeout,
            verbose: args.verbose,
        })
    }
}
