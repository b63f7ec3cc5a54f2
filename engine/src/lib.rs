//! Client for the Black Forest Labs FLUX image API: builds a generation
//! request, submits it, polls the job and stores request, result and image
//! side by side in an output directory.

pub mod args;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod job;
pub mod prompt;
pub mod request;
pub mod service;

pub use error::FluxError;
pub use service::{BflClient, FluxService};

pub const APP_NAME: &str = "flux_client";
pub const DEFAULT_API_BASE: &str = "https://api.bfl.ml";
pub const OUTPUT_DIR_NAME: &str = "output";
