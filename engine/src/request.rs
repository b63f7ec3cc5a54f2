use std::str::FromStr;

use color_eyre::{Result, eyre::ensure};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{FluxError, args::GenerationArgs};

pub const MAX_SAFETY_TOLERANCE: u8 = 6;

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Default,
)]
pub enum Variant {
    #[default]
    #[value(name = "flux.1-pro")]
    #[serde(rename = "flux.1-pro")]
    #[strum(to_string = "flux.1-pro")]
    FluxPro,

    #[value(name = "flux.1-dev")]
    #[serde(rename = "flux.1-dev")]
    #[strum(to_string = "flux.1-dev")]
    FluxDev,

    #[value(name = "flux.1.1-pro")]
    #[serde(rename = "flux.1.1-pro")]
    #[strum(to_string = "flux.1.1-pro")]
    Flux11Pro,
}

/// How the seed of a request is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// any base-10 integer, negative ones included
    Fixed(i128),
    /// drawn locally over the full `u64` range when the request is built
    Random,
    /// leaves the choice to the service
    Null,
}

impl FromStr for Seed {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("rand") {
            Ok(Seed::Random)
        } else if token.eq_ignore_ascii_case("null") {
            Ok(Seed::Null)
        } else {
            token
                .parse()
                .map(Seed::Fixed)
                .map_err(|_| FluxError::validation("seed must be an integer, 'rand', or 'null'"))
        }
    }
}

impl Seed {
    pub fn resolve(self) -> Option<i128> {
        match self {
            Seed::Fixed(seed) => Some(seed),
            Seed::Random => Some(i128::from(rand::random::<u64>())),
            Seed::Null => None,
        }
    }
}

/// The body of the generation POST.
///
/// Built once per invocation by [`GenerationRequest::new`], which checks every
/// parameter range, and read-only afterwards. The serialized field order is
/// the order the service documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    prompt: String,
    width: u32,
    height: u32,
    variant: Variant,
    steps: u32,
    prompt_upsampling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i128>,
    guidance: f64,
    safety_tolerance: u8,
    interval: f64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, args: &GenerationArgs) -> Result<Self> {
        let prompt = prompt.into();
        ensure!(
            !prompt.trim().is_empty(),
            FluxError::validation("Prompt cannot be empty")
        );
        ensure!(
            args.width > 0 && args.height > 0,
            FluxError::validation(format!(
                "width and height must be positive, got {}x{}",
                args.width, args.height
            ))
        );
        ensure!(
            args.steps > 0,
            FluxError::validation("steps must be positive")
        );
        ensure!(
            args.guidance.is_finite() && args.guidance > 0.0,
            FluxError::validation(format!("guidance must be positive, got {}", args.guidance))
        );
        ensure!(
            args.interval.is_finite() && args.interval > 0.0,
            FluxError::validation(format!("interval must be positive, got {}", args.interval))
        );
        ensure!(
            args.safety_tolerance <= MAX_SAFETY_TOLERANCE,
            FluxError::validation(format!(
                "safety_tolerance must be between 0 and {MAX_SAFETY_TOLERANCE}, got {}",
                args.safety_tolerance
            ))
        );

        Ok(Self {
            prompt,
            width: args.width,
            height: args.height,
            variant: args.variant,
            steps: args.steps,
            prompt_upsampling: args.prompt_upsampling,
            seed: args.seed.resolve(),
            guidance: args.guidance,
            safety_tolerance: args.safety_tolerance,
            interval: args.interval,
        })
    }

    pub fn seed(&self) -> Option<i128> {
        self.seed
    }
}
