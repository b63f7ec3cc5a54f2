use std::path::PathBuf;

use crate::request::{Seed, Variant};

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 1024;
pub const DEFAULT_STEPS: u32 = 25;
pub const DEFAULT_GUIDANCE: f64 = 2.5;
pub const DEFAULT_SAFETY_TOLERANCE: u8 = 2;
pub const DEFAULT_INTERVAL: f64 = 2.0;

// Everything the command line controls
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub generation: GenerationArgs,

    /// Enable verbose output for request and result details
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Give up waiting for the result after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory the request, result and image files are written to
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

// Parameters sent to the model
#[derive(Debug, Clone, clap::Args)]
#[command(next_help_heading = "Generation")]
pub struct GenerationArgs {
    /// Width of the image in pixels
    #[arg(short = 'W', long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Height of the image in pixels
    #[arg(short = 'H', long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Variant of the diffusion model
    #[arg(short, long, value_enum, default_value_t)]
    pub variant: Variant,

    /// Number of network evaluations. Higher values improve quality but
    /// increase computation time
    #[arg(short, long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Enable prompt upsampling to improve the fidelity of the image to the prompt
    #[arg(short = 'u', long = "prompt_upsampling", alias = "prompt-upsampling")]
    pub prompt_upsampling: bool,

    /// Fix the generation seed: an integer, 'rand' for a random seed, or
    /// 'null' to let the service choose
    #[arg(
        long,
        value_name = "SEED",
        default_value = "rand",
        allow_negative_numbers = true
    )]
    pub seed: Seed,

    /// Guidance scale. Higher values make the image adhere more strictly to
    /// the prompt
    #[arg(short, long, default_value_t = DEFAULT_GUIDANCE)]
    pub guidance: f64,

    /// Strictness of the content filters, lower is stricter (0-6)
    #[arg(
        short = 't',
        long = "safety_tolerance",
        alias = "safety-tolerance",
        default_value_t = DEFAULT_SAFETY_TOLERANCE
    )]
    pub safety_tolerance: u8,

    /// Controls how the diffusion progresses. Smaller values give more
    /// consistent outputs, larger ones more diversity
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL)]
    pub interval: f64,
}

impl Default for GenerationArgs {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            variant: Variant::default(),
            steps: DEFAULT_STEPS,
            prompt_upsampling: false,
            seed: Seed::Random,
            guidance: DEFAULT_GUIDANCE,
            safety_tolerance: DEFAULT_SAFETY_TOLERANCE,
            interval: DEFAULT_INTERVAL,
        }
    }
}
