use flux_engine::args::Args;
use indoc::indoc;

/// Generate an image with FLUX from a prompt read on stdin
#[derive(Debug, clap::Parser)]
#[command(
    name = "flux",
    after_help = indoc! {"
        The prompt is read from stdin until end of input. The API key is taken from
        BFL_API_KEY, which may also be set in ~/.env or a .env file in the working
        directory or one of its parents.

        Request, result and image are written to <output-dir>/<timestamp>_request.json,
        <timestamp>_result.json and <timestamp>_result.jpg.
    "}
)]
pub struct Cli {
    #[command(flatten)]
    pub args: Args,
}
