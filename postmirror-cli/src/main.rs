//! postmirror: mirror a directory of posts into a repository's issues.
//!
//! # Usage
//!
//! ```text
//! postmirror [--repo <name>] [--token <token>] [--owner <login>] [--dir <path>]
//!            [--ext <ext>] [--jobs <n>] [--dry-run] [--json] <BACKEND>
//! postmirror --version
//! ```
//!
//! Every run deletes all issues in the target repository and recreates one
//! per document. Do not run two mirrors against the same repository at once.

mod commands;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use commands::mirror::MirrorArgs;

#[derive(Parser, Debug)]
#[command(
    name = "postmirror",
    version,
    about = "Mirror local posts into a remote issue tracker",
    long_about = None,
    disable_version_flag = true,
)]
struct Cli {
    /// Print version information and exit.
    #[arg(short = 'v', long)]
    version: bool,

    #[command(flatten)]
    mirror: MirrorArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("postmirror version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(backend) = cli.mirror.backend else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "the following required arguments were not provided:\n  <BACKEND>",
            )
            .exit();
    };

    init_tracing();
    cli.mirror.run(backend)
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
