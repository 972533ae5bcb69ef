use std::{path::PathBuf, sync::OnceLock};

use clap::Parser;

/// Declares a customer's AWS stack from a deployment file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the deployment file. Vars files are read from the same directory.
    #[arg(short, long, default_value = "deployment.toml")]
    pub config: PathBuf,
    /// Write the plan to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}
