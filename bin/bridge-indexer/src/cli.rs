use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// Read the configuration from this JSON file instead of the environment.
    #[arg(long)]
    pub(crate) config_path: Option<PathBuf>,
}
