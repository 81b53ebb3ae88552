use charter::cli::{Cli, dispatch};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dispatch(cli)
}
