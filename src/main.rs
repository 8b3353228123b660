//! spx - Spectral Audio Toolkit

use clap::Parser;
use spectrakit::processing::ToolRunner;
use spectrakit::{init_logging, Args, Config};
use std::process;

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_args_and_config(&args)?;
    init_logging(config.verbose);
    log::debug!("{} v{}", spectrakit::NAME, spectrakit::VERSION);
    log::debug!("Config: {:?}", config);

    ToolRunner::new(config).run(&args.command)?;
    Ok(())
}
