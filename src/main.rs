mod args;
mod pipeline;

use clap::Parser;
use env_logger::Env;
use log::{debug, error};

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
    debug!("args: {:?}", args);

    if let Err(e) = pipeline::run_pipeline(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
