use std::process::ExitCode;

use colored::*;
use env_logger::Env;

use crate::{
    fs::config::VolumeConfig,
    shell::{run_once, start_shell},
};

mod disk;
mod fs;
mod shell;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let config = match VolumeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "❌ Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        start_shell(config);
        ExitCode::SUCCESS
    } else {
        run_once(&args, config)
    }
}
