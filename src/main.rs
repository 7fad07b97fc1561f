use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = ddecomp::cli::Cli::parse();

    let default_level = if cli.silent { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match ddecomp::app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
