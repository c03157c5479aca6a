#![forbid(unsafe_code)]

use std::process::ExitCode;

use et_runner::{RunnerError, USAGE, load_settings, parse_args, write_report};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunnerError::Usage(message)) => {
            eprintln!("et-resample: {message}\n\n{USAGE}");
            ExitCode::from(2)
        }
        Err(error) => {
            log::error!("{error}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), RunnerError> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let settings = load_settings(&args.config, &args.overrides)?;
    for warning in &settings.warnings {
        log::warn!("{warning}");
    }

    let report = et_runner::run(&args.dir, &settings)?;
    if let Some(path) = &args.report {
        write_report(path, &report)?;
        log::info!("wrote run report to '{}'", path.display());
    }
    Ok(())
}
