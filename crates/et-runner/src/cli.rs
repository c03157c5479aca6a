use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::settings::Overrides;
use crate::{DEFAULT_CONFIG_FILE, RunnerError};

pub const USAGE: &str = "\
et-resample
Resamples every matching file under DIR and writes <name>_processed<.ext> next to it.
Columns and their aggregate types come from the [AGGREGATE TYPE] section of the
configuration file; configured columns missing from a file are skipped.

Usage:
\tet-resample [DIR] [-n RATE] [--trial COLUMN] [--config PATH] [--report PATH]
Options:
\tDIR                directory to scan recursively (default: current directory)
\t-n <rate>          resample every RATE rows, overriding the configured mode
\t--trial <column>   column holding trial indices (default: TRIAL_INDEX)
\t--config <path>    configuration file (default: options.ini)
\t--report <path>    write a JSON run report
\t-h, --help         show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub report: Option<PathBuf>,
    pub overrides: Overrides,
    pub help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
            report: None,
            overrides: Overrides::default(),
            help: false,
        }
    }
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<CliArgs, RunnerError>
where
    I: IntoIterator<Item = String>,
{
    let mut out = CliArgs::default();
    let mut dir = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-n" => {
                let value = args.next().ok_or_else(|| usage("-n requires a rate"))?;
                let rate = value
                    .parse::<usize>()
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or_else(|| usage(format!("-n expects a positive integer, got '{value}'")))?;
                out.overrides.rate = Some(rate);
            }
            "--trial" => {
                let value = args
                    .next()
                    .ok_or_else(|| usage("--trial requires a column name"))?;
                if value.trim().is_empty() {
                    return Err(usage("--trial requires a column name"));
                }
                out.overrides.group_by = Some(value);
            }
            "--config" => {
                let value = args.next().ok_or_else(|| usage("--config requires a file path"))?;
                out.config = PathBuf::from(value);
            }
            "--report" => {
                let value = args.next().ok_or_else(|| usage("--report requires a file path"))?;
                out.report = Some(PathBuf::from(value));
            }
            "-h" | "--help" => out.help = true,
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(usage(format!("unknown argument: {other}")));
            }
            _ => {
                if dir.replace(PathBuf::from(&arg)).is_some() {
                    return Err(usage(format!("unexpected extra directory: {arg}")));
                }
            }
        }
    }

    if let Some(dir) = dir {
        out.dir = dir;
    }
    Ok(out)
}

fn usage(message: impl Into<String>) -> RunnerError {
    RunnerError::Usage(message.into())
}
