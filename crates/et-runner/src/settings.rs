use std::num::NonZeroUsize;
use std::path::Path;

use et_io::{IniDocument, read_ini};
use et_resample::{
    AggregationConfig, CarryOverScope, ConfigWarning, DEFAULT_PERCENT_PRECISION,
    DEFAULT_RESAMPLING_COUNT, DEFAULT_RESAMPLING_RATE, DEFAULT_TIME_PRECISION, ReportPrecision,
    ResamplingMode,
};

use crate::RunnerError;
use crate::discover::DiscoveryOptions;

const SETTINGS: &str = "SETTINGS";
const AGGREGATE_TYPE: &str = "AGGREGATE TYPE";
const CONSOLE_OUTPUT: &str = "CONSOLE OUTPUT";

/// Command-line values that win over the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Forces `FixedRate` with this rate.
    pub rate: Option<NonZeroUsize>,
    pub group_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub discovery: DiscoveryOptions,
    pub config: AggregationConfig,
    /// Problems found while reading the configuration, in file order.
    pub warnings: Vec<ConfigWarning>,
}

/// Load `path` and apply `overrides`. A missing file is not an error: every
/// setting takes its default and a warning is recorded.
pub fn load_settings(path: &Path, overrides: &Overrides) -> Result<RunSettings, RunnerError> {
    if !path.exists() {
        let mut settings = settings_from_document(&IniDocument::default(), overrides)?;
        settings.warnings.insert(
            0,
            ConfigWarning::MissingConfigFile {
                path: path.display().to_string(),
            },
        );
        return Ok(settings);
    }
    let doc = read_ini(path)?;
    settings_from_document(&doc, overrides)
}

pub fn settings_from_document(
    doc: &IniDocument,
    overrides: &Overrides,
) -> Result<RunSettings, RunnerError> {
    let mut warnings = Vec::new();

    let discovery = DiscoveryOptions::new(
        doc.get(SETTINGS, "FILE_TYPES"),
        doc.get(SETTINGS, "FILE_TO_PROCESS"),
    );

    let rate = positive_setting(doc, "RESAMPLING_RATE", DEFAULT_RESAMPLING_RATE, &mut warnings);
    let count = positive_setting(
        doc,
        "RESAMPLING_COUNT",
        DEFAULT_RESAMPLING_COUNT,
        &mut warnings,
    );
    let interval = doc.get(SETTINGS, "SPECIFY_INTERVAL").unwrap_or_default();
    let code = int_setting(
        doc,
        SETTINGS,
        "RESAMPLING_MODE",
        ResamplingMode::RATE_CODE,
        &mut warnings,
    );
    let mode = match overrides.rate {
        Some(rate) => ResamplingMode::FixedRate { rate },
        None => {
            let (mode, warning) = ResamplingMode::from_code(code, rate, count, interval);
            warnings.extend(warning);
            mode
        }
    };

    let carry_over = match doc.get(SETTINGS, "CARRY_OVER_SCOPE") {
        Some(raw) => raw.parse::<CarryOverScope>().unwrap_or_else(|warning| {
            warnings.push(warning);
            CarryOverScope::default()
        }),
        None => CarryOverScope::default(),
    };

    let precision = ReportPrecision {
        percent: precision_setting(doc, "PERCENT_PREC", DEFAULT_PERCENT_PRECISION, &mut warnings),
        time: precision_setting(doc, "TIME_PREC", DEFAULT_TIME_PRECISION, &mut warnings),
    };

    let mut builder = AggregationConfig::builder()
        .mode(mode)
        .carry_over(carry_over)
        .precision(precision);
    if let Some(group_by) = overrides
        .group_by
        .as_deref()
        .or_else(|| doc.get(SETTINGS, "GROUP_BY"))
    {
        builder = builder.group_by(group_by.trim());
    }
    if let Some(section) = doc.section(AGGREGATE_TYPE) {
        for (column, functions) in section.entries() {
            builder = builder.aggregate_list(column.as_str(), functions);
        }
    }
    let config = builder.build()?;

    warnings.extend(config.unknown_functions().map(|(column, function)| {
        ConfigWarning::UnknownAggregate {
            column: column.to_owned(),
            function: function.to_owned(),
        }
    }));

    Ok(RunSettings {
        discovery,
        config,
        warnings,
    })
}

fn int_setting(
    doc: &IniDocument,
    section: &str,
    key: &str,
    default: i64,
    warnings: &mut Vec<ConfigWarning>,
) -> i64 {
    let Some(raw) = doc.get(section, key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warnings.push(ConfigWarning::InvalidInteger {
            key: key.to_owned(),
            value: raw.to_owned(),
            default,
        });
        default
    })
}

fn positive_setting(
    doc: &IniDocument,
    key: &str,
    default: NonZeroUsize,
    warnings: &mut Vec<ConfigWarning>,
) -> NonZeroUsize {
    let fallback = default.get() as i64;
    let value = int_setting(doc, SETTINGS, key, fallback, warnings);
    match usize::try_from(value).ok().and_then(NonZeroUsize::new) {
        Some(value) => value,
        None => {
            warnings.push(ConfigWarning::NonPositive {
                key: key.to_owned(),
                value,
                default: fallback,
            });
            default
        }
    }
}

fn precision_setting(
    doc: &IniDocument,
    key: &str,
    default: usize,
    warnings: &mut Vec<ConfigWarning>,
) -> usize {
    let fallback = default as i64;
    let value = int_setting(doc, CONSOLE_OUTPUT, key, fallback, warnings);
    usize::try_from(value).unwrap_or_else(|_| {
        warnings.push(ConfigWarning::Negative {
            key: key.to_owned(),
            value,
            default: fallback,
        });
        default
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use et_io::{IniDocument, parse_ini};
    use et_resample::{
        AggregateFunctionId, AggregateKind, CarryOverScope, ConfigError, ConfigWarning,
        ResamplingMode,
    };

    use super::{Overrides, load_settings, settings_from_document};
    use crate::RunnerError;

    fn nz(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).expect("non-zero")
    }

    const OPTIONS: &str = "\
[SETTINGS]
FILE_TYPES = txt, .tsv
RESAMPLING_MODE = 1
RESAMPLING_RATE = 4
RESAMPLING_COUNT = 20
GROUP_BY = TRIAL_LABEL
FILE_TO_PROCESS = p0?_*

[AGGREGATE TYPE]
RIGHT_GAZE_X = mean,median
RIGHT_FIX_INDEX = unique_occurrences

[CONSOLE OUTPUT]
PERCENT_PREC = 1
TIME_PREC = 2
";

    #[test]
    fn document_values_populate_settings() {
        let doc = parse_ini(OPTIONS).expect("ini");
        let settings = settings_from_document(&doc, &Overrides::default()).expect("settings");

        assert!(settings.warnings.is_empty(), "{:?}", settings.warnings);
        assert_eq!(settings.discovery.file_types, vec!["txt", "tsv"]);
        assert_eq!(settings.discovery.pattern, "p0?_*");
        let config = &settings.config;
        assert_eq!(config.group_by(), "TRIAL_LABEL");
        assert_eq!(config.mode(), &ResamplingMode::FixedCount { count: nz(20) });
        assert_eq!(config.precision().percent, 1);
        assert_eq!(config.precision().time, 2);
        assert_eq!(
            config.functions_for("RIGHT_FIX_INDEX").expect("fix"),
            &[AggregateFunctionId::Known(AggregateKind::UniqueOccurrences)]
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let settings =
            settings_from_document(&IniDocument::default(), &Overrides::default()).expect("settings");

        assert!(settings.warnings.is_empty());
        assert_eq!(settings.discovery.file_types, vec!["txt", "text"]);
        assert_eq!(settings.discovery.pattern, "*");
        assert_eq!(settings.config.group_by(), "TRIAL_INDEX");
        assert_eq!(settings.config.mode(), &ResamplingMode::FixedRate { rate: nz(5) });
        assert_eq!(settings.config.carry_over(), CarryOverScope::Trial);
        assert!(settings.config.aggregations().is_empty());
    }

    #[test]
    fn bad_integers_fall_back_with_warnings() {
        let doc = parse_ini(
            "[SETTINGS]\nRESAMPLING_RATE = five\nRESAMPLING_COUNT = 0\nRESAMPLING_MODE = 9\n\
             [CONSOLE OUTPUT]\nTIME_PREC = -1\n",
        )
        .expect("ini");
        let settings = settings_from_document(&doc, &Overrides::default()).expect("settings");

        assert_eq!(settings.config.mode(), &ResamplingMode::FixedRate { rate: nz(5) });
        assert_eq!(settings.config.precision().time, 5);
        assert_eq!(
            settings.warnings,
            vec![
                ConfigWarning::InvalidInteger {
                    key: "RESAMPLING_RATE".to_owned(),
                    value: "five".to_owned(),
                    default: 5
                },
                ConfigWarning::NonPositive {
                    key: "RESAMPLING_COUNT".to_owned(),
                    value: 0,
                    default: 10
                },
                ConfigWarning::UnknownMode { value: 9 },
                ConfigWarning::Negative {
                    key: "TIME_PREC".to_owned(),
                    value: -1,
                    default: 5
                },
            ]
        );
    }

    #[test]
    fn unknown_aggregates_and_scopes_are_warned() {
        let doc = parse_ini(
            "[SETTINGS]\nCARRY_OVER_SCOPE = forever\n[AGGREGATE TYPE]\nX = mean,geomean\n",
        )
        .expect("ini");
        let settings = settings_from_document(&doc, &Overrides::default()).expect("settings");

        assert_eq!(settings.config.carry_over(), CarryOverScope::Trial);
        assert_eq!(
            settings.warnings,
            vec![
                ConfigWarning::UnknownCarryOverScope {
                    value: "forever".to_owned()
                },
                ConfigWarning::UnknownAggregate {
                    column: "X".to_owned(),
                    function: "geomean".to_owned()
                },
            ]
        );
    }

    #[test]
    fn command_line_overrides_win() {
        let doc = parse_ini(OPTIONS).expect("ini");
        let overrides = Overrides {
            rate: Some(nz(3)),
            group_by: Some("BLOCK".to_owned()),
        };
        let settings = settings_from_document(&doc, &overrides).expect("settings");

        assert_eq!(settings.config.mode(), &ResamplingMode::FixedRate { rate: nz(3) });
        assert_eq!(settings.config.group_by(), "BLOCK");
    }

    #[test]
    fn interval_mode_stops_the_run() {
        let doc = parse_ini("[SETTINGS]\nRESAMPLING_MODE = 2\nSPECIFY_INTERVAL = 20ms\n")
            .expect("ini");
        let err = settings_from_document(&doc, &Overrides::default()).expect_err("unsupported");
        assert!(matches!(err, RunnerError::Config(_)));
    }

    #[test]
    fn repeated_function_for_one_column_stops_the_run() {
        let doc = parse_ini("[AGGREGATE TYPE]\nX = mean\nX = mean\n").expect("ini");
        let err = settings_from_document(&doc, &Overrides::default()).expect_err("X_mean twice");
        assert!(matches!(
            err,
            RunnerError::Config(ConfigError::DuplicateOutputColumn { name }) if name == "X_mean"
        ));
    }

    #[test]
    fn missing_file_means_defaults_and_a_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("options.ini");
        let settings = load_settings(&path, &Overrides::default()).expect("settings");
        assert!(matches!(
            settings.warnings.as_slice(),
            [ConfigWarning::MissingConfigFile { .. }]
        ));
        assert_eq!(settings.config.group_by(), "TRIAL_INDEX");
    }
}
