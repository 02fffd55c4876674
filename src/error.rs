use thiserror::Error;

/// Errors raised while building a `ParameterSet` or an optimizer key list from
/// external input. The simulation core itself never fails.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown tax-rate change year '{0}' (expected none, 2030, 2035 or 2040)")]
    UnknownTaxChangeYear(String),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("'{0}' is not an optimizable parameter")]
    UnknownParamKey(String),

    #[error("parameter file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read parameter file: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
