use thiserror::Error;

/// Error kinds per the pipeline's error-handling design: most are local to a
/// single symbol and never propagate past the component boundary. Only
/// `ConfigError` and `HardCapExceeded` are meant to reach `main()`.
#[derive(Error, Debug)]
pub enum NightscreenError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("provider blocked (block signature detected): {0}")]
    ProviderBlocked(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("sentiment provider unavailable: {0}")]
    SentimentUnavailable(String),

    #[error("no trained model for {0}")]
    ModelMissing(String),

    #[error("phase budget exceeded: {0}")]
    PhaseBudgetExceeded(String),

    #[error("hard run cap exceeded")]
    HardCapExceeded,

    #[error("calculation error: {0}")]
    CalculationError(String),

    #[error("failed to write report: {reason}")]
    ReportWrite { reason: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl NightscreenError {
    /// Timeouts are treated as DataUnavailable for the symbol they occurred on.
    pub fn timeout_as_data_unavailable(symbol: &str, dur: std::time::Duration) -> Self {
        let _ = dur;
        NightscreenError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "request timed out".to_string(),
        }
    }
}
