use thiserror::Error;

/// Errors raised by the engine before or while evaluating a request.
///
/// `InvalidRequest` and `InvalidParameter` reject a request before any symbol
/// is processed. `DataUnavailable` describes a single symbol and never aborts
/// a multi-symbol run; runners record it as a [`SymbolFailure`] instead.
///
/// [`SymbolFailure`]: crate::services::engine::backtest::SymbolFailure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },
}

impl EngineError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRequest(_) | EngineError::InvalidParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn display_includes_parameter_name() {
        let err = EngineError::invalid_parameter("ma_length", "must be >= 1");
        assert_eq!(err.to_string(), "invalid parameter `ma_length`: must be >= 1");
        assert!(err.is_input_error());
    }

    #[test]
    fn data_unavailable_is_not_an_input_error() {
        let err = EngineError::DataUnavailable {
            ticker: "AAPL".to_string(),
            reason: "no bars".to_string(),
        };
        assert!(!err.is_input_error());
        assert!(err.to_string().contains("AAPL"));
    }
}
