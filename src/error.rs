use thiserror::Error;

/// Errors raised by the analysis core.
///
/// `InsufficientData` is a per-object outcome: the aggregator downgrades it to
/// a skip. `InvalidParameter` is fatal and surfaces before any object is
/// processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("insufficient data: need at least {required} distinct points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("header has no '{0}' entry")]
    MissingHeaderKey(String),

    #[error("header entry '{key}' is not numeric: {value}")]
    NonNumericHeader { key: String, value: String },
}

impl AnalysisError {
    pub fn invalid(parameter: &str, message: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
