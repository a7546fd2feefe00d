use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Invalid {param}: {reason}")]
    InvalidParameter { param: String, reason: String },
}

impl FilterError {
    pub fn parameter(param: &str, reason: impl Into<String>) -> Self {
        FilterError::InvalidParameter {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}
