use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::simulation::config::Field;

/// Rejections produced while validating a simulation parameter update.
///
/// None of these ever reach the store: validation finishes before any write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LimitsError {
    #[error("invalid {field}: '{value}' is not a number")]
    Malformed { field: Field, value: String },

    #[error("invalid {field}: {value} is out of range ({})", .field.expected_range())]
    OutOfRange { field: Field, value: f64 },

    #[error("invalid update form: {reason}")]
    InvalidForm { reason: String },
}

impl LimitsError {
    pub fn malformed(field: Field, value: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            value: value.into(),
        }
    }

    pub fn out_of_range(field: Field, value: f64) -> Self {
        Self::OutOfRange { field, value }
    }

    pub fn invalid_form(reason: impl Into<String>) -> Self {
        Self::InvalidForm {
            reason: reason.into(),
        }
    }

    /// Field that failed validation, if the rejection is field specific.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Malformed { field, .. } | Self::OutOfRange { field, .. } => Some(*field),
            Self::InvalidForm { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidForm { .. } => "invalid_form",
        }
    }
}

impl ResponseError for LimitsError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        tracing::warn!("rejected limits update: {}", self);

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "field": self.field().map(Field::name),
            "kind": self.kind(),
        }))
    }
}

/// Fatal startup failures. The process must not serve with these.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid initial simulation parameters: {0}")]
    Simulation(#[from] LimitsError),
}
