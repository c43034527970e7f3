//! Errors raised while loading and validating configuration
//!
//! Authentication outcomes have their own typed taxonomy in `gatehouse-auth`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type GatehouseResult<T> = Result<T, GatehouseError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    pub operation: Option<String>,
    pub metadata: HashMap<String, String>,
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

#[derive(Error, Debug)]
pub enum GatehouseError {
    /// The configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// The configuration parsed but a setting is unacceptable
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },
}

impl GatehouseError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            GatehouseError::Config { context, .. } => context,
            GatehouseError::Validation { context, .. } => context,
        }
    }

    /// Offending setting, for validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            GatehouseError::Validation { field, .. } => field.as_deref(),
            GatehouseError::Config { .. } => None,
        }
    }
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::GatehouseError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your gatehouse.toml or GATEHOUSE_* environment variables"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builder_collects_metadata() {
        let ctx = ErrorContext::new("config")
            .with_operation("load")
            .with_metadata("path", "gatehouse.toml")
            .with_suggestion("create the file");

        assert_eq!(ctx.component, "config");
        assert_eq!(ctx.operation.as_deref(), Some("load"));
        assert_eq!(ctx.metadata.get("path").map(String::as_str), Some("gatehouse.toml"));
        assert_eq!(ctx.recovery_suggestions.len(), 1);
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = validation_error!("too short", "security.jwt_secret", "config");
        assert_eq!(err.field(), Some("security.jwt_secret"));
        assert_eq!(err.context().component, "config");
        assert_eq!(err.to_string(), "Validation error: too short");
    }
}
