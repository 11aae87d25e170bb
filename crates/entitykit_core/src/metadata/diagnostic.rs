//! Non-fatal build-time diagnostics.

use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Offending declaration part was dropped; output is still usable.
    Warning,
    /// A field, query or entity was rejected.
    Error,
}

/// One finding reported while extracting or synthesizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub entity: String,
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(entity: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, entity, field, message)
    }

    pub fn error(entity: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, entity, field, message)
    }

    fn new(severity: Severity, entity: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity,
            entity: entity.to_string(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Emits this diagnostic as a log event.
    pub(crate) fn log(&self) {
        let field = self.field.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Warning => warn!(
                "event=declaration_check module=metadata status=warn entity={} field={}",
                self.entity, field
            ),
            Severity::Error => error!(
                "event=declaration_check module=metadata status=error entity={} field={}",
                self.entity, field
            ),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.field {
            Some(field) => write!(f, "{level}: {}.{field}: {}", self.entity, self.message),
            None => write!(f, "{level}: {}: {}", self.entity, self.message),
        }
    }
}
