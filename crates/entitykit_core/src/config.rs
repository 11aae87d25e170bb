//! Runtime configuration for the core and its facade.
//!
//! # Responsibility
//! - Hold storage, paging and logging settings with stable defaults.
//! - Deserialize from JSON documents supplied by callers.
//!
//! # Invariants
//! - Every field has a default, so partial documents are valid.
//! - `default_page_size` is never zero after validation.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Page size used by free-text search when the caller gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file; in-memory when unset.
    pub database: Option<PathBuf>,
    pub default_page_size: u32,
    pub log_level: String,
    /// Rotating log directory; logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_level",
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn facade(&self) -> FacadeConfig {
        FacadeConfig {
            default_page_size: self.default_page_size,
        }
    }
}

/// Settings consumed by `DispatchFacade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacadeConfig {
    pub default_page_size: u32,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, message } => write!(f, "config `{field}` {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DEFAULT_PAGE_SIZE};

    #[test]
    fn defaults_are_usable() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.facade().default_page_size, DEFAULT_PAGE_SIZE);
        assert!(config.database.is_none());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let config = CoreConfig {
            default_page_size: 0,
            ..CoreConfig::default()
        };
        let error = config.validate().expect_err("zero page size must fail");
        assert!(error.to_string().contains("default_page_size"));
    }
}
