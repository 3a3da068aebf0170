//! Context configuration
//!
//! Selects which backend serves a new context. Configuration can be built
//! in code, parsed from JSON, or read from the `IRKIT_BACKEND` environment
//! variable.

use crate::error::{IrError, Result};
use irkit_backend::{Backend, ReferenceBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted by [`Config::from_env`]
pub const BACKEND_ENV_VAR: &str = "IRKIT_BACKEND";

/// Which backend implementation a context binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The in-process reference backend
    #[default]
    Reference,
    /// The native LLVM library (requires the `llvm` feature)
    Llvm,
}

impl BackendKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::Reference => "reference",
            BackendKind::Llvm => "llvm",
        }
    }

    /// Instantiates the backend, or explains why it is unavailable.
    pub(crate) fn instantiate(&self) -> Result<Box<dyn Backend>> {
        match self {
            BackendKind::Reference => Ok(Box::new(ReferenceBackend::new())),
            #[cfg(feature = "llvm")]
            BackendKind::Llvm => Ok(Box::new(irkit_backend::LlvmBackend::bind())),
            #[cfg(not(feature = "llvm"))]
            BackendKind::Llvm => Err(IrError::InvalidConfig {
                message: "backend 'llvm' requires the `llvm` feature".to_string(),
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(BackendKind::Reference),
            "llvm" => Ok(BackendKind::Llvm),
            other => Err(IrError::InvalidConfig {
                message: format!("unknown backend '{}'", other),
            }),
        }
    }
}

/// Configuration for creating a context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
}

impl Config {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| IrError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| IrError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Read the configuration from the environment. An unset variable
    /// yields the default configuration.
    pub fn from_env() -> Result<Self> {
        match std::env::var(BACKEND_ENV_VAR) {
            Ok(value) => Ok(Config {
                backend: value.parse()?,
            }),
            Err(std::env::VarError::NotPresent) => Ok(Config::default()),
            Err(e) => Err(IrError::InvalidConfig {
                message: format!("{}: {}", BACKEND_ENV_VAR, e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_reference() {
        assert_eq!(Config::default().backend, BackendKind::Reference);
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(r#"{ "backend": "llvm" }"#).unwrap();
        assert_eq!(config.backend, BackendKind::Llvm);
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.backend, BackendKind::Reference);
    }

    #[test]
    fn test_from_json_rejects_unknown_backend() {
        let err = Config::from_json(r#"{ "backend": "gcc" }"#).unwrap_err();
        assert!(matches!(err, IrError::InvalidConfig { .. }));
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config { backend: BackendKind::Llvm };
        let text = config.to_json().unwrap();
        assert_eq!(Config::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("Reference".parse::<BackendKind>().unwrap(), BackendKind::Reference);
        assert_eq!(" llvm ".parse::<BackendKind>().unwrap(), BackendKind::Llvm);
        assert!("jit".parse::<BackendKind>().is_err());
    }

    // The only test touching the variable, so the cases run in sequence
    #[test]
    fn test_from_env() {
        std::env::remove_var(BACKEND_ENV_VAR);
        assert_eq!(Config::from_env().unwrap(), Config::default());

        std::env::set_var(BACKEND_ENV_VAR, "LLVM");
        assert_eq!(Config::from_env().unwrap().backend, BackendKind::Llvm);

        std::env::set_var(BACKEND_ENV_VAR, "gcc");
        assert_eq!(
            Config::from_env(),
            Err(IrError::InvalidConfig {
                message: "unknown backend 'gcc'".to_string()
            })
        );

        std::env::remove_var(BACKEND_ENV_VAR);
    }

    #[cfg(not(feature = "llvm"))]
    #[test]
    fn test_llvm_backend_requires_feature() {
        let err = BackendKind::Llvm.instantiate().err().unwrap();
        assert!(matches!(err, IrError::InvalidConfig { .. }));
    }
}
