use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::value::Value;

/// Identifier generation strategy declared on a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorType {
    /// Identifiers are assigned by the application.
    #[default]
    None,
    /// Let the mapping pick; resolves to assigned identifiers.
    Auto,
    Uuid,
    /// Sequential numbering needs a backing store and is rejected.
    Increment,
}

/// Resolved identifier generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdGenerator {
    #[default]
    Assigned,
    Uuid,
}

impl IdGenerator {
    pub fn resolve(kind: GeneratorType) -> Result<Self, ConfigurationError> {
        match kind {
            GeneratorType::None | GeneratorType::Auto => Ok(IdGenerator::Assigned),
            GeneratorType::Uuid => Ok(IdGenerator::Uuid),
            GeneratorType::Increment => Err(ConfigurationError::UnsupportedIdGenerator {
                kind: "increment".to_string(),
            }),
        }
    }

    /// A fresh identifier, or `None` when identifiers are assigned.
    pub fn generate(&self) -> Option<Value> {
        match self {
            IdGenerator::Assigned => None,
            IdGenerator::Uuid => Some(Value::from(uuid::Uuid::new_v4().to_string())),
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, IdGenerator::Assigned)
    }
}
