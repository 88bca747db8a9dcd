//! Marshaller settings.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OXM_INDENT` | 4 | Indentation width, 0 writes everything on one line |
//! | `OXM_ENCODING` | UTF-8 | Encoding label written in the declaration |
//! | `OXM_SCHEMA_VERSION` | 1.0 | XML version written in the declaration |
//! | `OXM_PASSTHROUGH` | false | Keep unmapped content instead of failing or skipping it |
//! | `OXM_XML_DECLARATION` | true | Write the `<?xml ...?>` declaration |
//!
//! # Example
//!
//! ```rust
//! use oxm::MarshallerConfig;
//!
//! let config = MarshallerConfig {
//!     indent: 0,
//!     passthrough: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::ffi::OsString;

use clap::Parser;
use tracing::warn;

use crate::error::ConfigurationError;

/// Settings for [`XmlMarshaller`](crate::XmlMarshaller).
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "oxm")]
#[command(about = "Object/XML mapping settings")]
pub struct MarshallerConfig {
    /// Indentation width in spaces.
    #[arg(long, env = "OXM_INDENT", default_value = "4")]
    pub indent: usize,

    /// Encoding label for the XML declaration.
    #[arg(long, env = "OXM_ENCODING", default_value = "UTF-8")]
    pub encoding: String,

    /// Version for the XML declaration.
    #[arg(long, env = "OXM_SCHEMA_VERSION", default_value = "1.0")]
    pub schema_version: String,

    /// Capture and re-emit content no mapping covers.
    #[arg(long, env = "OXM_PASSTHROUGH", default_value = "false")]
    pub passthrough: bool,

    /// Write the XML declaration.
    #[arg(long, env = "OXM_XML_DECLARATION", default_value = "true")]
    pub xml_declaration: bool,
}

impl Default for MarshallerConfig {
    fn default() -> Self {
        Self {
            indent: 4,
            encoding: "UTF-8".to_string(),
            schema_version: "1.0".to_string(),
            passthrough: false,
            xml_declaration: true,
        }
    }
}

impl MarshallerConfig {
    /// Reads the settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_args(["oxm"])
    }

    /// Parses command-line style arguments, with environment overrides.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args).map_err(|e| {
            warn!(error = %e, "could not parse marshaller settings");
            ConfigurationError::Invalid {
                message: e.to_string(),
            }
        })?;
        Ok(config.normalized())
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self.normalized()
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    fn normalized(mut self) -> Self {
        self.encoding = self.encoding.trim().to_uppercase();
        self
    }

    /// Output is always UTF-8; other labels would mislabel the document.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let encoding = self.encoding.trim().to_uppercase();
        if encoding != "UTF-8" && encoding != "UTF8" {
            return Err(ConfigurationError::UnsupportedEncoding {
                encoding: self.encoding.clone(),
            });
        }
        if self.schema_version.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                message: "schema version cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}
