//! Policy, state and configuration documents on disk
//!
//! Documents are hierarchical text files whose serialization format is
//! chosen from the file extension.

use crate::{Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// Serialization formats a document may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Detect the format from a path's extension.
    ///
    /// - `.yaml`, `.yml`, `.conf` -> YAML
    /// - `.json` -> JSON
    /// - `.toml` -> TOML
    pub fn detect(path: &NormalizedPath) -> Result<Self> {
        let extension = path.extension().unwrap_or("");
        match extension.to_lowercase().as_str() {
            "yaml" | "yml" | "conf" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    /// Parse document text; `path` is only used for error reporting.
    pub fn parse<T: DeserializeOwned>(self, path: &NormalizedPath, content: &str) -> Result<T> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::Parse {
            path: path.to_native(),
            format: self,
            message,
        })
    }

    /// Render a value as document text. JSON and TOML are pretty-printed.
    pub fn render<T: Serialize>(self, path: &NormalizedPath, value: &T) -> Result<String> {
        let rendered = match self {
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| Error::Render {
            path: path.to_native(),
            format: self,
            message,
        })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Toml => "TOML",
        })
    }
}

/// Load a document, or `None` if the file is blank.
pub fn load_document<T: DeserializeOwned>(path: &NormalizedPath) -> Result<Option<T>> {
    let format = DocumentFormat::detect(path)?;
    let content = io::read_text(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    format.parse(path, &content).map(Some)
}

/// Save a document atomically in the format its extension names.
pub fn save_document<T: Serialize>(path: &NormalizedPath, value: &T) -> Result<()> {
    let format = DocumentFormat::detect(path)?;
    let content = format.render(path, value)?;
    io::write_text(path, &content)
}
