//! Document loading and saving
//!
//! The resolver only needs `load(path) -> Value`; [`YamlLoader`] is the
//! implementation used by default. Paths without a YAML extension get the
//! canonical `.yml` appended before the file is opened.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

/// Extension appended to document paths that lack one
pub const CANONICAL_EXTENSION: &str = "yml";

/// Source of structured documents for `cfg:` includes
pub trait DocumentLoader: Send + Sync {
    /// Load the document at `path` into a Value Tree
    ///
    /// Must fail with a config-not-found error when the file is missing.
    fn load(&self, path: &Path) -> Result<Value>;
}

/// Loads YAML documents from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlLoader;

impl DocumentLoader for YamlLoader {
    fn load(&self, path: &Path) -> Result<Value> {
        let path = with_canonical_extension(path);
        log::debug!("Loading config document {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.display().to_string())
            } else {
                Error::io(format!("Failed to read '{}': {}", path.display(), e))
            }
        })?;

        parse_yaml(&content, &path.display().to_string())
    }
}

/// Parse YAML text into a Value Tree, attributing errors to `origin`
pub fn parse_yaml(content: &str, origin: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(content).map_err(|e| {
        let mut err = Error::parse(e.to_string());
        if let Some(loc) = e.location() {
            err = err.with_source_location(SourceLocation {
                file: origin.to_string(),
                line: Some(loc.line()),
                column: Some(loc.column()),
            });
        }
        err
    })
}

/// Append `.yml` unless the path already names a YAML document
pub fn with_canonical_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(CANONICAL_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Serialize a tree to YAML, keeping key insertion order
pub fn to_yaml_string(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::parse(e.to_string()))
}

/// Write a tree to `path` as YAML
pub fn save(value: &Value, path: &Path) -> Result<()> {
    let yaml = to_yaml_string(value)?;
    std::fs::write(path, yaml)
        .map_err(|e| Error::io(format!("Failed to write '{}': {}", path.display(), e)))
}
