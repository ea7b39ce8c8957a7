//! Error types for confly
//!
//! Errors are structured: a kind describing what went wrong, plus optional
//! context (config path, source location, cause, help text). Every fatal
//! condition aborts the whole build; there is no partial-tree recovery.

use std::fmt;

/// Result type alias for confly operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confly operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the config where the error occurred (e.g., "model.layers")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A `var:` path segment is absent from the tree
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },
    /// An included document does not exist
    #[error("Config not found: {path}")]
    ConfigNotFound { path: String },
    /// An arithmetic operator could not be evaluated
    #[error("Arithmetic error in '{operator}': {message}")]
    Arithmetic { operator: String, message: String },
    /// A variable or include depends on itself
    #[error("Circular reference detected")]
    CircularReference,
    /// Error parsing a document
    #[error("Parse error")]
    Parse,
    /// I/O error other than a missing document
    #[error("I/O error")]
    Io,
    /// Error accessing a path that doesn't exist in a built config
    #[error("Path not found")]
    PathNotFound,
    /// Typed access on a value of another type
    #[error("Type coercion failed")]
    TypeCoercion,
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create an undefined variable error
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        let name = name.into();
        let help = format!("Define '{}' in the configuration or pass it as an override", name);
        Self::from_kind(ErrorKind::UndefinedVariable { name }).with_help(help)
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::ConfigNotFound { path: path.into() })
            .with_help("Check that the file exists relative to the config directory")
    }

    /// Create an arithmetic error
    pub fn arithmetic(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Arithmetic {
            operator: operator.into(),
            message: message.into(),
        })
    }

    /// Create a circular reference error
    pub fn circular_reference(chain: Vec<String>) -> Self {
        let mut err = Self::from_kind(ErrorKind::CircularReference)
            .with_help("Break the circular dependency by removing one of the references");
        err.cause = Some(format!("Chain: {}", chain.join(" → ")));
        err
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        let mut err = Self::from_kind(ErrorKind::Parse);
        err.cause = Some(message.into());
        err
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        let mut err = Self::from_kind(ErrorKind::Io);
        err.cause = Some(message.into());
        err
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        let help = format!("Check that '{}' exists in the configuration", path_str);
        Self::from_kind(ErrorKind::PathNotFound)
            .with_path(path_str)
            .with_help(help)
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        let mut err = Self::from_kind(ErrorKind::TypeCoercion)
            .with_path(path)
            .with_help(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            ));
        err.cause = Some(format!("Got: {}", got.into()));
        err
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add path context unless the error already carries one
    pub fn or_path(mut self, path: &str) -> Self {
        if self.path.is_none() && !path.is_empty() {
            self.path = Some(path.to_string());
        }
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
                if let Some(column) = loc.column {
                    write!(f, ":{}", column)?;
                }
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
