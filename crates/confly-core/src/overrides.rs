//! Command-line tokens and dotted-path overrides
//!
//! Tokens are classified as:
//! - `key.path=value` - an override
//! - `--flag` - a boolean flag, normalized to `flag=True`
//! - anything else - a config document to merge after the base config
//!
//! Overrides set raw strings; numeric typing happens later in the coercion pass.

use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// Marker that introduces a boolean flag token
const FLAG_PREFIX: &str = "--";

/// Value assigned to a bare flag
pub const FLAG_VALUE: &str = "True";

/// One dotted-path assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Key path segments, root first
    pub path: Vec<String>,
    /// Raw value text
    pub value: String,
}

impl Override {
    /// Parse a `key.path=value` token
    ///
    /// Only the first `=` separates key from value, so values may contain `=`.
    pub fn parse(token: &str) -> Result<Self> {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| Error::parse(format!("Override '{}' is missing '='", token)))?;
        let key = key.strip_prefix(FLAG_PREFIX).unwrap_or(key).trim();

        let path: Vec<String> = key.split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(Error::parse(format!("Invalid override key '{}'", key))
                .with_help("Use a dotted key path such as model.depth=50"));
        }

        Ok(Self {
            path,
            value: value.to_string(),
        })
    }

    /// The dotted key path
    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// Set this override on `root`, creating intermediate mappings
    ///
    /// A non-mapping node in the way is replaced by a mapping.
    pub fn apply(&self, root: &mut Value) {
        let Some((leaf, parents)) = self.path.split_last() else {
            return;
        };

        let mut current = ensure_mapping(root, "");
        for (depth, segment) in parents.iter().enumerate() {
            let node = current
                .entry(segment.clone())
                .or_insert_with(Value::empty_mapping);
            current = ensure_mapping(node, &self.path[..=depth].join("."));
        }

        log::debug!("Override {} = {:?}", self.key(), self.value);
        current.insert(leaf.clone(), Value::String(self.value.clone()));
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value)
    }
}

fn ensure_mapping<'v>(
    node: &'v mut Value,
    at: &str,
) -> &'v mut indexmap::IndexMap<String, Value> {
    if !node.is_mapping() {
        log::warn!(
            "Override replaces {} at '{}' with a mapping",
            node.type_name(),
            if at.is_empty() { "<root>" } else { at }
        );
        *node = Value::empty_mapping();
    }
    match node {
        Value::Mapping(map) => map,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

/// Apply overrides in order; a later override on the same path wins
pub fn apply_overrides(root: &mut Value, overrides: &[Override]) {
    for ov in overrides {
        ov.apply(root);
    }
}

/// Command-line tokens split by role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Config documents to merge, in order
    pub configs: Vec<String>,
    /// Overrides to apply between the two phases, in order
    pub overrides: Vec<Override>,
}

impl CliArgs {
    /// Classify tokens into config paths and overrides
    pub fn parse<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = Self::default();
        for token in tokens {
            match classify(token.as_ref()) {
                Token::Override(raw) => args.overrides.push(Override::parse(&raw)?),
                Token::Config(path) => args.configs.push(path),
            }
        }
        Ok(args)
    }
}

/// Role of a single command-line token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `key=value`, with flags already normalized to `name=True`
    Override(String),
    /// Path of a config document
    Config(String),
}

/// Classify one token
pub fn classify(token: &str) -> Token {
    if token.contains('=') {
        Token::Override(token.to_string())
    } else if let Some(flag) = token.strip_prefix(FLAG_PREFIX) {
        Token::Override(format!("{}={}", flag, FLAG_VALUE))
    } else {
        Token::Config(token.to_string())
    }
}
