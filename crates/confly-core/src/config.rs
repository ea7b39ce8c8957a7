//! Building and accessing a resolved configuration
//!
//! [`ConfigBuilder::build`] runs the whole pipeline:
//!
//! 1. Phase 1 resolves `${cfg:...}` includes only, starting from the base
//!    document(s) followed by any config documents named on the command line.
//! 2. Overrides are applied to the included tree as raw strings.
//! 3. Phase 2 resolves every remaining expression, so `var` lookups see
//!    overridden values.
//! 4. Numeric-looking strings are coerced to numbers.
//!
//! The result is a [`Config`], a plain view over the final Value Tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::coerce::coerce_numeric;
use crate::error::{Error, Result};
use crate::interpolation::{self, Expression, Grammar, Scanner};
use crate::loader::{self, DocumentLoader, YamlLoader};
use crate::overrides::{apply_overrides, CliArgs};
use crate::resolver::{Operator, ResolverContext, ResolverRegistry};
use crate::value::Value;

/// Configuration options for building configs
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Base path for relative document references
    ///
    /// Defaults to the current working directory.
    pub base_path: Option<PathBuf>,
}

/// Where the base tree comes from, besides base documents
#[derive(Debug, Clone)]
enum Source {
    Value(Value),
    Yaml(String),
}

/// Fluent builder for a [`Config`]
pub struct ConfigBuilder {
    files: Vec<PathBuf>,
    source: Option<Source>,
    options: ConfigOptions,
    args: Vec<String>,
    loader: Box<dyn DocumentLoader>,
    operators: ResolverRegistry,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            source: None,
            options: ConfigOptions::default(),
            args: Vec::new(),
            loader: Box::new(YamlLoader),
            operators: ResolverRegistry::with_builtins(),
        }
    }

    /// Add a base config document, relative to the base path
    ///
    /// Base documents are merged before any documents named in the args.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Use an in-memory tree as the base config
    pub fn value(mut self, value: Value) -> Self {
        self.source = Some(Source::Value(value));
        self
    }

    /// Use YAML text as the base config
    pub fn yaml(mut self, yaml: impl Into<String>) -> Self {
        self.source = Some(Source::Yaml(yaml.into()));
        self
    }

    pub fn base_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.base_path = Some(dir.into());
        self
    }

    pub fn options(mut self, options: ConfigOptions) -> Self {
        self.options = options;
        self
    }

    /// Add one command-line token (override, flag, or config document)
    pub fn arg(mut self, token: impl Into<String>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Add command-line tokens in order
    pub fn args<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Replace the document loader used for base documents and includes
    pub fn loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Register an additional operator
    pub fn operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operators.register(operator);
        self
    }

    /// Run both resolution phases and return the final view
    pub fn build(self) -> Result<Config> {
        let base_path = match self.options.base_path {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| Error::io(format!("Failed to read working directory: {}", e)))?,
        };
        let cli = CliArgs::parse(&self.args)?;

        let mut documents = self.files;
        documents.extend(cli.configs.iter().map(PathBuf::from));

        let base = match self.source {
            Some(Source::Value(value)) => Some(value),
            Some(Source::Yaml(text)) => Some(loader::parse_yaml(&text, "<yaml>")?),
            None => None,
        };

        let engine = Engine {
            base_path: &base_path,
            loader: &*self.loader,
            operators: &self.operators,
        };

        log::debug!(
            "Phase 1: resolving includes ({} document(s) from {})",
            documents.len(),
            base_path.display()
        );
        let mut tree = match &base {
            Some(value) => engine.resolution(value, Grammar::Include).resolve_value(value, "")?,
            None => Value::empty_mapping(),
        };
        if !documents.is_empty() {
            let included = engine
                .resolution(&tree, Grammar::Include)
                .include(&documents, "")?;
            tree.merge_shallow(included);
        }

        apply_overrides(&mut tree, &cli.overrides);

        log::debug!("Phase 2: resolving expressions");
        let resolved = engine
            .resolution(&tree, Grammar::Full)
            .resolve_value(&tree, "")?;

        Ok(Config::new(coerce_numeric(resolved)))
    }
}

/// Shared inputs of every resolution pass
struct Engine<'a> {
    base_path: &'a Path,
    loader: &'a dyn DocumentLoader,
    operators: &'a ResolverRegistry,
}

impl<'a> Engine<'a> {
    fn resolution<'r>(&self, root: &'r Value, grammar: Grammar) -> Resolution<'r>
    where
        'a: 'r,
    {
        Resolution {
            root,
            grammar,
            base_path: self.base_path,
            loader: self.loader,
            operators: self.operators,
            chain: Vec::new(),
        }
    }
}

/// One pass over a tree in a single grammar
///
/// `root` is the snapshot that `var` lookups read from. `chain` holds the
/// `var:` paths and `cfg:` files currently being resolved.
struct Resolution<'a> {
    root: &'a Value,
    grammar: Grammar,
    base_path: &'a Path,
    loader: &'a dyn DocumentLoader,
    operators: &'a ResolverRegistry,
    chain: Vec<String>,
}

impl<'a> Resolution<'a> {
    /// Resolve every string in `value`, returning a new tree
    fn resolve_value(&mut self, value: &Value, path: &str) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_string(s, path),
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, item)| self.resolve_value(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut resolved = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    resolved.insert(key.clone(), self.resolve_value(item, &child)?);
                }
                Ok(Value::Mapping(resolved))
            }
            scalar => Ok(scalar.clone()),
        }
    }

    /// A string that is exactly one expression takes the expression's value;
    /// anything else stays a string with each expression spliced in.
    fn resolve_string(&mut self, s: &str, path: &str) -> Result<Value> {
        match interpolation::entire_expression(s, self.grammar) {
            Some(expr) => self.evaluate(&expr, s, path),
            None => self.interpolate(s, path).map(Value::String),
        }
    }

    /// Splice every expression in `s` as text
    fn interpolate(&mut self, s: &str, path: &str) -> Result<String> {
        let scanner = Scanner::new(s, self.grammar);
        let mut out = String::with_capacity(s.len());
        let mut pos = 0;

        while let Some(expr) = scanner.find_from(pos) {
            out.push_str(&s[pos..expr.span.start]);
            match self.evaluate(&expr, s, path)? {
                Value::String(text) => out.push_str(&text),
                other => out.push_str(&other.to_string()),
            }
            pos = expr.span.end;
        }

        out.push_str(&s[pos..]);
        Ok(out)
    }

    fn evaluate(&mut self, expr: &Expression, source: &str, path: &str) -> Result<Value> {
        log::trace!("Evaluating {} at '{}'", expr.text(source), path);

        match expr.operator.as_str() {
            "var" => {
                let name = self.interpolate(&expr.argument, path)?;
                self.lookup_var(name.trim(), path)
            }
            Grammar::INCLUDE_OPERATOR => {
                let mut documents = Vec::new();
                for piece in interpolation::split_top_level(&expr.argument, ',') {
                    let name = self.interpolate(piece, path)?;
                    if self.grammar == Grammar::Include
                        && interpolation::contains_any(&name, Grammar::Full)
                    {
                        // Path depends on var/env/arithmetic; include it after overrides
                        return Ok(Value::String(expr.text(source).to_string()));
                    }
                    let name: String = name
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect();
                    if !name.is_empty() {
                        documents.push(PathBuf::from(name));
                    }
                }
                self.include(&documents, path)
            }
            name => {
                let operators = self.operators;
                let Some(operator) = operators.get(name) else {
                    log::warn!(
                        "Unrecognized operator '{}' at '{}' left unresolved",
                        name,
                        path
                    );
                    return Ok(Value::String(expr.text(source).to_string()));
                };

                let pieces = if operator.splits_arguments() {
                    interpolation::split_top_level(&expr.argument, ',')
                } else {
                    vec![expr.argument.as_str()]
                };
                let args = pieces
                    .into_iter()
                    .map(|piece| -> Result<String> {
                        Ok(self.interpolate(piece, path)?.trim().to_string())
                    })
                    .collect::<Result<Vec<_>>>()?;

                operator
                    .evaluate(&args, &ResolverContext::new(path))
                    .map_err(|e| e.or_path(path))
            }
        }
    }

    /// Look up a dotted path in the root snapshot and resolve what is there
    fn lookup_var(&mut self, name: &str, path: &str) -> Result<Value> {
        let key = format!("var:{}", name);
        self.enter(key, path)?;

        let root = self.root;
        let result = match lookup(root, name) {
            Some(raw) => self.resolve_value(raw, name),
            None => Err(Error::undefined_variable(name).with_path(path)),
        };

        self.chain.pop();
        result
    }

    /// Load, resolve and merge documents left to right
    ///
    /// Mapping documents are merged shallowly, later ones winning. A scalar
    /// document (including an empty one) is returned as-is and stops the
    /// merge. No documents at all yields an empty mapping.
    fn include(&mut self, documents: &[PathBuf], path: &str) -> Result<Value> {
        let mut merged: Option<Value> = None;

        for document in documents {
            let file = self.base_path.join(document);
            let key = format!("cfg:{}", loader::with_canonical_extension(&file).display());
            self.enter(key, path)?;

            let result = self
                .loader
                .load(&file)
                .and_then(|doc| self.resolve_value(&doc, path));
            self.chain.pop();
            let doc = result.map_err(|e| e.or_path(path))?;

            if !doc.is_collection() {
                return Ok(doc);
            }
            match merged.as_mut() {
                Some(acc) => acc.merge_shallow(doc),
                None => merged = Some(doc),
            }
        }

        Ok(merged.unwrap_or_else(Value::empty_mapping))
    }

    /// Push `key` onto the resolution chain, failing if it is already there
    fn enter(&mut self, key: String, path: &str) -> Result<()> {
        if self.chain.contains(&key) {
            let mut chain = self.chain.clone();
            chain.push(key);
            return Err(Error::circular_reference(chain).or_path(path));
        }
        self.chain.push(key);
        Ok(())
    }
}

/// Walk dotted segments through mappings and sequence indices
fn lookup<'v>(root: &'v Value, name: &str) -> Option<&'v Value> {
    name.split('.').try_fold(root, |node, segment| match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    })
}

/// A fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Config {
    fn new(root: Value) -> Self {
        Self { root }
    }

    /// Start a [`ConfigBuilder`]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Build from a base document path
    ///
    /// Relative paths, here and in includes, are taken from the working directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_args(path, std::iter::empty::<String>())
    }

    /// Build from a base document path plus command-line tokens
    pub fn load_with_args<I, S>(path: impl AsRef<Path>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigBuilder::new()
            .file(path.as_ref())
            .args(args)
            .build()
    }

    /// Build from YAML text, resolving includes against the working directory
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        ConfigBuilder::new().yaml(yaml).build()
    }

    /// Build from an in-memory tree
    pub fn from_value(value: Value) -> Result<Self> {
        ConfigBuilder::new().value(value).build()
    }

    /// Get the value at a path (e.g., "model.depth" or "layers[0]")
    pub fn get(&self, path: &str) -> Result<&Value> {
        self.root.get_path(path)
    }

    /// Get a string value; other scalars are rendered as text
    pub fn get_string(&self, path: &str) -> Result<String> {
        let value = self.get(path)?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Bool(_) | Value::Null => {
                Ok(value.to_string())
            }
            _ => Err(Error::type_coercion(path, "string", value.type_name())),
        }
    }

    pub fn get_i64(&self, path: &str) -> Result<i64> {
        let value = self.get(path)?;
        match value {
            Value::Integer(i) => Ok(*i),
            _ => Err(Error::type_coercion(path, "integer", value.type_name())),
        }
    }

    /// Get a float; integers widen
    pub fn get_f64(&self, path: &str) -> Result<f64> {
        let value = self.get(path)?;
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            _ => Err(Error::type_coercion(path, "float", value.type_name())),
        }
    }

    /// Get a boolean; flag values ("True") and "false" strings are accepted
    pub fn get_bool(&self, path: &str) -> Result<bool> {
        let value = self.get(path)?;
        if let Some(b) = value.as_bool() {
            return Ok(b);
        }
        match value {
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::type_coercion(
                    path,
                    "boolean",
                    format!("string (\"{}\")", s),
                )),
            },
            _ => Err(Error::type_coercion(path, "boolean", value.type_name())),
        }
    }

    /// A nested mapping as its own view
    pub fn section(&self, key: &str) -> Result<Config> {
        let value = self.get(key)?;
        if !value.is_mapping() {
            return Err(Error::type_coercion(key, "mapping", value.type_name()));
        }
        Ok(Config::new(value.clone()))
    }

    /// Set a value, creating intermediate mappings
    ///
    /// The value is stored as given; no resolution or coercion is applied.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.root.set_path(key, value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    /// Top-level keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root
            .as_mapping()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Top-level entries in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root
            .as_mapping()
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.root.as_mapping().map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Plain mapping copy of the top level; empty if the root is not a mapping
    pub fn to_mapping(&self) -> IndexMap<String, Value> {
        self.root.as_mapping().cloned().unwrap_or_default()
    }

    pub fn to_yaml(&self) -> Result<String> {
        loader::to_yaml_string(&self.root)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root).map_err(|e| Error::parse(e.to_string()))
    }

    /// Write the resolved tree as YAML, keys in insertion order
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        loader::save(&self.root, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn fixture(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("confly_test_{}", name));
        std::fs::remove_dir_all(&dir).ok();
        for (file, content) in files {
            let path = dir.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    fn yaml(text: &str) -> Value {
        loader::parse_yaml(text, "test").unwrap()
    }

    fn build(text: &str, args: &[&str]) -> Result<Config> {
        ConfigBuilder::new()
            .yaml(text)
            .args(args.iter().copied())
            .build()
    }

    #[test]
    fn test_plain_yaml() {
        let config = Config::from_yaml("database:\n  host: localhost\n  port: 5432\n").unwrap();
        assert_eq!(config.get("database.host").unwrap().as_str(), Some("localhost"));
        assert_eq!(config.get_i64("database.port").unwrap(), 5432);
    }

    #[test]
    fn test_nested_arithmetic() {
        let config = build("x: '${add: 1, ${add: 2, 3}}'\n", &[]).unwrap();
        assert_eq!(config.get("x").unwrap(), &Value::Integer(6));
    }

    #[test]
    fn test_nested_arithmetic_depth_four() {
        let config = build(
            "x: 1\ny: '${mul: 2, ${add: 1, ${sub: 5, ${var:x}}}}'\n",
            &["x=2"],
        )
        .unwrap();
        assert_eq!(config.get("y").unwrap(), &Value::Integer(8));
    }

    #[test]
    fn test_arithmetic_results_are_coerced() {
        let config = build(
            "a: '${div: 1, 4}'\nb: '${mul: 2, 1.5}'\nsizes: ['${mul: 2, 3}', 4]\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get("a").unwrap(), &Value::Float(0.25));
        assert_eq!(config.get("b").unwrap(), &Value::Integer(3));
        assert_eq!(config.get("sizes").unwrap(), &yaml("[6, 4]"));
    }

    #[test]
    fn test_arithmetic_error_carries_path() {
        let err = build("trainer:\n  lr: '${div: 1, 0}'\n", &[]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Arithmetic { .. }));
        assert_eq!(err.path.as_deref(), Some("trainer.lr"));
    }

    #[test]
    fn test_var_keeps_type() {
        let config = build(
            "model:\n  depth: 50\ncopy: '${var:model}'\nsize: '${var:model.depth}'\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get("size").unwrap(), &Value::Integer(50));
        assert_eq!(config.get("copy").unwrap(), config.get("model").unwrap());
    }

    #[test]
    fn test_var_chain_and_sequence_index() {
        let config = build(
            "a: 1\nb: '${var:a}'\nc: '${var:b}'\nlayers: [8, 16]\nlast: '${var:layers.1}'\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get_i64("c").unwrap(), 1);
        assert_eq!(config.get_i64("last").unwrap(), 16);
    }

    #[test]
    fn test_var_spliced_into_text() {
        let config = build(
            "lr: 0.5\ndepth: 18\ntag: 'run-${var:depth}-lr${var:lr}'\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get_string("tag").unwrap(), "run-18-lr0.5");
    }

    #[test]
    fn test_undefined_variable() {
        let err = build("a:\n  b: '${var:missing.key}'\n", &[]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedVariable { ref name } if name == "missing.key"));
        assert_eq!(err.path.as_deref(), Some("a.b"));
    }

    #[test]
    fn test_circular_var() {
        let err = build("a: '${var:b}'\nb: '${var:a}'\n", &[]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularReference));
        assert!(err.cause.unwrap().contains("var:a"));

        let err = build("a: 'x${var:a}'\n", &[]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularReference));
    }

    #[test]
    fn test_env_operator() {
        std::env::set_var("CONFLY_TEST_CONFIG_FOO", "bar");
        std::env::remove_var("CONFLY_TEST_CONFIG_NOPE");

        let config = build(
            "a: '${env:CONFLY_TEST_CONFIG_FOO}'\nb: '${env:CONFLY_TEST_CONFIG_NOPE}'\nc: 'x-${env: CONFLY_TEST_CONFIG_FOO}'\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get_string("a").unwrap(), "bar");
        assert_eq!(config.get_string("b").unwrap(), "$CONFLY_TEST_CONFIG_NOPE");
        assert_eq!(config.get_string("c").unwrap(), "x-bar");

        std::env::remove_var("CONFLY_TEST_CONFIG_FOO");
    }

    #[test]
    fn test_unknown_operator_left_literal() {
        let config = build(
            "a: '${sqrt: 4}'\nb: '${foo:x}-${var:c}'\nc: 1\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.get_string("a").unwrap(), "${sqrt: 4}");
        assert_eq!(config.get_string("b").unwrap(), "${foo:x}-1");
    }

    #[test]
    fn test_unbalanced_expression_passes_through() {
        let config = build("a: '${var:b'\nb: 1\n", &[]).unwrap();
        assert_eq!(config.get_string("a").unwrap(), "${var:b");
    }

    #[test]
    fn test_override_sets_integer() {
        let config = build("a:\n  b: 1\n  c: keep\n", &["a.b=5"]).unwrap();
        assert_eq!(config.get("a.b").unwrap(), &Value::Integer(5));
        assert_eq!(config.get_string("a.c").unwrap(), "keep");
    }

    #[test]
    fn test_override_creates_path() {
        let config = build("a: 1\n", &["x.y=0.1"]).unwrap();
        assert_eq!(config.get_f64("x.y").unwrap(), 0.1);
    }

    #[test]
    fn test_flag_sets_true() {
        let config = build("a: 1\nquiet: false\n", &["--verbose"]).unwrap();
        assert_eq!(config.get_string("verbose").unwrap(), "True");
        assert!(config.get_bool("verbose").unwrap());
        assert!(!config.get_bool("quiet").unwrap());
        assert!(config.get_bool("a").is_err());
    }

    #[test]
    fn test_var_sees_overridden_value() {
        let config = build(
            "lr: 0.1\nhalf: '${div: ${var:lr}, 2}'\ncopy: '${var:lr}'\n",
            &["lr=0.5"],
        )
        .unwrap();
        assert_eq!(config.get("lr").unwrap(), &Value::Float(0.5));
        assert_eq!(config.get("half").unwrap(), &Value::Float(0.25));
        assert_eq!(config.get("copy").unwrap(), &Value::Float(0.5));
    }

    #[test]
    fn test_include_shallow_merge() {
        let dir = fixture(
            "config_include_merge",
            &[
                ("A.yml", "a: 1\nn:\n  p: 1\n  q: 2\n"),
                ("B.yml", "b: 2\nn:\n  p: 3\n"),
            ],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("merged: '${cfg: A, B}'\n")
            .build()
            .unwrap();
        assert_eq!(
            config.get("merged").unwrap(),
            &yaml("a: 1\nn:\n  p: 3\nb: 2\n")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_include_scalar_short_circuits() {
        let dir = fixture(
            "config_include_scalar",
            &[("one.yml", "42\n"), ("two.yml", "a: 1\n"), ("empty.yml", "")],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("x: '${cfg: one, two}'\ny: '${cfg: empty, two}'\nz: '${cfg: }'\n")
            .build()
            .unwrap();
        assert_eq!(config.get("x").unwrap(), &Value::Integer(42));
        assert_eq!(config.get("y").unwrap(), &Value::Null);
        assert_eq!(config.get("z").unwrap(), &Value::empty_mapping());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_include_missing_document() {
        let dir = fixture("config_include_missing", &[]);
        let err = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("model: '${cfg: models/nope}'\n")
            .build()
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConfigNotFound { ref path } if path.ends_with("nope.yml")));
        assert_eq!(err.path.as_deref(), Some("model"));
    }

    #[test]
    fn test_include_cycle() {
        let dir = fixture("config_include_cycle", &[("loop.yml", "inner: '${cfg: loop}'\n")]);
        let err = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("x: '${cfg: loop}'\n")
            .build()
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularReference));
        assert!(err.cause.unwrap().contains("loop.yml"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cli_documents_merge_after_base() {
        let dir = fixture(
            "config_cli_documents",
            &[
                ("base.yml", "lr: 0.1\nname: base\n"),
                ("fast.yml", "lr: 0.5\n"),
            ],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .file("base")
            .arg("fast")
            .build()
            .unwrap();
        assert_eq!(config.get_f64("lr").unwrap(), 0.5);
        assert_eq!(config.get_string("name").unwrap(), "base");
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["lr", "name"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_override_into_included_section() {
        let dir = fixture(
            "config_override_included",
            &[
                ("base.yml", "model: '${cfg: models/small}'\nwidth: '${var:model.width}'\n"),
                ("models/small.yml", "depth: 18\nwidth: 64\n"),
            ],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .file("base.yml")
            .args(["model.depth=50", "model.width=128"])
            .build()
            .unwrap();
        assert_eq!(config.get_i64("model.depth").unwrap(), 50);
        assert_eq!(config.get_i64("width").unwrap(), 128);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_include_selected_by_override() {
        let dir = fixture(
            "config_include_by_override",
            &[
                ("models/small.yml", "depth: 18\n"),
                ("models/big.yml", "depth: 50\n"),
            ],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("name: small\nmodel: '${cfg: models/${var:name}}'\n")
            .arg("name=big")
            .build()
            .unwrap();
        assert_eq!(config.get_i64("model.depth").unwrap(), 50);

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .yaml("name: small\nmodel: '${cfg: models/${var:name}}'\n")
            .build()
            .unwrap();
        assert_eq!(config.get_i64("model.depth").unwrap(), 18);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_resolves_relative_to_working_directory() {
        let root = PathBuf::from("confly_test_load_cwd");
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(root.join("models")).unwrap();
        std::fs::write(
            root.join("base.yml"),
            "lr: 0.1\nmodel: '${cfg: confly_test_load_cwd/models/small}'\n",
        )
        .unwrap();
        std::fs::write(root.join("fast.yml"), "lr: 0.5\n").unwrap();
        std::fs::write(root.join("models/small.yml"), "depth: 18\n").unwrap();

        let loaded =
            Config::load_with_args("confly_test_load_cwd/base", ["confly_test_load_cwd/fast"]);
        let built = ConfigBuilder::new()
            .file("confly_test_load_cwd/base")
            .arg("confly_test_load_cwd/fast")
            .build();
        std::fs::remove_dir_all(&root).ok();

        let loaded = loaded.unwrap();
        assert_eq!(loaded, built.unwrap());
        assert_eq!(loaded.get_f64("lr").unwrap(), 0.5);
        assert_eq!(loaded.get_i64("model.depth").unwrap(), 18);
    }

    #[test]
    fn test_include_inside_included_document() {
        let dir = fixture(
            "config_nested_include",
            &[
                ("base.yml", "trainer: '${cfg: trainer}'\n"),
                ("trainer.yml", "optim: '${cfg: optim/adam}'\nepochs: 10\n"),
                ("optim/adam.yml", "lr: 0.001\n"),
            ],
        );

        let config = ConfigBuilder::new()
            .base_path(&dir)
            .file("base")
            .build()
            .unwrap();
        assert_eq!(config.get_f64("trainer.optim.lr").unwrap(), 0.001);
        assert_eq!(config.get_i64("trainer.epochs").unwrap(), 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_and_reload() {
        let dir = fixture(
            "config_save_reload",
            &[("base.yml", "name: resnet\ndepth: '${mul: 2, 9}'\nlr: 0.01\ntags: [a, b]\n")],
        );

        let config = Config::load_with_args(dir.join("base"), ["depth=50"]).unwrap();
        let out = dir.join("resolved.yml");
        config.save(&out).unwrap();

        let reloaded = Config::load(&out).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["name", "depth", "lr", "tags"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_view_access() {
        let mut config = build("model:\n  depth: 18\n  name: r\nlr: 0.1\n", &[]).unwrap();

        assert_eq!(config.len(), 2);
        assert!(!config.is_empty());
        assert!(config.contains_key("model.depth"));
        assert!(!config.contains_key("model.width"));

        let model = config.section("model").unwrap();
        assert_eq!(model.get_i64("depth").unwrap(), 18);
        assert!(config.section("lr").is_err());

        config.set("model.width", 64).unwrap();
        assert_eq!(config.get_i64("model.width").unwrap(), 64);

        let entries: Vec<_> = config.iter().map(|(k, _)| k).collect();
        assert_eq!(entries, vec!["model", "lr"]);
        assert_eq!(config.to_mapping().len(), 2);

        assert!(matches!(
            config.get_i64("model.name").unwrap_err().kind,
            ErrorKind::TypeCoercion
        ));
        assert!(config.to_json().unwrap().contains("\"width\": 64"));
    }

    #[test]
    fn test_from_value() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::from("${add: 2, 2}"));
        let config = Config::from_value(Value::Mapping(map)).unwrap();
        assert_eq!(config.get_i64("a").unwrap(), 4);
    }

    #[test]
    fn test_custom_operator() {
        let config = ConfigBuilder::new()
            .yaml("name: '${upper: resnet}'\n")
            .operator(Arc::new(crate::resolver::FnOperator::unsplit(
                "upper",
                |args, _ctx| Ok(Value::String(args[0].to_uppercase())),
            )))
            .build()
            .unwrap();
        assert_eq!(config.get_string("name").unwrap(), "RESNET");
    }
}
