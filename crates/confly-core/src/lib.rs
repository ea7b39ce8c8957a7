//! confly-core: layered YAML configuration with inline expressions
//!
//! A configuration is built from a base document, further documents and
//! `key.path=value` overrides given on the command line. String values may
//! hold `${op:arg}` expressions:
//!
//! - `${cfg: a, b}` - include and shallow-merge documents
//! - `${var:model.depth}` - reference another value
//! - `${env:HOME}` - read an environment variable
//! - `${add: 1, ${var:x}}` - arithmetic (`add`, `sub`, `mul`, `div`, `floordiv`, `mod`, `pow`)
//!
//! # Example
//!
//! ```rust
//! use confly_core::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .yaml("depth: 18\nwidth: '${mul: ${var:depth}, 4}'\n")
//!     .arg("depth=50")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.get_i64("depth").unwrap(), 50);
//! assert_eq!(config.get_i64("width").unwrap(), 200);
//! ```

pub mod coerce;
pub mod error;
pub mod interpolation;
pub mod loader;
pub mod overrides;
pub mod resolver;
pub mod value;

mod config;

pub use config::{Config, ConfigBuilder, ConfigOptions};
pub use error::{Error, ErrorKind, Result};
pub use loader::{DocumentLoader, YamlLoader};
pub use overrides::{CliArgs, Override};
pub use resolver::{FnOperator, Operator, ResolverContext, ResolverRegistry};
pub use value::Value;
