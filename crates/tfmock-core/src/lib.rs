//! tfmock-core: mock provider data for configuration tests
//!
//! This crate decodes mock data files, made of `resource`, `data` and
//! `override` blocks, and fills the computed attributes of resource values
//! so a test run can proceed without a real provider.
//!
//! # Example
//!
//! ```rust
//! use tfmock_core::{MockData, MockProvider, ProviderSchema, Schema, Type, Value};
//! use tfmock_core::schema::Attribute;
//!
//! let (data, diags) = MockData::parse(
//!     r#"
//! resource "aws_instance" {
//!   defaults = { id = "i-123" }
//! }
//! "#,
//!     "main.tfmock.hcl",
//! )
//! .unwrap();
//! assert!(!diags.has_errors());
//!
//! let mut schema = ProviderSchema::default();
//! schema.resource_schemas.insert(
//!     "aws_instance".into(),
//!     Schema::new().with_attribute("id", Attribute::new(Type::String).computed()),
//! );
//!
//! let provider = MockProvider::new(schema, data);
//! let planned = Value::object([("id", Value::Unknown(Type::String))]);
//! let (applied, _) = provider
//!     .apply_resource(&"aws_instance.web".parse().unwrap(), &planned, rand::thread_rng())
//!     .unwrap();
//! assert_eq!(applied.get_attr("id"), Some(&Value::from("i-123")));
//! ```

pub mod addrs;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod filler;
pub mod mocks;
pub mod provider;
pub mod schema;
pub mod strategy;
pub mod syntax;
pub mod value;

pub use addrs::{AbsResourceInstance, ResourceMode, Target, Targetable};
pub use convert::ConversionError;
pub use diagnostics::{Diagnostic, Diagnostics, Severity, SourceRange};
pub use error::{Error, ErrorKind, Result};
pub use filler::fill_computed_values;
pub use mocks::{MockData, MockResource, Overrides, ResourceOverride};
pub use provider::MockProvider;
pub use schema::{ProviderSchema, Schema};
pub use strategy::{DataFiller, Filler, RandomSource, UnknownFiller, ValueFiller};
pub use value::{Type, Value, ValuePath};
