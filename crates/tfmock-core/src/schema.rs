//! Resource schemas
//!
//! Schemas describe the shape of a resource or data source: its attributes,
//! which of them the provider computes, and nested block groups with their
//! nesting mode. They are read from the `block` format emitted by
//! `terraform providers schema -json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::addrs::ResourceMode;
use crate::error::{Error, Result};
use crate::value::Type;

/// How a nested block group or nested attribute repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nesting {
    /// Exactly zero or one object
    Single,
    /// Exactly one object, never null
    Group,
    List,
    Set,
    Map,
}

/// The schema of one object level
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    pub block_types: BTreeMap<String, NestedBlock>,
}

/// A single attribute in a [`Schema`]
///
/// An attribute has either a plain `ty` or a `nested_type`, never both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: Option<Type>,
    pub nested_type: Option<NestedType>,
    pub computed: bool,
    pub optional: bool,
    pub required: bool,
    pub sensitive: bool,
}

/// An attribute whose value is structured like a nested block
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NestedType {
    #[serde(rename = "nesting_mode")]
    pub nesting: Nesting,
    /// Nested attributes; `block_types` is always empty here
    #[serde(flatten)]
    pub schema: Schema,
}

/// A named group of nested blocks
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NestedBlock {
    #[serde(rename = "nesting_mode")]
    pub nesting: Nesting,
    #[serde(default)]
    pub block: Schema,
    #[serde(default)]
    pub min_items: u64,
    #[serde(default)]
    pub max_items: u64,
}

impl Attribute {
    /// A plain attribute of the given type with no flags set
    pub fn new(ty: Type) -> Self {
        Self {
            ty: Some(ty),
            ..Default::default()
        }
    }

    /// A nested-type attribute
    pub fn nested(nesting: Nesting, schema: Schema) -> Self {
        Self {
            nested_type: Some(NestedType { nesting, schema }),
            ..Default::default()
        }
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// The type values of this attribute have
    pub fn implied_type(&self) -> Type {
        match (&self.ty, &self.nested_type) {
            (Some(ty), _) => ty.clone(),
            (None, Some(nested)) => nested_implied_type(nested.nesting, &nested.schema),
            (None, None) => Type::Dynamic,
        }
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block group
    pub fn with_block(mut self, name: impl Into<String>, nesting: Nesting, block: Schema) -> Self {
        self.block_types.insert(
            name.into(),
            NestedBlock {
                nesting,
                block,
                min_items: 0,
                max_items: 0,
            },
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.block_types.is_empty()
    }

    /// The object type values conforming to this schema have
    pub fn implied_type(&self) -> Type {
        let mut attrs: BTreeMap<String, Type> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.implied_type()))
            .collect();
        for (name, block) in &self.block_types {
            attrs.insert(name.clone(), nested_implied_type(block.nesting, &block.block));
        }
        Type::Object(attrs)
    }

    /// Load a schema block from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::parse(format!("Invalid JSON schema: {}", e)))?;
        Self::from_value(value)
    }

    /// Load a schema block from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::parse(format!("Invalid YAML schema: {}", e)))?;
        Self::from_value(value)
    }

    /// Load a schema block from a file (JSON or YAML based on extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_file(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Accepts either a bare block or a `{"version": .., "block": ..}` wrapper
    fn from_value(mut value: serde_json::Value) -> Result<Self> {
        if let Some(block) = value.get_mut("block").map(serde_json::Value::take) {
            value = block;
        }
        let schema: Schema = serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("Invalid schema: {}", e)))?;
        schema.check("")?;
        Ok(schema)
    }

    fn check(&self, prefix: &str) -> Result<()> {
        for (name, attr) in &self.attributes {
            let path = format!("{}{}", prefix, name);
            match (&attr.ty, &attr.nested_type) {
                (Some(_), Some(_)) => {
                    return Err(Error::parse(
                        "Attribute declares both \"type\" and \"nested_type\"",
                    )
                    .with_path(path))
                }
                (None, None) => {
                    return Err(Error::parse(
                        "Attribute must declare either \"type\" or \"nested_type\"",
                    )
                    .with_path(path))
                }
                (None, Some(nested)) => nested.schema.check(&format!("{}.", path))?,
                (Some(_), None) => {}
            }
        }
        for (name, block) in &self.block_types {
            block.block.check(&format!("{}{}.", prefix, name))?;
        }
        Ok(())
    }
}

fn nested_implied_type(nesting: Nesting, schema: &Schema) -> Type {
    let object = schema.implied_type();
    match nesting {
        Nesting::Single | Nesting::Group => object,
        Nesting::List => Type::list(object),
        Nesting::Set => Type::set(object),
        Nesting::Map => Type::map(object),
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))
}

/// Schemas for every resource and data source type of one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSchema {
    pub resource_schemas: BTreeMap<String, Schema>,
    pub data_source_schemas: BTreeMap<String, Schema>,
}

#[derive(Deserialize)]
struct VersionedSchema {
    block: Schema,
}

#[derive(Deserialize)]
struct RawProviderSchema {
    #[serde(default)]
    resource_schemas: BTreeMap<String, VersionedSchema>,
    #[serde(default)]
    data_source_schemas: BTreeMap<String, VersionedSchema>,
}

impl ProviderSchema {
    /// Schema for a resource type in the given mode
    pub fn schema_for(&self, mode: ResourceMode, type_name: &str) -> Option<&Schema> {
        match mode {
            ResourceMode::Managed => self.resource_schemas.get(type_name),
            ResourceMode::Data => self.data_source_schemas.get(type_name),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::parse(format!("Invalid JSON provider schema: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::parse(format!("Invalid YAML provider schema: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_file(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Accepts a single provider's schema, or full `providers schema -json`
    /// output holding exactly one provider
    fn from_value(mut value: serde_json::Value) -> Result<Self> {
        if let Some(providers) = value.get_mut("provider_schemas").map(serde_json::Value::take) {
            let serde_json::Value::Object(providers) = providers else {
                return Err(Error::parse("\"provider_schemas\" must be an object"));
            };
            if providers.len() != 1 {
                return Err(Error::parse(format!(
                    "Expected exactly one provider in \"provider_schemas\", found {}",
                    providers.len()
                ))
                .with_help("Extract the schema of the provider being mocked"));
            }
            value = providers.into_iter().map(|(_, v)| v).next().unwrap_or_default();
        }

        let raw: RawProviderSchema = serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("Invalid provider schema: {}", e)))?;

        let mut schema = ProviderSchema::default();
        for (name, versioned) in raw.resource_schemas {
            versioned.block.check(&format!("{}.", name))?;
            schema.resource_schemas.insert(name, versioned.block);
        }
        for (name, versioned) in raw.data_source_schemas {
            versioned.block.check(&format!("data.{}.", name))?;
            schema.data_source_schemas.insert(name, versioned.block);
        }
        Ok(schema)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        type_from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Decode the JSON type-constraint encoding (`"string"`, `["list", "number"]`,
/// `["object", {"id": "string"}]`)
pub fn type_from_json(json: &serde_json::Value) -> std::result::Result<Type, String> {
    use serde_json::Value as Json;

    match json {
        Json::String(name) => match name.as_str() {
            "string" => Ok(Type::String),
            "number" => Ok(Type::Number),
            "bool" => Ok(Type::Bool),
            "dynamic" => Ok(Type::Dynamic),
            other => Err(format!("unknown primitive type {:?}", other)),
        },
        Json::Array(parts) => match parts.as_slice() {
            [Json::String(kind), arg] => match (kind.as_str(), arg) {
                ("list", elem) => Ok(Type::list(type_from_json(elem)?)),
                ("set", elem) => Ok(Type::set(type_from_json(elem)?)),
                ("map", elem) => Ok(Type::map(type_from_json(elem)?)),
                ("object", Json::Object(attrs)) => {
                    let mut types = BTreeMap::new();
                    for (name, ty) in attrs {
                        types.insert(name.clone(), type_from_json(ty)?);
                    }
                    Ok(Type::Object(types))
                }
                ("tuple", Json::Array(elems)) => Ok(Type::Tuple(
                    elems.iter().map(type_from_json).collect::<std::result::Result<_, _>>()?,
                )),
                (other, _) => Err(format!("invalid {:?} type constraint", other)),
            },
            // Optional attribute markers, e.g. ["object", {..}, ["name"]]
            [Json::String(kind), Json::Object(_), Json::Array(_)] if kind == "object" => {
                type_from_json(&Json::Array(parts[..2].to_vec()))
            }
            _ => Err(format!("invalid type constraint {}", json)),
        },
        _ => Err(format!("invalid type constraint {}", json)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    const INSTANCE_SCHEMA: &str = r#"{
        "version": 1,
        "block": {
            "attributes": {
                "id": {"type": "string", "computed": true, "optional": true},
                "ami": {"type": "string", "required": true},
                "tags": {"type": ["map", "string"], "optional": true},
                "password": {"type": "string", "computed": true, "sensitive": true},
                "endpoints": {
                    "nested_type": {
                        "nesting_mode": "list",
                        "attributes": {
                            "url": {"type": "string", "computed": true}
                        }
                    },
                    "optional": true
                }
            },
            "block_types": {
                "ebs_block_device": {
                    "nesting_mode": "set",
                    "block": {
                        "attributes": {
                            "volume_id": {"type": "string", "computed": true}
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_from_json_block() {
        let schema = Schema::from_json(INSTANCE_SCHEMA).unwrap();

        let id = &schema.attributes["id"];
        assert_eq!(id.ty, Some(Type::String));
        assert!(id.computed && id.optional && !id.required);
        assert!(schema.attributes["password"].sensitive);
        assert_eq!(
            schema.attributes["tags"].ty,
            Some(Type::map(Type::String))
        );

        let endpoints = schema.attributes["endpoints"].nested_type.as_ref().unwrap();
        assert_eq!(endpoints.nesting, Nesting::List);
        assert!(endpoints.schema.attributes["url"].computed);

        assert_eq!(schema.block_types["ebs_block_device"].nesting, Nesting::Set);
    }

    #[test]
    fn test_implied_type() {
        let schema = Schema::from_json(INSTANCE_SCHEMA).unwrap();

        assert_eq!(
            schema.implied_type(),
            Type::object([
                ("ami", Type::String),
                (
                    "ebs_block_device",
                    Type::set(Type::object([("volume_id", Type::String)]))
                ),
                (
                    "endpoints",
                    Type::list(Type::object([("url", Type::String)]))
                ),
                ("id", Type::String),
                ("password", Type::String),
                ("tags", Type::map(Type::String)),
            ])
        );
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
attributes:
  id:
    type: string
    computed: true
block_types:
  rule:
    nesting_mode: single
    block:
      attributes:
        port:
          type: number
"#;
        let schema = Schema::from_yaml(yaml).unwrap();
        assert!(schema.attributes["id"].computed);
        assert_eq!(schema.block_types["rule"].nesting, Nesting::Single);
    }

    #[test]
    fn test_attribute_without_type_is_rejected() {
        let err = Schema::from_json(r#"{"attributes": {"id": {"computed": true}}}"#).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("id"));
        assert!(err.to_string().contains("either \"type\" or \"nested_type\""));
    }

    #[test]
    fn test_unknown_nesting_mode_is_rejected() {
        let json = r#"{"block_types": {"b": {"nesting_mode": "tree", "block": {}}}}"#;
        assert!(Schema::from_json(json).is_err());
    }

    #[test]
    fn test_type_constraints() {
        assert_eq!(type_from_json(&json!("dynamic")), Ok(Type::Dynamic));
        assert_eq!(
            type_from_json(&json!(["tuple", ["string", "bool"]])),
            Ok(Type::Tuple(vec![Type::String, Type::Bool]))
        );
        assert_eq!(
            type_from_json(&json!(["object", {"a": "number"}, ["a"]])),
            Ok(Type::object([("a", Type::Number)]))
        );
        assert!(type_from_json(&json!(["list"])).is_err());
        assert!(type_from_json(&json!("float")).is_err());
    }

    #[test]
    fn test_provider_schema_from_full_output() {
        let json = json!({
            "format_version": "1.0",
            "provider_schemas": {
                "registry.terraform.io/hashicorp/aws": {
                    "resource_schemas": {
                        "aws_instance": {"version": 1, "block": {"attributes": {"id": {"type": "string", "computed": true}}}}
                    },
                    "data_source_schemas": {
                        "aws_ami": {"version": 0, "block": {"attributes": {"arn": {"type": "string", "computed": true}}}}
                    }
                }
            }
        });
        let schema = ProviderSchema::from_json(&json.to_string()).unwrap();

        assert!(schema.schema_for(ResourceMode::Managed, "aws_instance").is_some());
        assert!(schema.schema_for(ResourceMode::Data, "aws_ami").is_some());
        assert!(schema.schema_for(ResourceMode::Managed, "aws_ami").is_none());
    }

    #[test]
    fn test_provider_schema_rejects_multiple_providers() {
        let json = json!({"provider_schemas": {"a": {}, "b": {}}});
        let err = ProviderSchema::from_json(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("exactly one provider"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(INSTANCE_SCHEMA.as_bytes()).unwrap();

        let schema = Schema::from_file(file.path()).unwrap();
        assert!(schema.attributes.contains_key("ami"));
    }

    #[test]
    fn test_from_missing_file() {
        let err = Schema::from_file("/nonexistent/schema.json").unwrap_err();
        assert!(!err.is_internal());
        assert!(err.to_string().contains("I/O error"));
    }
}
