//! Mock provider
//!
//! Answers plan, apply and read requests for mocked resources by filling
//! computed values. The target value for an instance comes from a
//! file-scope override if there is one, then from the mock data.

use crate::addrs::{AbsResourceInstance, ResourceMode, Targetable};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;
use crate::filler::fill_computed_values;
use crate::mocks::{MockData, Overrides};
use crate::schema::{ProviderSchema, Schema};
use crate::strategy::{DataFiller, Filler, RandomSource, UnknownFiller, ValueFiller};
use crate::value::Value;

/// A provider whose resources never leave memory
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    schema: ProviderSchema,
    data: MockData,
    overrides: Overrides,
}

impl MockProvider {
    pub fn new(schema: ProviderSchema, data: MockData) -> Self {
        Self {
            schema,
            data,
            overrides: Overrides::new(),
        }
    }

    /// Overrides from a test file or run block; these win over the
    /// overrides and defaults in the mock data
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn schema(&self) -> &ProviderSchema {
        &self.schema
    }

    pub fn data(&self) -> &MockData {
        &self.data
    }

    /// The value tree that drives filling for `addr`, if any
    pub fn target_for(&self, addr: &AbsResourceInstance) -> Option<&Value> {
        self.overrides
            .get(&Targetable::AbsResourceInstance(addr.clone()))
            .map(|o| &o.values)
            .or_else(|| self.data.target_for(addr))
    }

    /// Mark the computed attributes of a proposed new state as unknown
    pub fn plan_resource(
        &self,
        addr: &AbsResourceInstance,
        proposed: &Value,
    ) -> Result<(Value, Diagnostics)> {
        self.fill(addr, ResourceMode::Managed, proposed, &mut UnknownFiller, "plan")
    }

    /// Resolve the unknown computed attributes of a planned state
    pub fn apply_resource<R: RandomSource>(
        &self,
        addr: &AbsResourceInstance,
        planned: &Value,
        source: R,
    ) -> Result<(Value, Diagnostics)> {
        let mut filler = ValueFiller::with_source(source);
        self.fill(addr, ResourceMode::Managed, planned, &mut filler, "apply")
    }

    /// Populate the null computed attributes of a data source configuration
    pub fn read_data_source<R: RandomSource>(
        &self,
        addr: &AbsResourceInstance,
        config: &Value,
        source: R,
    ) -> Result<(Value, Diagnostics)> {
        let mut filler = DataFiller::with_source(source);
        self.fill(addr, ResourceMode::Data, config, &mut filler, "read")
    }

    fn fill<F: Filler>(
        &self,
        addr: &AbsResourceInstance,
        mode: ResourceMode,
        original: &Value,
        filler: &mut F,
        operation: &str,
    ) -> Result<(Value, Diagnostics)> {
        let schema = match self.schema_for(addr, mode, operation) {
            Ok(schema) => schema,
            Err(diag) => return Ok((original.clone(), diag.into())),
        };

        let target = self.target_for(addr);
        log::debug!(
            "{} {} ({})",
            operation,
            addr,
            if target.is_some() { "with mock values" } else { "generated" }
        );

        fill_computed_values(original, target, schema, filler)
    }

    fn schema_for(
        &self,
        addr: &AbsResourceInstance,
        mode: ResourceMode,
        operation: &str,
    ) -> std::result::Result<&Schema, Diagnostic> {
        if addr.mode() != mode {
            return Err(Diagnostic::error(
                "Invalid resource mode",
                format!(
                    "{} is a {}, but {} only works on a {}.",
                    addr,
                    addr.mode().noun(),
                    operation,
                    mode.noun()
                ),
            ));
        }

        self.schema.schema_for(mode, addr.type_name()).ok_or_else(|| {
            let summary = match mode {
                ResourceMode::Managed => "Unsupported resource type",
                ResourceMode::Data => "Unsupported data source type",
            };
            Diagnostic::error(
                summary,
                format!(
                    "The provider does not support {} type {:?}.",
                    mode.noun(),
                    addr.type_name()
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::decode_overrides;
    use crate::schema::Attribute;
    use crate::strategy::ScriptedSource;
    use crate::syntax;
    use crate::value::Type;
    use pretty_assertions::assert_eq;

    fn provider() -> MockProvider {
        let instance_schema = Schema::new()
            .with_attribute("id", Attribute::new(Type::String).computed())
            .with_attribute("ami", Attribute::new(Type::String).required());
        let ami_schema = Schema::new()
            .with_attribute("id", Attribute::new(Type::String).computed())
            .with_attribute("name", Attribute::new(Type::String).optional());

        let mut schema = ProviderSchema::default();
        schema
            .resource_schemas
            .insert("aws_instance".into(), instance_schema);
        schema.data_source_schemas.insert("aws_ami".into(), ami_schema);

        let (data, diags) = MockData::parse(
            r#"
resource "aws_instance" {
  override {
    addr   = aws_instance.web
    values = { id = "i-web" }
  }
}

data "aws_ami" {
  defaults = { id = "ami-123" }
}
"#,
            "mocks.tfmock.hcl",
        )
        .unwrap();
        assert!(diags.is_empty());

        MockProvider::new(schema, data)
    }

    fn instance(s: &str) -> AbsResourceInstance {
        s.parse().unwrap()
    }

    fn state(id: Value) -> Value {
        Value::object([("ami", Value::from("ami-1")), ("id", id)])
    }

    #[test]
    fn test_plan_marks_computed_unknown() {
        let (value, diags) = provider()
            .plan_resource(&instance("aws_instance.db"), &state(Value::Null(Type::String)))
            .unwrap();

        assert!(diags.is_empty());
        assert_eq!(value, state(Value::Unknown(Type::String)));
    }

    #[test]
    fn test_apply_uses_override() {
        let (value, _) = provider()
            .apply_resource(
                &instance("aws_instance.web"),
                &state(Value::Unknown(Type::String)),
                ScriptedSource::spelling("kj87eb9x"),
            )
            .unwrap();
        assert_eq!(value, state(Value::from("i-web")));
    }

    #[test]
    fn test_apply_generates_without_target() {
        let (value, _) = provider()
            .apply_resource(
                &instance("aws_instance.db"),
                &state(Value::Unknown(Type::String)),
                ScriptedSource::spelling("kj87eb9x"),
            )
            .unwrap();
        assert_eq!(value, state(Value::from("kj87eb9x")));
    }

    #[test]
    fn test_read_data_source_uses_defaults() {
        let config = Value::object([
            ("id", Value::Null(Type::String)),
            ("name", Value::from("ubuntu")),
        ]);
        let (value, _) = provider()
            .read_data_source(
                &instance("data.aws_ami.ubuntu"),
                &config,
                ScriptedSource::spelling("kj87eb9x"),
            )
            .unwrap();

        assert_eq!(
            value,
            Value::object([("id", Value::from("ami-123")), ("name", Value::from("ubuntu"))])
        );
    }

    #[test]
    fn test_unsupported_resource_type() {
        let original = state(Value::Null(Type::String));
        let (value, diags) = provider()
            .plan_resource(&instance("aws_vpc.main"), &original)
            .unwrap();

        assert_eq!(value, original);
        assert_eq!(
            diags.iter().next().unwrap().summary,
            "Unsupported resource type"
        );
    }

    #[test]
    fn test_wrong_mode() {
        let original = Value::empty_object();
        let (_, diags) = provider()
            .plan_resource(&instance("data.aws_ami.ubuntu"), &original)
            .unwrap();
        assert_eq!(diags.iter().next().unwrap().summary, "Invalid resource mode");
    }

    #[test]
    fn test_file_overrides_take_precedence() {
        let (body, _) = syntax::parse(
            "override {\n  addr = aws_instance.web\n  values = { id = \"from-test\" }\n}\n",
            "main.tftest.hcl",
        );
        let (overrides, _) = decode_overrides(&body.unwrap(), true).unwrap();
        let provider = provider().with_overrides(overrides);

        let (value, _) = provider
            .apply_resource(
                &instance("aws_instance.web"),
                &state(Value::Unknown(Type::String)),
                ScriptedSource::spelling("kj87eb9x"),
            )
            .unwrap();
        assert_eq!(value, state(Value::from("from-test")));
    }
}
