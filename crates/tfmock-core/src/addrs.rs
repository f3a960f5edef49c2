//! Resource and module addresses
//!
//! Addresses identify what an override targets. Only three kinds come out
//! of [`parse_target`]: module instances, resources and resource instances.
//! The static [`Module`] and [`ConfigResource`] forms exist for callers that
//! work with configuration rather than instances.

use std::fmt;
use std::str::FromStr;

use crate::diagnostics::{Diagnostic, Diagnostics, SourceRange};
use crate::syntax::{self, IndexKey, Traversal, TraverseStep};

/// Whether an address refers to a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceMode {
    Managed,
    Data,
}

impl ResourceMode {
    /// Keyword of the block declaring this mode (`resource` or `data`)
    pub fn block_name(self) -> &'static str {
        match self {
            ResourceMode::Managed => "resource",
            ResourceMode::Data => "data",
        }
    }

    /// Human-readable noun for diagnostics
    pub fn noun(self) -> &'static str {
        match self {
            ResourceMode::Managed => "resource",
            ResourceMode::Data => "data source",
        }
    }
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.noun())
    }
}

/// Distinguishes instances created by `count` or `for_each`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    #[default]
    NoKey,
    Int(i64),
    String(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::NoKey => Ok(()),
            InstanceKey::Int(i) => write!(f, "[{}]", i),
            InstanceKey::String(s) => write!(f, "[{:?}]", s),
        }
    }
}

impl From<IndexKey> for InstanceKey {
    fn from(key: IndexKey) -> Self {
        match key {
            IndexKey::Int(i) => InstanceKey::Int(i),
            IndexKey::String(s) => InstanceKey::String(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstanceStep {
    pub name: String,
    pub key: InstanceKey,
}

/// A path of module calls with instance keys; empty for the root module
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstance(pub Vec<ModuleInstanceStep>);

impl ModuleInstance {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a child module call
    pub fn child(&self, name: impl Into<String>, key: InstanceKey) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleInstanceStep {
            name: name.into(),
            key,
        });
        ModuleInstance(steps)
    }

    /// The static module path, without instance keys
    pub fn module(&self) -> Module {
        Module(self.0.iter().map(|step| step.name.clone()).collect())
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "module.{}{}", step.name, step.key)?;
        }
        Ok(())
    }
}

/// A static module path
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module(pub Vec<String>);

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|name| format!("module.{}", name)).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A resource within some module, e.g. `aws_instance.web`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
}

impl Resource {
    pub fn new(mode: ResourceMode, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode,
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.type_name, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.type_name, self.name),
        }
    }
}

/// One instance of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceInstance {
    pub resource: Resource,
    pub key: InstanceKey,
}

impl fmt::Display for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource, self.key)
    }
}

fn write_in_module(f: &mut fmt::Formatter<'_>, module: &impl fmt::Display, is_root: bool) -> fmt::Result {
    if !is_root {
        write!(f, "{}.", module)?;
    }
    Ok(())
}

/// A resource in a specific module instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsResource {
    pub module: ModuleInstance,
    pub resource: Resource,
}

impl AbsResource {
    pub fn new(module: ModuleInstance, resource: Resource) -> Self {
        Self { module, resource }
    }

    /// The instance of this resource with the given key
    pub fn instance(&self, key: InstanceKey) -> AbsResourceInstance {
        AbsResourceInstance {
            module: self.module.clone(),
            resource: ResourceInstance {
                resource: self.resource.clone(),
                key,
            },
        }
    }

    /// The configuration-level resource, without instance keys
    pub fn config(&self) -> ConfigResource {
        ConfigResource {
            module: self.module.module(),
            resource: self.resource.clone(),
        }
    }
}

impl fmt::Display for AbsResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_in_module(f, &self.module, self.module.is_root())?;
        write!(f, "{}", self.resource)
    }
}

/// A resource instance in a specific module instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsResourceInstance {
    pub module: ModuleInstance,
    pub resource: ResourceInstance,
}

impl AbsResourceInstance {
    pub fn mode(&self) -> ResourceMode {
        self.resource.resource.mode
    }

    pub fn type_name(&self) -> &str {
        &self.resource.resource.type_name
    }
}

impl fmt::Display for AbsResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_in_module(f, &self.module, self.module.is_root())?;
        write!(f, "{}", self.resource)
    }
}

impl FromStr for AbsResourceInstance {
    type Err = Diagnostics;

    /// Parse `aws_instance.web`, `data.aws_ami.x` or a keyed or
    /// module-qualified form; a resource without a key is its no-key instance
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let traversal = syntax::parse_traversal(s, "<address>")?;
        let target = parse_target(&traversal)?;
        match target.subject {
            Targetable::AbsResource(resource) => Ok(resource.instance(InstanceKey::NoKey)),
            Targetable::AbsResourceInstance(instance) => Ok(instance),
            other => Err(Diagnostic::error(
                "Invalid address",
                format!("A resource instance address is required, but {} is a module.", other),
            )
            .with_subject(target.source_range)
            .into()),
        }
    }
}

/// A resource in a static module path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigResource {
    pub module: Module,
    pub resource: Resource,
}

impl fmt::Display for ConfigResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_in_module(f, &self.module, self.module.0.is_empty())?;
        write!(f, "{}", self.resource)
    }
}

/// Anything an override can be aimed at
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Targetable {
    Module(Module),
    ModuleInstance(ModuleInstance),
    AbsResource(AbsResource),
    AbsResourceInstance(AbsResourceInstance),
    ConfigResource(ConfigResource),
}

impl fmt::Display for Targetable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Targetable::Module(m) => write!(f, "{}", m),
            Targetable::ModuleInstance(m) => write!(f, "{}", m),
            Targetable::AbsResource(r) => write!(f, "{}", r),
            Targetable::AbsResourceInstance(r) => write!(f, "{}", r),
            Targetable::ConfigResource(r) => write!(f, "{}", r),
        }
    }
}

/// A parsed target with the source range it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub subject: Targetable,
    pub source_range: SourceRange,
}

enum Token {
    Name(String),
    Key(IndexKey),
}

/// Resolve an absolute traversal to a module instance, resource or
/// resource instance
pub fn parse_target(traversal: &Traversal) -> Result<Target, Diagnostic> {
    let invalid = |detail: &str| {
        Diagnostic::error("Invalid address", detail).with_subject(traversal.range.clone())
    };

    let mut tokens = std::iter::once(Token::Name(traversal.root.clone()))
        .chain(traversal.steps.iter().map(|step| match step {
            TraverseStep::Attr(name) => Token::Name(name.clone()),
            TraverseStep::Index(key) => Token::Key(key.clone()),
        }))
        .peekable();

    let mut module = ModuleInstance::root();
    while matches!(tokens.peek(), Some(Token::Name(n)) if n == "module") {
        tokens.next();
        let Some(Token::Name(name)) = tokens.next() else {
            return Err(invalid(
                "Module address prefix must be followed by dot and then a name.",
            ));
        };
        let key = match tokens.peek() {
            Some(Token::Key(_)) => match tokens.next() {
                Some(Token::Key(key)) => InstanceKey::from(key),
                _ => InstanceKey::NoKey,
            },
            _ => InstanceKey::NoKey,
        };
        module = module.child(name, key);
    }

    let subject = match tokens.next() {
        None => Targetable::ModuleInstance(module),
        Some(Token::Key(_)) => return Err(invalid("Unexpected index; a resource type or module call was expected.")),
        Some(Token::Name(first)) => {
            let (mode, type_name) = if first == "data" {
                match tokens.next() {
                    Some(Token::Name(type_name)) => (ResourceMode::Data, type_name),
                    _ => {
                        return Err(invalid(
                            "Data source address must be followed by a data source type and name.",
                        ))
                    }
                }
            } else {
                (ResourceMode::Managed, first)
            };

            let Some(Token::Name(name)) = tokens.next() else {
                return Err(invalid(
                    "Resource specification must include a resource type and name.",
                ));
            };

            let resource = AbsResource::new(module, Resource::new(mode, type_name, name));
            match tokens.next() {
                None => Targetable::AbsResource(resource),
                Some(Token::Key(key)) => {
                    Targetable::AbsResourceInstance(resource.instance(InstanceKey::from(key)))
                }
                Some(Token::Name(_)) => {
                    return Err(invalid("Unexpected extra operators after address."))
                }
            }
        }
    };

    if tokens.next().is_some() {
        return Err(invalid("Unexpected extra operators after address."));
    }

    Ok(Target {
        subject,
        source_range: traversal.range.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target(s: &str) -> Targetable {
        let traversal = syntax::parse_traversal(s, "test").unwrap();
        parse_target(&traversal).unwrap().subject
    }

    fn target_err(s: &str) -> Diagnostic {
        let traversal = syntax::parse_traversal(s, "test").unwrap();
        parse_target(&traversal).unwrap_err()
    }

    #[test]
    fn test_parse_resource() {
        assert_eq!(
            target("aws_instance.web"),
            Targetable::AbsResource(AbsResource::new(
                ModuleInstance::root(),
                Resource::new(ResourceMode::Managed, "aws_instance", "web")
            ))
        );
    }

    #[test]
    fn test_parse_data_resource_instance() {
        let Targetable::AbsResourceInstance(instance) = target(r#"data.aws_ami.ubuntu["a"]"#) else {
            panic!("expected a resource instance");
        };
        assert_eq!(instance.mode(), ResourceMode::Data);
        assert_eq!(instance.type_name(), "aws_ami");
        assert_eq!(instance.resource.key, InstanceKey::String("a".into()));
        assert_eq!(instance.to_string(), r#"data.aws_ami.ubuntu["a"]"#);
    }

    #[test]
    fn test_parse_module_instance() {
        let subject = target("module.child[0].module.grandchild");
        assert_eq!(
            subject,
            Targetable::ModuleInstance(
                ModuleInstance::root()
                    .child("child", InstanceKey::Int(0))
                    .child("grandchild", InstanceKey::NoKey)
            )
        );
        assert_eq!(subject.to_string(), "module.child[0].module.grandchild");
    }

    #[test]
    fn test_parse_resource_in_module() {
        let subject = target("module.child.aws_instance.web[2]");
        assert_eq!(subject.to_string(), "module.child.aws_instance.web[2]");
        assert!(matches!(subject, Targetable::AbsResourceInstance(_)));
    }

    #[test]
    fn test_invalid_targets() {
        assert!(target_err("aws_instance")
            .detail
            .contains("must include a resource type and name"));
        assert!(target_err("module")
            .detail
            .contains("must be followed by dot and then a name"));
        assert!(target_err("aws_instance.web[0].id")
            .detail
            .contains("Unexpected extra operators"));
    }

    #[test]
    fn test_instance_from_str() {
        let instance: AbsResourceInstance = "aws_instance.web".parse().unwrap();
        assert_eq!(instance.resource.key, InstanceKey::NoKey);

        let err = "module.child".parse::<AbsResourceInstance>().unwrap_err();
        assert!(err.has_errors());
    }

    #[test]
    fn test_config_resource_drops_keys() {
        let resource = AbsResource::new(
            ModuleInstance::root().child("app", InstanceKey::Int(1)),
            Resource::new(ResourceMode::Managed, "aws_instance", "web"),
        );
        assert_eq!(resource.config().to_string(), "module.app.aws_instance.web");
    }
}
