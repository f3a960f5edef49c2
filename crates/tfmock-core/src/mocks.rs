//! Mock data
//!
//! Decodes mock-provider bodies into [`MockData`]: per resource and data
//! source type, the default values and the overrides aimed at specific
//! instances.
//!
//! ```hcl
//! resource "aws_instance" {
//!   defaults = {
//!     arn = "arn:aws:ec2:us-east-1:000000000000:instance/i-0"
//!   }
//!
//!   override {
//!     addr   = aws_instance.web
//!     values = { id = "i-web" }
//!   }
//! }
//!
//! data "aws_ami" {}
//! ```

use std::path::Path;

use indexmap::IndexMap;

use crate::addrs::{parse_target, AbsResourceInstance, InstanceKey, ResourceMode, Target, Targetable};
use crate::diagnostics::{Diagnostic, Diagnostics, SourceRange};
use crate::error::{Error, Result};
use crate::syntax::{self, Block, Body};
use crate::value::{Type, Value};

/// Replacement values aimed at one address
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOverride {
    /// Always a module instance or a resource instance once decoded
    /// successfully; absent when the address could not be decoded
    pub target: Option<Target>,
    pub values: Value,
    /// Range of the `override` keyword
    pub type_range: SourceRange,
    pub decl_range: SourceRange,
}

/// Overrides in declaration order, keyed by what they target
pub type Overrides = IndexMap<Targetable, ResourceOverride>;

/// Mocked behaviour for one resource or data source type
#[derive(Debug, Clone, PartialEq)]
pub struct MockResource {
    pub mode: ResourceMode,
    pub type_name: String,
    /// Range of the `resource` or `data` keyword
    pub type_range: SourceRange,
    /// Always an object when present
    pub defaults: Option<Value>,
    pub overrides: Overrides,
}

impl MockResource {
    /// The value tree that should drive filling for `instance`: its override
    /// if one targets it, otherwise the defaults
    pub fn target_for(&self, instance: &AbsResourceInstance) -> Option<&Value> {
        let key = Targetable::AbsResourceInstance(instance.clone());
        self.overrides
            .get(&key)
            .map(|o| &o.values)
            .or(self.defaults.as_ref())
    }
}

/// Every mocked resource and data source type of one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockData {
    pub resources: IndexMap<String, MockResource>,
    pub data_sources: IndexMap<String, MockResource>,
}

impl MockData {
    pub fn get(&self, mode: ResourceMode, type_name: &str) -> Option<&MockResource> {
        match mode {
            ResourceMode::Managed => self.resources.get(type_name),
            ResourceMode::Data => self.data_sources.get(type_name),
        }
    }

    /// The value tree that should drive filling for `instance`, if any
    pub fn target_for(&self, instance: &AbsResourceInstance) -> Option<&Value> {
        self.get(instance.mode(), instance.type_name())
            .and_then(|resource| resource.target_for(instance))
    }

    /// Parse and decode mock data from source text
    ///
    /// Invalid syntax yields empty mock data alongside the syntax
    /// diagnostics.
    pub fn parse(source: &str, file: &str) -> Result<(Self, Diagnostics)> {
        let (body, mut diags) = syntax::parse(source, file);
        let Some(body) = body else {
            return Ok((Self::default(), diags));
        };

        let (data, decode_diags) = decode_mock_data(&body)?;
        diags.append(decode_diags);
        Ok((data, diags))
    }

    /// Read, parse and decode a mock data file
    pub fn from_file(path: impl AsRef<Path>) -> Result<(Self, Diagnostics)> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e.to_string()))?;
        Self::parse(&source, &path.display().to_string())
    }
}

fn unsupported_argument(attr: &syntax::Attribute) -> Diagnostic {
    Diagnostic::error(
        "Unsupported argument",
        format!("An argument named {:?} is not expected here.", attr.name),
    )
    .with_subject(attr.name_range.clone())
}

fn unsupported_block(block: &Block) -> Diagnostic {
    Diagnostic::error(
        "Unsupported block type",
        format!("Blocks of type {:?} are not expected here.", block.kind),
    )
    .with_subject(block.kind_range.clone())
}

/// Decode a mock data body of `resource` and `data` blocks
pub fn decode_mock_data(body: &Body) -> Result<(MockData, Diagnostics)> {
    let mut diags = Diagnostics::new();
    let mut data = MockData::default();

    diags.extend(body.attributes.iter().map(unsupported_argument));

    for block in &body.blocks {
        let mode = match block.kind.as_str() {
            "resource" => ResourceMode::Managed,
            "data" => ResourceMode::Data,
            _ => {
                diags.push(unsupported_block(block));
                continue;
            }
        };

        let Some(resource) = decode_mock_resource_block(block, mode, &mut diags)? else {
            continue;
        };

        let (existing, summary) = match mode {
            ResourceMode::Managed => (&mut data.resources, "Duplicate resource block"),
            ResourceMode::Data => (&mut data.data_sources, "Duplicate data block"),
        };

        if let Some(previous) = existing.get(&resource.type_name) {
            log::warn!(
                "ignoring duplicate {} block for {}",
                mode.block_name(),
                resource.type_name
            );
            diags.push(
                Diagnostic::error(
                    summary,
                    format!(
                        "A {} block for {} has already been defined at {}.",
                        mode.block_name(),
                        resource.type_name,
                        previous.type_range
                    ),
                )
                .with_subject(resource.type_range.clone()),
            );
            continue;
        }

        existing.insert(resource.type_name.clone(), resource);
    }

    log::debug!(
        "decoded mock data: {} resources, {} data sources",
        data.resources.len(),
        data.data_sources.len()
    );

    Ok((data, diags))
}

fn decode_mock_resource_block(
    block: &Block,
    mode: ResourceMode,
    diags: &mut Diagnostics,
) -> Result<Option<MockResource>> {
    let [label] = block.labels.as_slice() else {
        diags.push(
            Diagnostic::error(
                "Invalid block definition",
                format!(
                    "A {} block must have exactly one label: the {} type.",
                    block.kind,
                    mode.noun()
                ),
            )
            .with_subject(block.def_range.clone()),
        );
        return Ok(None);
    };

    let mut resource = MockResource {
        mode,
        type_name: label.value.clone(),
        type_range: block.kind_range.clone(),
        defaults: None,
        overrides: Overrides::new(),
    };

    for attr in &block.body.attributes {
        if attr.name != "defaults" {
            diags.push(unsupported_argument(attr));
            continue;
        }

        let (defaults, value_diags) = attr.expr.evaluate();
        let failed = value_diags.has_errors();
        diags.append(value_diags);

        if failed || defaults.is_null() {
            continue;
        }

        if !defaults.ty().is_object() {
            diags.push(
                Diagnostic::error(
                    "Invalid defaults",
                    format!(
                        "The defaults for a mocked {} must be an object, but found {}.",
                        mode.noun(),
                        defaults.ty().friendly_name()
                    ),
                )
                .with_subject(attr.expr.range.clone()),
            );
            continue;
        }

        resource.defaults = Some(defaults);
    }

    for child in &block.body.blocks {
        if child.kind != "override" {
            diags.push(unsupported_block(child));
            continue;
        }

        let (decoded, override_diags) = decode_override_block(child, false)?;
        let failed = override_diags.has_errors();
        diags.append(override_diags);
        if failed {
            continue;
        }

        let Some(target) = &decoded.target else {
            continue;
        };

        if let Some(existing) = resource.overrides.get(&target.subject) {
            log::warn!("ignoring duplicate override for {}", target.subject);
            diags.push(duplicate_override(&target.subject, existing, &decoded));
            continue;
        }

        let Targetable::AbsResourceInstance(instance) = &target.subject else {
            return Err(Error::internal(format!(
                "override in a {} block resolved to {}, which is not a resource instance",
                mode.block_name(),
                target.subject
            ))
            .with_source_location(target.source_range.clone()));
        };

        let mut valid = true;

        if instance.type_name() != resource.type_name {
            diags.push(
                Diagnostic::error(
                    "Invalid resource type",
                    format!(
                        "You have targeted resource type {:?} for an override while defining resource type {:?}.",
                        instance.type_name(),
                        resource.type_name
                    ),
                )
                .with_subject(target.source_range.clone()),
            );
            valid = false;
        }

        if instance.mode() != mode {
            diags.push(
                Diagnostic::error(
                    "Invalid resource type",
                    format!(
                        "You have targeted resource mode {:?} for an override while defining resource type {:?}.",
                        instance.mode().block_name(),
                        block.kind
                    ),
                )
                .with_subject(target.source_range.clone()),
            );
            valid = false;
        }

        if valid {
            resource.overrides.insert(target.subject.clone(), decoded);
        }
    }

    Ok(Some(resource))
}

fn duplicate_override(
    subject: &Targetable,
    existing: &ResourceOverride,
    duplicate: &ResourceOverride,
) -> Diagnostic {
    Diagnostic::error(
        "Duplicate override block",
        format!(
            "An override block targeting {} has already been defined at {}.",
            subject, existing.type_range
        ),
    )
    .with_subject(duplicate.type_range.clone())
}

/// Decode one `override` block
///
/// Module instance targets are accepted only when `allow_module_targets` is
/// set. A resource target is normalised to its no-key instance. User
/// mistakes are reported as diagnostics alongside a possibly partial
/// override; an `Err` means address parsing produced a kind of target it
/// never should.
pub fn decode_override_block(
    block: &Block,
    allow_module_targets: bool,
) -> Result<(ResourceOverride, Diagnostics)> {
    let mut diags = Diagnostics::new();

    let mut decoded = ResourceOverride {
        target: None,
        values: Value::Null(Type::Dynamic),
        type_range: block.kind_range.clone(),
        decl_range: block.def_range.clone(),
    };

    diags.extend(
        block
            .body
            .attributes
            .iter()
            .filter(|a| a.name != "addr" && a.name != "values")
            .map(unsupported_argument),
    );
    diags.extend(block.body.blocks.iter().map(unsupported_block));

    match block.body.attribute("addr") {
        Some(attr) => match attr.expr.absolute_traversal().and_then(|t| parse_target(&t)) {
            Ok(target) => decoded.target = Some(target),
            Err(diag) => diags.push(diag),
        },
        None => diags.push(
            Diagnostic::error(
                "Missing \"addr\" attribute",
                "Override blocks must specify a target address.",
            )
            .with_subject(block.kind_range.clone()),
        ),
    }

    match block.body.attribute("values") {
        Some(attr) => {
            let (values, value_diags) = attr.expr.evaluate();
            diags.append(value_diags);
            decoded.values = values;
        }
        None => diags.push(
            Diagnostic::error(
                "Missing \"values\" attribute",
                "Override blocks must specify the replacement values.",
            )
            .with_subject(block.kind_range.clone()),
        ),
    }

    if let Some(target) = decoded.target.take() {
        let subject = match target.subject {
            Targetable::Module(_) | Targetable::ConfigResource(_) => {
                return Err(Error::internal(format!(
                    "override address {} was not resolved to an instance",
                    target.subject
                ))
                .with_source_location(target.source_range));
            }
            Targetable::ModuleInstance(module) => {
                if !allow_module_targets {
                    diags.push(
                        Diagnostic::error(
                            "Invalid override address target",
                            format!(
                                "A module target {} is not acceptable in this context. Modules can only be targeted by override blocks defined directly within test files or test file run blocks.",
                                module
                            ),
                        )
                        .with_subject(target.source_range.clone()),
                    );
                }
                Targetable::ModuleInstance(module)
            }
            Targetable::AbsResource(resource) => {
                Targetable::AbsResourceInstance(resource.instance(InstanceKey::NoKey))
            }
            instance @ Targetable::AbsResourceInstance(_) => instance,
        };
        decoded.target = Some(Target {
            subject,
            source_range: target.source_range,
        });
    }

    Ok((decoded, diags))
}

/// Decode the top-level `override` blocks of a body, as found directly in
/// test files and run blocks
///
/// Other blocks and attributes are left to the caller.
pub fn decode_overrides(body: &Body, allow_module_targets: bool) -> Result<(Overrides, Diagnostics)> {
    let mut diags = Diagnostics::new();
    let mut overrides = Overrides::new();

    for block in body.blocks_of("override") {
        let (decoded, override_diags) = decode_override_block(block, allow_module_targets)?;
        let failed = override_diags.has_errors();
        diags.append(override_diags);
        if failed {
            continue;
        }

        let Some(target) = &decoded.target else {
            continue;
        };

        if let Some(existing) = overrides.get(&target.subject) {
            log::warn!("ignoring duplicate override for {}", target.subject);
            diags.push(duplicate_override(&target.subject, existing, &decoded));
            continue;
        }

        overrides.insert(target.subject.clone(), decoded);
    }

    log::debug!("decoded {} overrides", overrides.len());
    Ok((overrides, diags))
}
