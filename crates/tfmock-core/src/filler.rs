//! Computed value filling
//!
//! Walks an original value, its schema and an optional target value in
//! lock-step, replacing computed attributes the [`Filler`] selects. Nested
//! block groups and nested-type attributes are descended according to their
//! nesting mode; every element of a list, set or map shares the same target
//! object, since there is no reliable way to match user-supplied values to
//! individual set elements.
//!
//! Problems with the target value are reported as diagnostics and abort only
//! the affected subtree. An original value that does not match its schema is
//! a caller bug and is returned as an [`Error`].

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::schema::{Attribute, Nesting, Schema};
use crate::strategy::Filler;
use crate::value::{Known, Value, ValuePath};

/// Fill the computed values of `original`
///
/// `original` must be an object conforming to `schema`. `target` is the
/// user-supplied value tree (override values or mock defaults), if any.
pub fn fill_computed_values<F: Filler + ?Sized>(
    original: &Value,
    target: Option<&Value>,
    schema: &Schema,
    filler: &mut F,
) -> Result<(Value, Diagnostics)> {
    let mut walker = Walker {
        filler,
        diags: Diagnostics::new(),
    };
    let value = walker.fill_object(original, target, schema, &ValuePath::root())?;
    Ok((value, walker.diags))
}

struct Walker<'a, F: ?Sized> {
    filler: &'a mut F,
    diags: Diagnostics,
}

impl<F: Filler + ?Sized> Walker<'_, F> {
    fn fill_object(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        schema: &Schema,
        path: &ValuePath,
    ) -> Result<Value> {
        let Some(attrs) = original.as_object() else {
            return Err(mismatch(path, "object", original));
        };

        if let Some(target) = target {
            if !target.ty().is_object() {
                self.diags.push(
                    Diagnostic::error(
                        "Type mismatch",
                        format!("Expected object but found {}", target.ty().friendly_name()),
                    )
                    .with_path(path),
                );
                return Ok(original.clone());
            }
        }

        let mut filled = BTreeMap::new();

        for (name, block) in &schema.block_types {
            let child_path = path.attr(name);
            let child = attribute_of(attrs, name, &child_path)?;

            if child.is_null() {
                filled.insert(name.clone(), child.clone());
                continue;
            }

            let child_target = child_of(target, name);
            if let Some(child_target) = child_target {
                if !child_target.ty().is_object() {
                    self.diags.push(
                        Diagnostic::error(
                            "Type mismatch",
                            format!(
                                "Expected attribute {} to be an object but found {}",
                                name,
                                child_target.ty().friendly_name()
                            ),
                        )
                        .with_path(&child_path),
                    );
                    filled.insert(name.clone(), child.clone());
                    continue;
                }
            }

            let value =
                self.fill_nested(child, child_target, block.nesting, &block.block, &child_path)?;
            filled.insert(name.clone(), value);
        }

        for (name, attr) in &schema.attributes {
            let child_path = path.attr(name);
            let child = attribute_of(attrs, name, &child_path)?;
            let value = self.fill_attribute(child, child_of(target, name), attr, &child_path)?;
            filled.insert(name.clone(), value);
        }

        Ok(Value::Known(Known::Object(filled)))
    }

    fn fill_attribute(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        attr: &Attribute,
        path: &ValuePath,
    ) -> Result<Value> {
        if attr.computed && self.filler.should_fill(original) {
            log::trace!("filling computed attribute {}", path);
            let (value, diags) = self.filler.fill(original, target, path);
            self.diags.append(diags);
            return Ok(value);
        }

        let Some(nested) = &attr.nested_type else {
            return Ok(original.clone());
        };

        if original.is_null() || original.is_unknown() {
            return Ok(original.clone());
        }

        if let Some(target) = target {
            if !target.ty().is_object() {
                self.diags.push(
                    Diagnostic::error(
                        "Type mismatch",
                        format!("Expected object but found {}", target.ty().friendly_name()),
                    )
                    .with_path(path),
                );
                return Ok(original.clone());
            }
        }

        self.fill_nested(original, target, nested.nesting, &nested.schema, path)
    }

    /// Fill a non-null nested value according to its nesting mode
    fn fill_nested(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        nesting: Nesting,
        schema: &Schema,
        path: &ValuePath,
    ) -> Result<Value> {
        match nesting {
            Nesting::Single | Nesting::Group => self.fill_object(original, target, schema, path),
            Nesting::List => {
                let Some(Known::List(ety, elems)) = original.as_known() else {
                    return Err(mismatch(path, "list", original));
                };
                if elems.is_empty() {
                    return Ok(original.clone());
                }

                let mut filled = Vec::with_capacity(elems.len());
                for (i, elem) in elems.iter().enumerate() {
                    filled.push(self.fill_object(elem, target, schema, &path.index(i))?);
                }
                Ok(Value::list(ety.clone(), filled))
            }
            Nesting::Set => {
                let Some(Known::Set(ety, elems)) = original.as_known() else {
                    return Err(mismatch(path, "set", original));
                };
                if elems.is_empty() {
                    return Ok(original.clone());
                }

                let mut filled = Vec::with_capacity(elems.len());
                for elem in elems {
                    filled.push(self.fill_object(elem, target, schema, &path.element(elem))?);
                }
                Ok(Value::set(ety.clone(), filled))
            }
            Nesting::Map => {
                let Some(Known::Map(ety, entries)) = original.as_known() else {
                    return Err(mismatch(path, "map", original));
                };
                if entries.is_empty() {
                    return Ok(original.clone());
                }

                let mut filled = BTreeMap::new();
                for (key, entry) in entries {
                    let value = self.fill_object(entry, target, schema, &path.key(key))?;
                    filled.insert(key.clone(), value);
                }
                Ok(Value::map(ety.clone(), filled))
            }
        }
    }
}

fn attribute_of<'v>(
    attrs: &'v BTreeMap<String, Value>,
    name: &str,
    path: &ValuePath,
) -> Result<&'v Value> {
    attrs
        .get(name)
        .ok_or_else(|| Error::schema_mismatch(path.to_string(), "a value", "no attribute"))
}

/// The named attribute of a target object, if the target has one
fn child_of<'v>(target: Option<&'v Value>, name: &str) -> Option<&'v Value> {
    target.and_then(|t| t.get_attr(name))
}

fn mismatch(path: &ValuePath, expected: &str, found: &Value) -> Error {
    let found = match found {
        Value::Null(ty) => format!("null {}", ty.friendly_name()),
        Value::Unknown(ty) => format!("unknown {}", ty.friendly_name()),
        Value::Known(_) => found.ty().friendly_name(),
    };
    Error::schema_mismatch(path.to_string(), expected, found)
}
