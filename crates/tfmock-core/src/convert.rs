//! Type conversion
//!
//! Converts values to a required type the way configuration values are
//! coerced: nulls and unknowns take the new type, primitives convert through
//! their string forms, and structural types convert element-wise.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::{number_from_f64, Known, Type, Value, ValuePath};

/// A value that cannot be represented as the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{}", path_prefix(.path), .message)]
pub struct ConversionError {
    /// Where inside the converted value the failure happened
    pub path: ValuePath,
    pub message: String,
}

impl ConversionError {
    fn new(path: &ValuePath, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            message: message.into(),
        }
    }

    fn required(path: &ValuePath, want: &Type) -> Self {
        Self::new(path, format!("{} required", want.friendly_name()))
    }
}

fn path_prefix(path: &ValuePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        format!("{}: ", path)
    }
}

impl Value {
    pub fn convert(&self, want: &Type) -> Result<Value, ConversionError> {
        convert(self, want)
    }

    pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Value, ConversionError> {
        from_json(json, ty)
    }
}

/// Convert `value` to type `want`
pub fn convert(value: &Value, want: &Type) -> Result<Value, ConversionError> {
    convert_at(value, want, &ValuePath::root())
}

fn convert_at(value: &Value, want: &Type, path: &ValuePath) -> Result<Value, ConversionError> {
    if *want == Type::Dynamic {
        return Ok(value.clone());
    }

    let known = match value {
        Value::Null(_) => return Ok(Value::Null(want.clone())),
        Value::Unknown(_) => return Ok(Value::Unknown(want.clone())),
        Value::Known(known) => known,
    };

    match (known, want) {
        (Known::String(s), Type::String) => Ok(Value::string(s.clone())),
        (Known::Number(n), Type::String) => Ok(Value::string(n.to_string())),
        (Known::Bool(b), Type::String) => Ok(Value::string(b.to_string())),

        (Known::Number(n), Type::Number) => Ok(Value::number(n.clone())),
        (Known::String(s), Type::Number) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(number_from_f64)
            .map(Value::number)
            .ok_or_else(|| ConversionError::new(path, "a number is required")),

        (Known::Bool(b), Type::Bool) => Ok(Value::bool(*b)),
        (Known::String(s), Type::Bool) => match s.as_str() {
            "true" => Ok(Value::bool(true)),
            "false" => Ok(Value::bool(false)),
            _ => Err(ConversionError::new(path, "a bool is required")),
        },

        (Known::List(_, elems) | Known::Set(_, elems) | Known::Tuple(elems), Type::List(ety)) => {
            let (ety, elems) = convert_elements(elems, ety, path)?;
            Ok(Value::list(ety, elems))
        }
        (Known::List(_, elems) | Known::Set(_, elems) | Known::Tuple(elems), Type::Set(ety)) => {
            let (ety, elems) = convert_elements(elems, ety, path)?;
            Ok(Value::set(ety, elems))
        }
        (Known::List(_, elems) | Known::Set(_, elems) | Known::Tuple(elems), Type::Tuple(etys)) => {
            if elems.len() != etys.len() {
                return Err(ConversionError::new(
                    path,
                    format!("tuple required with {} elements", etys.len()),
                ));
            }
            let converted = elems
                .iter()
                .zip(etys)
                .enumerate()
                .map(|(i, (elem, ety))| convert_at(elem, ety, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::tuple(converted))
        }

        (Known::Map(_, entries) | Known::Object(entries), Type::Map(ety)) => {
            let mut converted = BTreeMap::new();
            for (key, entry) in entries {
                converted.insert(key.clone(), convert_at(entry, ety, &path.key(key))?);
            }
            let ety = unify(converted.values(), ety, path)?;
            Ok(Value::map(ety, converted))
        }
        (Known::Map(_, entries) | Known::Object(entries), Type::Object(atys)) => {
            let mut converted = BTreeMap::new();
            for (name, aty) in atys {
                let attr = entries.get(name).ok_or_else(|| {
                    ConversionError::new(path, format!("attribute {:?} is required", name))
                })?;
                converted.insert(name.clone(), convert_at(attr, aty, &path.attr(name))?);
            }
            Ok(Value::Known(Known::Object(converted)))
        }

        _ => Err(ConversionError::required(path, want)),
    }
}

fn convert_elements(
    elems: &[Value],
    ety: &Type,
    path: &ValuePath,
) -> Result<(Type, Vec<Value>), ConversionError> {
    let converted = elems
        .iter()
        .enumerate()
        .map(|(i, elem)| convert_at(elem, ety, &path.index(i)))
        .collect::<Result<Vec<_>, _>>()?;
    let ety = unify(converted.iter(), ety, path)?;
    Ok((ety, converted))
}

/// Resolve a dynamic element type to the single type all elements share
fn unify<'a>(
    elems: impl Iterator<Item = &'a Value>,
    ety: &Type,
    path: &ValuePath,
) -> Result<Type, ConversionError> {
    if *ety != Type::Dynamic {
        return Ok(ety.clone());
    }

    let mut found: Option<Type> = None;
    for elem in elems {
        let ty = elem.ty();
        match &found {
            None => found = Some(ty),
            Some(existing) if *existing == ty => {}
            Some(_) => {
                return Err(ConversionError::new(
                    path,
                    "all elements must have the same type",
                ))
            }
        }
    }
    Ok(found.unwrap_or(Type::Dynamic))
}

/// Build a value of type `ty` from JSON
///
/// Object attributes missing from the JSON become nulls of their declared
/// type; attributes the type does not declare are rejected.
pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Value, ConversionError> {
    from_json_at(json, ty, &ValuePath::root())
}

fn from_json_at(
    json: &serde_json::Value,
    ty: &Type,
    path: &ValuePath,
) -> Result<Value, ConversionError> {
    use serde_json::Value as Json;

    match (json, ty) {
        (Json::Null, _) => Ok(Value::Null(ty.clone())),
        (_, Type::Dynamic) => Ok(implied_from_json(json)),

        (Json::Array(items), Type::List(ety) | Type::Set(ety)) => {
            let elems = items
                .iter()
                .enumerate()
                .map(|(i, item)| from_json_at(item, ety, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            let ety = unify(elems.iter(), ety, path)?;
            Ok(if ty.is_set() {
                Value::set(ety, elems)
            } else {
                Value::list(ety, elems)
            })
        }
        (Json::Array(items), Type::Tuple(etys)) => {
            if items.len() != etys.len() {
                return Err(ConversionError::new(
                    path,
                    format!("tuple required with {} elements", etys.len()),
                ));
            }
            let elems = items
                .iter()
                .zip(etys)
                .enumerate()
                .map(|(i, (item, ety))| from_json_at(item, ety, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::tuple(elems))
        }
        (Json::Object(fields), Type::Map(ety)) => {
            let mut entries = BTreeMap::new();
            for (key, field) in fields {
                entries.insert(key.clone(), from_json_at(field, ety, &path.key(key))?);
            }
            let ety = unify(entries.values(), ety, path)?;
            Ok(Value::map(ety, entries))
        }
        (Json::Object(fields), Type::Object(atys)) => {
            if let Some(extra) = fields.keys().find(|k| !atys.contains_key(*k)) {
                return Err(ConversionError::new(
                    path,
                    format!("unsupported attribute {:?}", extra),
                ));
            }
            let mut attrs = BTreeMap::new();
            for (name, aty) in atys {
                let attr = match fields.get(name) {
                    Some(field) => from_json_at(field, aty, &path.attr(name))?,
                    None => Value::Null(aty.clone()),
                };
                attrs.insert(name.clone(), attr);
            }
            Ok(Value::Known(Known::Object(attrs)))
        }

        (Json::String(_) | Json::Number(_) | Json::Bool(_), _) if ty.is_primitive() => {
            convert_at(&implied_from_json(json), ty, path)
        }

        _ => Err(ConversionError::required(path, ty)),
    }
}

/// The value JSON naturally describes: arrays are tuples, objects are objects
pub fn implied_from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::Null(Type::Dynamic),
        Json::Bool(b) => Value::bool(*b),
        Json::Number(n) => Value::number(n.clone()),
        Json::String(s) => Value::string(s.clone()),
        Json::Array(items) => Value::tuple(items.iter().map(implied_from_json).collect()),
        Json::Object(fields) => Value::object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), implied_from_json(v))),
        ),
    }
}
