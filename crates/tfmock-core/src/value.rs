//! Typed values
//!
//! Every value has a [`Type`] and is in one of three states: null, unknown
//! (a placeholder whose type is fixed but whose content is not yet
//! determined) or known. Unknown is a first-class state; it is never inferred
//! from a missing payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Numbers are stored as JSON numbers, normalised so that integral values
/// always use the integer representation and compare equal.
pub type Number = serde_json::Number;

/// The type of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    String,
    Number,
    Bool,
    /// Placeholder for "any type", used by untyped nulls and `dynamic`
    /// schema attributes
    Dynamic,
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>),
    Object(BTreeMap<String, Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    pub fn map(element: Type) -> Self {
        Type::Map(Box::new(element))
    }

    /// Build an object type from `(name, type)` pairs
    pub fn object<K: Into<String>>(attrs: impl IntoIterator<Item = (K, Type)>) -> Self {
        Type::Object(attrs.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn empty_object() -> Self {
        Type::Object(BTreeMap::new())
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::String | Type::Number | Type::Bool)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Type::Set(_))
    }

    /// Short human-readable name, as used in diagnostics
    pub fn friendly_name(&self) -> String {
        match self {
            Type::String => "string".into(),
            Type::Number => "number".into(),
            Type::Bool => "bool".into(),
            Type::Dynamic => "dynamic".into(),
            Type::List(t) => format!("list of {}", t.friendly_name()),
            Type::Set(t) => format!("set of {}", t.friendly_name()),
            Type::Map(t) => format!("map of {}", t.friendly_name()),
            Type::Object(_) => "object".into(),
            Type::Tuple(_) => "tuple".into(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}

/// A typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value; still typed
    Null(Type),
    /// A value of the given type that is not determined yet
    Unknown(Type),
    /// A determined value
    Known(Known),
}

/// Payload of a known value
///
/// Collections carry their element type so that empty collections are still
/// fully typed.
#[derive(Debug, Clone)]
pub enum Known {
    String(String),
    Number(Number),
    Bool(bool),
    List(Type, Vec<Value>),
    /// Elements are unique under structural equality
    Set(Type, Vec<Value>),
    Map(Type, BTreeMap<String, Value>),
    Object(BTreeMap<String, Value>),
    Tuple(Vec<Value>),
}

impl PartialEq for Known {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Known::String(a), Known::String(b)) => a == b,
            (Known::Number(a), Known::Number(b)) => a == b,
            (Known::Bool(a), Known::Bool(b)) => a == b,
            (Known::List(ta, a), Known::List(tb, b)) => ta == tb && a == b,
            (Known::Set(ta, a), Known::Set(tb, b)) => {
                ta == tb && a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Known::Map(ta, a), Known::Map(tb, b)) => ta == tb && a == b,
            (Known::Object(a), Known::Object(b)) => a == b,
            (Known::Tuple(a), Known::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Known(Known::String(s.into()))
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Value::Known(Known::Number(normalize_number(n.into())))
    }

    /// Number from a float; `None` for NaN and infinities
    pub fn number_f64(f: f64) -> Option<Self> {
        number_from_f64(f).map(|n| Value::Known(Known::Number(n)))
    }

    pub fn bool(b: bool) -> Self {
        Value::Known(Known::Bool(b))
    }

    /// Build a list whose elements are of `element` type
    pub fn list(element: Type, values: Vec<Value>) -> Self {
        Value::Known(Known::List(element, values))
    }

    /// Build a set, dropping structural duplicates
    pub fn set(element: Type, values: Vec<Value>) -> Self {
        let mut unique: Vec<Value> = Vec::with_capacity(values.len());
        for v in values {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        Value::Known(Known::Set(element, unique))
    }

    pub fn map(element: Type, entries: BTreeMap<String, Value>) -> Self {
        Value::Known(Known::Map(element, entries))
    }

    /// Build an object from `(name, value)` pairs
    pub fn object<K: Into<String>>(attrs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Known(Known::Object(
            attrs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn empty_object() -> Self {
        Value::Known(Known::Object(BTreeMap::new()))
    }

    pub fn tuple(values: Vec<Value>) -> Self {
        Value::Known(Known::Tuple(values))
    }

    /// The type of this value
    pub fn ty(&self) -> Type {
        match self {
            Value::Null(t) | Value::Unknown(t) => t.clone(),
            Value::Known(known) => match known {
                Known::String(_) => Type::String,
                Known::Number(_) => Type::Number,
                Known::Bool(_) => Type::Bool,
                Known::List(t, _) => Type::list(t.clone()),
                Known::Set(t, _) => Type::set(t.clone()),
                Known::Map(t, _) => Type::map(t.clone()),
                Known::Object(attrs) => {
                    Type::Object(attrs.iter().map(|(k, v)| (k.clone(), v.ty())).collect())
                }
                Known::Tuple(values) => Type::Tuple(values.iter().map(Value::ty).collect()),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// Whether this value itself is known; nested values may still be unknown
    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    pub fn as_known(&self) -> Option<&Known> {
        match self {
            Value::Known(known) => Some(known),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Known(Known::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Attributes of a known object
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Known(Known::Object(attrs)) => Some(attrs),
            _ => None,
        }
    }

    /// Look up an attribute of a known object
    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|attrs| attrs.get(name))
    }

    /// Render as JSON for display; unknown values become a marker string
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null(_) => serde_json::Value::Null,
            Value::Unknown(_) => serde_json::Value::String(UNKNOWN_MARKER.into()),
            Value::Known(known) => match known {
                Known::String(s) => serde_json::Value::String(s.clone()),
                Known::Number(n) => serde_json::Value::Number(n.clone()),
                Known::Bool(b) => serde_json::Value::Bool(*b),
                Known::List(_, vs) | Known::Set(_, vs) | Known::Tuple(vs) => {
                    serde_json::Value::Array(vs.iter().map(Value::to_json).collect())
                }
                Known::Map(_, m) | Known::Object(m) => serde_json::Value::Object(
                    m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                ),
            },
        }
    }
}

/// Marker used when rendering unknown values
pub const UNKNOWN_MARKER: &str = "(known after apply)";

fn normalize_number(n: Number) -> Number {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() => number_from_f64(f).unwrap_or(n),
        _ => n,
    }
}

/// Integral floats are stored as integers so `1` and `1.0` compare equal
pub(crate) fn number_from_f64(f: f64) -> Option<Number> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(Number::from(f as i64))
    } else {
        Number::from_f64(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "null"),
            Value::Unknown(_) => write!(f, "{}", UNKNOWN_MARKER),
            Value::Known(known) => match known {
                Known::String(s) => write!(f, "{:?}", s),
                Known::Number(n) => write!(f, "{}", n),
                Known::Bool(b) => write!(f, "{}", b),
                Known::List(_, vs) | Known::Set(_, vs) | Known::Tuple(vs) => {
                    write!(f, "[")?;
                    for (i, v) in vs.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", v)?;
                    }
                    write!(f, "]")
                }
                Known::Map(_, m) | Known::Object(m) => {
                    write!(f, "{{")?;
                    for (i, (k, v)) in m.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} = {}", k, v)?;
                    }
                    write!(f, "}}")
                }
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::number(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::number(i64::from(i))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

/// One step in a [`ValuePath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// An object attribute or nested block name
    Attr(String),
    /// A list element
    Index(usize),
    /// A map entry
    Key(String),
    /// A set element, identified by its rendered value
    Element(String),
}

/// Location of a value inside a value tree (e.g. `block[0].id`)
///
/// Paths only qualify diagnostics; they never affect computed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuePath(Vec<PathStep>);

impl ValuePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn with(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        ValuePath(steps)
    }

    pub fn attr(&self, name: impl Into<String>) -> Self {
        self.with(PathStep::Attr(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(PathStep::Index(index))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(PathStep::Key(key.into()))
    }

    pub fn element(&self, value: &Value) -> Self {
        self.with(PathStep::Element(value.to_string()))
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attr(name) if i == 0 => write!(f, "{}", name)?,
                PathStep::Attr(name) => write!(f, ".{}", name)?,
                PathStep::Index(idx) => write!(f, "[{}]", idx)?,
                PathStep::Key(key) => write!(f, "[{:?}]", key)?,
                PathStep::Element(elem) => write!(f, "[{}]", elem)?,
            }
        }
        Ok(())
    }
}

impl Serialize for ValuePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
