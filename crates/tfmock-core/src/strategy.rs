//! Filling strategies
//!
//! A [`Filler`] decides which computed values need replacing and produces
//! the replacement. Three strategies cover the provider operations:
//!
//! - [`UnknownFiller`] marks null computed values as unknown, for plans
//! - [`ValueFiller`] adopts a supplied target value or synthesizes one, for
//!   applies
//! - [`DataFiller`] selects like the first and produces like the second, for
//!   data source reads, which skip the plan/apply split

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::convert::convert;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::value::{Known, Type, Value, ValuePath};

/// Alphabet of synthesized strings
const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of synthesized strings
const GENERATED_STRING_LEN: usize = 8;

/// Policy for replacing computed values
pub trait Filler {
    /// Whether `original` should be replaced
    fn should_fill(&self, original: &Value) -> bool;

    /// Produce the replacement for `original`, using `target` when supplied
    fn fill(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        path: &ValuePath,
    ) -> (Value, Diagnostics);
}

/// Source of uniformly random indexes for synthesized strings
pub trait RandomSource {
    /// A random index in `0..bound`. Larger results are reduced modulo
    /// `bound` by the caller.
    fn next_index(&mut self, bound: usize) -> usize;
}

impl<R: rand::RngCore> RandomSource for R {
    fn next_index(&mut self, bound: usize) -> usize {
        self.gen_range(0..bound)
    }
}

/// Replaces null computed values with unknowns of the same type
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownFiller;

impl Filler for UnknownFiller {
    fn should_fill(&self, original: &Value) -> bool {
        original.is_null()
    }

    fn fill(
        &mut self,
        original: &Value,
        _target: Option<&Value>,
        _path: &ValuePath,
    ) -> (Value, Diagnostics) {
        (Value::Unknown(original.ty()), Diagnostics::new())
    }
}

/// Replaces values that are not known with the target value converted to
/// the original's type, or with synthesized data when there is no target
#[derive(Debug, Clone)]
pub struct ValueFiller<R = StdRng> {
    source: R,
}

impl ValueFiller<StdRng> {
    /// A filler seeded from system entropy
    pub fn new() -> Self {
        Self::with_source(StdRng::from_entropy())
    }

    /// A filler whose synthesized strings are reproducible
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(StdRng::seed_from_u64(seed))
    }
}

impl Default for ValueFiller<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> ValueFiller<R> {
    pub fn with_source(source: R) -> Self {
        Self { source }
    }

    fn random_string(&mut self) -> String {
        (0..GENERATED_STRING_LEN)
            .map(|_| char::from(CHARS[self.source.next_index(CHARS.len()) % CHARS.len()]))
            .collect()
    }

    /// Invent a value of type `ty`
    fn synthesize(&mut self, original: &Value, ty: &Type, path: &ValuePath) -> (Value, Diagnostics) {
        let mut diags = Diagnostics::new();

        let value = match ty {
            Type::String => Value::string(self.random_string()),
            Type::Number => Value::from(0),
            Type::Bool => Value::bool(false),
            Type::List(elem) => Value::list((**elem).clone(), Vec::new()),
            Type::Set(elem) => Value::set((**elem).clone(), Vec::new()),
            Type::Map(elem) => Value::map((**elem).clone(), Default::default()),
            Type::Object(attrs) => {
                let mut filled = std::collections::BTreeMap::new();
                for (name, attr_ty) in attrs {
                    let child = Value::Unknown(attr_ty.clone());
                    let (value, child_diags) = self.synthesize(&child, attr_ty, &path.attr(name));
                    diags.append(child_diags);
                    filled.insert(name.clone(), value);
                }
                Value::Known(Known::Object(filled))
            }
            Type::Tuple(elems) => {
                let mut filled = Vec::with_capacity(elems.len());
                for (i, elem_ty) in elems.iter().enumerate() {
                    let child = Value::Unknown(elem_ty.clone());
                    let (value, child_diags) = self.synthesize(&child, elem_ty, &path.index(i));
                    diags.append(child_diags);
                    filled.push(value);
                }
                Value::tuple(filled)
            }
            Type::Dynamic => {
                diags.push(
                    Diagnostic::error(
                        "Unable to generate value",
                        "The attribute accepts a value of any type, so no value can be generated for it. Supply one with an override or with the mock defaults.",
                    )
                    .with_path(path),
                );
                original.clone()
            }
        };

        (value, diags)
    }
}

impl<R: RandomSource> Filler for ValueFiller<R> {
    fn should_fill(&self, original: &Value) -> bool {
        !original.is_known()
    }

    fn fill(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        path: &ValuePath,
    ) -> (Value, Diagnostics) {
        let ty = original.ty();

        let Some(target) = target else {
            log::trace!("synthesizing {} value for {}", ty, path);
            return self.synthesize(original, &ty, path);
        };

        match convert(target, &ty) {
            Ok(value) => (value, Diagnostics::new()),
            Err(e) => {
                let diag = Diagnostic::error(
                    "Type mismatch",
                    format!(
                        "Failed to convert the provided value into the required value: {}",
                        e
                    ),
                )
                .with_path(path);
                (original.clone(), diag.into())
            }
        }
    }
}

/// Selects null values like [`UnknownFiller`] and produces replacements like
/// [`ValueFiller`]
#[derive(Debug, Clone)]
pub struct DataFiller<R = StdRng> {
    unknown: UnknownFiller,
    value: ValueFiller<R>,
}

impl DataFiller<StdRng> {
    pub fn new() -> Self {
        Self::with_source(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_source(StdRng::seed_from_u64(seed))
    }
}

impl Default for DataFiller<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> DataFiller<R> {
    pub fn with_source(source: R) -> Self {
        Self {
            unknown: UnknownFiller,
            value: ValueFiller::with_source(source),
        }
    }
}

impl<R: RandomSource> Filler for DataFiller<R> {
    fn should_fill(&self, original: &Value) -> bool {
        self.unknown.should_fill(original)
    }

    fn fill(
        &mut self,
        original: &Value,
        target: Option<&Value>,
        path: &ValuePath,
    ) -> (Value, Diagnostics) {
        self.value.fill(original, target, path)
    }
}

/// Replays a fixed sequence of indexes, for reproducible tests
#[cfg(test)]
pub(crate) struct ScriptedSource {
    indexes: Vec<usize>,
    next: usize,
}

#[cfg(test)]
impl ScriptedSource {
    /// Script the indexes that spell `s` in the synthesized-string alphabet
    pub(crate) fn spelling(s: &str) -> Self {
        let indexes = s
            .bytes()
            .map(|b| CHARS.iter().position(|c| *c == b).unwrap())
            .collect();
        Self { indexes, next: 0 }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedSource {
    fn next_index(&mut self, bound: usize) -> usize {
        let index = self.indexes[self.next % self.indexes.len()];
        self.next += 1;
        index % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_filler_only_fills_null() {
        let filler = UnknownFiller;
        assert!(filler.should_fill(&Value::Null(Type::String)));
        assert!(!filler.should_fill(&Value::Unknown(Type::String)));
        assert!(!filler.should_fill(&Value::from("x")));
    }

    #[test]
    fn test_unknown_filler_keeps_type() {
        let ty = Type::list(Type::Number);
        let (value, diags) = UnknownFiller.fill(&Value::Null(ty.clone()), None, &ValuePath::root());
        assert_eq!(value, Value::Unknown(ty));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_value_filler_only_fills_unknown() {
        let filler = ValueFiller::seeded(1);
        assert!(filler.should_fill(&Value::Unknown(Type::String)));
        assert!(!filler.should_fill(&Value::Null(Type::String)));
        assert!(!filler.should_fill(&Value::from("x")));
    }

    #[test]
    fn test_synthesized_string_uses_source() {
        let mut filler = ValueFiller::with_source(ScriptedSource::spelling("kj87eb9x"));
        let (value, diags) = filler.fill(&Value::Unknown(Type::String), None, &ValuePath::root());
        assert_eq!(value, Value::from("kj87eb9x"));
        assert!(diags.is_empty());
    }

    struct OutOfRange;

    impl RandomSource for OutOfRange {
        fn next_index(&mut self, bound: usize) -> usize {
            bound + 3
        }
    }

    #[test]
    fn test_out_of_range_source_wraps() {
        let mut filler = ValueFiller::with_source(OutOfRange);
        let (value, _) = filler.fill(&Value::Unknown(Type::String), None, &ValuePath::root());
        assert_eq!(value, Value::from("dddddddd"));
    }

    #[test]
    fn test_synthesized_primitives_and_collections() {
        let mut filler = ValueFiller::seeded(7);
        let root = ValuePath::root();

        assert_eq!(filler.fill(&Value::Unknown(Type::Number), None, &root).0, Value::from(0));
        assert_eq!(filler.fill(&Value::Unknown(Type::Bool), None, &root).0, Value::from(false));
        assert_eq!(
            filler.fill(&Value::Unknown(Type::list(Type::String)), None, &root).0,
            Value::list(Type::String, vec![])
        );
        assert_eq!(
            filler.fill(&Value::Unknown(Type::set(Type::Bool)), None, &root).0,
            Value::set(Type::Bool, vec![])
        );
        assert_eq!(
            filler.fill(&Value::Unknown(Type::map(Type::Number)), None, &root).0,
            Value::map(Type::Number, Default::default())
        );
    }

    #[test]
    fn test_synthesized_string_alphabet() {
        let mut filler = ValueFiller::seeded(42);
        let (value, _) = filler.fill(&Value::Unknown(Type::String), None, &ValuePath::root());
        let s = value.as_str().unwrap();

        assert_eq!(s.len(), 8);
        assert!(s.bytes().all(|b| CHARS.contains(&b)));
    }

    #[test]
    fn test_seeded_fillers_agree() {
        let ty = Type::object([("a", Type::String), ("b", Type::String)]);
        let original = Value::Unknown(ty);

        let (first, _) = ValueFiller::seeded(9).fill(&original, None, &ValuePath::root());
        let (second, _) = ValueFiller::seeded(9).fill(&original, None, &ValuePath::root());
        assert_eq!(first, second);
    }

    #[test]
    fn test_synthesized_object_recurses() {
        let ty = Type::object([
            ("count", Type::Number),
            ("name", Type::String),
            ("pair", Type::Tuple(vec![Type::Bool, Type::Number])),
        ]);
        let mut filler = ValueFiller::with_source(ScriptedSource::spelling("abcdefgh"));
        let (value, diags) = filler.fill(&Value::Unknown(ty.clone()), None, &ValuePath::root());

        assert!(diags.is_empty());
        assert_eq!(
            value,
            Value::object([
                ("count", Value::from(0)),
                ("name", Value::from("abcdefgh")),
                (
                    "pair",
                    Value::tuple(vec![Value::from(false), Value::from(0)])
                ),
            ])
        );
        assert_eq!(value.ty(), ty);
    }

    #[test]
    fn test_dynamic_cannot_be_synthesized() {
        let original = Value::Unknown(Type::Dynamic);
        let path = ValuePath::root().attr("config");
        let (value, diags) = ValueFiller::seeded(1).fill(&original, None, &path);

        assert_eq!(value, original);
        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Unable to generate value");
        assert_eq!(diag.path, Some(path));
    }

    #[test]
    fn test_target_is_adopted_and_converted() {
        let mut filler = ValueFiller::seeded(1);
        let (value, diags) = filler.fill(
            &Value::Unknown(Type::String),
            Some(&Value::from(5)),
            &ValuePath::root(),
        );
        assert_eq!(value, Value::from("5"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_unconvertible_target() {
        let original = Value::Unknown(Type::Number);
        let path = ValuePath::root().attr("port");
        let (value, diags) =
            ValueFiller::seeded(1).fill(&original, Some(&Value::from("http")), &path);

        assert_eq!(value, original);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Type mismatch");
        assert_eq!(
            diag.detail,
            "Failed to convert the provided value into the required value: a number is required"
        );
        assert_eq!(diag.path, Some(path));
    }

    #[test]
    fn test_data_filler_composes() {
        let mut filler = DataFiller::with_source(ScriptedSource::spelling("kj87eb9x"));

        assert!(filler.should_fill(&Value::Null(Type::String)));
        assert!(!filler.should_fill(&Value::Unknown(Type::String)));

        let (value, _) = filler.fill(&Value::Null(Type::String), None, &ValuePath::root());
        assert_eq!(value, Value::from("kj87eb9x"));
    }
}
