//! Configuration syntax
//!
//! Parses HCL source with `hcl-edit` into a small tree of bodies, blocks and
//! attributes whose byte spans have already been mapped to line/column
//! [`SourceRange`]s. Expressions are kept unevaluated; callers either
//! evaluate them statically (no variables or functions) or read them as
//! absolute traversals.

use std::ops::Range;

use hcl::eval::{Context, Evaluate};
use hcl_edit::expr::{Expression as HclExpression, TraversalOperator};
use hcl_edit::structure::{BlockLabel, Structure};
use hcl_edit::Span;

use crate::diagnostics::{Diagnostic, Diagnostics, LineIndex, Pos, SourceRange};
use crate::value::{Type, Value};

/// Maps byte spans within one source file to [`SourceRange`]s
struct SourceMapper<'a> {
    file: &'a str,
    index: LineIndex<'a>,
}

impl<'a> SourceMapper<'a> {
    fn new(file: &'a str, source: &'a str) -> Self {
        Self {
            file,
            index: LineIndex::new(source),
        }
    }

    fn range(&self, span: Option<Range<usize>>) -> SourceRange {
        match span {
            Some(span) => self.index.range(self.file, &span),
            None => SourceRange::file_start(self.file),
        }
    }

    fn range_between(&self, start: Option<Range<usize>>, end: Option<Range<usize>>) -> SourceRange {
        match (start, end) {
            (Some(start), Some(end)) => self.range(Some(start.start..end.end)),
            (start, _) => self.range(start),
        }
    }
}

/// Where the parser gave up
fn error_range(file: &str, e: &hcl_edit::parser::Error) -> SourceRange {
    let location = e.location();
    let start = Pos {
        line: location.line(),
        column: location.column(),
    };
    SourceRange {
        file: file.to_string(),
        start,
        end: start,
    }
}

/// A parsed configuration body
#[derive(Debug, Clone)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
    pub range: SourceRange,
}

impl Body {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Blocks with the given type keyword, in source order
    pub fn blocks_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }
}

/// `name = expression`
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    pub name_range: SourceRange,
    pub range: SourceRange,
}

/// `kind "label" ... { body }`
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: String,
    pub labels: Vec<Label>,
    pub body: Body,
    pub kind_range: SourceRange,
    /// From the type keyword through the last label
    pub def_range: SourceRange,
    pub range: SourceRange,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub value: String,
    pub range: SourceRange,
}

/// An unevaluated expression
#[derive(Debug, Clone)]
pub struct Expression {
    inner: HclExpression,
    pub range: SourceRange,
}

/// Parse `source` (named `file` in diagnostics)
///
/// Returns `None` when the source is not valid HCL, including when an
/// attribute is set more than once in the same body.
pub fn parse(source: &str, file: &str) -> (Option<Body>, Diagnostics) {
    let body = match hcl_edit::parser::parse_body(source) {
        Ok(body) => body,
        Err(e) => {
            let diag = Diagnostic::error("Invalid configuration syntax", e.to_string())
                .with_subject(error_range(file, &e));
            return (None, diag.into());
        }
    };

    let mapper = SourceMapper::new(file, source);
    let range = mapper.range(Some(0..source.len()));
    (Some(convert_body(&mapper, &body, range)), Diagnostics::new())
}

/// Parse standalone text such as `aws_instance.web[0]` as an absolute
/// traversal
pub fn parse_traversal(source: &str, file: &str) -> Result<Traversal, Diagnostics> {
    let inner = hcl_edit::parser::parse_expr(source).map_err(|e| {
        Diagnostics::from(
            Diagnostic::error("Invalid address", e.to_string())
                .with_subject(error_range(file, &e)),
        )
    })?;
    let mapper = SourceMapper::new(file, source);
    let expr = Expression {
        range: mapper.range(Some(0..source.len())),
        inner,
    };
    expr.absolute_traversal().map_err(Diagnostics::from)
}

fn convert_body(
    mapper: &SourceMapper<'_>,
    body: &hcl_edit::structure::Body,
    range: SourceRange,
) -> Body {
    let mut attributes = Vec::new();
    let mut blocks = Vec::new();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => {
                attributes.push(Attribute {
                    name: attr.key.as_str().to_string(),
                    expr: Expression {
                        inner: attr.value.clone(),
                        range: mapper.range(attr.value.span()),
                    },
                    name_range: mapper.range(attr.key.span()),
                    range: mapper.range_between(attr.key.span(), attr.value.span()),
                });
            }
            Structure::Block(block) => {
                let labels: Vec<Label> = block
                    .labels
                    .iter()
                    .map(|label| Label {
                        value: match label {
                            BlockLabel::String(s) => s.value().to_string(),
                            BlockLabel::Ident(i) => i.value().as_str().to_string(),
                        },
                        range: mapper.range(label_span(label)),
                    })
                    .collect();

                blocks.push(Block {
                    kind: block.ident.as_str().to_string(),
                    kind_range: mapper.range(block.ident.span()),
                    def_range: mapper.range_between(
                        block.ident.span(),
                        block.labels.last().and_then(label_span),
                    ),
                    labels,
                    body: convert_body(mapper, &block.body, mapper.range(block.span())),
                    range: mapper.range(block.span()),
                });
            }
        }
    }

    Body {
        attributes,
        blocks,
        range,
    }
}

fn label_span(label: &BlockLabel) -> Option<Range<usize>> {
    match label {
        BlockLabel::String(s) => s.span(),
        BlockLabel::Ident(i) => i.span(),
    }
}

/// A static reference such as `module.app[0].aws_instance.web["a"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    pub root: String,
    pub steps: Vec<TraverseStep>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraverseStep {
    Attr(String),
    Index(IndexKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    Int(i64),
    String(String),
}

impl Expression {
    /// Evaluate with no variables or functions in scope
    pub fn evaluate(&self) -> (Value, Diagnostics) {
        let expr = hcl::Expression::from(self.inner.clone());
        match expr.evaluate(&Context::new()) {
            Ok(value) => (value_from_hcl(value), Diagnostics::new()),
            Err(errors) => {
                let diag = Diagnostic::error(
                    "Invalid expression",
                    format!(
                        "Only static values are allowed here; variables and function calls are not available. {}",
                        errors
                    ),
                )
                .with_subject(self.range.clone());
                (Value::Null(Type::Dynamic), diag.into())
            }
        }
    }

    /// Read the expression as an absolute traversal
    pub fn absolute_traversal(&self) -> Result<Traversal, Diagnostic> {
        let invalid = || {
            Diagnostic::error(
                "Invalid expression",
                "A single static variable reference is required: only attribute access and indexing with constant keys. No calculations, function calls, template expressions, etc are allowed here.",
            )
            .with_subject(self.range.clone())
        };

        match &self.inner {
            HclExpression::Variable(var) => Ok(Traversal {
                root: var.as_str().to_string(),
                steps: Vec::new(),
                range: self.range.clone(),
            }),
            HclExpression::Traversal(traversal) => {
                let Some(root) = traversal.expr.as_variable() else {
                    return Err(invalid());
                };

                let mut steps = Vec::with_capacity(traversal.operators.len());
                for op in traversal.operators.iter() {
                    let step = match op.value() {
                        TraversalOperator::GetAttr(ident) => {
                            TraverseStep::Attr(ident.as_str().to_string())
                        }
                        TraversalOperator::LegacyIndex(index) => {
                            let index = i64::try_from(*index.value()).map_err(|_| invalid())?;
                            TraverseStep::Index(IndexKey::Int(index))
                        }
                        TraversalOperator::Index(HclExpression::Number(n)) => {
                            TraverseStep::Index(IndexKey::Int(n.as_i64().ok_or_else(invalid)?))
                        }
                        TraversalOperator::Index(HclExpression::String(s)) => {
                            TraverseStep::Index(IndexKey::String(s.value().to_string()))
                        }
                        _ => return Err(invalid()),
                    };
                    steps.push(step);
                }

                Ok(Traversal {
                    root: root.as_str().to_string(),
                    steps,
                    range: self.range.clone(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Arrays become tuples and objects become objects; `null` is untyped
fn value_from_hcl(value: hcl::Value) -> Value {
    match value {
        hcl::Value::Null => Value::Null(Type::Dynamic),
        hcl::Value::Bool(b) => Value::bool(b),
        hcl::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::number(u)
            } else {
                n.as_f64()
                    .and_then(Value::number_f64)
                    .unwrap_or(Value::Null(Type::Number))
            }
        }
        hcl::Value::String(s) => Value::string(s),
        hcl::Value::Array(items) => Value::tuple(items.into_iter().map(value_from_hcl).collect()),
        hcl::Value::Object(attrs) => Value::object(
            attrs
                .into_iter()
                .map(|(k, v)| (k, value_from_hcl(v))),
        ),
    }
}
