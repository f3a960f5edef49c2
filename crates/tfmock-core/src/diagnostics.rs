//! User-facing diagnostics
//!
//! Problems with user-authored mock data (a missing attribute, a duplicate
//! override, a default of the wrong shape) never abort an operation. They are
//! collected into [`Diagnostics`] alongside a best-effort result so a test
//! harness can report every problem in one pass.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::value::ValuePath;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// A 1-based line/column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

/// A range of source text within a named file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub file: String,
    pub start: Pos,
    pub end: Pos,
}

impl SourceRange {
    /// Range covering the first character of a file, used when a syntax
    /// node carries no span
    pub fn file_start(file: impl Into<String>) -> Self {
        let start = Pos { line: 1, column: 1 };
        Self {
            file: file.into(),
            start,
            end: start,
        }
    }
}

/// Maps byte offsets within one source text to line/column positions
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Position of a byte offset; columns count characters
    pub fn position(&self, offset: usize) -> Pos {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(offset - line_start, |text| text.chars().count());

        Pos {
            line,
            column: column + 1,
        }
    }

    pub fn range(&self, file: impl Into<String>, span: &Range<usize>) -> SourceRange {
        SourceRange {
            file: file.into(),
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.file, self.start.line, self.start.column)?;
        if self.end.line == self.start.line {
            if self.end.column != self.start.column {
                write!(f, "-{}", self.end.column)?;
            }
        } else {
            write!(f, "-{},{}", self.end.line, self.end.column)?;
        }
        Ok(())
    }
}

/// A single problem found while decoding mock data or filling values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Where in the configuration the problem is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SourceRange>,
    /// Where in the value tree the problem is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ValuePath>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            subject: None,
            path: None,
        }
    }

    /// Attach the source range the diagnostic refers to
    pub fn with_subject(mut self, subject: SourceRange) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Attach the value path the diagnostic refers to; the root path is
    /// left off
    pub fn with_path(mut self, path: &ValuePath) -> Self {
        self.path = if path.is_root() {
            None
        } else {
            Some(path.clone())
        };
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;

        if let Some(subject) = &self.subject {
            write!(f, "\n  on {}", subject)?;
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if !self.detail.is_empty() {
            write!(f, "\n  {}", self.detail)?;
        }

        Ok(())
    }
}

/// An accumulating collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    /// Move every diagnostic from `other` into this collection
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Diagnostics(vec![diag])
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write!(f, "{}", diag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_position() {
        let source = "resource \"a\" {\n  defaults = {}\n}\n";
        let range = LineIndex::new(source).range("main.tfmock.hcl", &(17..25));

        assert_eq!(range.start, Pos { line: 2, column: 3 });
        assert_eq!(range.end, Pos { line: 2, column: 11 });
        assert_eq!(range.to_string(), "main.tfmock.hcl:2,3-11");
    }

    #[test]
    fn test_line_index_positions() {
        let source = "a = 1\n\nb = \"é\"\n";
        let index = LineIndex::new(source);

        assert_eq!(index.position(0), Pos { line: 1, column: 1 });
        assert_eq!(index.position(6), Pos { line: 2, column: 1 });
        assert_eq!(index.position(7), Pos { line: 3, column: 1 });
        // after the two-byte character
        assert_eq!(index.position(14), Pos { line: 3, column: 7 });
        assert_eq!(index.position(source.len() + 10), Pos { line: 4, column: 1 });
    }

    #[test]
    fn test_multiline_range_display() {
        let range = SourceRange {
            file: "f.hcl".into(),
            start: Pos { line: 1, column: 1 },
            end: Pos { line: 3, column: 2 },
        };
        assert_eq!(range.to_string(), "f.hcl:1,1-3,2");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error("Type mismatch", "Expected object but found string")
            .with_subject(SourceRange::file_start("f.hcl"))
            .with_path(&ValuePath::root().attr("block"));
        let display = diag.to_string();

        assert!(display.starts_with("Error: Type mismatch"));
        assert!(display.contains("on f.hcl:1,1"));
        assert!(display.contains("Path: block"));
        assert!(display.contains("Expected object but found string"));
    }

    #[test]
    fn test_root_path_is_omitted() {
        let diag = Diagnostic::error("x", "y").with_path(&ValuePath::root());
        assert!(diag.path.is_none());
    }

    #[test]
    fn test_has_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error("careful", "")
        });
        assert!(!diags.has_errors());

        diags.append(Diagnostic::error("broken", "").into());
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.errors().count(), 1);
    }
}
