use miette::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a declaration, statement or expression in the source text the
/// front-end parsed. `pos` is a byte offset, `line` is 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub pos: usize,
    #[serde(default)]
    pub len: usize,
}

impl Pos {
    pub fn new(line: usize, pos: usize, len: usize) -> Self {
        Self { line, pos, len }
    }

    /// A position that only knows its line, used by hand-built programs.
    pub fn line(line: usize) -> Self {
        Self { line, pos: 0, len: 0 }
    }

    pub fn span(self) -> SourceSpan {
        pos_to_span(self)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.pos)
    }
}

impl From<Pos> for SourceSpan {
    fn from(pos: Pos) -> Self {
        pos_to_span(pos)
    }
}

/// Convert a `Pos` to a `SourceSpan` for use with miette diagnostics
///
/// ```rust
/// use isolate_check::pos::{pos_to_span, Pos};
///
/// let span = pos_to_span(Pos::new(5, 100, 5));
/// assert_eq!(span.offset(), 100);
/// assert_eq!(span.len(), 5);
/// ```
pub fn pos_to_span(pos: Pos) -> SourceSpan {
    SourceSpan::new(pos.pos.into(), pos.len)
}
