use std::fmt;
use std::ops::Range;

/// A byte region of the source text
///
/// Spans are attached to every token and AST node. The user-facing error
/// format only needs the source line, which [`Span::line`] recovers from the
/// original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span of a single byte
    pub fn single(position: usize) -> Self {
        Self::new(position, position + 1)
    }

    /// Empty span, e.g. for the end of the input
    pub fn marker(position: usize) -> Self {
        Self::new(position, position)
    }

    /// Smallest span that contains both `self` and `other`
    pub fn merge(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// The 1-based line this span starts on
    pub fn line(&self, source: &str) -> usize {
        let upto = self.start.min(source.len());
        source[..upto].bytes().filter(|&b| b == b'\n').count() + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl chumsky::span::Span for Span {
    type Context = ();
    type Offset = usize;

    fn new(_context: Self::Context, range: Range<Self::Offset>) -> Self {
        Self::new(range.start, range.end)
    }

    fn context(&self) -> Self::Context {}

    fn start(&self) -> Self::Offset {
        self.start
    }

    fn end(&self) -> Self::Offset {
        self.end
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.end.saturating_sub(span.start)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines() {
        let src = "program p;\nbegin\nend.\n";
        assert_eq!(Span::new(0, 7).line(src), 1);
        assert_eq!(Span::new(11, 16).line(src), 2);
        assert_eq!(Span::new(17, 21).line(src), 3);
    }

    #[test]
    fn merge() {
        assert_eq!(Span::new(3, 5).merge(Span::new(9, 12)), Span::new(3, 12));
    }
}
