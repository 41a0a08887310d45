#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Span` records a byte range `[start, end)` of the user's input (e.g. that of a lexeme or of a
/// rule name in a grammar). It does not hold a reference to, or copy of, the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span starting at byte `start` and ending at byte `end`.
    ///
    /// # Panics
    ///
    /// If `end` is less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            panic!("Span starts ({}) after it ends ({})!", start, end);
        }
        Span { start, end }
    }

    /// Byte offset of the start of the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in bytes of the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if this `Span` covers 0 bytes, or `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest span which contains both `self` and `other`, including any bytes between
    /// them.
    pub fn cover(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[cfg(test)]
mod test {
    use super::Span;

    #[test]
    fn test_cover() {
        let s = Span::new(2, 4);
        assert_eq!(s.cover(Span::new(7, 9)), Span::new(2, 9));
        assert_eq!(Span::new(7, 9).cover(s), Span::new(2, 9));
        assert_eq!(s.cover(Span::new(3, 3)), s);
        assert!(Span::new(5, 5).is_empty());
        assert_eq!(s.cover(Span::new(0, 10)).len(), 10);
    }

    #[test]
    #[should_panic]
    fn test_backwards_span() {
        Span::new(3, 2);
    }
}
