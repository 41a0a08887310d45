use std::{cmp, error::Error, fmt, hash::Hash, marker};

use gllgrammar::Span;
use num_traits::{PrimInt, Unsigned};

/// A `NonStreamingLexer` takes its input in one go and hands out, by index, the lexemes it found
/// in it. It can also return substrings of the input and calculate line and column numbers from
/// a [Span]. This is the token collaborator a [Set](crate::Set) uses to resolve terminals and to
/// render derivations.
pub trait NonStreamingLexer<StorageT: Hash + PrimInt + Unsigned> {
    type LexemeT: Lexeme<StorageT>;

    /// All of the lexemes in the input, in order.
    fn lexemes(&self) -> &[Self::LexemeT];

    /// Return the user input associated with a [Span].
    ///
    /// The [Span] must be well formed:
    ///   * The start/end byte indexes must be valid UTF-8 character indexes.
    ///   * The end byte index must not exceed the input's length.
    ///
    /// If these requirements are not respected this function may panic or return unexpected
    /// portions of the input.
    fn span_str(&self, span: Span) -> &str;

    /// Return the lines containing the input at `span` (including *all* the text on the lines
    /// that `span` starts and ends on). The same well-formedness requirements as
    /// [span_str](NonStreamingLexer::span_str) apply.
    fn span_lines_str(&self, span: Span) -> &str;

    /// Return `((start line, start column), (end line, end column))` for `span`. Note that column
    /// *characters* (not bytes) are returned. The same well-formedness requirements as
    /// [span_str](NonStreamingLexer::span_str) apply.
    fn line_col(&self, span: Span) -> ((usize, usize), (usize, usize));

    /// How many lexemes are there in the input?
    fn tokens_len(&self) -> usize {
        self.lexemes().len()
    }

    /// The lexeme at absolute token position `idx`, or `None` if `idx` is beyond the input.
    fn token_at(&self, idx: usize) -> Option<Self::LexemeT> {
        self.lexemes().get(idx).copied()
    }

    /// The `(line, column)` at which the lexeme at `idx` starts. An `idx` equal to
    /// [tokens_len](NonStreamingLexer::tokens_len) refers to the end of the last lexeme.
    fn line_column_of(&self, idx: usize) -> (usize, usize) {
        let lexemes = self.lexemes();
        let off = match lexemes.get(idx) {
            Some(l) => l.span().start(),
            None => lexemes.last().map_or(0, |l| l.span().end()),
        };
        self.line_col(Span::new(off, off)).0
    }

    /// The input text from the start of the lexeme at `left` to the end of the lexeme at
    /// `right - 1` (including any skipped text in between). Empty if `left >= right` or if the
    /// range is beyond the input.
    fn source_text(&self, left: usize, right: usize) -> &str {
        if left >= right {
            return "";
        }
        let lexemes = self.lexemes();
        match (lexemes.get(left), lexemes.get(right - 1)) {
            (Some(l), Some(r)) => self.span_str(l.span().cover(r.span())),
            _ => "",
        }
    }
}

/// A lexeme represents a segment of the user's input that conforms to a known type: this trait
/// captures the common behaviour of all lexeme structs.
pub trait Lexeme<StorageT>: fmt::Debug + fmt::Display + cmp::Eq + Hash + marker::Copy {
    /// Create a new lexeme with ID `tok_id`, a starting position in the input `start`, and length
    /// `len`.
    fn new(tok_id: StorageT, start: usize, len: usize) -> Self
    where
        Self: Sized;

    /// The token ID.
    fn tok_id(&self) -> StorageT;

    /// Obtain this `Lexeme`'s [Span].
    fn span(&self) -> Span;
}

/// A lexing error.
pub trait LexError: Error {
    /// Return the span associated with this error.
    fn span(&self) -> Span;
}
