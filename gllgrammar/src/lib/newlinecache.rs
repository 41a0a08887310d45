/// Converts byte offsets into 1-based line and column numbers. Input is given to the cache via
/// [`NewlineCache::feed`]; queries must pass the concatenation of everything fed so far.
#[derive(Debug)]
pub struct NewlineCache {
    /// The byte offset at which each line starts. Always contains at least `0`.
    line_starts: Vec<usize>,
    input_len: usize,
}

impl Default for NewlineCache {
    fn default() -> Self {
        NewlineCache {
            line_starts: vec![0],
            input_len: 0,
        }
    }
}

impl NewlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more input into the cache. `src` is treated as if it were concatenated with the
    /// input of all previous calls to `feed`.
    pub fn feed(&mut self, src: &str) {
        let base = self.input_len;
        self.line_starts
            .extend(src.match_indices('\n').map(|(off, _)| base + off + 1));
        self.input_len += src.len();
    }

    /// The total number of bytes fed so far.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// The number of lines fed so far (an empty input has one, empty, line).
    pub fn lines_len(&self) -> usize {
        self.line_starts.len()
    }

    /// The 1-based line number containing `byte`, or `None` if `byte` is beyond the end of the
    /// input. The offset one past the last byte is considered to be on the last line.
    pub fn byte_to_line(&self, byte: usize) -> Option<usize> {
        if byte > self.input_len {
            return None;
        }
        Some(self.line_starts.partition_point(|&start| start <= byte))
    }

    /// The byte offset at which 1-based line `line` starts.
    pub fn line_to_byte(&self, line: usize) -> Option<usize> {
        if line == 0 {
            return None;
        }
        self.line_starts.get(line - 1).copied()
    }

    /// The byte offset at which 1-based line `line` ends, excluding its newline.
    pub fn line_end_byte(&self, line: usize) -> Option<usize> {
        self.line_to_byte(line)?;
        Some(match self.line_starts.get(line) {
            Some(next) => next - 1,
            None => self.input_len,
        })
    }

    /// Convert `byte` into a 1-based `(line, column)` pair, where columns count characters, not
    /// bytes. Returns `None` if `src` is not the input fed to the cache, or if `byte` is beyond
    /// the end of `src` or not on a character boundary.
    pub fn byte_to_line_col(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if src.len() != self.input_len {
            return None;
        }
        let line = self.byte_to_line(byte)?;
        let line_start = self.line_starts[line - 1];
        let col = src.get(line_start..byte)?.chars().count() + 1;
        Some((line, col))
    }
}

#[cfg(test)]
mod test {
    use super::NewlineCache;

    fn cache(feeds: &[&str]) -> (NewlineCache, String) {
        let mut nc = NewlineCache::new();
        let mut src = String::new();
        for f in feeds {
            nc.feed(f);
            src.push_str(f);
        }
        (nc, src)
    }

    #[test]
    fn test_single_line() {
        let (nc, src) = cache(&["abc"]);
        assert_eq!(nc.lines_len(), 1);
        assert_eq!(nc.byte_to_line_col(&src, 0), Some((1, 1)));
        assert_eq!(nc.byte_to_line_col(&src, 2), Some((1, 3)));
        assert_eq!(nc.byte_to_line_col(&src, 3), Some((1, 4)));
        assert_eq!(nc.byte_to_line_col(&src, 4), None);
    }

    #[test]
    fn test_multiple_feeds() {
        let (nc, src) = cache(&["a\nb", "c\n", "\nd"]);
        assert_eq!(nc.lines_len(), 4);
        assert_eq!(nc.byte_to_line_col(&src, 1), Some((1, 2)));
        assert_eq!(nc.byte_to_line_col(&src, 2), Some((2, 1)));
        assert_eq!(nc.byte_to_line_col(&src, 4), Some((2, 3)));
        assert_eq!(nc.byte_to_line_col(&src, 5), Some((3, 1)));
        assert_eq!(nc.byte_to_line_col(&src, 6), Some((4, 1)));
        assert_eq!(nc.line_to_byte(2), Some(2));
        assert_eq!(nc.line_end_byte(2), Some(4));
        assert_eq!(nc.line_end_byte(4), Some(7));
        assert_eq!(nc.line_to_byte(0), None);
        assert_eq!(nc.line_to_byte(5), None);
    }

    #[test]
    fn test_multibyte() {
        let (nc, src) = cache(&["℮a\n€b"]);
        assert_eq!(nc.byte_to_line_col(&src, 3), Some((1, 2)));
        assert_eq!(nc.byte_to_line_col(&src, 8), Some((2, 2)));
        // Not a character boundary.
        assert_eq!(nc.byte_to_line_col(&src, 1), None);
    }

    #[test]
    fn test_mismatched_src() {
        let (nc, _) = cache(&["ab\nc"]);
        assert_eq!(nc.byte_to_line_col("ab", 0), None);
    }
}
