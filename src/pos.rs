use bstr::ByteSlice;
use serde::Serialize;

/// Zero-based line and column of a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets of one source buffer to line/column positions.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    /// Offset of the first byte of every line; always starts with 0.
    line_starts: Vec<usize>,
}

impl SourceLocator {
    pub fn new(source: &[u8]) -> Self {
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < source.len() {
            match source[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' if source.get(i + 1) != Some(&b'\n') => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        SourceLocator { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next_line) => next_line - 1,
        }
    }

    /// Position with the column counted in bytes. Offsets past the end of
    /// `source` are clamped to it.
    pub fn position(&self, source: &[u8], offset: usize) -> Position {
        let offset = offset.min(source.len());
        let line = self.line_of(offset);
        Position {
            line: line as u32,
            column: (offset - self.line_starts[line]) as u32,
        }
    }

    /// Position with the column counted in UTF-16 code units.
    pub fn position_utf16(&self, source: &[u8], offset: usize) -> Position {
        let offset = offset.min(source.len());
        let line = self.line_of(offset);
        let column = source[self.line_starts[line]..offset]
            .chars()
            .map(|ch| ch.len_utf16() as u32)
            .sum();
        Position {
            line: line as u32,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position() {
        let source = b"ab\ncd\r\nef\rg";
        let locator = SourceLocator::new(source);
        assert_eq!(locator.line_count(), 4);
        assert_eq!(locator.position(source, 0), Position { line: 0, column: 0 });
        assert_eq!(locator.position(source, 2), Position { line: 0, column: 2 });
        assert_eq!(locator.position(source, 3), Position { line: 1, column: 0 });
        assert_eq!(locator.position(source, 8), Position { line: 2, column: 1 });
        assert_eq!(locator.position(source, 10), Position { line: 3, column: 0 });
        assert_eq!(locator.position(source, 99), Position { line: 3, column: 1 });
    }

    #[test]
    fn test_position_utf16() {
        let source = "é😀x".as_bytes();
        let locator = SourceLocator::new(source);
        assert_eq!(locator.position(source, 6), Position { line: 0, column: 6 });
        assert_eq!(
            locator.position_utf16(source, 6),
            Position { line: 0, column: 3 }
        );
    }
}
