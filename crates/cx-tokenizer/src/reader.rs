use std::ops::Index;

use text_size::{TextLen, TextRange, TextSize};

use crate::Interpolations;

pub const EOF_CHAR: char = '\0';

/// Character cursor over the markup text plus the parse configuration that
/// travels with it.
#[derive(Debug, Clone)]
pub struct SourceReader<'a> {
    text: &'a str,
    position: TextSize,
    interpolations: Interpolations,
    wrapping_quote_count: u32,
}

impl<'a> SourceReader<'a> {
    pub fn new(text: &'a str) -> Self {
        assert!(text.len() <= u32::MAX as usize, "source text is too long");
        Self {
            text,
            position: TextSize::new(0),
            interpolations: Interpolations::default(),
            wrapping_quote_count: 0,
        }
    }

    pub fn with_interpolations(mut self, interpolations: Interpolations) -> Self {
        self.interpolations = interpolations;
        self
    }

    /// Number of quote characters that delimit the host string literal the
    /// markup is written in.
    pub fn with_wrapping_quote_count(mut self, count: u32) -> Self {
        self.wrapping_quote_count = count;
        self
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> TextSize {
        self.text.text_len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn interpolations(&self) -> &Interpolations {
        &self.interpolations
    }

    pub fn wrapping_quote_count(&self) -> u32 {
        self.wrapping_quote_count
    }

    /// String delimiters inside the markup must be written as `\"`.
    pub fn quotes_are_escaped(&self) -> bool {
        self.wrapping_quote_count == 1
    }

    pub fn position(&self) -> TextSize {
        self.position
    }

    pub fn set_position(&mut self, position: TextSize) {
        assert!(
            position <= self.len() && self.text.is_char_boundary(position.into()),
            "invalid reader position {position:?}"
        );
        self.position = position;
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.len()
    }

    /// Text from the current position to the end.
    pub fn rest(&self) -> &'a str {
        &self.text[usize::from(self.position)..]
    }

    pub fn current(&self) -> char {
        self.rest().chars().next().unwrap_or(EOF_CHAR)
    }

    pub fn next(&self) -> char {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next().unwrap_or(EOF_CHAR)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// The next `n` characters, or fewer at the end of the text.
    pub fn peek(&self, n: usize) -> &'a str {
        let rest = self.rest();
        let end = rest.char_indices().nth(n).map_or(rest.len(), |(index, _)| index);
        &rest[..end]
    }

    /// Consumes one character and returns it, `'\0'` at the end.
    pub fn advance(&mut self) -> char {
        let ch = self.current();
        if !self.is_eof() {
            self.position += ch.text_len();
        }
        ch
    }

    pub fn advance_by(&mut self, n: usize) {
        self.position += TextSize::of(self.peek(n));
    }
}

impl Index<TextRange> for SourceReader<'_> {
    type Output = str;

    fn index(&self, range: TextRange) -> &str {
        &self.text[range]
    }
}
