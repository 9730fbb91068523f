//! Mode-driven lexer for CX markup.
//!
//! The parser picks the lexing [`Mode`] for every token: the same characters
//! mean different things inside an element body, a tag or a string literal.
//! Interpolation holes are opaque; each one becomes a single `INTERPOLATION`
//! token no matter the mode.

mod escapes;
mod interpolation;
mod reader;

use cx_errors::{CancellationToken, Diagnostic, check_cancelled};
use cx_yellow::SyntaxKind::*;
pub use cx_yellow::{SyntaxKind, TokenFlags};
pub use escapes::{NAMED_ESCAPES, contains_escape, resolve_escape, unescape};
pub use interpolation::{InterpolationError, Interpolations};
pub use reader::{EOF_CHAR, SourceReader};
use text_size::{TextRange, TextSize};

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Tag punctuation only.
    Default,
    /// Inside a quoted attribute value.
    StringLiteral,
    /// Element and attribute names.
    Identifier,
    /// Free text between tags.
    ElementValue,
    /// After `=`: quotes, parentheses and bare values.
    Attribute,
}

/// The quote that opened the current string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub ch: char,
    /// Written as `\"` because the markup sits inside a host string literal.
    pub escaped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub full_range: TextRange,
    pub leading_len: TextSize,
    pub trailing_len: TextSize,
    pub flags: TokenFlags,
    /// Absolute ranges.
    pub diagnostics: Vec<Diagnostic>,
}

impl Token {
    /// Range without leading and trailing trivia.
    pub fn range(&self) -> TextRange {
        TextRange::new(
            self.full_range.start() + self.leading_len,
            self.full_range.end() - self.trailing_len,
        )
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.full_range]
    }

    pub fn value<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range()]
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    mode: Mode,
    quote: Option<Quote>,
}

pub struct Lexer<'a> {
    reader: SourceReader<'a>,
    cancel: CancellationToken,
    frames: Vec<Frame>,
    pending_quote: Option<Quote>,
    /// First hole that ends after the reader position.
    next_hole: usize,
    interpolation_tokens: Vec<Option<Token>>,
}

impl<'a> Lexer<'a> {
    /// Starts lexing at the reader's position in [`Mode::Default`].
    pub fn new(reader: SourceReader<'a>, cancel: &CancellationToken) -> Self {
        let holes = reader.interpolations();
        let next_hole = holes.first_ending_after(reader.position()).unwrap_or(holes.len());
        let interpolation_tokens = vec![None; holes.len()];
        Self {
            reader,
            cancel: cancel.clone(),
            frames: vec![Frame { mode: Mode::Default, quote: None }],
            pending_quote: None,
            next_hole,
            interpolation_tokens,
        }
    }

    pub fn reader(&self) -> &SourceReader<'a> {
        &self.reader
    }

    pub fn position(&self) -> TextSize {
        self.reader.position()
    }

    pub fn mode(&self) -> Mode {
        self.frame().mode
    }

    fn frame(&self) -> Frame {
        *self.frames.last().expect("the base mode is never popped")
    }

    /// Enters `mode` until the matching [`Lexer::pop_mode`].
    ///
    /// # Panics
    ///
    /// Entering [`Mode::StringLiteral`] requires a `STRING_LITERAL_START` to
    /// have been lexed since the previous string literal was entered.
    pub fn push_mode(&mut self, mode: Mode) {
        let quote = match mode {
            Mode::StringLiteral => Some(
                self.pending_quote
                    .take()
                    .expect("string literal mode entered without an opening quote"),
            ),
            _ => None,
        };
        self.frames.push(Frame { mode, quote });
    }

    pub fn pop_mode(&mut self) -> Mode {
        assert!(self.frames.len() > 1, "`pop_mode` without a matching `push_mode`");
        self.frames.pop().map_or(Mode::Default, |frame| frame.mode)
    }

    /// Moves the lexer to `position`, which must not lie inside a hole.
    pub fn seek(&mut self, position: TextSize) {
        let holes = self.reader.interpolations();
        assert!(
            holes.containing(position).is_none(),
            "cannot seek into an interpolation at {position:?}"
        );
        let next_hole = holes.first_ending_after(position).unwrap_or(holes.len());

        self.reader.set_position(position);
        self.next_hole = next_hole;
        tracing::trace!(?position, mode = ?self.mode(), "lexer seek");
    }

    /// The token lexed for each hole so far, by hole id.
    pub fn interpolation_tokens(&self) -> impl Iterator<Item = (usize, &Token)> {
        self.interpolation_tokens
            .iter()
            .enumerate()
            .filter_map(|(index, token)| Some((index, token.as_ref()?)))
    }

    pub fn interpolation_token(&self, index: usize) -> Option<&Token> {
        self.interpolation_tokens.get(index)?.as_ref()
    }

    pub fn next_token(&mut self) -> Token {
        let (token, hole) = self.lex();
        if let Some(index) = hole {
            self.interpolation_tokens[index] = Some(token.clone());
        }
        token
    }

    /// Lexes the next token in `mode` without consuming it.
    pub fn peek_token(&mut self, mode: Mode) -> Token {
        assert_ne!(mode, Mode::StringLiteral, "string literals cannot be peeked into");
        let position = self.reader.position();
        let next_hole = self.next_hole;
        let pending_quote = self.pending_quote;

        self.frames.push(Frame { mode, quote: None });
        let (token, _) = self.lex();
        self.frames.pop();

        self.reader.set_position(position);
        self.next_hole = next_hole;
        self.pending_quote = pending_quote;
        token
    }

    fn lex(&mut self) -> (Token, Option<usize>) {
        self.check_cancelled();
        let start = self.reader.position();
        let mut flags = TokenFlags::empty();
        let mut diagnostics = Vec::new();

        self.trivia(false, &mut flags, &mut diagnostics);
        let value_start = self.reader.position();

        let hole = self.hole_at_position();
        let kind = match hole {
            Some((_, span)) => {
                self.reader.set_position(span.end());
                INTERPOLATION
            }
            None => self.scan(),
        };

        let value_end = self.reader.position();
        if self.collects_trailing_trivia(kind) {
            self.trivia(true, &mut flags, &mut diagnostics);
        }
        let end = self.reader.position();

        if matches!(kind, TEXT | STRING_LITERAL_TEXT | ATTRIBUTE_VALUE)
            && contains_escape(&self.reader[TextRange::new(value_start, value_end)])
        {
            flags |= TokenFlags::HAS_ESCAPES;
        }

        let token = Token {
            kind,
            full_range: TextRange::new(start, end),
            leading_len: value_start - start,
            trailing_len: end - value_end,
            flags,
            diagnostics,
        };
        (token, hole.map(|(index, _)| index))
    }

    fn check_cancelled(&self) {
        check_cancelled(&self.cancel);
    }

    fn sync_holes(&mut self) {
        let position = self.reader.position();
        let holes = self.reader.interpolations();
        while holes.get(self.next_hole).is_some_and(|span| span.end() <= position) {
            check_cancelled(&self.cancel);
            self.next_hole += 1;
        }
    }

    /// Start of the current or next hole, or the end of the text.
    fn boundary(&mut self) -> TextSize {
        self.sync_holes();
        self.reader.interpolations().get(self.next_hole).map_or(self.reader.len(), |span| span.start())
    }

    fn hole_at_position(&mut self) -> Option<(usize, TextRange)> {
        self.sync_holes();
        let span = self.reader.interpolations().get(self.next_hole)?;
        (span.start() == self.reader.position()).then_some((self.next_hole, span))
    }

    /// The current character and the one after it, as long as they lie
    /// before `boundary`.
    fn lookahead(&self, boundary: TextSize) -> (char, char) {
        let position = self.reader.position();
        let current = if position < boundary { self.reader.current() } else { EOF_CHAR };
        let next_position = position + TextSize::of(current);
        let next = if next_position < boundary { self.reader.next() } else { EOF_CHAR };
        (current, next)
    }

    fn collects_trailing_trivia(&self, kind: SyntaxKind) -> bool {
        !matches!(self.mode(), Mode::ElementValue | Mode::StringLiteral)
            && !matches!(kind, GREATER_THAN | SLASH_GREATER_THAN | STRING_LITERAL_START | EOF)
    }

    fn trivia(&mut self, trailing: bool, flags: &mut TokenFlags, diagnostics: &mut Vec<Diagnostic>) {
        let mode = self.mode();
        if mode == Mode::StringLiteral {
            return;
        }

        let boundary = self.boundary();
        while self.reader.position() < boundary {
            self.check_cancelled();

            if self.reader.starts_with(COMMENT_START)
                && self.reader.position() + TextSize::of(COMMENT_START) <= boundary
            {
                self.comment(boundary, flags, diagnostics);
                continue;
            }
            if mode == Mode::ElementValue {
                break;
            }

            match self.reader.current() {
                '\r' | '\n' => {
                    if self.reader.starts_with("\r\n") {
                        self.reader.advance_by(2);
                    } else {
                        self.reader.advance();
                    }
                    if trailing {
                        break;
                    }
                }
                ch if ch.is_whitespace() => {
                    self.reader.advance();
                }
                _ => break,
            }
        }
    }

    fn comment(&mut self, boundary: TextSize, flags: &mut TokenFlags, diagnostics: &mut Vec<Diagnostic>) {
        let start = self.reader.position();
        self.reader.advance_by(COMMENT_START.len());

        loop {
            self.check_cancelled();
            let position = self.reader.position();
            if position >= boundary {
                *flags |= TokenFlags::UNTERMINATED;
                diagnostics
                    .push(Diagnostic::error("unterminated comment", TextRange::new(start, position)));
                return;
            }
            if self.reader.starts_with(COMMENT_END) && position + TextSize::of(COMMENT_END) <= boundary
            {
                self.reader.advance_by(COMMENT_END.len());
                return;
            }
            self.reader.advance();
        }
    }

    fn scan(&mut self) -> SyntaxKind {
        let boundary = self.boundary();
        if self.reader.position() >= boundary && self.reader.is_eof() {
            return EOF;
        }

        match self.mode() {
            Mode::Default => self.punctuation(boundary),
            Mode::Identifier => self.identifier(boundary),
            Mode::ElementValue => self.element_value(boundary),
            Mode::Attribute => self.attribute(boundary),
            Mode::StringLiteral => self.string_literal(boundary),
        }
    }

    fn punctuation(&mut self, boundary: TextSize) -> SyntaxKind {
        let kind = match self.lookahead(boundary) {
            ('<', '/') => LESS_THAN_SLASH,
            ('<', _) => LESS_THAN,
            ('/', '>') => SLASH_GREATER_THAN,
            ('>', _) => GREATER_THAN,
            ('=', _) => EQUALS,
            _ => {
                self.reader.advance();
                return INVALID;
            }
        };
        self.reader.advance_by(kind.text().map_or(1, str::len));
        kind
    }

    fn identifier(&mut self, boundary: TextSize) -> SyntaxKind {
        let (current, _) = self.lookahead(boundary);
        if !(current.is_ascii_alphabetic() || current == '_') {
            return self.punctuation(boundary);
        }

        self.reader.advance();
        while self.reader.position() < boundary && is_identifier_continue(self.reader.current()) {
            self.check_cancelled();
            self.reader.advance();
        }
        IDENTIFIER
    }

    fn element_value(&mut self, boundary: TextSize) -> SyntaxKind {
        match self.lookahead(boundary) {
            ('<', '/') => {
                self.reader.advance_by(2);
                return LESS_THAN_SLASH;
            }
            ('<', _) => {
                self.reader.advance();
                return LESS_THAN;
            }
            (EOF_CHAR, _) => {
                self.reader.advance();
                return INVALID;
            }
            _ => {}
        }

        while self.reader.position() < boundary && !matches!(self.reader.current(), '<' | EOF_CHAR)
        {
            self.check_cancelled();
            self.reader.advance();
        }
        TEXT
    }

    fn attribute(&mut self, boundary: TextSize) -> SyntaxKind {
        let escaped = self.reader.quotes_are_escaped();
        match self.lookahead(boundary) {
            ('\\', '"') if escaped => {
                self.reader.advance_by(2);
                self.pending_quote = Some(Quote { ch: '"', escaped: true });
                return STRING_LITERAL_START;
            }
            (ch @ ('"' | '\''), _) if ch == '\'' || !escaped => {
                self.reader.advance();
                self.pending_quote = Some(Quote { ch, escaped: false });
                return STRING_LITERAL_START;
            }
            ('(', _) => {
                self.reader.advance();
                return L_PAREN;
            }
            (')', _) => {
                self.reader.advance();
                return R_PAREN;
            }
            ('<' | '>' | '=', _) | ('/', '>') => return self.punctuation(boundary),
            _ => {}
        }

        let start = self.reader.position();
        loop {
            let (current, next) = self.lookahead(boundary);
            let stop = match current {
                EOF_CHAR | '"' | '\'' | '<' | '>' | '=' | '(' | ')' => true,
                '/' => next == '>',
                '\\' => escaped && next == '"',
                ch => ch.is_whitespace(),
            };
            if stop {
                break;
            }
            self.check_cancelled();
            self.reader.advance();
        }

        if self.reader.position() == start {
            self.reader.advance();
            INVALID
        } else {
            ATTRIBUTE_VALUE
        }
    }

    fn string_literal(&mut self, boundary: TextSize) -> SyntaxKind {
        let quote = self.frame().quote.expect("string literal frames carry their quote");
        let closing_len = if quote.escaped { 2 } else { 1 };

        if self.at_closing_quote(quote, boundary) {
            self.reader.advance_by(closing_len);
            return STRING_LITERAL_END;
        }

        while self.reader.position() < boundary && !self.at_closing_quote(quote, boundary) {
            self.check_cancelled();
            match self.lookahead(boundary) {
                ('\\', '\\') if quote.escaped => self.reader.advance_by(2),
                _ => {
                    self.reader.advance();
                }
            }
        }
        STRING_LITERAL_TEXT
    }

    fn at_closing_quote(&self, quote: Quote, boundary: TextSize) -> bool {
        match self.lookahead(boundary) {
            ('\\', next) if quote.escaped => next == quote.ch,
            (current, _) => !quote.escaped && current == quote.ch,
        }
    }
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')
}
