use cx_errors::CancellationToken;
use cx_tokenizer::{Lexer, Mode, SourceReader, Token};
use cx_yellow::{GreenBuilder, GreenNode, SyntaxKind};
use drop_bomb::DropBomb;
use text_size::TextRange;

pub(crate) struct Parser<'a> {
    text: &'a str,
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
    events: Vec<Event>,
    /// Names of the elements whose content is being parsed, outermost first.
    /// `None` stands for an element without a name.
    pub(crate) open_elements: Vec<Option<String>>,
}

impl<'a> Parser<'a> {
    /// Starts at the reader's position in `mode`.
    pub(crate) fn new(reader: SourceReader<'a>, cancel: &CancellationToken, mode: Mode) -> Self {
        let text = reader.text();
        let mut lexer = Lexer::new(reader, cancel);
        lexer.push_mode(mode);
        Self { text, lexer, lookahead: None, events: Vec::new(), open_elements: Vec::new() }
    }

    fn peek(&mut self) -> &Token {
        let lexer = &mut self.lexer;
        self.lookahead.get_or_insert_with(|| lexer.next_token())
    }

    pub(crate) fn peek_kind(&mut self) -> SyntaxKind {
        self.peek().kind
    }

    /// Text of the next token without its trivia.
    pub(crate) fn peek_value(&mut self) -> &'a str {
        let text = self.text;
        self.peek().value(text)
    }

    pub(crate) fn at(&mut self, kind: SyntaxKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn advance(&mut self) {
        self.peek();
        if let Some(token) = self.lookahead.take() {
            self.events.push(Event::Token(token));
        }
    }

    pub(crate) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if !self.at(kind) {
            return false;
        }
        self.advance();
        true
    }

    /// Consumes `kind`, or records a missing token and an error.
    pub(crate) fn expect(&mut self, kind: SyntaxKind, message: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error(message);
        self.missing(kind);
        false
    }

    pub(crate) fn missing(&mut self, kind: SyntaxKind) {
        self.events.push(Event::Missing(kind));
    }

    /// Reports an error at the next token. It belongs to the innermost node
    /// started so far.
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let range = self.peek().range();
        self.events.push(Event::Error { message: message.into(), range });
    }

    pub(crate) fn error_and_bump(&mut self, message: &str) {
        let m = self.start();
        self.error(message);
        self.advance();
        m.complete(self, SyntaxKind::ERROR);
    }

    /// Runs `f` with `mode` pushed onto the lexer. A token peeked in the
    /// surrounding mode is lexed again.
    pub(crate) fn with_mode<T>(&mut self, mode: Mode, f: impl FnOnce(&mut Self) -> T) -> T {
        self.relex_lookahead();
        self.lexer.push_mode(mode);
        let value = f(self);
        self.relex_lookahead();
        self.lexer.pop_mode();
        value
    }

    fn relex_lookahead(&mut self) {
        if let Some(token) = self.lookahead.take() {
            self.lexer.seek(token.full_range.start());
        }
    }

    /// Kind and value of the token after the peeked one, lexed in `mode`.
    pub(crate) fn peek_second(&mut self, mode: Mode) -> (SyntaxKind, &'a str) {
        self.peek();
        let token = self.lexer.peek_token(mode);
        (token.kind, token.value(self.text))
    }

    pub(crate) fn start(&mut self) -> Marker {
        let position = self.events.len() as u32;
        self.events.push(Event::TOMBSTONE);
        Marker::new(position)
    }

    pub(crate) fn build(self, mut builder: GreenBuilder<'_>) -> GreenNode {
        let Parser { text, events, .. } = self;

        for event in events {
            match event {
                Event::Start { kind } => {
                    debug_assert_ne!(kind, SyntaxKind::TOMBSTONE, "uncompleted marker");
                    builder.start_node(kind);
                }
                Event::Finish => builder.finish_node(),
                Event::Token(token) => builder.token(
                    token.kind,
                    token.text(text),
                    token.leading_len,
                    token.trailing_len,
                    token.flags,
                    &token.diagnostics,
                ),
                Event::Missing(kind) => builder.missing(kind),
                Event::Error { message, range } => builder.error(message, range),
            }
        }

        builder.finish()
    }
}

enum Event {
    Start { kind: SyntaxKind },
    Token(Token),
    Missing(SyntaxKind),
    Error { message: String, range: TextRange },
    Finish,
}

impl Event {
    const TOMBSTONE: Self = Event::Start { kind: SyntaxKind::TOMBSTONE };
}

pub(crate) struct Marker {
    position: u32,
    bomb: DropBomb,
}

impl Marker {
    fn new(position: u32) -> Marker {
        Marker { position, bomb: DropBomb::new("Marker must be completed") }
    }

    pub(crate) fn complete(mut self, p: &mut Parser<'_>, kind: SyntaxKind) {
        self.bomb.defuse();

        match &mut p.events[self.position as usize] {
            Event::Start { kind: slot } => *slot = kind,
            _ => unreachable!(),
        }

        p.events.push(Event::Finish);
    }
}
