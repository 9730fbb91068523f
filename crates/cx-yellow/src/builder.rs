//! Bottom-up construction of green trees from parser events.

use cx_errors::Diagnostic;
use cx_span::StringInternTable;
use text_size::{TextRange, TextSize};

use crate::{GreenElement, GreenNode, GreenToken, NodeOrToken, SyntaxKind, TokenFlags};

/// Lets a builder substitute previously built elements for fresh ones.
///
/// Each hook receives the absolute offset of the element being built and may
/// return an existing element to use instead. A returned element must be
/// structurally equal to the candidate.
pub trait NodeCache {
    fn token(&mut self, offset: TextSize, candidate: &GreenToken) -> Option<GreenToken>;

    fn node(
        &mut self,
        offset: TextSize,
        kind: SyntaxKind,
        slots: &[GreenElement],
        diagnostics: &[Diagnostic],
    ) -> Option<GreenNode>;
}

struct OpenNode {
    kind: SyntaxKind,
    first_slot: usize,
    start: TextSize,
    diagnostics: Vec<Diagnostic>,
}

const DEFAULT_TREE_DEPTH: usize = 32;
const DEFAULT_TREE_SIZE: usize = 256;

pub struct GreenBuilder<'c> {
    interner: &'static StringInternTable,
    cache: Option<&'c mut dyn NodeCache>,
    offset: TextSize,
    open: Vec<OpenNode>,
    slots: Vec<GreenElement>,
}

impl Drop for GreenBuilder<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.open.is_empty() {
            panic!("you should call `GreenBuilder::finish()`");
        }
    }
}

impl<'c> GreenBuilder<'c> {
    /// Creates a builder whose first token starts at `base`.
    pub fn new(base: TextSize) -> Self {
        Self {
            interner: StringInternTable::shared(),
            cache: None,
            offset: base,
            open: Vec::with_capacity(DEFAULT_TREE_DEPTH),
            slots: Vec::with_capacity(DEFAULT_TREE_SIZE),
        }
    }

    pub fn with_cache(base: TextSize, cache: &'c mut dyn NodeCache) -> Self {
        let mut builder = Self::new(base);
        builder.cache = Some(cache);
        builder
    }

    /// Absolute offset of the next token.
    pub fn offset(&self) -> TextSize {
        self.offset
    }

    pub fn start_node(&mut self, kind: SyntaxKind) {
        self.open.push(OpenNode {
            kind,
            first_slot: self.slots.len(),
            start: self.offset,
            diagnostics: Vec::new(),
        });
    }

    pub fn finish_node(&mut self) {
        let OpenNode { kind, first_slot, start, diagnostics } =
            self.open.pop().expect("no opened nodes?");
        let slots = self.slots.split_off(first_slot);
        let diagnostics = diagnostics.iter().map(|d| d.relative_to(start)).collect::<Vec<_>>();

        let reused = self.cache.as_mut().and_then(|cache| cache.node(start, kind, &slots, &diagnostics));
        let node = reused.unwrap_or_else(|| GreenNode::new(kind, slots, diagnostics));
        self.slots.push(NodeOrToken::Node(node));
    }

    /// Adds a token whose full text is `text`. `diagnostics` carry absolute
    /// ranges.
    pub fn token(
        &mut self,
        kind: SyntaxKind,
        text: &str,
        leading_len: TextSize,
        trailing_len: TextSize,
        flags: TokenFlags,
        diagnostics: &[Diagnostic],
    ) {
        let start = self.offset;
        let diagnostics = diagnostics.iter().map(|d| clamp(d, start).relative_to(start)).collect();
        let token = GreenToken::new(
            kind,
            self.interner.add(text),
            leading_len,
            trailing_len,
            flags,
            diagnostics,
        );
        self.push_token(token);
    }

    /// Adds a zero-width placeholder for a token the source lacks.
    pub fn missing(&mut self, kind: SyntaxKind) {
        self.push_token(GreenToken::missing(kind));
    }

    /// Attaches an error to the innermost open node.
    pub fn error(&mut self, message: impl Into<String>, range: TextRange) {
        let node = self.open.last_mut().expect("errors must be reported inside a node");
        let diagnostic = Diagnostic::error(message, range);
        node.diagnostics.push(clamp(&diagnostic, node.start));
    }

    fn push_token(&mut self, token: GreenToken) {
        let token = match self.cache.as_mut() {
            Some(cache) => cache.token(self.offset, &token).unwrap_or(token),
            None => token,
        };
        self.offset += token.width();
        self.slots.push(NodeOrToken::Token(token));
    }

    /// Returns the single root node built so far.
    pub fn finish(mut self) -> GreenNode {
        assert!(self.open.is_empty(), "unfinished nodes at the end of the build");
        assert_eq!(self.slots.len(), 1, "expected exactly one root element");
        match self.slots.pop() {
            Some(NodeOrToken::Node(root)) => root,
            _ => panic!("the root element must be a node"),
        }
    }
}

/// Moves a diagnostic that starts before `origin` to `origin`.
fn clamp(diagnostic: &Diagnostic, origin: TextSize) -> Diagnostic {
    let range = diagnostic.range();
    if range.start() >= origin {
        return diagnostic.clone();
    }
    let end = range.end().max(origin);
    Diagnostic::error(diagnostic.message(), TextRange::new(origin, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn builds_nested_nodes() {
        let mut builder = GreenBuilder::new(TextSize::new(0));
        builder.start_node(SyntaxKind::ELEMENT);
        builder.token(SyntaxKind::LESS_THAN, "<", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        builder.token(SyntaxKind::IDENTIFIER, "br ", 0.into(), 1.into(), TokenFlags::empty(), &[]);
        builder.start_node(SyntaxKind::ATTRIBUTE_LIST);
        builder.finish_node();
        builder.missing(SyntaxKind::SLASH_GREATER_THAN);
        builder.error("expected `/>`", range(4, 4));
        builder.finish_node();
        let root = builder.finish();

        assert_eq!(root.kind(), SyntaxKind::ELEMENT);
        assert_eq!(root.text(), "<br ");
        assert_eq!(root.slots().len(), 4);
        assert_eq!(root.slots()[2].width(), TextSize::new(0));
        assert_eq!(root.diagnostics(), [Diagnostic::error("expected `/>`", range(4, 4))]);
    }

    #[test]
    fn diagnostics_are_relative_to_their_owner() {
        let mut builder = GreenBuilder::new(TextSize::new(10));
        builder.start_node(SyntaxKind::CONTENT);
        builder.token(SyntaxKind::TEXT, "ab", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        let unterminated = Diagnostic::error("unterminated comment", range(13, 15));
        builder.token(
            SyntaxKind::TEXT,
            "c<!--",
            0.into(),
            4.into(),
            TokenFlags::UNTERMINATED,
            &[unterminated],
        );
        builder.error("stray text", range(12, 13));
        builder.finish_node();
        let root = builder.finish();

        assert_eq!(root.diagnostics(), [Diagnostic::error("stray text", range(2, 3))]);
        let NodeOrToken::Token(token) = &root.slots()[1] else { panic!("expected a token") };
        assert_eq!(token.diagnostics(), [Diagnostic::error("unterminated comment", range(1, 3))]);
    }

    #[test]
    fn token_text_is_interned() {
        let mut builder = GreenBuilder::new(TextSize::new(0));
        builder.start_node(SyntaxKind::CONTENT);
        builder.token(SyntaxKind::TEXT, "same", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        builder.token(SyntaxKind::TEXT, "same", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        builder.finish_node();
        let root = builder.finish();

        let [NodeOrToken::Token(a), NodeOrToken::Token(b)] = root.slots() else {
            panic!("expected two tokens")
        };
        assert!(!a.ptr_eq(b));
        assert!(std::ptr::eq(a.text().as_ptr(), b.text().as_ptr()));
    }

    struct ReuseEverything(Vec<GreenToken>);

    impl NodeCache for ReuseEverything {
        fn token(&mut self, _offset: TextSize, candidate: &GreenToken) -> Option<GreenToken> {
            self.0.iter().find(|old| *old == candidate).cloned()
        }

        fn node(
            &mut self,
            _offset: TextSize,
            _kind: SyntaxKind,
            _slots: &[GreenElement],
            _diagnostics: &[Diagnostic],
        ) -> Option<GreenNode> {
            None
        }
    }

    #[test]
    fn cache_supplies_existing_tokens() {
        let old = GreenToken::new(
            SyntaxKind::TEXT,
            "x".into(),
            0.into(),
            0.into(),
            TokenFlags::empty(),
            Vec::new(),
        );
        let mut cache = ReuseEverything(vec![old.clone()]);
        let mut builder = GreenBuilder::with_cache(TextSize::new(0), &mut cache);
        builder.start_node(SyntaxKind::CONTENT);
        builder.token(SyntaxKind::TEXT, "x", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        builder.token(SyntaxKind::TEXT, "y", 0.into(), 0.into(), TokenFlags::empty(), &[]);
        builder.finish_node();
        let root = builder.finish();

        let NodeOrToken::Token(first) = &root.slots()[0] else { panic!("expected a token") };
        assert!(first.ptr_eq(&old));
        assert_eq!(root.text(), "xy");
    }
}
