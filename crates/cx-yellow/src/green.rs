//! Position-free, immutable tree elements.
//!
//! Green elements know their kind, text and width but not where they live, so
//! the same element can appear in several trees. The address of the shared
//! allocation is the element's identity.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use cx_errors::Diagnostic;
use text_size::{TextRange, TextSize};

use crate::{NodeOrToken, SyntaxKind};

pub type GreenElement = NodeOrToken<GreenNode, GreenToken>;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TokenFlags: u8 {
        /// The token stands for a construct absent from the source.
        const MISSING = 1 << 0;
        /// The token was produced by recovery rather than read from the source.
        const SYNTHETIC = 1 << 1;
        /// The value contains at least one resolvable character escape.
        const HAS_ESCAPES = 1 << 2;
        /// A comment or literal ran into the end of input.
        const UNTERMINATED = 1 << 3;
    }
}

/// Stable identity of a green allocation, valid while the element is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GreenId(usize);

#[derive(Debug, PartialEq, Eq, Hash)]
struct GreenTokenData {
    kind: SyntaxKind,
    text: Arc<str>,
    leading_len: TextSize,
    trailing_len: TextSize,
    flags: TokenFlags,
    diagnostics: Box<[Diagnostic]>,
}

/// A token with its leading and trailing trivia. Equality is structural; use
/// [`GreenToken::id`] for identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GreenToken(triomphe::Arc<GreenTokenData>);

impl GreenToken {
    /// Creates a token. `diagnostics` are relative to the start of `text`.
    pub fn new(
        kind: SyntaxKind,
        text: Arc<str>,
        leading_len: TextSize,
        trailing_len: TextSize,
        flags: TokenFlags,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        debug_assert!(kind.is_token(), "{kind:?} is not a token kind");
        assert!(
            usize::from(leading_len + trailing_len) <= text.len(),
            "trivia of {kind:?} is longer than its text"
        );
        Self(triomphe::Arc::new(GreenTokenData {
            kind,
            text,
            leading_len,
            trailing_len,
            flags,
            diagnostics: diagnostics.into_boxed_slice(),
        }))
    }

    /// A zero-width placeholder for a token the source does not contain.
    pub fn missing(kind: SyntaxKind) -> Self {
        Self::new(
            kind,
            Arc::from(""),
            TextSize::new(0),
            TextSize::new(0),
            TokenFlags::MISSING | TokenFlags::SYNTHETIC,
            Vec::new(),
        )
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    /// Full text, trivia included.
    pub fn text(&self) -> &str {
        &self.0.text
    }

    /// Text without leading and trailing trivia.
    pub fn value(&self) -> &str {
        &self.0.text[self.value_range()]
    }

    /// Range of the value inside [`GreenToken::text`].
    pub fn value_range(&self) -> TextRange {
        TextRange::new(self.0.leading_len, self.width() - self.0.trailing_len)
    }

    pub fn leading_text(&self) -> &str {
        &self.0.text[..usize::from(self.0.leading_len)]
    }

    pub fn trailing_text(&self) -> &str {
        &self.0.text[usize::from(self.width() - self.0.trailing_len)..]
    }

    pub fn leading_len(&self) -> TextSize {
        self.0.leading_len
    }

    pub fn trailing_len(&self) -> TextSize {
        self.0.trailing_len
    }

    pub fn width(&self) -> TextSize {
        TextSize::of(&*self.0.text)
    }

    pub fn flags(&self) -> TokenFlags {
        self.0.flags
    }

    pub fn is_missing(&self) -> bool {
        self.0.flags.contains(TokenFlags::MISSING)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0.diagnostics
    }

    pub fn id(&self) -> GreenId {
        GreenId(triomphe::Arc::as_ptr(&self.0) as usize)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        triomphe::Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for GreenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.kind(), self.text())?;
        if !self.flags().is_empty() {
            write!(f, " {:?}", self.flags())?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct GreenNodeData {
    kind: SyntaxKind,
    width: TextSize,
    slots: Box<[GreenElement]>,
    diagnostics: Box<[Diagnostic]>,
}

/// An interior node. The width is the sum of the slot widths, computed once.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GreenNode(triomphe::Arc<GreenNodeData>);

impl GreenNode {
    /// Creates a node. `diagnostics` are relative to the start of the node.
    pub fn new(kind: SyntaxKind, slots: Vec<GreenElement>, diagnostics: Vec<Diagnostic>) -> Self {
        debug_assert!(kind.is_node(), "{kind:?} is not a node kind");
        let width = slots.iter().map(GreenElement::width).sum();
        Self(triomphe::Arc::new(GreenNodeData {
            kind,
            width,
            slots: slots.into_boxed_slice(),
            diagnostics: diagnostics.into_boxed_slice(),
        }))
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    pub fn width(&self) -> TextSize {
        self.0.width
    }

    pub fn slots(&self) -> &[GreenElement] {
        &self.0.slots
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0.diagnostics
    }

    pub fn id(&self) -> GreenId {
        GreenId(triomphe::Arc::as_ptr(&self.0) as usize)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        triomphe::Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a copy of this node with slot `index` replaced. Every other
    /// slot is shared with `self`.
    ///
    /// Diagnostics at or past the end of the old slot move by the change in
    /// width, so they keep pointing at the same text.
    pub fn with_slot(&self, index: usize, element: GreenElement) -> Self {
        let old_width = self.0.slots[index].width();
        let new_width = element.width();
        let slot_end: TextSize = self.0.slots[..=index].iter().map(GreenElement::width).sum();
        let moved = |offset: TextSize| {
            if offset >= slot_end { offset - old_width + new_width } else { offset }
        };
        let diagnostics = self
            .diagnostics()
            .iter()
            .map(|diagnostic| {
                let range = diagnostic.range();
                let start = moved(range.start());
                let end = moved(range.end()).max(start);
                Diagnostic::error(diagnostic.message(), TextRange::new(start, end))
            })
            .collect();

        let mut slots = self.0.slots.to_vec();
        slots[index] = element;
        Self::new(self.kind(), slots, diagnostics)
    }

    /// Concatenated full text of every token below this node.
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.width().into());
        let mut stack: Vec<&GreenElement> = self.slots().iter().rev().collect();
        while let Some(element) = stack.pop() {
            match element {
                NodeOrToken::Token(token) => text.push_str(token.text()),
                NodeOrToken::Node(node) => stack.extend(node.slots().iter().rev()),
            }
        }
        text
    }
}

impl fmt::Debug for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenNode")
            .field("kind", &self.kind())
            .field("width", &self.width())
            .field("slots", &self.slots().len())
            .finish_non_exhaustive()
    }
}

impl GreenElement {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            NodeOrToken::Node(node) => node.kind(),
            NodeOrToken::Token(token) => token.kind(),
        }
    }

    pub fn width(&self) -> TextSize {
        match self {
            NodeOrToken::Node(node) => node.width(),
            NodeOrToken::Token(token) => token.width(),
        }
    }

    pub fn id(&self) -> GreenId {
        match self {
            NodeOrToken::Node(node) => node.id(),
            NodeOrToken::Token(token) => token.id(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            NodeOrToken::Node(node) => node.diagnostics(),
            NodeOrToken::Token(token) => token.diagnostics(),
        }
    }

    pub fn text(&self) -> String {
        match self {
            NodeOrToken::Node(node) => node.text(),
            NodeOrToken::Token(token) => token.text().to_owned(),
        }
    }
}

impl From<GreenNode> for GreenElement {
    fn from(node: GreenNode) -> Self {
        Self::Node(node)
    }
}

impl From<GreenToken> for GreenElement {
    fn from(token: GreenToken) -> Self {
        Self::Token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: SyntaxKind, text: &str, leading: u32, trailing: u32) -> GreenToken {
        GreenToken::new(
            kind,
            text.into(),
            leading.into(),
            trailing.into(),
            TokenFlags::empty(),
            Vec::new(),
        )
    }

    #[test]
    fn token_text() {
        let token = token(SyntaxKind::IDENTIFIER, "\n\t div \t", 3, 2);

        assert_eq!(token.text(), "\n\t div \t");
        assert_eq!(token.value(), "div");
        assert_eq!(token.leading_text(), "\n\t ");
        assert_eq!(token.trailing_text(), " \t");
        assert_eq!(token.width(), TextSize::new(8));
    }

    #[test]
    fn missing_tokens_are_empty() {
        let token = GreenToken::missing(SyntaxKind::GREATER_THAN);

        assert!(token.is_missing());
        assert!(token.flags().contains(TokenFlags::SYNTHETIC));
        assert_eq!(token.width(), TextSize::new(0));
        assert_eq!(token.value(), "");
    }

    #[test]
    fn node_width_and_text() {
        let name = token(SyntaxKind::IDENTIFIER, "b ", 0, 1);
        let node = GreenNode::new(
            SyntaxKind::ELEMENT,
            vec![
                token(SyntaxKind::LESS_THAN, "<", 0, 0).into(),
                GreenNode::new(SyntaxKind::ATTRIBUTE_LIST, vec![name.into()], Vec::new()).into(),
                token(SyntaxKind::SLASH_GREATER_THAN, "/>", 0, 0).into(),
            ],
            Vec::new(),
        );

        assert_eq!(node.width(), TextSize::new(5));
        assert_eq!(node.text(), "<b />");
    }

    #[test]
    fn identity_is_per_allocation() {
        let a = token(SyntaxKind::TEXT, "hello", 0, 0);
        let b = token(SyntaxKind::TEXT, "hello", 0, 0);

        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn with_slot_shares_untouched_slots() {
        let first = token(SyntaxKind::TEXT, "a", 0, 0);
        let node = GreenNode::new(
            SyntaxKind::CONTENT,
            vec![first.clone().into(), token(SyntaxKind::TEXT, "b", 0, 0).into()],
            Vec::new(),
        );

        let replaced = node.with_slot(1, token(SyntaxKind::TEXT, "cd", 0, 0).into());

        assert_eq!(replaced.text(), "acd");
        assert_eq!(replaced.width(), TextSize::new(3));
        assert!(matches!(&replaced.slots()[0], NodeOrToken::Token(t) if t.ptr_eq(&first)));
        assert_eq!(node.text(), "ab");
    }

    #[test]
    fn with_slot_moves_later_diagnostics() {
        let range = |start: u32, end: u32| TextRange::new(start.into(), end.into());
        let node = GreenNode::new(
            SyntaxKind::ELEMENT,
            vec![
                token(SyntaxKind::LESS_THAN, "<", 0, 0).into(),
                token(SyntaxKind::TEXT, "xyyyy", 0, 0).into(),
                token(SyntaxKind::GREATER_THAN, ">", 0, 0).into(),
            ],
            vec![
                Diagnostic::error("before", range(0, 1)),
                Diagnostic::error("after", range(6, 7)),
                Diagnostic::error("at the end", range(7, 7)),
            ],
        );

        let shrunk = node.with_slot(1, token(SyntaxKind::TEXT, "x", 0, 0).into());
        assert_eq!(
            shrunk.diagnostics(),
            [
                Diagnostic::error("before", range(0, 1)),
                Diagnostic::error("after", range(2, 3)),
                Diagnostic::error("at the end", range(3, 3)),
            ]
        );

        let grown = shrunk.with_slot(1, token(SyntaxKind::TEXT, "xyyyy", 0, 0).into());
        assert_eq!(grown.diagnostics(), node.diagnostics());
    }
}
