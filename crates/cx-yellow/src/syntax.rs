//! Borrowed handles into a [`SyntaxTree`].

use std::fmt;

use cx_errors::Diagnostic;
use text_size::{TextRange, TextSize};

use crate::trivia::group_trivia;
use crate::{
    ElementId, GreenElement, GreenNode, GreenToken, SyntaxKind, SyntaxTree, TokenFlags, Trivia,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOrToken<N, T> {
    Node(N),
    Token(T),
}

impl<N, T> NodeOrToken<N, T> {
    pub fn into_node(self) -> Option<N> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn into_token(self) -> Option<T> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&T> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }
}

pub type SyntaxElement<'a> = NodeOrToken<SyntaxNode<'a>, SyntaxToken<'a>>;

impl<'a> SyntaxElement<'a> {
    pub fn id(self) -> ElementId {
        match self {
            Self::Node(node) => node.id,
            Self::Token(token) => token.id,
        }
    }

    pub fn kind(self) -> SyntaxKind {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    pub fn full_range(self) -> TextRange {
        match self {
            Self::Node(node) => node.full_range(),
            Self::Token(token) => token.full_range(),
        }
    }

    pub fn range(self) -> TextRange {
        match self {
            Self::Node(node) => node.range(),
            Self::Token(token) => token.range(),
        }
    }

    pub fn parent(self) -> Option<SyntaxNode<'a>> {
        match self {
            Self::Node(node) => node.parent(),
            Self::Token(token) => Some(token.parent()),
        }
    }
}

impl SyntaxTree {
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, id: self.root_id() }
    }

    pub fn element(&self, id: ElementId) -> SyntaxElement<'_> {
        if self.kind(id).is_token() {
            NodeOrToken::Token(SyntaxToken { tree: self, id })
        } else {
            NodeOrToken::Node(SyntaxNode { tree: self, id })
        }
    }

    pub fn node(&self, id: ElementId) -> Option<SyntaxNode<'_>> {
        self.element(id).into_node()
    }

    pub fn token(&self, id: ElementId) -> Option<SyntaxToken<'_>> {
        self.element(id).into_token()
    }
}

/// Node handle tied to the lifetime of the tree.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'a> {
    tree: &'a SyntaxTree,
    id: ElementId,
}

impl<'a> SyntaxNode<'a> {
    #[inline]
    pub fn id(self) -> ElementId {
        self.id
    }

    #[inline]
    pub fn tree(self) -> &'a SyntaxTree {
        self.tree
    }

    #[inline]
    pub fn kind(self) -> SyntaxKind {
        self.tree.kind(self.id)
    }

    pub fn green(self) -> &'a GreenNode {
        match self.tree.green(self.id) {
            GreenElement::Node(node) => node,
            GreenElement::Token(_) => unreachable!("node handle over a token"),
        }
    }

    pub fn offset(self) -> TextSize {
        self.tree.offset(self.id)
    }

    pub fn width(self) -> TextSize {
        self.tree.width(self.id)
    }

    pub fn full_range(self) -> TextRange {
        self.tree.full_range(self.id)
    }

    pub fn range(self) -> TextRange {
        self.tree.range(self.id)
    }

    pub fn slots(self) -> impl DoubleEndedIterator<Item = SyntaxElement<'a>> + ExactSizeIterator {
        let tree = self.tree;
        tree.slots(self.id).iter().map(move |&id| tree.element(id))
    }

    pub fn slot(self, index: usize) -> Option<SyntaxElement<'a>> {
        self.tree.slot(self.id, index).map(|id| self.tree.element(id))
    }

    /// Child nodes, skipping tokens.
    pub fn children(self) -> impl Iterator<Item = SyntaxNode<'a>> {
        self.slots().filter_map(NodeOrToken::into_node)
    }

    pub fn child_tokens(self) -> impl Iterator<Item = SyntaxToken<'a>> {
        self.slots().filter_map(NodeOrToken::into_token)
    }

    pub fn parent(self) -> Option<SyntaxNode<'a>> {
        let parent = self.tree.parent(self.id)?;
        Some(SyntaxNode { tree: self.tree, id: parent })
    }

    /// This node followed by its ancestors.
    pub fn ancestors(self) -> impl Iterator<Item = SyntaxNode<'a>> {
        std::iter::successors(Some(self), |node| node.parent())
    }

    pub fn first_terminal(self) -> Option<SyntaxToken<'a>> {
        let id = self.tree.first_terminal(self.id)?;
        Some(SyntaxToken { tree: self.tree, id })
    }

    pub fn last_terminal(self) -> Option<SyntaxToken<'a>> {
        let id = self.tree.last_terminal(self.id)?;
        Some(SyntaxToken { tree: self.tree, id })
    }

    pub fn descendants(self) -> impl Iterator<Item = SyntaxElement<'a>> {
        let tree = self.tree;
        tree.descendants(self.id).iter().map(move |&id| tree.element(id))
    }

    pub fn tokens(self) -> impl Iterator<Item = SyntaxToken<'a>> {
        let tree = self.tree;
        tree.tokens(self.id).map(move |id| SyntaxToken { tree, id })
    }

    /// This node and everything below it, in source order.
    pub fn flat_graph(self) -> Vec<SyntaxElement<'a>> {
        self.tree.flat_graph(self.id).into_iter().map(|id| self.tree.element(id)).collect()
    }

    pub fn find_owning_node(self, range: TextRange) -> SyntaxNode<'a> {
        SyntaxNode { tree: self.tree, id: self.tree.find_owning_node(self.id, range) }
    }

    pub fn text(self) -> String {
        self.tree.text(self.id)
    }

    pub fn diagnostics(self) -> Vec<Diagnostic> {
        self.tree.diagnostics(self.id)
    }

    pub fn leading_trivia(self) -> Vec<Trivia> {
        self.first_terminal().map(SyntaxToken::leading_trivia).unwrap_or_default()
    }

    pub fn trailing_trivia(self) -> Vec<Trivia> {
        self.last_terminal().map(SyntaxToken::trailing_trivia).unwrap_or_default()
    }

    pub fn debug_dump(self) -> String {
        self.tree.debug_dump(self.id)
    }
}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?}", self.kind(), self.full_range())
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxNode<'_> {}

/// Token handle tied to the lifetime of the tree.
#[derive(Clone, Copy)]
pub struct SyntaxToken<'a> {
    tree: &'a SyntaxTree,
    id: ElementId,
}

impl<'a> SyntaxToken<'a> {
    #[inline]
    pub fn id(self) -> ElementId {
        self.id
    }

    #[inline]
    pub fn kind(self) -> SyntaxKind {
        self.tree.kind(self.id)
    }

    pub fn green(self) -> &'a GreenToken {
        match self.tree.green(self.id) {
            GreenElement::Token(token) => token,
            GreenElement::Node(_) => unreachable!("token handle over a node"),
        }
    }

    pub fn offset(self) -> TextSize {
        self.tree.offset(self.id)
    }

    pub fn width(self) -> TextSize {
        self.tree.width(self.id)
    }

    pub fn full_range(self) -> TextRange {
        self.tree.full_range(self.id)
    }

    pub fn range(self) -> TextRange {
        self.tree.range(self.id)
    }

    /// Text including trivia.
    pub fn text(self) -> &'a str {
        self.green().text()
    }

    /// Text without trivia.
    pub fn value(self) -> &'a str {
        self.green().value()
    }

    pub fn flags(self) -> TokenFlags {
        self.green().flags()
    }

    pub fn is_missing(self) -> bool {
        self.green().is_missing()
    }

    pub fn parent(self) -> SyntaxNode<'a> {
        let parent = self.tree.parent(self.id).expect("tokens always have a parent");
        SyntaxNode { tree: self.tree, id: parent }
    }

    pub fn ancestors(self) -> impl Iterator<Item = SyntaxNode<'a>> {
        self.parent().ancestors()
    }

    pub fn leading_trivia(self) -> Vec<Trivia> {
        let pieces = self.tree.trivia_cache().pieces(self.green(), false);
        group_trivia(self.offset(), &pieces)
    }

    pub fn trailing_trivia(self) -> Vec<Trivia> {
        let pieces = self.tree.trivia_cache().pieces(self.green(), true);
        group_trivia(self.range().end(), &pieces)
    }

    pub fn diagnostics(self) -> Vec<Diagnostic> {
        self.tree.diagnostics(self.id)
    }
}

impl fmt::Debug for SyntaxToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?} {:?}", self.kind(), self.full_range(), self.text())
    }
}

impl PartialEq for SyntaxToken<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxToken<'_> {}
