//! Lossless syntax tree for CX markup.
//!
//! Green elements are immutable, position-free and shared between trees. A
//! [`SyntaxTree`] lays them out in an arena with parent links and lazily
//! computed positions, and can splice new green subtrees in place.

mod builder;
mod green;
mod syntax;
mod syntax_kind;
mod syntax_set;
mod tree;
mod trivia;

pub use builder::{GreenBuilder, NodeCache};
pub use green::{GreenElement, GreenId, GreenNode, GreenToken, TokenFlags};
pub use syntax::{NodeOrToken, SyntaxElement, SyntaxNode, SyntaxToken};
pub use syntax_kind::SyntaxKind;
pub use syntax_set::SyntaxSet;
pub use tree::{ElementId, SyntaxTree};
pub use trivia::{
    Trivia, TriviaCache, TriviaPiece, TriviaPieceKind, TriviaToken, XmlComment, group_trivia,
    lex_trivia,
};
