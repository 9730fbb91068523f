//! Trivia pieces derived from token text.
//!
//! Tokens only record how much of their text is leading and trailing trivia.
//! The pieces are recovered on demand by [`lex_trivia`] and memoized per green
//! token in a [`TriviaCache`].

use std::cell::RefCell;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use text_size::{TextRange, TextSize};

use crate::green::{GreenId, GreenToken};

pub(crate) const COMMENT_START: &str = "<!--";
pub(crate) const COMMENT_END: &str = "-->";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TriviaPieceKind {
    Whitespace,
    Newline,
    CommentStart,
    Comment,
    CommentEnd,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TriviaPiece {
    pub kind: TriviaPieceKind,
    pub len: TextSize,
}

impl TriviaPiece {
    pub fn new(kind: TriviaPieceKind, len: TextSize) -> Self {
        Self { kind, len }
    }
}

/// Splits trivia text into pieces.
///
/// Trailing trivia holds at most one newline, and only as its final piece.
pub fn lex_trivia(text: &str, is_trailing: bool) -> Vec<TriviaPiece> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let (kind, len) = if let Some(body) = rest.strip_prefix(COMMENT_START) {
            pieces.push(TriviaPiece::new(TriviaPieceKind::CommentStart, TextSize::of(COMMENT_START)));
            let (value_len, closed) = match body.find(COMMENT_END) {
                Some(end) => (end, true),
                None => (body.len(), false),
            };
            if value_len > 0 {
                pieces.push(TriviaPiece::new(TriviaPieceKind::Comment, len_of(value_len)));
            }
            rest = &body[value_len..];
            if !closed {
                continue;
            }
            (TriviaPieceKind::CommentEnd, COMMENT_END.len())
        } else if rest.starts_with("\r\n") {
            (TriviaPieceKind::Newline, 2)
        } else if rest.starts_with(['\n', '\r']) {
            (TriviaPieceKind::Newline, 1)
        } else {
            (TriviaPieceKind::Whitespace, whitespace_len(rest))
        };

        pieces.push(TriviaPiece::new(kind, len_of(len)));
        rest = &rest[len..];
    }

    debug_assert!(
        !is_trailing
            || pieces
                .iter()
                .rev()
                .skip(1)
                .all(|piece| piece.kind != TriviaPieceKind::Newline),
        "trailing trivia continues past a newline: {text:?}"
    );
    pieces
}

/// Length of the run before the next newline or comment, at least one char.
fn whitespace_len(text: &str) -> usize {
    text.char_indices()
        .skip(1)
        .find(|&(index, ch)| matches!(ch, '\n' | '\r') || text[index..].starts_with(COMMENT_START))
        .map_or(text.len(), |(index, _)| index)
}

fn len_of(len: usize) -> TextSize {
    TextSize::new(len as u32)
}

/// A single non-comment trivia piece with its absolute range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TriviaToken {
    pub kind: TriviaPieceKind,
    pub range: TextRange,
}

/// A `<!-- ... -->` comment. `end` is `None` when the comment runs to the end
/// of input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct XmlComment {
    pub start: TextRange,
    pub value: Option<TextRange>,
    pub end: Option<TextRange>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trivia {
    Token(TriviaToken),
    Comment(XmlComment),
}

impl Trivia {
    pub fn range(&self) -> TextRange {
        match self {
            Self::Token(token) => token.range,
            Self::Comment(comment) => {
                let end = comment.end.or(comment.value).unwrap_or(comment.start);
                comment.start.cover(end)
            }
        }
    }
}

/// Groups `pieces` that start at `offset` into whitespace, newlines and whole
/// comments.
pub fn group_trivia(offset: TextSize, pieces: &[TriviaPiece]) -> Vec<Trivia> {
    let mut trivia = Vec::with_capacity(pieces.len());
    let mut offset = offset;

    for piece in pieces {
        let range = TextRange::at(offset, piece.len);
        offset += piece.len;

        match piece.kind {
            TriviaPieceKind::CommentStart => {
                trivia.push(Trivia::Comment(XmlComment { start: range, value: None, end: None }));
            }
            TriviaPieceKind::Comment => {
                if let Some(Trivia::Comment(comment)) = trivia.last_mut() {
                    comment.value = Some(range);
                }
            }
            TriviaPieceKind::CommentEnd => {
                if let Some(Trivia::Comment(comment)) = trivia.last_mut() {
                    comment.end = Some(range);
                }
            }
            kind => trivia.push(Trivia::Token(TriviaToken { kind, range })),
        }
    }

    trivia
}

type CacheKey = (GreenId, bool);

/// Memoized trivia pieces keyed by green token identity.
///
/// Each entry keeps its token alive so that an identity is never reused while
/// it is still cached.
#[derive(Clone, Default)]
pub struct TriviaCache {
    entries: RefCell<FxHashMap<CacheKey, (GreenToken, Arc<[TriviaPiece]>)>>,
}

impl TriviaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pieces(&self, token: &GreenToken, is_trailing: bool) -> Arc<[TriviaPiece]> {
        let key = (token.id(), is_trailing);
        if let Some((_, pieces)) = self.entries.borrow().get(&key) {
            return Arc::clone(pieces);
        }

        let text = if is_trailing { token.trailing_text() } else { token.leading_text() };
        let pieces: Arc<[TriviaPiece]> = lex_trivia(text, is_trailing).into();
        self.entries.borrow_mut().insert(key, (token.clone(), Arc::clone(&pieces)));
        pieces
    }

    pub fn contains(&self, token: &GreenToken, is_trailing: bool) -> bool {
        self.entries.borrow().contains_key(&(token.id(), is_trailing))
    }

    /// Copies the entries `other` holds for `token` into this cache.
    pub fn carry_over(&self, other: &Self, token: &GreenToken) {
        let other = other.entries.borrow();
        let mut entries = self.entries.borrow_mut();
        for is_trailing in [false, true] {
            let key = (token.id(), is_trailing);
            if let Some(entry) = other.get(&key) {
                entries.entry(key).or_insert_with(|| entry.clone());
            }
        }
    }

    /// Drops the entries of every token `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(GreenId) -> bool) {
        self.entries.get_mut().retain(|&(id, _), _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for TriviaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriviaCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::TriviaPieceKind::*;
    use super::*;
    use crate::{SyntaxKind, TokenFlags};

    fn kinds(text: &str, is_trailing: bool) -> Vec<(TriviaPieceKind, u32)> {
        lex_trivia(text, is_trailing).iter().map(|piece| (piece.kind, piece.len.into())).collect()
    }

    #[test]
    fn whitespace_and_newlines() {
        assert_eq!(kinds("  \t\r\n\n ", false), [
            (Whitespace, 3),
            (Newline, 2),
            (Newline, 1),
            (Whitespace, 1)
        ]);
        assert_eq!(kinds(" \n", true), [(Whitespace, 1), (Newline, 1)]);
        assert!(kinds("", true).is_empty());
    }

    #[test]
    fn comments() {
        assert_eq!(kinds(" <!-- hi -->\n", false), [
            (Whitespace, 1),
            (CommentStart, 4),
            (Comment, 4),
            (CommentEnd, 3),
            (Newline, 1)
        ]);
        assert_eq!(kinds("<!---->", false), [(CommentStart, 4), (CommentEnd, 3)]);
        assert_eq!(kinds("<!-- open", false), [(CommentStart, 4), (Comment, 5)]);
    }

    #[test]
    fn grouping_uses_absolute_ranges() {
        let pieces = lex_trivia(" <!--x--> <!--y", false);
        let trivia = group_trivia(TextSize::new(10), &pieces);

        let range = |start: u32, end: u32| TextRange::new(start.into(), end.into());
        assert_eq!(trivia, [
            Trivia::Token(TriviaToken { kind: Whitespace, range: range(10, 11) }),
            Trivia::Comment(XmlComment {
                start: range(11, 15),
                value: Some(range(15, 16)),
                end: Some(range(16, 19)),
            }),
            Trivia::Token(TriviaToken { kind: Whitespace, range: range(19, 20) }),
            Trivia::Comment(XmlComment { start: range(20, 24), value: Some(range(24, 25)), end: None }),
        ]);
        assert_eq!(trivia[1].range(), range(11, 19));
        assert_eq!(trivia[3].range(), range(20, 25));
    }

    #[test]
    fn cache_is_keyed_by_identity() {
        let token = GreenToken::new(
            SyntaxKind::LESS_THAN,
            " <".into(),
            1.into(),
            0.into(),
            TokenFlags::empty(),
            Vec::new(),
        );
        let cache = TriviaCache::new();

        let first = cache.pieces(&token, false);
        let second = cache.pieces(&token, false);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains(&token, false));
        assert!(!cache.contains(&token, true));

        let next = TriviaCache::new();
        next.carry_over(&cache, &token);
        assert!(Arc::ptr_eq(&next.pieces(&token, false), &first));
        assert_eq!(next.len(), 1);
    }
}
