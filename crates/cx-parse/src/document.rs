use std::fmt::Write as _;

use cx_errors::{CancellationToken, Cancelled, Diagnostic};
use cx_tokenizer::{Interpolations, Mode, SourceReader};
use cx_yellow::{
    ElementId, GreenBuilder, GreenNode, NodeCache, SyntaxElement, SyntaxKind, SyntaxNode,
    SyntaxToken, SyntaxTree,
};
use text_size::TextSize;

use crate::grammar;
use crate::parser::Parser;

/// A parsed CX document: the source, its interpolation holes and the
/// lossless tree over them.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    interpolations: Interpolations,
    wrapping_quote_count: u32,
    tree: SyntaxTree,
    tokens: Vec<ElementId>,
    interpolation_tokens: Vec<Option<ElementId>>,
}

impl Document {
    /// Parses all of the reader's text, whatever its position.
    pub fn parse(reader: SourceReader<'_>, cancel: &CancellationToken) -> Result<Self, Cancelled> {
        Cancelled::catch(|| {
            let _span = tracing::debug_span!(
                "parse",
                len = reader.text().len(),
                interpolations = reader.interpolations().len()
            )
            .entered();

            let root = parse_green(reader.clone(), cancel, None);
            Self::new(&reader, SyntaxTree::new(root))
        })
    }

    pub(crate) fn new(reader: &SourceReader<'_>, tree: SyntaxTree) -> Self {
        let interpolations = reader.interpolations().clone();
        let mut tokens = Vec::new();
        let mut interpolation_tokens = vec![None; interpolations.len()];

        for id in tree.tokens(tree.root_id()) {
            if tree.kind(id) == SyntaxKind::INTERPOLATION {
                if let Some(index) = interpolations.index_at(tree.range(id).start()) {
                    interpolation_tokens[index] = Some(id);
                }
            }
            tokens.push(id);
        }

        let document = Self {
            text: reader.text().to_owned(),
            interpolations,
            wrapping_quote_count: reader.wrapping_quote_count(),
            tree,
            tokens,
            interpolation_tokens,
        };
        tracing::trace!(tokens = document.tokens.len(), "document built");
        document
    }

    /// A reader over this document's text and configuration.
    pub fn reader(&self) -> SourceReader<'_> {
        SourceReader::new(&self.text)
            .with_interpolations(self.interpolations.clone())
            .with_wrapping_quote_count(self.wrapping_quote_count)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn root(&self) -> SyntaxNode<'_> {
        self.tree.root()
    }

    /// Top-level text, interpolations and elements.
    pub fn root_nodes(&self) -> Vec<SyntaxElement<'_>> {
        self.root()
            .children()
            .find(|node| node.kind() == SyntaxKind::CONTENT)
            .map(|content| content.slots().collect())
            .unwrap_or_default()
    }

    /// Every token in source order, missing ones included.
    pub fn tokens(&self) -> impl Iterator<Item = SyntaxToken<'_>> + '_ {
        self.tokens.iter().filter_map(|&id| self.tree.token(id))
    }

    pub fn interpolations(&self) -> &Interpolations {
        &self.interpolations
    }

    pub fn wrapping_quote_count(&self) -> u32 {
        self.wrapping_quote_count
    }

    /// The token lexed for hole `index`.
    pub fn interpolation_token(&self, index: usize) -> Option<SyntaxToken<'_>> {
        self.tree.token(self.interpolation_tokens.get(index).copied()??)
    }

    pub fn interpolation_tokens(&self) -> impl Iterator<Item = (usize, SyntaxToken<'_>)> + '_ {
        self.interpolation_tokens
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| Some((index, self.tree.token(id?)?)))
    }

    /// The hole `token` was lexed from.
    pub fn interpolation_index(&self, token: SyntaxToken<'_>) -> Option<usize> {
        if token.kind() != SyntaxKind::INTERPOLATION {
            return None;
        }
        let index = self.interpolations.index_at(token.range().start())?;
        (self.interpolation_tokens[index] == Some(token.id())).then_some(index)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.root().diagnostics()
    }

    /// The tree dump followed by one line per diagnostic.
    pub fn debug_tree(&self) -> String {
        let mut out = self.root().debug_dump();
        for diagnostic in self.diagnostics() {
            _ = writeln!(out, "error {:?}: {}", diagnostic.range(), diagnostic.message());
        }
        out
    }
}

/// Parses the whole text of `reader` into a `DOCUMENT` node.
pub(crate) fn parse_green(
    mut reader: SourceReader<'_>,
    cancel: &CancellationToken,
    cache: Option<&mut dyn NodeCache>,
) -> GreenNode {
    reader.set_position(TextSize::new(0));
    let mut parser = Parser::new(reader, cancel, Mode::ElementValue);
    grammar::document(&mut parser);

    let builder = match cache {
        Some(cache) => GreenBuilder::with_cache(TextSize::new(0), cache),
        None => GreenBuilder::new(TextSize::new(0)),
    };
    parser.build(builder)
}
