//! Reparsing after edits while sharing unaffected green elements with the
//! previous tree.

use cx_errors::{CancellationToken, Cancelled, Diagnostic, check_cancelled};
use cx_span::{TextChange, TextChangeRange, intersects};
use cx_tokenizer::{Mode, SourceReader};
use cx_yellow::SyntaxKind::*;
use cx_yellow::{
    ElementId, GreenBuilder, GreenElement, GreenId, GreenNode, GreenToken, NodeCache, NodeOrToken,
    SyntaxKind, SyntaxTree,
};
use rustc_hash::{FxHashMap, FxHashSet};
use text_size::{TextRange, TextSize};

use crate::Document;
use crate::document::parse_green;
use crate::grammar;
use crate::parser::Parser;

/// What an incremental reparse kept and what it threw away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReuseReport {
    /// Elements of the new tree shared with the old one.
    pub reused_nodes: Vec<ElementId>,
    /// Elements of the old tree absent from the new one.
    pub discarded_nodes: Vec<ElementId>,
    pub changes: Vec<TextChange>,
    pub affected_range: TextChangeRange,
    /// Region of the new text that was parsed again.
    pub reparsed_range: TextRange,
}

impl Document {
    /// Parses the edited text of `reader`, reusing what `changes` left intact.
    ///
    /// # Panics
    ///
    /// If applying `changes` to this document's text cannot yield a text of
    /// the reader's length.
    pub fn incremental_parse(
        &self,
        reader: SourceReader<'_>,
        changes: &[TextChange],
        cancel: &CancellationToken,
    ) -> Result<(Document, ReuseReport), Cancelled> {
        Cancelled::catch(|| reparse(self, reader, changes, cancel))
    }
}

fn reparse(
    old: &Document,
    reader: SourceReader<'_>,
    changes: &[TextChange],
    cancel: &CancellationToken,
) -> (Document, ReuseReport) {
    let _span = tracing::debug_span!("incremental_parse", changes = changes.len()).entered();

    let old_len = TextSize::of(old.text());
    let affected = TextChangeRange::collapse(changes)
        .unwrap_or_else(|| TextChangeRange::new(TextRange::empty(old_len), TextSize::new(0)));
    assert_eq!(
        i64::from(u32::from(reader.len())),
        i64::from(u32::from(old_len)) + affected.delta(),
        "text changes do not produce the new text"
    );

    let mut blender = Blender::new(old.tree(), affected, cancel);
    let (tree, reparsed_range, strategy) =
        match reparse_element(old, &reader, affected, cancel, &mut blender) {
            Some((tree, range)) => (tree, range, "element"),
            None => {
                let root = parse_green(reader.clone(), cancel, Some(&mut blender));
                (SyntaxTree::new(root), TextRange::up_to(reader.len()), "document")
            }
        };

    let (reused_nodes, discarded_nodes) = diff(old.tree(), &tree, cancel);
    tracing::debug!(
        strategy,
        reused = reused_nodes.len(),
        discarded = discarded_nodes.len(),
        ?reparsed_range,
        "incremental parse finished"
    );

    let report = ReuseReport {
        reused_nodes,
        discarded_nodes,
        changes: changes.to_vec(),
        affected_range: affected,
        reparsed_range,
    };
    (Document::new(&reader, tree), report)
}

/// Reparses the innermost element of a content list that strictly encloses
/// the edit and splices it into a copy of the old tree.
///
/// Gives up when the holes outside the edit moved or when the new element
/// does not end where the old one did.
fn reparse_element(
    old: &Document,
    reader: &SourceReader<'_>,
    affected: TextChangeRange,
    cancel: &CancellationToken,
    blender: &mut Blender<'_>,
) -> Option<(SyntaxTree, TextRange)> {
    let shifted = old.interpolations().shifted(affected.span, |offset| affected.map_to_new(offset));
    if shifted.as_ref() != Some(reader.interpolations()) {
        return None;
    }

    let tree = old.tree();
    let owner = tree.find_owning_node(tree.root_id(), affected.span);
    let element = std::iter::once(owner).chain(tree.ancestors(owner)).find(|&id| {
        tree.kind(id) == ELEMENT && tree.parent(id).is_some_and(|parent| tree.kind(parent) == CONTENT)
    })?;

    let old_range = tree.full_range(element);
    let expected_end = affected.map_to_new(old_range.end());

    let mut reader = reader.clone();
    reader.set_position(old_range.start());
    let mut parser = Parser::new(reader, cancel, Mode::ElementValue);
    parser.open_elements = open_elements(tree, element);
    if !parser.at(LESS_THAN) {
        return None;
    }
    grammar::element(&mut parser);
    let green = parser.build(GreenBuilder::with_cache(old_range.start(), blender));

    let new_range = TextRange::at(old_range.start(), green.width());
    if new_range.end() != expected_end {
        tracing::debug!(?new_range, ?expected_end, "reparsed element changed its extent");
        return None;
    }

    let mut tree = tree.clone();
    tree.replace(element, NodeOrToken::Node(green));
    if tree.needs_compaction() {
        tree = tree.compact();
    } else {
        tree.prune_trivia();
    }
    Some((tree, new_range))
}

/// Names of the elements whose content holds `element`, outermost first.
fn open_elements(tree: &SyntaxTree, element: ElementId) -> Vec<Option<String>> {
    let mut names = Vec::new();
    let mut child = element;
    for parent in tree.ancestors(element) {
        if tree.kind(parent) == ELEMENT && tree.kind(child) == CONTENT {
            let name = tree
                .slot(parent, 1)
                .and_then(|id| tree.token(id))
                .filter(|token| !token.is_missing())
                .map(|token| token.value().to_owned());
            names.push(name);
        }
        child = parent;
    }
    names.reverse();
    names
}

/// Reused elements of `new` and discarded elements of `old`, compared by
/// green identity.
fn diff(
    old: &SyntaxTree,
    new: &SyntaxTree,
    cancel: &CancellationToken,
) -> (Vec<ElementId>, Vec<ElementId>) {
    let identities = |tree: &SyntaxTree, graph: &[ElementId]| {
        graph
            .iter()
            .map(|&id| {
                check_cancelled(cancel);
                tree.green(id).id()
            })
            .collect::<FxHashSet<GreenId>>()
    };

    let old_graph = old.flat_graph(old.root_id());
    let new_graph = new.flat_graph(new.root_id());
    let old_ids = identities(old, &old_graph);
    let new_ids = identities(new, &new_graph);

    let mut reused = Vec::new();
    for id in new_graph {
        check_cancelled(cancel);
        let green = new.green(id);
        if old_ids.contains(&green.id()) {
            if let NodeOrToken::Token(token) = green {
                new.trivia_cache().carry_over(old.trivia_cache(), token);
            }
            reused.push(id);
        }
    }

    let discarded = old_graph
        .into_iter()
        .filter(|&id| {
            check_cancelled(cancel);
            !new_ids.contains(&old.green(id).id())
        })
        .collect();

    (reused, discarded)
}

/// Hands old green elements to the builder in place of structurally equal
/// fresh ones.
struct Blender<'a> {
    old: &'a SyntaxTree,
    affected: TextChangeRange,
    /// Old tokens read from the source, by full start and kind. Missing
    /// tokens are left out since several can share an offset.
    tokens: FxHashMap<(TextSize, SyntaxKind), ElementId>,
    /// Old parent of every old element, by green identity.
    parents: FxHashMap<GreenId, ElementId>,
    /// Old nodes without slots by offset and kind.
    empty_nodes: FxHashMap<(TextSize, SyntaxKind), ElementId>,
}

impl<'a> Blender<'a> {
    fn new(old: &'a SyntaxTree, affected: TextChangeRange, cancel: &CancellationToken) -> Self {
        let mut tokens = FxHashMap::default();
        let mut parents = FxHashMap::default();
        let mut empty_nodes = FxHashMap::default();

        for id in old.flat_graph(old.root_id()) {
            check_cancelled(cancel);
            let kind = old.kind(id);
            if let Some(parent) = old.parent(id) {
                parents.insert(old.green(id).id(), parent);
            }
            if kind.is_token() {
                if !old.green(id).as_token().is_some_and(GreenToken::is_missing) {
                    tokens.insert((old.offset(id), kind), id);
                }
            } else if old.slots(id).is_empty() {
                empty_nodes.insert((old.offset(id), kind), id);
            }
        }

        Self { old, affected, tokens, parents, empty_nodes }
    }

    /// Maps a new offset to the old text if `range` lies outside the edit.
    fn old_offset(&self, range: TextRange) -> Option<TextSize> {
        if intersects(range, self.affected.new_range()) {
            return None;
        }
        self.affected.map_to_old(range.start())
    }
}

impl NodeCache for Blender<'_> {
    fn token(&mut self, offset: TextSize, candidate: &GreenToken) -> Option<GreenToken> {
        let old_offset = self.old_offset(TextRange::at(offset, candidate.width()))?;
        let &id = self.tokens.get(&(old_offset, candidate.kind()))?;
        let old = self.old.green(id).as_token()?;
        (old == candidate).then(|| old.clone())
    }

    fn node(
        &mut self,
        offset: TextSize,
        kind: SyntaxKind,
        slots: &[GreenElement],
        diagnostics: &[Diagnostic],
    ) -> Option<GreenNode> {
        let id = match slots.first() {
            Some(first) => *self.parents.get(&first.id())?,
            None => {
                let old_offset = self.old_offset(TextRange::empty(offset))?;
                *self.empty_nodes.get(&(old_offset, kind))?
            }
        };

        let old = self.old.green(id).as_node()?;
        let same = old.kind() == kind
            && old.slots().len() == slots.len()
            && old.slots().iter().zip(slots).all(|(old, new)| old.id() == new.id())
            && old.diagnostics() == diagnostics;
        same.then(|| old.clone())
    }
}

#[cfg(test)]
mod tests {
    use cx_errors::Renderer;
    use cx_tokenizer::Interpolations;

    use super::*;

    fn parse(reader: SourceReader<'_>) -> Document {
        Document::parse(reader, &CancellationToken::new()).unwrap()
    }

    /// Replaces the first `needle` of `text`.
    fn edit(text: &str, needle: &str, replacement: &str) -> TextChange {
        let start = text.find(needle).unwrap_or_else(|| panic!("no {needle:?} in {text:?}"));
        let range = TextRange::at(TextSize::new(start as u32), TextSize::of(needle));
        TextChange::new(range, replacement)
    }

    fn reparse(old: &Document, change: TextChange) -> (Document, ReuseReport, String) {
        let text = TextChange::apply_all(old.text(), std::slice::from_ref(&change));
        let (document, report) = old
            .incremental_parse(SourceReader::new(&text), &[change], &CancellationToken::new())
            .unwrap();
        (document, report, text)
    }

    #[test]
    fn comment_before_the_edit_is_reused() {
        let old = parse(SourceReader::new("<!-- note --><a>x</a><b>yz</b>"));
        let (new, report, _) = reparse(&old, edit(old.text(), "y", "Y"));

        assert_eq!(new.text(), "<!-- note --><a>x</a><b>Yz</b>");
        assert_eq!(report.reparsed_range, TextRange::new(21.into(), 30.into()));

        let commented = new.tokens().find(|token| token.text().starts_with("<!--")).unwrap();
        assert!(report.reused_nodes.contains(&commented.id()));
        assert!(report.reused_nodes.contains(&commented.parent().id()));

        let old_text = old.tokens().find(|token| token.value() == "yz").unwrap();
        assert!(report.discarded_nodes.contains(&old_text.id()));
        assert!(!report.discarded_nodes.contains(&old.tokens().next().unwrap().id()));
    }

    #[test]
    fn matches_a_full_parse() {
        let cases = [
            ("<!-- note --><a>x</a><b>yz</b>", "y", "Y"),
            ("<a><b>text</b></a>", "text", ""),
            ("<a>x</a>", "</a>", ""),
            ("<a b=\"1\">x</a>", "1", "2\" c='3"),
            ("<a>one</a> tail", " tail", "<b/>"),
            ("<a><b>x</b></a>", "x", "</b><c>"),
            ("<a>\n  <b/>\n</a>", "b", "bee"),
            ("<p>&amp; text</p>", "&amp;", "&lt;"),
            ("<a>x<!-- c --></a>", "c -->", ""),
            ("<a k=(<b/>)>t</a>", "b", "i"),
            ("<a></a><b></b>", "", "<c/>"),
            ("<a><b>xyyyy</b>", "yyyy", ""),
            ("<a><b>x</b>", "x", "xyyyy"),
            ("<a>\n<b>x</b>\n<c>", "x", ""),
        ];

        for (text, needle, replacement) in cases {
            let old = parse(SourceReader::new(text));
            let (new, _, new_text) = reparse(&old, edit(text, needle, replacement));
            let full = parse(SourceReader::new(&new_text));

            assert_eq!(new.debug_tree(), full.debug_tree(), "editing {needle:?} in {text:?}");
            assert_eq!(new.root().text(), new_text);
        }
    }

    #[test]
    fn diagnostics_stay_inside_the_edited_text() {
        let renderer = Renderer::plain();
        let cases = [
            ("<a><b>xyyyy</b>", "yyyy", ""),
            ("<a><b>x</b>", "x", "xyyyy"),
            ("<a><b>x</b><c d=>", "x", ""),
        ];

        for (text, needle, replacement) in cases {
            let old = parse(SourceReader::new(text));
            let (new, report, new_text) = reparse(&old, edit(text, needle, replacement));
            assert_ne!(report.reparsed_range.start(), TextSize::new(0), "{text:?}");

            let diagnostics = new.diagnostics();
            assert!(!diagnostics.is_empty(), "{text:?}");
            for diagnostic in diagnostics {
                assert!(diagnostic.range().end() <= TextSize::of(new_text.as_str()), "{text:?}");
                let rendered = diagnostic.render(&renderer, "page.cx", &new_text).to_string();
                assert!(rendered.contains(diagnostic.message()));
            }
        }
    }

    #[test]
    fn trivia_cache_follows_the_live_tokens() {
        let mut document = parse(SourceReader::new("<a>\n  <b> x </b>\n</a>\n"));

        for round in 0..50 {
            let change = if round % 2 == 0 {
                edit(document.text(), " x ", " xyz ")
            } else {
                edit(document.text(), " xyz ", " x ")
            };
            let (new, report, _) = reparse(&document, change);
            assert_ne!(report.reparsed_range.start(), TextSize::new(0));

            for token in new.tokens() {
                _ = token.leading_trivia();
                _ = token.trailing_trivia();
            }
            let tokens = new.tokens().count();
            assert!(new.tree().trivia_cache().len() <= 2 * tokens, "round {round}");
            document = new;
        }
    }

    #[test]
    fn missing_tokens_are_never_shared() {
        let old = parse(SourceReader::new("<a><b>"));
        let (new, report, new_text) = reparse(&old, TextChange::insert(0.into(), "<!-- c -->"));
        let full = parse(SourceReader::new(&new_text));
        assert_eq!(new.debug_tree(), full.debug_tree());

        let tree = new.tree();
        let graph = tree.flat_graph(tree.root_id());
        let identities = graph.iter().map(|&id| tree.green(id).id()).collect::<FxHashSet<_>>();
        assert_eq!(identities.len(), graph.len());

        let reused = report.reused_nodes.iter().copied().collect::<FxHashSet<_>>();
        assert_eq!(reused.len(), report.reused_nodes.len());
        let missing = |id: &ElementId| tree.green(*id).as_token().is_some_and(GreenToken::is_missing);
        assert!(!report.reused_nodes.iter().any(missing));
    }

    #[test]
    fn moving_an_element_boundary_reparses_everything() {
        let old = parse(SourceReader::new("<a>x</a><b>y</b>"));
        let (new, report, text) = reparse(&old, edit(old.text(), "</a>", ""));

        assert_eq!(report.reparsed_range, TextRange::up_to(TextSize::of(text.as_str())));
        let reused_kinds =
            report.reused_nodes.iter().map(|&id| new.tree().kind(id)).collect::<Vec<_>>();
        assert!(reused_kinds.contains(&LESS_THAN));
    }

    #[test]
    fn holes_after_the_edit_shift() {
        let text = "<a>z</a><b>{X}</b>";
        let holes = Interpolations::new([TextRange::new(11.into(), 14.into())], text).unwrap();
        let old = parse(SourceReader::new(text).with_interpolations(holes));

        let change = edit(text, "z", "zz");
        let affected = TextChangeRange::collapse(std::slice::from_ref(&change)).unwrap();
        let new_text = TextChange::apply_all(text, std::slice::from_ref(&change));
        let new_holes = old
            .interpolations()
            .shifted(affected.span, |offset| affected.map_to_new(offset))
            .unwrap();

        let reader = SourceReader::new(&new_text).with_interpolations(new_holes);
        let (new, report) =
            old.incremental_parse(reader, &[change], &CancellationToken::new()).unwrap();

        let token = new.interpolation_token(0).unwrap();
        assert_eq!(token.range(), TextRange::new(12.into(), 15.into()));
        assert_eq!(new.interpolation_index(token), Some(0));
        assert_eq!(report.reparsed_range, TextRange::new(0.into(), 9.into()));
        assert!(report.reused_nodes.contains(&token.id()));
    }

    #[test]
    fn trivia_survives_a_full_reparse() {
        let old = parse(SourceReader::new("<!-- a --><x/>"));
        let commented = old.tokens().next().unwrap();
        assert_eq!(commented.leading_trivia().len(), 1);

        let (new, report, _) = reparse(&old, edit(old.text(), "/>", "></x>"));
        assert_eq!(report.reparsed_range.start(), TextSize::new(0));

        let token = new.tokens().next().unwrap();
        assert!(token.green().ptr_eq(commented.green()));
        assert!(new.tree().trivia_cache().contains(token.green(), false));
    }

    #[test]
    #[should_panic(expected = "text changes do not produce the new text")]
    fn mismatched_changes_panic() {
        let old = parse(SourceReader::new("<a/>"));
        let change = TextChange::insert(0.into(), "xyz");
        let _ = old.incremental_parse(SourceReader::new("<a/>"), &[change], &CancellationToken::new());
    }

    #[test]
    fn cancellation() {
        let old = parse(SourceReader::new("<a>x</a>"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let change = TextChange::insert(3.into(), "y");
        let result = old.incremental_parse(SourceReader::new("<a>yx</a>"), &[change], &cancel);
        assert_eq!(result.unwrap_err(), Cancelled);
    }
}
