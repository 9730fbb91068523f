//! Positioned view over a green tree.
//!
//! Every element of the tree gets an entry in an arena. Entries point to their
//! parent by index and memoize derived positions in `OnceCell`s, which are
//! filled under `&self` and cleared only under `&mut self`.

use std::cell::OnceCell;
use std::fmt;

use cx_errors::Diagnostic;
use la_arena::{Arena, Idx};
use rustc_hash::FxHashSet;
use text_size::{TextRange, TextSize};

use crate::{GreenElement, GreenNode, GreenToken, NodeOrToken, SyntaxKind, TriviaCache};

/// Index of an element in a [`SyntaxTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(Idx<Entry>);

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", u32::from(self.0.into_raw()))
    }
}

#[derive(Clone)]
pub(crate) struct Entry {
    green: GreenElement,
    parent: Option<ElementId>,
    slot: u32,
    slots: Box<[ElementId]>,
    offset: OnceCell<TextSize>,
    first_terminal: OnceCell<Option<ElementId>>,
    last_terminal: OnceCell<Option<ElementId>>,
    descendants: OnceCell<Box<[ElementId]>>,
}

impl Entry {
    fn new(green: GreenElement, parent: Option<ElementId>, slot: u32) -> Self {
        Self {
            green,
            parent,
            slot,
            slots: Box::default(),
            offset: OnceCell::new(),
            first_terminal: OnceCell::new(),
            last_terminal: OnceCell::new(),
            descendants: OnceCell::new(),
        }
    }

    fn reset_shape(&mut self) {
        self.first_terminal.take();
        self.last_terminal.take();
        self.descendants.take();
    }

    fn reset(&mut self) {
        self.offset.take();
        self.reset_shape();
    }
}

#[derive(Clone)]
pub struct SyntaxTree {
    entries: Arena<Entry>,
    root: ElementId,
    live: usize,
    trivia: TriviaCache,
}

impl SyntaxTree {
    pub fn new(root: GreenNode) -> Self {
        Self::with_trivia(root, TriviaCache::new())
    }

    pub fn with_trivia(root: GreenNode, trivia: TriviaCache) -> Self {
        let mut entries = Arena::new();
        let root = ElementId(entries.alloc(Entry::new(NodeOrToken::Node(root), None, 0)));
        let mut tree = Self { entries, root, live: 1, trivia };
        tree.alloc_slots(root);
        tree
    }

    /// Allocates entries for everything below `top`.
    fn alloc_slots(&mut self, top: ElementId) {
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            let NodeOrToken::Node(node) = self.entry(id).green.clone() else { continue };
            let slots = node
                .slots()
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    let entry = Entry::new(child.clone(), Some(id), index as u32);
                    ElementId(self.entries.alloc(entry))
                })
                .collect::<Box<[_]>>();
            self.live += slots.len();
            stack.extend(slots.iter().copied());
            self.entries[id.0].slots = slots;
        }
    }

    #[inline]
    fn entry(&self, id: ElementId) -> &Entry {
        &self.entries[id.0]
    }

    pub fn root_id(&self) -> ElementId {
        self.root
    }

    pub fn green_root(&self) -> &GreenNode {
        match &self.entry(self.root).green {
            NodeOrToken::Node(node) => node,
            NodeOrToken::Token(_) => unreachable!("the root is always a node"),
        }
    }

    pub fn trivia_cache(&self) -> &TriviaCache {
        &self.trivia
    }

    /// Number of elements reachable from the root.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of allocated entries, including ones detached by [`Self::replace`].
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn needs_compaction(&self) -> bool {
        self.entries.len() - self.live > self.live
    }

    /// Rebuilds the arena without detached entries. Every [`ElementId`] of
    /// `self` is meaningless for the result.
    pub fn compact(&self) -> Self {
        let mut tree = Self::with_trivia(self.green_root().clone(), self.trivia.clone());
        tree.prune_trivia();
        tree
    }

    /// Forgets cached trivia of tokens no longer reachable from the root.
    pub fn prune_trivia(&mut self) {
        let live = self
            .flat_graph(self.root)
            .into_iter()
            .filter_map(|id| self.green(id).as_token().map(GreenToken::id))
            .collect::<FxHashSet<_>>();
        self.trivia.retain(|id| live.contains(&id));
    }

    pub fn green(&self, id: ElementId) -> &GreenElement {
        &self.entry(id).green
    }

    pub fn kind(&self, id: ElementId) -> SyntaxKind {
        self.entry(id).green.kind()
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.entry(id).parent
    }

    /// Position of `id` among its parent's slots.
    pub fn slot_index(&self, id: ElementId) -> usize {
        self.entry(id).slot as usize
    }

    pub fn slots(&self, id: ElementId) -> &[ElementId] {
        &self.entry(id).slots
    }

    pub fn slot(&self, id: ElementId, index: usize) -> Option<ElementId> {
        self.slots(id).get(index).copied()
    }

    /// Proper ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.parent(id), |&id| self.parent(id))
    }

    pub fn width(&self, id: ElementId) -> TextSize {
        self.entry(id).green.width()
    }

    pub fn offset(&self, id: ElementId) -> TextSize {
        if let Some(&offset) = self.entry(id).offset.get() {
            return offset;
        }

        let mut chain = vec![id];
        while let Some(parent) = self.entry(chain[chain.len() - 1]).parent {
            if self.entry(parent).offset.get().is_some() {
                break;
            }
            chain.push(parent);
        }

        let mut offset = TextSize::new(0);
        for &id in chain.iter().rev() {
            offset = self.compute_offset(id);
            let _ = self.entry(id).offset.set(offset);
        }
        offset
    }

    /// Offset of `id` given that its parent's offset is already known.
    fn compute_offset(&self, id: ElementId) -> TextSize {
        let entry = self.entry(id);
        let Some(parent) = entry.parent else { return TextSize::new(0) };
        let slot = entry.slot as usize;
        let siblings = self.slots(parent);

        if let Some(&previous) = slot.checked_sub(1).and_then(|index| siblings.get(index)) {
            if let Some(&offset) = self.entry(previous).offset.get() {
                return offset + self.width(previous);
            }
        }

        let base = match self.entry(parent).offset.get() {
            Some(&offset) => offset,
            None => self.offset(parent),
        };
        base + siblings[..slot].iter().map(|&sibling| self.width(sibling)).sum::<TextSize>()
    }

    /// Range including leading and trailing trivia.
    pub fn full_range(&self, id: ElementId) -> TextRange {
        TextRange::at(self.offset(id), self.width(id))
    }

    /// Range without the outermost trivia.
    pub fn range(&self, id: ElementId) -> TextRange {
        match &self.entry(id).green {
            NodeOrToken::Token(token) => token.value_range() + self.offset(id),
            NodeOrToken::Node(_) => {
                match (self.first_terminal(id), self.last_terminal(id)) {
                    (Some(first), Some(last)) => {
                        TextRange::new(self.range(first).start(), self.range(last).end())
                    }
                    _ => TextRange::empty(self.offset(id)),
                }
            }
        }
    }

    /// First token of the subtree that is not missing.
    pub fn first_terminal(&self, id: ElementId) -> Option<ElementId> {
        *self.entry(id).first_terminal.get_or_init(|| self.find_terminal(id, false))
    }

    /// Last token of the subtree that is not missing.
    pub fn last_terminal(&self, id: ElementId) -> Option<ElementId> {
        *self.entry(id).last_terminal.get_or_init(|| self.find_terminal(id, true))
    }

    fn find_terminal(&self, id: ElementId, from_end: bool) -> Option<ElementId> {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let entry = self.entry(id);
            match &entry.green {
                NodeOrToken::Token(token) if !token.is_missing() => return Some(id),
                NodeOrToken::Token(_) => {}
                NodeOrToken::Node(_) if from_end => stack.extend(entry.slots.iter().copied()),
                NodeOrToken::Node(_) => stack.extend(entry.slots.iter().rev().copied()),
            }
        }
        None
    }

    /// Every element below `id` in source order.
    pub fn descendants(&self, id: ElementId) -> &[ElementId] {
        self.entry(id).descendants.get_or_init(|| {
            let mut graph = self.flat_graph(id);
            graph.remove(0);
            graph.into_boxed_slice()
        })
    }

    /// `id` followed by every element below it, in source order.
    pub fn flat_graph(&self, id: ElementId) -> Vec<ElementId> {
        let mut graph = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            graph.push(id);
            stack.extend(self.slots(id).iter().rev().copied());
        }
        graph
    }

    /// Tokens of the subtree in source order.
    pub fn tokens(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::once(id)
            .chain(self.descendants(id).iter().copied())
            .filter(|&id| self.kind(id).is_token())
    }

    pub fn text(&self, id: ElementId) -> String {
        self.entry(id).green.text()
    }

    /// The deepest node below `id` whose full range strictly encloses `range`,
    /// or `id` itself.
    pub fn find_owning_node(&self, id: ElementId, range: TextRange) -> ElementId {
        let mut current = id;
        'descend: loop {
            for &slot in self.slots(current) {
                if self.kind(slot).is_node() && strictly_contains(self.full_range(slot), range) {
                    current = slot;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Diagnostics of `id` and its descendants with absolute ranges.
    pub fn diagnostics(&self, id: ElementId) -> Vec<Diagnostic> {
        self.flat_graph(id)
            .into_iter()
            .flat_map(|id| {
                let offset = self.offset(id);
                self.green(id).diagnostics().iter().map(move |d| d.shifted(offset))
            })
            .collect()
    }

    /// Forgets every memoized value of `id` and its descendants.
    pub fn reset_cached_state(&mut self, id: ElementId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let entry = &mut self.entries[id.0];
            entry.reset();
            stack.extend(entry.slots.iter().copied());
        }
    }

    /// Puts `green` where `id` is and returns the id of the new element.
    ///
    /// The ancestors get path-copied green nodes. Memoized state of the
    /// ancestors and of every element after the new one is reset. The old
    /// entries stay allocated but detached.
    pub fn replace(&mut self, id: ElementId, green: GreenElement) -> ElementId {
        let removed = self.flat_graph(id).len();
        let Entry { parent, slot, .. } = *self.entry(id);
        let new_id = ElementId(self.entries.alloc(Entry::new(green, parent, slot)));
        self.live = self.live - removed + 1;
        self.alloc_slots(new_id);

        let Some(parent) = parent else {
            self.root = new_id;
            return new_id;
        };
        self.entries[parent.0].slots[slot as usize] = new_id;

        let mut child = new_id;
        while let Some(parent) = self.entry(child).parent {
            let slot = self.entry(child).slot as usize;
            let NodeOrToken::Node(node) = &self.entry(parent).green else {
                unreachable!("tokens have no slots")
            };
            let node = node.with_slot(slot, self.entry(child).green.clone());

            let following = self.slots(parent)[slot + 1..].to_vec();
            for sibling in following {
                self.reset_cached_state(sibling);
            }

            let entry = &mut self.entries[parent.0];
            entry.green = NodeOrToken::Node(node);
            entry.reset_shape();
            child = parent;
        }

        new_id
    }

    pub fn debug_dump(&self, id: ElementId) -> String {
        DebugDump { tree: self, id }.to_string()
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("width", &self.width(self.root))
            .field("live", &self.live)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

fn strictly_contains(outer: TextRange, inner: TextRange) -> bool {
    outer.start() < inner.start() && inner.end() < outer.end()
}

struct DebugDump<'a> {
    tree: &'a SyntaxTree,
    id: ElementId,
}

impl fmt::Display for DebugDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree;
        let mut stack = vec![(self.id, 0)];
        while let Some((id, depth)) = stack.pop() {
            let range = tree.full_range(id);
            write!(f, "{:indent$}{:?}@{range:?}", "", tree.kind(id), indent = depth * 2)?;
            if let NodeOrToken::Token(token) = tree.green(id) {
                write!(f, " {:?}", token.text())?;
                let flags = token.flags().iter_names().map(|(name, _)| name).collect::<Vec<_>>();
                if !flags.is_empty() {
                    write!(f, " ({})", flags.join(" | "))?;
                }
            }
            writeln!(f)?;
            stack.extend(tree.slots(id).iter().rev().map(|&slot| (slot, depth + 1)));
        }
        Ok(())
    }
}
