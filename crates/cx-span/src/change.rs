use text_size::{TextRange, TextSize};

/// A single replacement of `range` (in the old text) by `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextChange {
    pub range: TextRange,
    pub new_text: String,
}

impl TextChange {
    pub fn new(range: TextRange, new_text: impl Into<String>) -> Self {
        Self { range, new_text: new_text.into() }
    }

    pub fn insert(offset: TextSize, text: impl Into<String>) -> Self {
        Self::new(TextRange::empty(offset), text)
    }

    pub fn delete(range: TextRange) -> Self {
        Self::new(range, String::new())
    }

    pub fn new_len(&self) -> TextSize {
        TextSize::of(self.new_text.as_str())
    }

    /// Applies `changes` to `text`. All ranges refer to the original text and
    /// must not overlap.
    pub fn apply_all(text: &str, changes: &[TextChange]) -> String {
        let mut sorted = changes.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|change| (change.range.start(), change.range.end()));

        let inserted: usize = sorted.iter().map(|change| change.new_text.len()).sum();
        let mut out = String::with_capacity(text.len() + inserted);
        let mut last = 0;

        for change in sorted {
            let start = usize::from(change.range.start());
            assert!(start >= last, "overlapping text changes at {start}");
            out.push_str(&text[last..start]);
            out.push_str(&change.new_text);
            last = change.range.end().into();
        }

        out.push_str(&text[last..]);
        out
    }
}

/// The union of a set of edits: `span` is the covered region of the old
/// text, `new_len` the length that region has in the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextChangeRange {
    pub span: TextRange,
    pub new_len: TextSize,
}

impl TextChangeRange {
    pub fn new(span: TextRange, new_len: TextSize) -> Self {
        Self { span, new_len }
    }

    /// Collapses `changes` into the single range they affect.
    pub fn collapse(changes: &[TextChange]) -> Option<Self> {
        let start = changes.iter().map(|change| change.range.start()).min()?;
        let end = changes.iter().map(|change| change.range.end()).max()?;

        let removed: TextSize = changes.iter().map(|change| change.range.len()).sum();
        let inserted: TextSize = changes.iter().map(TextChange::new_len).sum();

        Some(Self { span: TextRange::new(start, end), new_len: end - start + inserted - removed })
    }

    /// The affected region in new-text coordinates.
    pub fn new_range(&self) -> TextRange {
        TextRange::at(self.span.start(), self.new_len)
    }

    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_len)) - i64::from(u32::from(self.span.len()))
    }

    /// Maps the start of something in the new text back to the old text.
    ///
    /// Returns `None` for offsets inside the inserted region.
    pub fn map_to_old(&self, offset: TextSize) -> Option<TextSize> {
        let new_range = self.new_range();
        if offset < self.span.start() {
            Some(offset)
        } else if offset >= new_range.end() {
            Some(offset - self.new_len + self.span.len())
        } else {
            None
        }
    }

    /// Maps an offset of the old text that lies after the change to the new text.
    pub fn map_to_new(&self, offset: TextSize) -> TextSize {
        if offset < self.span.end() { offset } else { offset - self.span.len() + self.new_len }
    }
}
