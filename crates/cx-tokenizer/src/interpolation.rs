//! Registry of interpolation holes.

use std::sync::Arc;

use text_size::{TextRange, TextSize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolationError {
    #[error("interpolation {index} at {span:?} is empty")]
    Empty { index: usize, span: TextRange },
    #[error("interpolation {index} at {span:?} starts before the previous one")]
    Unsorted { index: usize, span: TextRange },
    #[error("interpolation {index} at {span:?} overlaps the previous one")]
    Overlapping { index: usize, span: TextRange },
    #[error("interpolation {index} at {span:?} ends past the end of the text ({len:?})")]
    OutOfBounds { index: usize, span: TextRange, len: TextSize },
    #[error("interpolation {index} at {span:?} does not fall on character boundaries")]
    NotCharBoundary { index: usize, span: TextRange },
}

/// Sorted, non-overlapping spans of host-language text. A hole's id is its
/// index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpolations {
    spans: Arc<[TextRange]>,
}

impl Interpolations {
    pub fn new(
        spans: impl IntoIterator<Item = TextRange>,
        text: &str,
    ) -> Result<Self, InterpolationError> {
        let spans = spans.into_iter().collect::<Arc<[_]>>();
        let len = TextSize::of(text);

        for (index, &span) in spans.iter().enumerate() {
            if span.is_empty() {
                return Err(InterpolationError::Empty { index, span });
            }
            if span.end() > len {
                return Err(InterpolationError::OutOfBounds { index, span, len });
            }
            if !text.is_char_boundary(span.start().into()) || !text.is_char_boundary(span.end().into())
            {
                return Err(InterpolationError::NotCharBoundary { index, span });
            }
            if let Some(previous) = index.checked_sub(1).map(|index| spans[index]) {
                if span.start() < previous.start() {
                    return Err(InterpolationError::Unsorted { index, span });
                }
                if span.start() < previous.end() {
                    return Err(InterpolationError::Overlapping { index, span });
                }
            }
        }

        Ok(Self { spans })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TextRange> {
        self.spans.get(index).copied()
    }

    pub fn as_slice(&self) -> &[TextRange] {
        &self.spans
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, TextRange)> + '_ {
        self.spans.iter().copied().enumerate()
    }

    /// Id of the hole that starts exactly at `offset`.
    pub fn index_at(&self, offset: TextSize) -> Option<usize> {
        self.spans.binary_search_by_key(&offset, |span| span.start()).ok()
    }

    /// Id of the first hole that ends after `offset`: the hole containing
    /// `offset` or the next one.
    pub fn first_ending_after(&self, offset: TextSize) -> Option<usize> {
        let index = self.spans.partition_point(|span| span.end() <= offset);
        (index < self.spans.len()).then_some(index)
    }

    /// Id of the hole strictly surrounding `offset`.
    pub fn containing(&self, offset: TextSize) -> Option<usize> {
        let index = self.first_ending_after(offset)?;
        (self.spans[index].start() < offset).then_some(index)
    }

    /// Holes after an edit, or `None` if the edit touches one. `map` moves an
    /// old offset past the edit.
    pub fn shifted(
        &self,
        edit: TextRange,
        map: impl Fn(TextSize) -> TextSize,
    ) -> Option<Self> {
        let mut spans = Vec::with_capacity(self.spans.len());
        for &span in self.spans.iter() {
            if span.end() <= edit.start() {
                spans.push(span);
            } else if span.start() >= edit.end() {
                spans.push(TextRange::new(map(span.start()), map(span.end())));
            } else {
                return None;
            }
        }
        Some(Self { spans: spans.into() })
    }
}
