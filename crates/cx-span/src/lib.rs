//! Text positions, edits and the token-text intern cache shared by the CX crates.

mod change;
mod intern;

pub use change::{TextChange, TextChangeRange};
pub use intern::{StringInternTable, fnv1a};
pub use text_size::{TextLen, TextRange, TextSize};

/// Returns `true` when the two ranges overlap.
///
/// An empty range intersects a range it touches, so an insertion point at
/// either edge of a span counts as affecting it.
pub fn intersects(a: TextRange, b: TextRange) -> bool {
    if a.is_empty() || b.is_empty() {
        a.start() <= b.end() && b.start() <= a.end()
    } else {
        a.start() < b.end() && b.start() < a.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn overlapping_ranges_intersect() {
        assert!(intersects(range(0, 4), range(3, 6)));
        assert!(!intersects(range(0, 3), range(3, 6)));
        assert!(intersects(range(2, 2), range(0, 2)));
        assert!(intersects(range(5, 5), range(5, 9)));
        assert!(!intersects(range(10, 10), range(0, 9)));
    }
}
