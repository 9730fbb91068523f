use crate::SyntaxKind;

/// A set of kinds packed into a single word, usable in `const` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyntaxSet(u64);

impl SyntaxSet {
    pub const EMPTY: Self = Self(0);

    const fn bit(kind: SyntaxKind) -> u64 {
        let index = kind as u16;
        assert!(index < u64::BITS as u16, "SyntaxKind does not fit into SyntaxSet");
        1 << index
    }

    pub const fn new<const N: usize>(kinds: [SyntaxKind; N]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < N {
            bits |= Self::bit(kinds[i]);
            i += 1;
        }
        Self(bits)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn with(self, kind: SyntaxKind) -> Self {
        Self(self.0 | Self::bit(kind))
    }

    pub const fn contains(self, kind: SyntaxKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::SyntaxSet;
    use crate::SyntaxKind::*;

    #[test]
    fn membership() {
        const TAG_END: SyntaxSet = SyntaxSet::new([GREATER_THAN, SLASH_GREATER_THAN]);
        const ALL: SyntaxSet = TAG_END.union(SyntaxSet::new([EOF])).with(TOMBSTONE);

        assert!(TAG_END.contains(GREATER_THAN));
        assert!(!TAG_END.contains(LESS_THAN));
        assert!(ALL.contains(TOMBSTONE));
        assert!(ALL.contains(SLASH_GREATER_THAN));
        assert!(!SyntaxSet::EMPTY.contains(EOF));
    }
}
