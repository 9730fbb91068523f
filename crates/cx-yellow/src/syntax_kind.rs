#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[repr(u16)]
pub enum SyntaxKind {
    LESS_THAN,
    LESS_THAN_SLASH,
    GREATER_THAN,
    SLASH_GREATER_THAN,
    EQUALS,
    L_PAREN,
    R_PAREN,

    IDENTIFIER,
    TEXT,
    ATTRIBUTE_VALUE,
    STRING_LITERAL_START,
    STRING_LITERAL_TEXT,
    STRING_LITERAL_END,
    INTERPOLATION,

    INVALID,
    EOF,

    DOCUMENT,
    CONTENT,
    ELEMENT,
    ATTRIBUTE_LIST,
    ATTRIBUTE,
    STRING_LITERAL,
    INLINE_ELEMENT,
    CLOSING_TAG,
    ERROR,
    TOMBSTONE,
}

impl SyntaxKind {
    #[inline]
    pub fn is_token(self) -> bool {
        self <= Self::EOF
    }

    #[inline]
    pub fn is_node(self) -> bool {
        !self.is_token()
    }

    /// Returns the fixed spelling of punctuation kinds.
    pub fn text(self) -> Option<&'static str> {
        Some(match self {
            Self::LESS_THAN => "<",
            Self::LESS_THAN_SLASH => "</",
            Self::GREATER_THAN => ">",
            Self::SLASH_GREATER_THAN => "/>",
            Self::EQUALS => "=",
            Self::L_PAREN => "(",
            Self::R_PAREN => ")",
            _ => return None,
        })
    }
}
