use cx_tokenizer::Mode;
use cx_yellow::SyntaxKind::*;
use cx_yellow::SyntaxSet;

use super::element;
use crate::parser::Parser;

/// Tokens that end an attribute list.
const TAG_END: SyntaxSet =
    SyntaxSet::new([GREATER_THAN, SLASH_GREATER_THAN, LESS_THAN, LESS_THAN_SLASH, EOF]);

/// Expects [`Mode::Identifier`].
pub(super) fn attribute_list(p: &mut Parser<'_>) {
    let m = p.start();

    loop {
        match p.peek_kind() {
            IDENTIFIER | INTERPOLATION => attribute(p),
            kind if TAG_END.contains(kind) => break,
            _ => p.error_and_bump("expected attribute name"),
        }
    }

    m.complete(p, ATTRIBUTE_LIST);
}

fn attribute(p: &mut Parser<'_>) {
    let m = p.start();
    p.advance();

    if p.eat(EQUALS) {
        p.with_mode(Mode::Attribute, attribute_value);
    }

    m.complete(p, ATTRIBUTE);
}

fn attribute_value(p: &mut Parser<'_>) {
    match p.peek_kind() {
        STRING_LITERAL_START => string_literal(p),
        ATTRIBUTE_VALUE | INTERPOLATION => p.advance(),
        L_PAREN => inline_element(p),
        _ => {
            p.error("expected attribute value");
            p.missing(ATTRIBUTE_VALUE);
        }
    }
}

fn string_literal(p: &mut Parser<'_>) {
    let m = p.start();
    p.advance();

    p.with_mode(Mode::StringLiteral, |p| {
        loop {
            match p.peek_kind() {
                STRING_LITERAL_TEXT | INTERPOLATION => p.advance(),
                STRING_LITERAL_END => {
                    p.advance();
                    break;
                }
                _ => {
                    p.error("unterminated string literal");
                    p.missing(STRING_LITERAL_END);
                    break;
                }
            }
        }
    });

    m.complete(p, STRING_LITERAL);
}

/// `( <element> )` used as an attribute value.
fn inline_element(p: &mut Parser<'_>) {
    let m = p.start();
    p.advance();

    p.with_mode(Mode::ElementValue, |p| {
        if p.at(LESS_THAN) {
            element(p);
        } else {
            p.error("expected element");
        }
    });
    p.expect(R_PAREN, "expected `)`");

    m.complete(p, INLINE_ELEMENT);
}
