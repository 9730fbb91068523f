use cx_tokenizer::Mode;
use cx_yellow::SyntaxKind::*;

use crate::parser::Parser;

mod attributes;

/// `DOCUMENT = CONTENT EOF`, lexed as element content.
pub(crate) fn document(p: &mut Parser<'_>) {
    let m = p.start();
    content(p);
    p.expect(EOF, "expected end of input");
    m.complete(p, DOCUMENT);
}

fn content(p: &mut Parser<'_>) {
    let m = p.start();

    loop {
        match p.peek_kind() {
            EOF => break,
            TEXT | INTERPOLATION => p.advance(),
            LESS_THAN => element(p),
            LESS_THAN_SLASH if !p.open_elements.is_empty() => break,
            LESS_THAN_SLASH => stray_closing_tag(p),
            _ => p.error_and_bump("unexpected character"),
        }
    }

    m.complete(p, CONTENT);
}

/// Parses an element starting at `<`. Expects [`Mode::ElementValue`].
pub(crate) fn element(p: &mut Parser<'_>) {
    debug_assert!(p.at(LESS_THAN));
    let m = p.start();
    p.advance();

    let (name, has_content) = p.with_mode(Mode::Identifier, |p| {
        let name = element_name(p);
        attributes::attribute_list(p);

        let has_content = match p.peek_kind() {
            SLASH_GREATER_THAN => {
                p.advance();
                false
            }
            GREATER_THAN => {
                p.advance();
                true
            }
            _ => {
                p.error("expected `>` or `/>`");
                p.missing(SLASH_GREATER_THAN);
                false
            }
        };
        (name, has_content)
    });

    if has_content {
        p.open_elements.push(name.clone());
        content(p);
        p.open_elements.pop();
        closing_tag(p, name.as_deref());
    }

    m.complete(p, ELEMENT);
}

fn element_name(p: &mut Parser<'_>) -> Option<String> {
    match p.peek_kind() {
        IDENTIFIER | INTERPOLATION => {
            let name = p.peek_value().to_owned();
            p.advance();
            Some(name)
        }
        _ => {
            p.error("expected element name");
            p.missing(IDENTIFIER);
            None
        }
    }
}

/// Closes the element named `name`. A closing tag that belongs to an
/// enclosing element is left alone and a missing one is synthesized instead.
fn closing_tag(p: &mut Parser<'_>, name: Option<&str>) {
    if p.at(LESS_THAN_SLASH) && !closes_ancestor(p, name) {
        let m = p.start();
        p.advance();
        p.with_mode(Mode::Identifier, |p| {
            match p.peek_kind() {
                IDENTIFIER | INTERPOLATION => {
                    if let Some(name) = name.filter(|&name| name != p.peek_value()) {
                        p.error(format!("mismatched closing tag, expected `{name}`"));
                    }
                    p.advance();
                }
                _ => {
                    p.error("expected element name");
                    p.missing(IDENTIFIER);
                }
            }
            p.expect(GREATER_THAN, "expected `>`");
        });
        m.complete(p, CLOSING_TAG);
        return;
    }

    p.error(format!("unclosed element `{}`", name.unwrap_or_default()));
    let m = p.start();
    p.missing(LESS_THAN_SLASH);
    p.missing(IDENTIFIER);
    p.missing(GREATER_THAN);
    m.complete(p, CLOSING_TAG);
}

fn closes_ancestor(p: &mut Parser<'_>, name: Option<&str>) -> bool {
    let (kind, closing) = p.peek_second(Mode::Identifier);
    if !matches!(kind, IDENTIFIER | INTERPOLATION) || name == Some(closing) {
        return false;
    }
    p.open_elements.iter().any(|open| open.as_deref() == Some(closing))
}

fn stray_closing_tag(p: &mut Parser<'_>) {
    let m = p.start();
    p.error("closing tag without an open element");
    p.advance();
    p.with_mode(Mode::Identifier, |p| {
        if matches!(p.peek_kind(), IDENTIFIER | INTERPOLATION) {
            p.advance();
        }
        p.eat(GREATER_THAN);
    });
    m.complete(p, ERROR);
}
