use std::fmt::Display;

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
pub use text_size::TextRange;
use text_size::TextSize;

mod cancel;

pub use cancel::{Cancelled, CancellationToken, check_cancelled};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    message: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { message: message.into(), range }
    }

    /// Moves the diagnostic forward by `offset`.
    pub fn shifted(&self, offset: TextSize) -> Self {
        Self { message: self.message.clone(), range: self.range + offset }
    }

    /// Makes the diagnostic relative to `origin`.
    pub fn relative_to(&self, origin: TextSize) -> Self {
        Self { message: self.message.clone(), range: self.range - origin }
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let message = Level::Error.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(Level::Error.span(self.range.into()).label("here"))
                .fold(true),
        );
        renderer.render(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifting_round_trips() {
        let diagnostic = Diagnostic::error("expected `>`", TextRange::new(4.into(), 6.into()));
        let absolute = diagnostic.shifted(10.into());

        assert_eq!(absolute.range(), TextRange::new(14.into(), 16.into()));
        assert_eq!(absolute.relative_to(10.into()), diagnostic);
    }

    #[test]
    fn render_points_at_the_range() {
        let text = "<a>\n<b>\n";
        let diagnostic = Diagnostic::error("unclosed element `b`", TextRange::new(4.into(), 7.into()));
        let rendered = diagnostic.render(&Renderer::plain(), "page.cx", text).to_string();

        assert!(rendered.contains("unclosed element `b`"));
        assert!(rendered.contains("page.cx"));
    }
}
