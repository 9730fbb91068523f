mod logging;

use anyhow::{Context, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use cx_errors::{CancellationToken, Renderer};
use cx_parse::{Document, ReuseReport, TextChange, TextChangeRange};
use cx_span::{TextRange, TextSize};
use cx_tokenizer::{Interpolations, SourceReader, TokenFlags};

#[derive(Parser)]
#[command(version, about = "Inspect the syntax tree of CX markup")]
enum Options {
    /// Print every token with its range and flags.
    Tokens {
        #[command(flatten)]
        input: Input,
    },
    /// Print the syntax tree.
    Parse {
        #[command(flatten)]
        input: Input,
    },
    /// Apply edits, reparse and print the new tree with what was reused.
    Reparse {
        #[command(flatten)]
        input: Input,
        /// Replacement in offsets of the unedited file.
        #[arg(long = "edit", value_name = "START..END=TEXT", value_parser = parse_edit, required = true)]
        edits: Vec<TextChange>,
    },
}

#[derive(clap::Args)]
struct Input {
    path: Utf8PathBuf,
    /// Byte range of an interpolation hole. Repeat for every hole.
    #[arg(long = "interpolation", value_name = "START..END", value_parser = parse_range)]
    interpolations: Vec<TextRange>,
    /// Quote nesting depth of the host string literal.
    #[arg(long, value_name = "N", default_value_t = 0)]
    wrapping_quotes: u32,
}

impl Input {
    fn read(&self) -> anyhow::Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read `{}`", self.path))
    }

    fn reader<'a>(&self, text: &'a str) -> anyhow::Result<SourceReader<'a>> {
        let interpolations = Interpolations::new(self.interpolations.iter().copied(), text)
            .with_context(|| format!("invalid interpolation for `{}`", self.path))?;
        Ok(SourceReader::new(text)
            .with_interpolations(interpolations)
            .with_wrapping_quote_count(self.wrapping_quotes))
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let cancel = CancellationToken::new();
    let renderer = Renderer::styled();

    match Options::parse() {
        Options::Tokens { input } => {
            let text = input.read()?;
            let document = Document::parse(input.reader(&text)?, &cancel)?;

            for token in document.tokens() {
                println!(
                    "{:?}@{:?} {:?}{}",
                    token.kind(),
                    token.range(),
                    token.value(),
                    flags_suffix(token.flags())
                );
            }
            report(&renderer, &input.path, &document);
        }
        Options::Parse { input } => {
            let text = input.read()?;
            let document = Document::parse(input.reader(&text)?, &cancel)?;

            print!("{}", document.root().debug_dump());
            report(&renderer, &input.path, &document);
        }
        Options::Reparse { input, edits } => {
            let text = input.read()?;
            let document = Document::parse(input.reader(&text)?, &cancel)?;
            let (document, reuse) = reparse(&input.path, &document, &edits, &cancel)?;

            print!("{}", document.root().debug_dump());
            println!(
                "reparsed {:?}, reused {} elements, discarded {}",
                reuse.reparsed_range,
                reuse.reused_nodes.len(),
                reuse.discarded_nodes.len()
            );
            report(&renderer, &input.path, &document);
        }
    }

    Ok(())
}

fn reparse(
    path: &Utf8Path,
    document: &Document,
    edits: &[TextChange],
    cancel: &CancellationToken,
) -> anyhow::Result<(Document, ReuseReport)> {
    check_edits(document.text(), edits)?;
    let new_text = TextChange::apply_all(document.text(), edits);
    let interpolations = match TextChangeRange::collapse(edits) {
        Some(change) => document
            .interpolations()
            .shifted(change.span, |offset| change.map_to_new(offset))
            .context("an edit overlaps an interpolation")?,
        None => document.interpolations().clone(),
    };
    let reader = SourceReader::new(&new_text)
        .with_interpolations(interpolations)
        .with_wrapping_quote_count(document.wrapping_quote_count());

    tracing::info!(%path, edits = edits.len(), "reparsing");
    Ok(document.incremental_parse(reader, edits, cancel)?)
}

fn report(renderer: &Renderer, path: &Utf8Path, document: &Document) {
    for diagnostic in document.diagnostics() {
        eprintln!("{}", diagnostic.render(renderer, path.as_str(), document.text()));
    }
}

fn flags_suffix(flags: TokenFlags) -> String {
    if flags.is_empty() {
        return String::new();
    }
    let names = flags.iter_names().map(|(name, _)| name).collect::<Vec<_>>();
    format!(" ({})", names.join(" | "))
}

/// Edits must be in bounds, on character boundaries and disjoint.
fn check_edits(text: &str, edits: &[TextChange]) -> anyhow::Result<()> {
    let mut ranges = edits.iter().map(|edit| edit.range).collect::<Vec<_>>();
    ranges.sort_by_key(|range| (range.start(), range.end()));

    let mut last = TextSize::new(0);
    for range in ranges {
        ensure!(range.end() <= TextSize::of(text), "edit {range:?} is past the end of the file");
        ensure!(
            text.is_char_boundary(range.start().into()) && text.is_char_boundary(range.end().into()),
            "edit {range:?} splits a character"
        );
        ensure!(range.start() >= last, "edit {range:?} overlaps another edit");
        last = range.end();
    }
    Ok(())
}

fn parse_range(s: &str) -> Result<TextRange, String> {
    let (start, end) =
        s.split_once("..").ok_or_else(|| format!("expected `START..END`, found `{s}`"))?;
    let start = start.parse::<u32>().map_err(|err| format!("invalid start `{start}`: {err}"))?;
    let end = end.parse::<u32>().map_err(|err| format!("invalid end `{end}`: {err}"))?;
    if start > end {
        return Err(format!("`{s}` ends before it starts"));
    }
    Ok(TextRange::new(start.into(), end.into()))
}

fn parse_edit(s: &str) -> Result<TextChange, String> {
    let (range, text) =
        s.split_once('=').ok_or_else(|| format!("expected `START..END=TEXT`, found `{s}`"))?;
    Ok(TextChange::new(parse_range(range)?, text))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use clap::CommandFactory as _;

    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn command_is_well_formed() {
        Options::command().debug_assert();
    }

    #[test]
    fn ranges() {
        assert_eq!(parse_range("3..7"), Ok(range(3, 7)));
        assert_eq!(parse_range("4..4"), Ok(range(4, 4)));
        assert!(parse_range("7..3").is_err());
        assert!(parse_range("3").is_err());
        assert!(parse_range("a..3").is_err());
    }

    #[test]
    fn edits_keep_everything_after_the_first_equals() {
        assert_eq!(parse_edit("2..5=a=b"), Ok(TextChange::new(range(2, 5), "a=b")));
        assert_eq!(parse_edit("0..0="), Ok(TextChange::new(range(0, 0), "")));
        assert!(parse_edit("2..5").is_err());
    }

    #[test]
    fn reparse_arguments() {
        let options = Options::try_parse_from([
            "cx",
            "reparse",
            "page.cx",
            "--interpolation",
            "1..4",
            "--interpolation",
            "8..11",
            "--wrapping-quotes",
            "1",
            "--edit",
            "5..6=x",
        ])
        .unwrap();

        let Options::Reparse { input, edits } = options else { panic!("expected `reparse`") };
        assert_eq!(input.path, "page.cx");
        assert_eq!(input.interpolations, [range(1, 4), range(8, 11)]);
        assert_eq!(input.wrapping_quotes, 1);
        assert_eq!(edits, [TextChange::new(range(5, 6), "x")]);
    }

    #[test]
    fn reparse_requires_an_edit() {
        assert!(Options::try_parse_from(["cx", "reparse", "page.cx"]).is_err());
    }

    #[test]
    fn bad_edits_are_rejected() {
        let text = "<p>é</p>";
        assert!(check_edits(text, &[TextChange::new(range(3, 5), "e")]).is_ok());
        assert!(check_edits(text, &[TextChange::new(range(3, 4), "e")]).is_err());
        assert!(check_edits(text, &[TextChange::new(range(9, 12), "")]).is_err());
        assert!(
            check_edits(
                text,
                &[TextChange::new(range(0, 3), ""), TextChange::new(range(2, 3), "")]
            )
            .is_err()
        );
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reparse_applies_edits_and_logs() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let cancel = CancellationToken::new();
        let document = Document::parse(SourceReader::new("<a>x</a>"), &cancel).unwrap();
        let edits = [TextChange::new(range(3, 4), "yz")];
        let (document, reuse) = tracing::subscriber::with_default(subscriber, || {
            reparse(Utf8Path::new("page.cx"), &document, &edits, &cancel).unwrap()
        });

        assert_eq!(document.text(), "<a>yz</a>");
        assert_eq!(reuse.changes, edits);
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("reparsing"), "{logs}");
        assert!(logs.contains("page.cx"), "{logs}");
    }

    #[test]
    fn flags_are_listed_by_name() {
        assert_eq!(flags_suffix(TokenFlags::empty()), "");
        assert_eq!(
            flags_suffix(TokenFlags::MISSING | TokenFlags::SYNTHETIC),
            " (MISSING | SYNTHETIC)"
        );
    }
}
