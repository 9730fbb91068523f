use std::hint::black_box;

use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use cx_errors::CancellationToken;
use cx_parse::Document;
use cx_tokenizer::{Interpolations, SourceReader};
use text_size::TextRange;

fn benchmark_parser(c: &mut Criterion) {
    let simple = r#"<p class="lead">Hello <b>world</b></p>"#.to_owned();
    let medium = r#"
        <article id="post">
          <!-- header -->
          <h1 title='Greeting'>Hello &amp; welcome</h1>
          <ul>
            <li>one</li>
            <li data-x=1>two</li>
            <li>three <img src="a.png" alt=(<em>inline</em>)/></li>
          </ul>
        </article>
        "#
    .repeat(20);
    let holes = "<ul>{ITEMS}</ul><a href={HREF} title=\"go {TO}\">{LABEL}</a>".repeat(20);

    let cases = [("Simple", simple), ("Medium", medium), ("Interpolated", holes)];
    let cancel = CancellationToken::new();

    let mut group = c.benchmark_group("Parser Benchmark");

    for (name, text) in &cases {
        let interpolations = Interpolations::new(braces(text), text).unwrap();

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_code", name), text, |b, text| {
            b.iter(|| {
                let reader =
                    SourceReader::new(text).with_interpolations(interpolations.clone());
                let document = Document::parse(reader, &cancel).unwrap();
                black_box(document);
            });
        });
    }

    group.finish();
}

/// Every `{...}` run of the text.
fn braces(text: &str) -> Vec<TextRange> {
    let mut holes = Vec::new();
    let mut start = None;
    for (offset, ch) in text.char_indices() {
        match ch {
            '{' => start = Some(offset),
            '}' => {
                if let Some(start) = start.take() {
                    holes.push(TextRange::new((start as u32).into(), (offset as u32 + 1).into()));
                }
            }
            _ => {}
        }
    }
    holes
}

criterion_group!(benches, benchmark_parser);
criterion_main!(benches);
