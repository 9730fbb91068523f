//! Parser for CX documents and incremental reparsing after edits.

mod document;
mod grammar;
mod incremental;
mod parser;

pub use cx_span::{TextChange, TextChangeRange};
pub use document::Document;
pub use incremental::ReuseReport;
