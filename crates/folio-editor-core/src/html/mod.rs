//! HTML serialization for documents.
//!
//! `serialize` produces the controlled value handed to the owner; `deserialize`
//! reads any markup back, coercing what it does not understand. For every
//! document reachable through the editor, `deserialize(serialize(d).html)`
//! yields `d` again.

mod parser;
mod writer;


pub use writer::HtmlWriter;

use crate::document::Document;
use crate::state::EditorValue;

/// Serialize a document to `{html, text}`.
pub fn serialize(doc: &Document) -> EditorValue {
    let mut w = HtmlWriter::new();
    match writer::write_nodes(&mut w, doc.children()) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    EditorValue {
        html: w.into_string(),
        text: doc.plain_text(),
    }
}

/// Parse HTML into a document. Never fails.
pub fn deserialize(html: &str) -> Document {
    parser::parse(html)
}
