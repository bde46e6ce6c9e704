//! Document ingestion: loading papers and splitting them into chunks

pub mod parser;
mod processor;
mod splitter;

pub use parser::{cleanup_text, load_text_file, PdfLoader};
pub use processor::DocumentProcessor;
pub use splitter::{RecursiveCharacterSplitter, DEFAULT_SEPARATORS};
