//! Page-aware loaders for PDFs and plain-text papers

use regex::Regex;
use std::path::Path;
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{FileType, Page, SourceRef};

/// Replacements for glyphs pdf-extract leaves behind
const GLYPH_REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
    ("\u{2010}", "-"),
    ("\u{2011}", "-"),
    ("\u{2013}", "-"),
    ("\u{2014}", "--"),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{2022}", "* "),
    ("\u{2026}", "..."),
    ("\u{00A0}", " "),
    ("\u{00AD}", ""),
    ("\0", ""),
];

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Normalize extracted page text without losing paragraph breaks
pub fn cleanup_text(text: &str) -> String {
    let mut result = text.replace("\r\n", "\n").replace('\r', "\n");
    for (from, to) in GLYPH_REPLACEMENTS {
        if result.contains(from) {
            result = result.replace(from, to);
        }
    }

    let result = result
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    blank_lines().replace_all(result.trim(), "\n\n").into_owned()
}

/// Loads PDF files into one [`Page`] per PDF page
pub struct PdfLoader {
    /// Limit for pdf-extract on a single file
    timeout: Duration,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl PdfLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Load a PDF from disk
    pub fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let filename = file_name(path);
        tracing::info!("Loading PDF from {}", path.display());
        let data = std::fs::read(path)?;
        self.load_bytes(&filename, &data)
    }

    /// Load a PDF held in memory
    pub fn load_bytes(&self, filename: &str, data: &[u8]) -> Result<Vec<Page>> {
        let raw_pages = match self.extract_pages_with_timeout(data) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("pdf-extract failed for {}: {}, trying lopdf", filename, e);
                Self::extract_pages_fallback(filename, data)?
            }
        };

        let total_pages = raw_pages.len() as u32;
        let pages: Vec<Page> = raw_pages
            .into_iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let content = cleanup_text(&text);
                if content.is_empty() {
                    return None;
                }
                Some(Page::new(
                    content,
                    SourceRef::pdf(filename, i as u32 + 1, total_pages),
                ))
            })
            .collect();

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF (it may be scanned or encrypted)",
            ));
        }

        tracing::debug!("{}: {} of {} pages have text", filename, pages.len(), total_pages);
        Ok(pages)
    }

    /// Run pdf-extract on its own thread so a pathological font cannot hang ingestion
    fn extract_pages_with_timeout(&self, data: &[u8]) -> Result<Vec<String>> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem_by_pages(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(pages)) => {
                let _ = handle.join();
                Ok(pages)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(Error::internal(e.to_string()))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::internal(format!(
                "extraction timed out after {:?}",
                self.timeout
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::internal("extraction thread panicked"))
            }
        }
    }

    /// Page-by-page text from lopdf
    fn extract_pages_fallback(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let pages = doc
            .get_pages()
            .keys()
            .map(|&page_num| match doc.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("Could not extract page {} of {}: {}", page_num, filename, e);
                    String::new()
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Load a `.txt` or `.md` file as a single page
pub fn load_text_file(path: &Path) -> Result<Vec<Page>> {
    let filename = file_name(path);
    let file_type = FileType::from_path(path);
    let bytes = std::fs::read(path)?;
    let content = cleanup_text(&String::from_utf8_lossy(&bytes));

    if content.is_empty() {
        return Err(Error::file_parse(filename, "File is empty"));
    }

    Ok(vec![Page::new(content, SourceRef::text(filename, file_type))])
}

/// Load any supported file
pub fn load_file(loader: &PdfLoader, path: &Path) -> Result<Vec<Page>> {
    match FileType::from_path(path) {
        FileType::Pdf => loader.load(path),
        FileType::Txt | FileType::Markdown => load_text_file(path),
        FileType::Unknown => Err(Error::UnsupportedFileType(path.display().to_string())),
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
