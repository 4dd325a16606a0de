//! PDF text extraction.
//!
//! Thin wrapper around `lopdf` exposing the two things the conversion
//! workflow needs: a page count and per-page plain text. The [`DocumentSource`]
//! trait is the seam that lets the workflow be tested without a real PDF.

use std::path::Path;

use lopdf::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to load PDF: {0}")]
    Load(String),

    #[error("page {0} is out of range")]
    PageOutOfRange(u32),

    #[error("failed to extract text from page {page}: {reason}")]
    Extraction { page: u32, reason: String },
}

/// Source of per-page plain text for one conversion run.
///
/// Page indices are zero-based; implementations report failures per page so
/// the caller can decide whether a bad page is fatal.
pub trait DocumentSource {
    fn page_count(&self) -> u32;

    fn page_text(&self, index: u32) -> Result<String, PdfError>;
}

/// A parsed PDF document, owned by the workflow for the duration of a run.
#[derive(Debug)]
pub struct PdfDocument {
    doc: Document,
    page_numbers: Vec<u32>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let doc = Document::load(path).map_err(|e| PdfError::Load(e.to_string()))?;
        // get_pages() keys are the 1-based page numbers in document order.
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        Ok(Self { doc, page_numbers })
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_numbers.len() as u32
    }

    fn page_text(&self, index: u32) -> Result<String, PdfError> {
        let page_number = *self
            .page_numbers
            .get(index as usize)
            .ok_or(PdfError::PageOutOfRange(index + 1))?;
        self.doc
            .extract_text(&[page_number])
            .map_err(|e| PdfError::Extraction {
                page: page_number,
                reason: e.to_string(),
            })
    }
}
