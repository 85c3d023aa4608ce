//! PDF text decoding: pdfium → positioned text fragments.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking thread, keeping the Tokio workers free while pdfium walks the
//! page content.
//!
//! One fragment is emitted per decoded character. Grouping characters into
//! runs is deliberately left to the line assembler, which already merges
//! horizontally adjacent fragments; doing it here would duplicate that
//! logic with a second set of tolerances.

use crate::error::ScrapError;
use crate::model::{PageFragments, Rect, TextFragment};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium library: an explicit `PDFIUM_DYNAMIC_LIB_PATH`
/// directory first, then the current directory, then the system library.
pub(crate) fn bind_pdfium() -> Result<Pdfium, ScrapError> {
    let mut errors = Vec::new();
    if let Ok(dir) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => errors.push(format!("{dir}: {e}")),
        }
    }
    match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(e) => errors.push(format!("./: {e}")),
    }
    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            errors.push(format!("system: {e}"));
            Err(ScrapError::PdfiumBindingFailed(errors.join("; ")))
        }
    }
}

/// Decode every page of the PDF at `path` into positioned fragments.
pub async fn decode_pages(path: &Path) -> Result<Vec<PageFragments>, ScrapError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || decode_pages_blocking(&path))
        .await
        .map_err(|e| ScrapError::Internal(format!("decode task panicked: {e}")))?
}

/// Blocking implementation of [`decode_pages`].
pub fn decode_pages_blocking(path: &Path) -> Result<Vec<PageFragments>, ScrapError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            ScrapError::EncryptedPdf {
                path: path.to_path_buf(),
            }
        } else {
            ScrapError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })?;

    let pages = document.pages();
    info!(pages = pages.len(), path = %path.display(), "PDF loaded");

    let mut decoded = Vec::with_capacity(pages.len() as usize);
    for (page_index, page) in pages.iter().enumerate() {
        let width = page.width().value;
        let height = page.height().value;
        let text = page.text().map_err(|e| ScrapError::DecodeFailed {
            page: page_index,
            detail: format!("{e:?}"),
        })?;

        let mut fragments = Vec::new();
        for ch in text.chars().iter() {
            let Some(c) = ch.unicode_char() else { continue };
            if c == '\n' || c == '\r' {
                continue;
            }
            let bounds = ch
                .tight_bounds()
                .or_else(|_| ch.loose_bounds())
                .unwrap_or(PdfRect::ZERO);
            let rect = Rect::new(
                bounds.left().value,
                bounds.bottom().value,
                bounds.right().value,
                bounds.top().value,
            );
            fragments.push(TextFragment::new(
                rect,
                c.to_string(),
                ch.scaled_font_size().value,
                page_index,
            ));
        }

        debug!(
            page = page_index,
            fragments = fragments.len(),
            "decoded page"
        );
        decoded.push(PageFragments {
            page_index,
            width,
            height,
            fragments,
        });
    }

    Ok(decoded)
}
