//! Debug overlay: re-emit the detected geometry as a new PDF for human
//! verification.
//!
//! Rendering is split in two: [`build_plan`] reduces the extraction
//! geometry to a plain list of outlines per page, and [`render`] walks that
//! plan against an [`OverlayCanvas`]. The canvas trait keeps the geometry
//! side free of any PDF dependency, so tests drive the renderer with a
//! recording canvas and never touch pdfium.
//!
//! The overlay is produced strictly after extraction has completed; a
//! failure here (unwritable path, pdfium binding trouble) is reported to
//! the caller without touching the already-computed result.

use crate::error::ScrapError;
use crate::model::{Line, Rect, Table};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a drawn outline represents; canvases choose stroke style per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Line,
    Cell,
    Table,
}

/// One outline to draw, with an optional index label such as `T2`.
#[derive(Debug, Clone)]
pub struct OverlayRegion {
    pub rect: Rect,
    pub kind: RegionKind,
    pub label: Option<String>,
}

/// All outlines for one output page, at the original page dimensions.
#[derive(Debug, Clone)]
pub struct OverlayPage {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub regions: Vec<OverlayRegion>,
}

/// The full overlay: one output page per input page, in order.
#[derive(Debug, Clone, Default)]
pub struct OverlayPlan {
    pub pages: Vec<OverlayPage>,
}

/// Reduce extraction geometry to an overlay plan.
///
/// Every assembled line is outlined; each table gets an outline and a
/// `T{index}` label on every page it touches. Cell outlines are included
/// for single-page tables, where each cell's page is unambiguous.
pub fn build_plan(
    page_sizes: &[(f32, f32)],
    lines_by_page: &[Vec<Line>],
    tables: &[Table],
) -> OverlayPlan {
    let mut pages: Vec<OverlayPage> = page_sizes
        .iter()
        .enumerate()
        .map(|(i, &(width, height))| OverlayPage {
            page_index: i,
            width,
            height,
            regions: Vec::new(),
        })
        .collect();

    for lines in lines_by_page {
        for line in lines {
            if let Some(page) = pages.get_mut(line.page_index) {
                page.regions.push(OverlayRegion {
                    rect: line.rect,
                    kind: RegionKind::Line,
                    label: None,
                });
            }
        }
    }

    for (i, table) in tables.iter().enumerate() {
        if table.first_page == table.last_page {
            if let Some(page) = pages.get_mut(table.first_page) {
                for cell in table.rows.iter().flatten() {
                    if let Some(rect) = cell.rect {
                        page.regions.push(OverlayRegion {
                            rect,
                            kind: RegionKind::Cell,
                            label: None,
                        });
                    }
                }
            }
        }
        for p in table.first_page..=table.last_page {
            if let Some(page) = pages.get_mut(p) {
                page.regions.push(OverlayRegion {
                    rect: table.rect,
                    kind: RegionKind::Table,
                    label: Some(format!("T{i}")),
                });
            }
        }
    }

    OverlayPlan { pages }
}

/// Sink for overlay drawing. One `begin_page`/`end_page` pair per page,
/// one `outline` call per region in between.
pub trait OverlayCanvas {
    fn begin_page(&mut self, width: f32, height: f32) -> Result<(), ScrapError>;
    fn outline(&mut self, region: &OverlayRegion) -> Result<(), ScrapError>;
    fn end_page(&mut self) -> Result<(), ScrapError>;
}

/// Walk a plan against a canvas.
pub fn render<C: OverlayCanvas>(plan: &OverlayPlan, canvas: &mut C) -> Result<(), ScrapError> {
    for page in &plan.pages {
        canvas.begin_page(page.width, page.height)?;
        for region in &page.regions {
            canvas.outline(region)?;
        }
        canvas.end_page()?;
    }
    Ok(())
}

// ── pdfium canvas ────────────────────────────────────────────────────────

/// Canvas that builds a fresh PDF via pdfium. Pages are appended as the
/// plan is walked; [`PdfiumOverlayCanvas::save`] writes the file.
pub struct PdfiumOverlayCanvas<'a> {
    document: PdfDocument<'a>,
    path: PathBuf,
}

const LINE_GRAY: PdfColor = PdfColor::new(191, 191, 191, 255);
const CELL_GRAY: PdfColor = PdfColor::new(128, 128, 128, 255);
const TABLE_BLUE: PdfColor = PdfColor::new(40, 80, 200, 255);

impl<'a> PdfiumOverlayCanvas<'a> {
    pub fn new(pdfium: &'a Pdfium, path: &Path) -> Result<Self, ScrapError> {
        let document = pdfium
            .create_new_pdf()
            .map_err(|e| overlay_err(path, format!("{e:?}")))?;
        Ok(Self {
            document,
            path: path.to_path_buf(),
        })
    }

    pub fn save(self) -> Result<(), ScrapError> {
        self.document
            .save_to_file(&self.path)
            .map_err(|e| overlay_err(&self.path, format!("{e:?}")))
    }

    fn stroke(kind: RegionKind) -> (PdfColor, PdfPoints) {
        match kind {
            RegionKind::Line => (LINE_GRAY, PdfPoints::new(0.5)),
            RegionKind::Cell => (CELL_GRAY, PdfPoints::new(0.5)),
            RegionKind::Table => (TABLE_BLUE, PdfPoints::new(1.0)),
        }
    }
}

fn overlay_err(path: &Path, detail: String) -> ScrapError {
    ScrapError::OverlayWriteFailed {
        path: path.to_path_buf(),
        detail,
    }
}

impl OverlayCanvas for PdfiumOverlayCanvas<'_> {
    fn begin_page(&mut self, width: f32, height: f32) -> Result<(), ScrapError> {
        self.document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(width),
                PdfPoints::new(height),
            ))
            .map(|_| ())
            .map_err(|e| overlay_err(&self.path, format!("{e:?}")))
    }

    fn outline(&mut self, region: &OverlayRegion) -> Result<(), ScrapError> {
        let (color, stroke_width) = Self::stroke(region.kind);
        let font = self.document.fonts_mut().helvetica();
        let pages = self.document.pages();
        if pages.len() == 0 {
            return Err(overlay_err(&self.path, "outline before begin_page".into()));
        }
        let mut page = pages
            .get(pages.len() - 1)
            .map_err(|e| overlay_err(&self.path, format!("{e:?}")))?;
        let rect = PdfRect::new(
            PdfPoints::new(region.rect.y0),
            PdfPoints::new(region.rect.x0),
            PdfPoints::new(region.rect.y1),
            PdfPoints::new(region.rect.x1),
        );
        page.objects_mut()
            .create_path_object_rect(rect, Some(color), Some(stroke_width), None)
            .map_err(|e| overlay_err(&self.path, format!("{e:?}")))?;
        if let Some(label) = &region.label {
            let mut text = page
                .objects_mut()
                .create_text_object(
                    PdfPoints::new(region.rect.x0 + 2.0),
                    PdfPoints::new(region.rect.y1 + 2.0),
                    label,
                    font,
                    PdfPoints::new(8.0),
                )
                .map_err(|e| overlay_err(&self.path, format!("{e:?}")))?;
            text.set_fill_color(color)
                .map_err(|e| overlay_err(&self.path, format!("{e:?}")))?;
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), ScrapError> {
        Ok(())
    }
}

/// Render a plan to a PDF at `path`.
///
/// pdfium is not safe to drive from async contexts, so the whole render
/// runs inside `spawn_blocking`, same as text decoding.
pub async fn write_overlay_pdf(plan: OverlayPlan, path: &Path) -> Result<(), ScrapError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_overlay_blocking(&plan, &path))
        .await
        .map_err(|e| ScrapError::Internal(format!("overlay task panicked: {e}")))?
}

/// Blocking implementation of [`write_overlay_pdf`].
pub fn write_overlay_blocking(plan: &OverlayPlan, path: &Path) -> Result<(), ScrapError> {
    let pdfium = crate::pipeline::decode::bind_pdfium()
        .map_err(|e| overlay_err(path, e.to_string()))?;
    let mut canvas = PdfiumOverlayCanvas::new(&pdfium, path)?;
    render(plan, &mut canvas)?;
    canvas.save()?;
    info!(path = %path.display(), pages = plan.pages.len(), "wrote debug overlay");
    debug!(
        regions = plan.pages.iter().map(|p| p.regions.len()).sum::<usize>(),
        "overlay region count"
    );
    Ok(())
}
