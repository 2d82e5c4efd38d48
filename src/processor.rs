//! The preview pipeline: pick target columns, classify cell values, fetch
//! pictures and embed them (or `IMAGE()` formulas) into the workbook.
//!
//! Cells are handled one at a time. A failing cell gets a note and a bump of
//! the matching counter; it never stops the run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::embed::{MAX_PICTURE_PX, prepare_picture};
use crate::error::{PreviewError, Result};
use crate::fetcher::{ImageSource, is_image_content_type};
use crate::marketplace::Marketplace;
use crate::url::{is_url_like, resolve_url};
use crate::workbook::{Sheet, SheetExt, Workbook};

/// Author name on every note the pipeline writes
pub const NOTE_AUTHOR: &str = "PreviewBot";
/// Smallest accepted picture edge
pub const MIN_PICTURE_PX: u32 = 40;
pub const DEFAULT_PICTURE_PX: u32 = 140;
/// Last row of an Excel worksheet
pub const MAX_HEADER_ROW: u32 = 1_048_576;

/// How a URL cell is turned into a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Download the picture and anchor it on the cell
    #[default]
    Picture,
    /// Write an `=IMAGE("url")` formula and let Excel fetch it
    Formula,
    /// Try a picture, fall back to the formula when the download fails
    Auto,
}

impl FromStr for EmbedMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "picture" | "image" | "anchor" => Ok(EmbedMode::Picture),
            "formula" => Ok(EmbedMode::Formula),
            "auto" => Ok(EmbedMode::Auto),
            other => Err(PreviewError::InvalidOption(format!(
                "unknown embed mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SheetSelection {
    #[default]
    All,
    One(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOptions {
    pub marketplace: Marketplace,
    /// Keep the marketplace template rows at their original height
    pub keep_header_heights: bool,
    pub sheets: SheetSelection,
    /// Row holding the column names, 1-based
    pub header_row: u32,
    pub width_px: u32,
    pub height_px: u32,
    pub keep_notes: bool,
    /// Put previews in new `*_preview` columns instead of on top of the URL
    pub create_adjacent: bool,
    /// Header names of the URL columns; empty means auto-detect per sheet
    pub columns: Vec<String>,
    pub mode: EmbedMode,
    /// Look up the content type and skip links that are not images
    pub check_content_type: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            marketplace: Marketplace::default(),
            keep_header_heights: true,
            sheets: SheetSelection::All,
            header_row: 1,
            width_px: DEFAULT_PICTURE_PX,
            height_px: DEFAULT_PICTURE_PX,
            keep_notes: true,
            create_adjacent: false,
            columns: Vec::new(),
            mode: EmbedMode::default(),
            check_content_type: true,
        }
    }
}

impl ProcessOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HEADER_ROW).contains(&self.header_row) {
            return Err(PreviewError::InvalidOption(format!(
                "header row must be between 1 and {}",
                MAX_HEADER_ROW
            )));
        }
        let sizes = MIN_PICTURE_PX..=MAX_PICTURE_PX;
        if !sizes.contains(&self.width_px) || !sizes.contains(&self.height_px) {
            return Err(PreviewError::InvalidOption(format!(
                "picture size must be between {}px and {}px",
                MIN_PICTURE_PX, MAX_PICTURE_PX
            )));
        }
        Ok(())
    }

    pub fn preserve_top_rows(&self) -> u32 {
        if self.keep_header_heights {
            self.marketplace.header_rows()
        } else {
            0
        }
    }

    /// Edge length used to size rows and columns
    pub fn cell_px(&self) -> u32 {
        self.width_px.max(self.height_px)
    }

    /// Names of the sheets the run touches, in workbook order
    pub fn target_sheets(&self, workbook: &Workbook) -> Result<Vec<String>> {
        match &self.sheets {
            SheetSelection::All => Ok(workbook.sheet_names()),
            SheetSelection::One(name) => match workbook.sheet(name) {
                Some(_) => Ok(vec![name.clone()]),
                None => Err(PreviewError::UnknownSheet(name.clone())),
            },
        }
    }

    /// URL columns of one sheet, sorted
    pub fn target_columns(&self, sheet: &Sheet) -> Vec<u32> {
        let columns: BTreeSet<u32> = if self.columns.is_empty() {
            sheet.detect_url_columns(self.header_row).into_iter().collect()
        } else {
            sheet
                .columns_by_names(&self.columns, self.header_row)
                .into_iter()
                .collect()
        };
        columns.into_iter().collect()
    }
}

/// Per-sheet overview shown before processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub target_columns: usize,
    pub url_cells: usize,
}

/// Counters reported while and after processing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub total: usize,
    pub processed: usize,
    pub inserted: usize,
    pub formulas: usize,
    pub skipped_non_image: usize,
    pub failed: usize,
}

impl ProcessStats {
    /// Share of URL cells handled so far, 0.0 ..= 1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }

    pub fn status_line(&self) -> String {
        format!(
            "Processed {}/{} | inserted:{}, formulas:{}, skipped:{}, failed:{}",
            self.processed,
            self.total,
            self.inserted,
            self.formulas,
            self.skipped_non_image,
            self.failed
        )
    }
}

fn url_cells_in(sheet: &Sheet, columns: &[u32], header_row: u32) -> usize {
    (header_row.saturating_add(1)..=sheet.max_row())
        .flat_map(|r| columns.iter().map(move |&c| (r, c)))
        .filter(|&(r, c)| sheet.text(r, c).is_some_and(|v| is_url_like(&v)))
        .count()
}

/// Count target columns and URL cells for every sheet the run would touch
pub fn summarize(workbook: &Workbook, options: &ProcessOptions) -> Result<Vec<SheetSummary>> {
    options.validate()?;
    let mut rows = Vec::new();
    for name in options.target_sheets(workbook)? {
        let sheet = workbook
            .sheet(&name)
            .ok_or_else(|| PreviewError::UnknownSheet(name.clone()))?;
        let columns = options.target_columns(sheet);
        rows.push(SheetSummary {
            url_cells: url_cells_in(sheet, &columns, options.header_row),
            target_columns: columns.len(),
            sheet: name,
        });
    }
    Ok(rows)
}

/// `IMAGE()` formula for a URL, with the Excel future-function prefix
pub fn image_formula(url: &str) -> String {
    format!("_xlfn.IMAGE(\"{}\")", url.replace('"', "\"\""))
}

/// Insert one `*_preview` column right of each source column
///
/// Returns `(source, preview)` pairs with positions valid after all inserts.
fn insert_preview_columns(sheet: &mut Sheet, sources: &[u32], header_row: u32) -> Vec<(u32, u32)> {
    let mut pairs = Vec::with_capacity(sources.len());
    for (inserted, &col) in sources.iter().enumerate() {
        let source = col + inserted as u32;
        let preview = source + 1;
        sheet.insert_column(preview);

        let base = match sheet.text(header_row, source) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => format!("Col {}", col),
        };
        sheet.set_text(header_row, preview, &format!("{}_preview", base));
        pairs.push((source, preview));
    }
    pairs
}

enum Outcome {
    Inserted,
    Formula,
    Skipped(Option<String>),
    Failed(PreviewError),
}

struct Cell<'a> {
    row: u32,
    col: u32,
    url: &'a str,
}

async fn embed_picture<S: ImageSource>(
    sheet: &mut Sheet,
    cell: &Cell<'_>,
    options: &ProcessOptions,
    source: &S,
) -> Result<()> {
    let bytes = source.fetch(cell.url).await?;
    let data = prepare_picture(&bytes, options.width_px, options.height_px)?;
    sheet.add_picture(cell.row, cell.col, &data)
}

async fn preview_cell<S: ImageSource>(
    sheet: &mut Sheet,
    cell: &Cell<'_>,
    options: &ProcessOptions,
    source: &S,
) -> (Outcome, Option<String>) {
    if options.check_content_type {
        let ct = source.content_type(cell.url).await;
        if !is_image_content_type(ct.as_deref()) {
            let note = format!(
                "Skipped (non-image: {})\n{}",
                ct.as_deref().unwrap_or("unknown"),
                cell.url
            );
            return (Outcome::Skipped(ct), Some(note));
        }
    }

    let original = format!("Original URL:\n{}", cell.url);
    match options.mode {
        EmbedMode::Formula => {
            sheet.set_formula(cell.row, cell.col, &image_formula(cell.url));
            (Outcome::Formula, Some(original))
        }
        EmbedMode::Picture => match embed_picture(sheet, cell, options, source).await {
            Ok(()) => (Outcome::Inserted, Some(original)),
            Err(e) => {
                let note = format!("Preview failed; kept value.\n{}\nError: {}", cell.url, e);
                (Outcome::Failed(e), Some(note))
            }
        },
        EmbedMode::Auto => match embed_picture(sheet, cell, options, source).await {
            Ok(()) => (Outcome::Inserted, Some(original)),
            Err(e) => {
                log::info!("picture failed for {} ({}), writing formula", cell.url, e);
                sheet.set_formula(cell.row, cell.col, &image_formula(cell.url));
                let note = format!(
                    "Embedded as formula; picture failed.\n{}\nError: {}",
                    cell.url, e
                );
                (Outcome::Formula, Some(note))
            }
        },
    }
}

/// Embed previews for every URL cell of the selected sheets
///
/// `progress` is called after each URL cell with the running counters.
///
/// # Arguments
/// * `workbook` - Workbook to modify in place
/// * `options` - Run settings
/// * `source` - Where pictures and content types come from
/// * `progress` - Callback receiving the counters after every URL cell
///
/// # Returns
/// * `Result<ProcessStats>` - Final counters, or an error when the options
///   do not fit the workbook
pub async fn process<S, P>(
    workbook: &mut Workbook,
    options: &ProcessOptions,
    source: &S,
    mut progress: P,
) -> Result<ProcessStats>
where
    S: ImageSource + Sync,
    P: FnMut(&ProcessStats) + Send,
{
    let summary = summarize(workbook, options)?;
    let mut stats = ProcessStats {
        total: summary.iter().map(|s| s.url_cells).sum(),
        ..Default::default()
    };
    let notes_enabled = options.keep_notes && !options.create_adjacent;

    for name in options.target_sheets(workbook)? {
        let sheet = workbook
            .sheet_mut(&name)
            .ok_or_else(|| PreviewError::UnknownSheet(name.clone()))?;
        let sources = options.target_columns(sheet);
        if sources.is_empty() {
            log::info!("sheet '{}': no URL columns, skipped", name);
            continue;
        }

        let pairs: Vec<(u32, u32)> = if options.create_adjacent {
            insert_preview_columns(sheet, &sources, options.header_row)
        } else {
            sources.iter().map(|&c| (c, c)).collect()
        };
        let previews: Vec<u32> = pairs.iter().map(|&(_, p)| p).collect();
        sheet.adjust_dimensions(&previews, options.cell_px(), options.preserve_top_rows());

        for row in options.header_row.saturating_add(1)..=sheet.max_row() {
            for &(src, col) in &pairs {
                let url = match sheet.text(row, src) {
                    Some(v) if is_url_like(&v) => resolve_url(&v),
                    _ => continue,
                };
                let cell = Cell { row, col, url: &url };

                let (outcome, note) = preview_cell(sheet, &cell, options, source).await;
                match outcome {
                    Outcome::Inserted => stats.inserted += 1,
                    Outcome::Formula => stats.formulas += 1,
                    Outcome::Skipped(ct) => {
                        log::info!(
                            "{}!{}:{} skipped, content type {}",
                            name,
                            row,
                            col,
                            ct.as_deref().unwrap_or("unknown")
                        );
                        stats.skipped_non_image += 1;
                    }
                    Outcome::Failed(e) => {
                        log::warn!("{}!{}:{} preview failed for {}: {}", name, row, col, url, e);
                        stats.failed += 1;
                    }
                }
                if let (true, Some(text)) = (notes_enabled, note) {
                    sheet.set_note(row, col, NOTE_AUTHOR, &text);
                }

                stats.processed += 1;
                progress(&stats);
            }
        }
    }

    log::info!("{}", stats.status_line().replacen("Processed", "Completed", 1));
    Ok(stats)
}
