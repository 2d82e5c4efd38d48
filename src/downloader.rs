use std::io::Cursor;

use crate::error::{PreviewError, Result};
use crate::workbook::Workbook;

/// MIME type of the generated download
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Convert a workbook to XLSX format
///
/// The loaded document is saved as a whole, so styles, number formats,
/// merged ranges, sheet visibility and existing drawings come back as they
/// were uploaded, next to the widths, heights, notes, pictures and formulas
/// the pipeline added.
///
/// # Arguments
/// * `workbook` - Reference to the workbook to convert
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use image_opening::workbook::{SheetExt, Workbook};
/// use image_opening::downloader::to_xlsx;
///
/// let mut wb = Workbook::new();
/// wb.add_sheet("Items").unwrap().set_text(1, 1, "SKU");
/// let bytes = to_xlsx(&wb).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(workbook: &Workbook) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(workbook.document(), &mut buffer)
        .map_err(|e| PreviewError::Write(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Name offered for the processed download
///
/// A trailing `.xlsx` (any case) is replaced by `-preview.xlsx`; other names
/// get the suffix appended as is.
///
/// # Examples
/// ```
/// use image_opening::downloader::output_file_name;
///
/// assert_eq!(output_file_name("Walmart.XLSX"), "Walmart-preview.xlsx");
/// assert_eq!(output_file_name("feed"), "feed-preview.xlsx");
/// ```
pub fn output_file_name(original: &str) -> String {
    let stem = match original.len().checked_sub(5) {
        Some(cut)
            if original.is_char_boundary(cut)
                && original[cut..].eq_ignore_ascii_case(".xlsx") =>
        {
            &original[..cut]
        }
        _ => original,
    };
    format!("{}-preview.xlsx", stem)
}
