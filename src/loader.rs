use std::io::Cursor;
use std::path::Path;

use crate::error::{PreviewError, Result};
use crate::workbook::{SheetExt, Workbook};

/// Load an uploaded Excel file into a workbook
///
/// The whole document is kept, not just cell values, so saving it again
/// gives back the same file plus whatever the pipeline added.
///
/// # Arguments
/// * `bytes` - Raw `.xlsx` file content
///
/// # Returns
/// * `Result<Workbook>` - The loaded workbook or an error
///
/// # Examples
/// ```no_run
/// use image_opening::loader::from_xlsx_bytes;
///
/// let data = std::fs::read("masterfile.xlsx").unwrap();
/// match from_xlsx_bytes(&data) {
///     Ok(wb) => println!("Loaded {} sheets", wb.sheet_count()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Workbook> {
    let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
        .map_err(|e| PreviewError::Read(e.to_string()))?;
    let workbook = Workbook::from_document(book);
    if workbook.sheet_count() == 0 {
        return Err(PreviewError::NoSheets);
    }

    for name in workbook.sheet_names() {
        if let Some(sheet) = workbook.sheet(&name) {
            log::debug!(
                "loaded sheet '{}' ({} rows x {} cols)",
                name,
                sheet.max_row(),
                sheet.max_col()
            );
        }
    }

    Ok(workbook)
}

/// Load an Excel file from disk
pub fn from_xlsx_file(path: impl AsRef<Path>) -> Result<Workbook> {
    let bytes = std::fs::read(path)?;
    from_xlsx_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;

    // Written by a different library, the way real templates arrive
    fn fixture() -> Vec<u8> {
        let mut workbook = XlsxWorkbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Items").unwrap();
        sheet.write_string(0, 0, "SKU").unwrap();
        sheet.write_string(0, 1, "Image").unwrap();
        sheet.write_string(1, 0, "A-1").unwrap();
        sheet.write_string(1, 1, "https://x.io/a.png").unwrap();
        sheet.write_number(2, 0, 42.0).unwrap();
        sheet.write_formula(2, 2, "=1+1").unwrap();
        let other = workbook.add_worksheet();
        other.set_name("Notes").unwrap();
        other.write_string(3, 3, "far away").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn loads_every_sheet_with_one_based_positions() {
        let wb = from_xlsx_bytes(&fixture()).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Items", "Notes"]);

        let items = wb.sheet("Items").unwrap();
        assert_eq!(items.text(1, 1).as_deref(), Some("SKU"));
        assert_eq!(items.text(2, 2).as_deref(), Some("https://x.io/a.png"));
        assert_eq!(items.text(3, 1), None);
        assert_eq!(items.max_row(), 3);

        let notes = wb.sheet("Notes").unwrap();
        assert_eq!(notes.text(4, 4).as_deref(), Some("far away"));
    }

    #[test]
    fn keeps_formulas() {
        let wb = from_xlsx_bytes(&fixture()).unwrap();
        let items = wb.sheet("Items").unwrap();
        assert!(items.formula(3, 3).is_some_and(|f| f.contains("1+1")));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            from_xlsx_bytes(b"definitely not a zip"),
            Err(PreviewError::Read(_))
        ));
    }
}
