//! The uploaded workbook and the sheet operations the preview pipeline needs.
//!
//! The document is edited in place: whatever the pipeline does not touch
//! (number formats, styles, merged ranges, hidden sheets, existing comments
//! and drawings, data validation) is written back exactly as it was read.
//! Rows and columns are 1-based, matching what users see in a spreadsheet
//! application.

use std::collections::BTreeMap;
use std::io::Write;

use umya_spreadsheet::helper::coordinate::coordinate_from_index;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::{Comment, Image, Spreadsheet, Worksheet};

use crate::error::{PreviewError, Result};
use crate::geometry::{px_to_col_width, px_to_row_height};
use crate::url::is_url_like;

/// Number of data rows scanned below the header when guessing URL columns
pub const DETECT_SCAN_ROWS: u32 = 50;

pub type Sheet = Worksheet;

/// Comment attached to a cell
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub author: String,
    pub text: String,
}

fn is_at(comment: &Comment, row: u32, col: u32) -> bool {
    let coordinate = comment.get_coordinate();
    *coordinate.get_row_num() == row && *coordinate.get_col_num() == col
}

/// Cell, dimension and drawing access on top of a worksheet
pub trait SheetExt {
    /// Last used row (0 for an empty sheet)
    fn max_row(&self) -> u32;
    /// Last used column (0 for an empty sheet)
    fn max_col(&self) -> u32;

    /// String content of a cell; numbers, booleans and formulas are not text
    fn text(&self, row: u32, col: u32) -> Option<String>;
    /// Formula text without the leading `=`
    fn formula(&self, row: u32, col: u32) -> Option<String>;
    fn set_text(&mut self, row: u32, col: u32, value: &str);
    fn set_formula(&mut self, row: u32, col: u32, formula: &str);

    fn note(&self, row: u32, col: u32) -> Option<Note>;
    /// Attach a note, replacing any comment already on the cell
    fn set_note(&mut self, row: u32, col: u32, author: &str, text: &str);

    /// Anchor an encoded picture at the top-left corner of a cell
    ///
    /// The picture keeps its pixel size, so it should already be scaled.
    fn add_picture(&mut self, row: u32, col: u32, png: &[u8]) -> Result<()>;
    fn has_picture(&self, row: u32, col: u32) -> bool;
    fn picture_count(&self) -> usize;

    fn column_width(&self, col: u32) -> Option<f64>;
    /// Height of a row that was given one explicitly
    fn row_height(&self, row: u32) -> Option<f64>;

    /// Header label for every column, `Col {c}` where the header cell holds no text
    fn headers(&self, header_row: u32) -> Vec<String>;
    /// Columns holding at least one URL-like value in the rows right below the header
    fn detect_url_columns(&self, header_row: u32) -> Vec<u32>;
    /// Map header names to column indexes, keeping the order of `names`
    ///
    /// Names without a matching header are dropped. When a header appears
    /// twice the rightmost column wins.
    fn columns_by_names<S: AsRef<str>>(&self, names: &[S], header_row: u32) -> Vec<u32>;

    /// Insert an empty column at `at`, moving everything at or right of it one column right
    fn insert_column(&mut self, at: u32);
    /// Size preview columns and data rows so a `px` square picture fits
    ///
    /// The first `preserve_top_rows` rows keep their height.
    fn adjust_dimensions(&mut self, columns: &[u32], px: u32, preserve_top_rows: u32);
}

impl SheetExt for Worksheet {
    fn max_row(&self) -> u32 {
        self.get_highest_row()
    }

    fn max_col(&self) -> u32 {
        self.get_highest_column()
    }

    fn text(&self, row: u32, col: u32) -> Option<String> {
        let cell = self.get_cell((col, row))?;
        if !cell.get_formula().is_empty() || cell.get_data_type() != "s" {
            return None;
        }
        Some(cell.get_value().into_owned())
    }

    fn formula(&self, row: u32, col: u32) -> Option<String> {
        let formula = self.get_cell((col, row))?.get_formula();
        (!formula.is_empty()).then(|| formula.to_string())
    }

    fn set_text(&mut self, row: u32, col: u32, value: &str) {
        self.get_cell_mut((col, row)).set_value_string(value);
    }

    fn set_formula(&mut self, row: u32, col: u32, formula: &str) {
        self.get_cell_mut((col, row)).set_formula(formula);
    }

    fn note(&self, row: u32, col: u32) -> Option<Note> {
        self.get_comments()
            .iter()
            .find(|c| is_at(c, row, col))
            .map(|c| Note {
                author: c.get_author().to_string(),
                text: c.get_text().get_text().to_string(),
            })
    }

    fn set_note(&mut self, row: u32, col: u32, author: &str, text: &str) {
        self.get_comments_mut().retain(|c| !is_at(c, row, col));
        let mut comment = Comment::default();
        comment.new_comment(coordinate_from_index(&col, &row).as_str());
        comment.set_text_string(text);
        comment.set_author(author);
        self.add_comments(comment);
    }

    fn add_picture(&mut self, row: u32, col: u32, png: &[u8]) -> Result<()> {
        // The drawing API takes a path; the bytes are read back right away
        let mut file = tempfile::Builder::new()
            .prefix("preview-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(png)?;
        file.flush()?;
        let path = file.path().to_str().ok_or_else(|| {
            PreviewError::Io(std::io::Error::other("temporary path is not UTF-8"))
        })?;

        let mut marker = MarkerType::default();
        marker.set_coordinate(coordinate_from_index(&col, &row));
        let mut image = Image::default();
        image.new_image(path, marker);
        self.add_image(image);
        Ok(())
    }

    fn has_picture(&self, row: u32, col: u32) -> bool {
        let coordinate = coordinate_from_index(&col, &row);
        self.get_image_collection()
            .iter()
            .any(|image| image.get_coordinate() == coordinate)
    }

    fn picture_count(&self) -> usize {
        self.get_image_collection().len()
    }

    fn column_width(&self, col: u32) -> Option<f64> {
        self.get_column_dimension_by_number(&col)
            .map(|c| *c.get_width())
    }

    fn row_height(&self, row: u32) -> Option<f64> {
        self.get_row_dimension(&row)
            .filter(|r| *r.get_custom_height())
            .map(|r| *r.get_height())
    }

    fn headers(&self, header_row: u32) -> Vec<String> {
        (1..=self.max_col())
            .map(|c| match self.text(header_row, c) {
                Some(s) => s.trim().to_string(),
                None => format!("Col {}", c),
            })
            .collect()
    }

    fn detect_url_columns(&self, header_row: u32) -> Vec<u32> {
        let first_row = header_row.saturating_add(1);
        let last_row = self
            .max_row()
            .min(header_row.saturating_add(DETECT_SCAN_ROWS));
        (1..=self.max_col())
            .filter(|&c| {
                (first_row..=last_row)
                    .any(|r| self.text(r, c).is_some_and(|v| is_url_like(&v)))
            })
            .collect()
    }

    fn columns_by_names<S: AsRef<str>>(&self, names: &[S], header_row: u32) -> Vec<u32> {
        let mut by_name: BTreeMap<String, u32> = BTreeMap::new();
        for c in 1..=self.max_col() {
            if let Some(s) = self.text(header_row, c) {
                by_name.insert(s.trim().to_string(), c);
            }
        }
        names
            .iter()
            .filter_map(|n| by_name.get(n.as_ref()).copied())
            .collect()
    }

    fn insert_column(&mut self, at: u32) {
        self.insert_new_column_by_index(&at, &1);
    }

    fn adjust_dimensions(&mut self, columns: &[u32], px: u32, preserve_top_rows: u32) {
        let width = px_to_col_width(px);
        for c in columns {
            self.get_column_dimension_by_number_mut(c).set_width(width);
        }
        let height = px_to_row_height(px);
        for r in preserve_top_rows.saturating_add(1)..=self.max_row() {
            let dimension = self.get_row_dimension_mut(&r);
            dimension.set_height(height);
            dimension.set_custom_height(true);
        }
    }
}

/// A loaded `.xlsx` document
pub struct Workbook {
    book: Spreadsheet,
}

impl Default for Workbook {
    fn default() -> Self {
        Workbook {
            book: umya_spreadsheet::new_file_empty_worksheet(),
        }
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(book: Spreadsheet) -> Self {
        Workbook { book }
    }

    pub fn document(&self) -> &Spreadsheet {
        &self.book
    }

    /// Append an empty sheet
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        self.book
            .new_sheet(name)
            .map_err(|e| PreviewError::InvalidOption(format!("cannot add sheet '{}': {}", name, e)))
    }

    pub fn sheet_count(&self) -> usize {
        self.book.get_sheet_collection().len()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book
            .get_sheet_collection()
            .iter()
            .map(|s| s.get_name().to_string())
            .collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.book
            .get_sheet_collection()
            .iter()
            .find(|s| s.get_name() == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.book
            .get_sheet_collection_mut()
            .iter_mut()
            .find(|s| s.get_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Items").unwrap();
        sheet.set_text(1, 1, "SKU");
        sheet.set_text(1, 2, " Main Image ");
        sheet.get_cell_mut((3, 1)).set_value_number(7);
        sheet.set_text(2, 1, "A-1");
        sheet.set_text(2, 2, "cdn.shop.com/a.jpg");
        sheet.set_text(3, 1, "A-2");
        sheet.set_text(3, 3, "https://x.io/b.png");
        wb
    }

    fn items(wb: &mut Workbook) -> &mut Sheet {
        wb.sheet_mut("Items").unwrap()
    }

    #[test]
    fn headers_fall_back_to_column_label() {
        let wb = catalog();
        assert_eq!(
            wb.sheet("Items").unwrap().headers(1),
            vec!["SKU", "Main Image", "Col 3"]
        );
    }

    #[test]
    fn numbers_and_formulas_are_not_text() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        sheet.set_formula(4, 1, "1+1");
        assert_eq!(sheet.text(1, 3), None);
        assert_eq!(sheet.text(4, 1), None);
        assert_eq!(sheet.formula(4, 1).as_deref(), Some("1+1"));
    }

    #[test]
    fn detects_url_columns_below_header() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        assert_eq!(sheet.detect_url_columns(1), vec![2, 3]);
        // header row 2 leaves only row 3 to scan
        assert_eq!(sheet.detect_url_columns(2), vec![3]);
    }

    #[test]
    fn detection_stops_after_scan_window() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Deep").unwrap();
        sheet.set_text(1, 1, "Image");
        sheet.set_text(2 + DETECT_SCAN_ROWS, 1, "https://x.io/a.png");
        assert!(sheet.detect_url_columns(1).is_empty());
    }

    #[test]
    fn header_row_at_the_limit_does_not_overflow() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        assert!(sheet.detect_url_columns(u32::MAX).is_empty());
        sheet.adjust_dimensions(&[2], 140, u32::MAX);
        assert_eq!(sheet.row_height(2), None);
    }

    #[test]
    fn columns_by_names_keeps_requested_order() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        assert_eq!(
            sheet.columns_by_names(&["Main Image", "SKU", "Missing"], 1),
            vec![2, 1]
        );
    }

    #[test]
    fn duplicate_header_resolves_to_rightmost() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        sheet.set_text(1, 4, "SKU");
        assert_eq!(sheet.columns_by_names(&["SKU"], 1), vec![4]);
    }

    #[test]
    fn insert_column_shifts_cells_right() {
        let mut wb = catalog();
        let sheet = items(&mut wb);

        sheet.insert_column(2);

        assert_eq!(sheet.max_col(), 4);
        assert_eq!(sheet.text(1, 1).as_deref(), Some("SKU"));
        assert_eq!(sheet.text(1, 2), None);
        assert_eq!(sheet.text(1, 3).as_deref(), Some(" Main Image "));
        assert_eq!(sheet.text(3, 4).as_deref(), Some("https://x.io/b.png"));
    }

    #[test]
    fn notes_replace_existing_comment() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        sheet.set_note(2, 2, "Buyer", "check colour");
        sheet.set_note(2, 2, "PreviewBot", "Original URL:\ncdn.shop.com/a.jpg");
        sheet.set_note(3, 1, "Buyer", "keep");

        assert_eq!(sheet.get_comments().len(), 2);
        assert_eq!(
            sheet.note(2, 2),
            Some(Note {
                author: "PreviewBot".into(),
                text: "Original URL:\ncdn.shop.com/a.jpg".into()
            })
        );
        assert_eq!(sheet.note(3, 1).unwrap().author, "Buyer");
        assert_eq!(sheet.note(1, 1), None);
    }

    #[test]
    fn adjust_dimensions_preserves_top_rows() {
        let mut wb = catalog();
        let sheet = items(&mut wb);
        sheet.adjust_dimensions(&[2], 140, 1);
        assert_eq!(sheet.column_width(2), Some(20.0));
        assert_eq!(sheet.row_height(1), None);
        assert_eq!(sheet.row_height(2), Some(105.0));
        assert_eq!(sheet.row_height(3), Some(105.0));
    }

    #[test]
    fn sheets_are_found_by_name() {
        let mut wb = catalog();
        wb.add_sheet("Lookup").unwrap();
        assert_eq!(wb.sheet_names(), vec!["Items", "Lookup"]);
        assert_eq!(wb.sheet_count(), 2);
        assert!(wb.sheet("Nope").is_none());
        assert!(wb.add_sheet("Items").is_err());
    }
}
