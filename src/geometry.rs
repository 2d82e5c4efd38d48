//! Pixel to spreadsheet unit conversions.

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Column width, in character units, that fits `px` pixels.
pub fn px_to_col_width(px: u32) -> f64 {
    round2(px as f64 / 7.0)
}

/// Row height, in points, that fits `px` pixels.
pub fn px_to_row_height(px: u32) -> f64 {
    round2(px as f64 * 0.75)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_width_rounds_to_two_places() {
        assert_eq!(px_to_col_width(140), 20.0);
        assert_eq!(px_to_col_width(100), 14.29);
        assert_eq!(px_to_col_width(0), 0.0);
    }

    #[test]
    fn row_height_is_three_quarters_of_pixels() {
        assert_eq!(px_to_row_height(140), 105.0);
        assert_eq!(px_to_row_height(41), 30.75);
    }
}
