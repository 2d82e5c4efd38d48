use image::ImageFormat;
use image::imageops::FilterType;
use std::io::Cursor;

use crate::error::{PreviewError, Result};

/// Largest accepted picture edge; 545px maps to Excel's 409pt row height limit
pub const MAX_PICTURE_PX: u32 = 545;

/// Decode a fetched picture and re-encode it as a `width` x `height` PNG
///
/// The picture is stretched to the exact box so it lines up with the resized
/// cell. Re-encoding also lets formats the workbook writer cannot embed
/// directly (WebP, TIFF) end up in the file.
///
/// # Arguments
/// * `bytes` - Raw image bytes as downloaded
/// * `width` - Target width in pixels
/// * `height` - Target height in pixels
///
/// # Returns
/// * `Result<Vec<u8>>` - PNG bytes or a decode/encode error
pub fn prepare_picture(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let sizes = 1..=MAX_PICTURE_PX;
    if !sizes.contains(&width) || !sizes.contains(&height) {
        return Err(PreviewError::InvalidOption(format!(
            "picture box {}x{} is outside 1..={}px",
            width, height, MAX_PICTURE_PX
        )));
    }
    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize_exact(width, height, FilterType::Triangle);

    let mut out = Vec::new();
    resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}
