use exn::ResultExt;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

const QUALITY: u8 = 95;

/// Crop the right half of a fanart image (JPEG or PNG) into a JPEG poster.
///
/// Fanart is the full two-page jacket scan; the right half is the front
/// cover. The crop spans `[width / 2, width)` horizontally at full height.
#[instrument(skip_all, fields(bytes = fanart.len()))]
pub fn poster_from_fanart(fanart: &[u8]) -> Result<Vec<u8>> {
    if fanart.is_empty() {
        exn::bail!(ErrorKind::EmptyImage);
    }
    let image = image::load_from_memory(fanart).or_raise(|| ErrorKind::Decode)?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::Dimensions { width, height });
    }
    let left = width / 2;
    let poster = image.crop_imm(left, 0, width - left, height).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, QUALITY)
        .encode(poster.as_raw(), poster.width(), poster.height(), ExtendedColorType::Rgb8)
        .or_raise(|| ErrorKind::Encode)?;
    tracing::debug!(width = poster.width(), height = poster.height(), bytes = out.len(), "Poster cropped");
    Ok(out)
}
