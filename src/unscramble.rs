//! Reverses the tile scrambling applied to some pages.
//!
//! The host cuts each page into strips of `TILE_SIZE` pixels and swaps
//! every pair of neighbouring strips, first along the width and then along
//! the height. A trailing pair that does not fit entirely in the image is
//! left untouched. Swapping twice restores the input, so the same layout
//! both scrambles and unscrambles.

use crate::error::{JapscanError, Result};
use image::{imageops, DynamicImage, GenericImage, RgbImage};
use scraper::{Html, Selector};
use std::path::Path;
use tracing::debug;

pub const TILE_SIZE: u32 = 100;

/// One strip move along an axis: `len` pixels read at `src` land at `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strip {
    pub src: u32,
    pub dst: u32,
    pub len: u32,
}

/// Whether the page markup carries the scrambling marker.
pub fn is_scrambled(document: &Html, marker: &Selector) -> bool {
    document.select(marker).next().is_some()
}

/// Strip recipe for one axis of `extent` pixels.
pub fn layout(extent: u32) -> Vec<Strip> {
    let pair = TILE_SIZE * 2;
    let mut strips = Vec::new();
    let mut start = 0;

    while start < extent {
        if start + pair <= extent {
            strips.push(Strip { src: start, dst: start + TILE_SIZE, len: TILE_SIZE });
            strips.push(Strip { src: start + TILE_SIZE, dst: start, len: TILE_SIZE });
        } else {
            strips.push(Strip { src: start, dst: start, len: extent - start });
        }
        start += pair;
    }

    strips
}

/// Moves every tile of `input` to the place the layout gives it.
pub fn reassemble(input: &RgbImage) -> Result<RgbImage> {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
        return Err(JapscanError::decode(format!(
            "no tile layout for a {}x{} image",
            width, height
        )));
    }

    let columns = layout(width);
    let rows = layout(height);
    let mut output = RgbImage::new(width, height);

    for column in &columns {
        for row in &rows {
            let tile = imageops::crop_imm(input, column.src, row.src, column.len, row.len).to_image();
            output
                .copy_from(&tile, column.dst, row.dst)
                .map_err(|e| JapscanError::decode(e.to_string()))?;
        }
    }

    Ok(output)
}

/// Reads the scrambled file at `input_path` and writes the rebuilt page to
/// `output_path`, encoded after the output extension.
pub fn unscramble(input_path: &Path, output_path: &Path) -> Result<()> {
    let scrambled = image::io::Reader::open(input_path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| JapscanError::decode(format!("{}: {}", input_path.display(), e)))?;

    let (width, height) = (scrambled.width(), scrambled.height());
    debug!("unscrambling {} ({}x{})", input_path.display(), width, height);

    let rebuilt = reassemble(&scrambled.to_rgb8())?;
    DynamicImage::ImageRgb8(rebuilt).save(output_path)?;

    Ok(())
}
