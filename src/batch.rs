//! Tile assembly for OCR submission.
//!
//! Accepted columns of a page are widened to the page's widest column and
//! stacked in groups into tiles, one OCR call per tile. The section-start
//! marker never touches pixels; it rides along as tile metadata.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat};

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::raster;
use crate::section::{ColumnContext, SectionColumn, SectionMarker};

/// Stacked columns submitted as one OCR unit.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Position among the page's tiles
    pub index: usize,
    /// Page the columns came from
    pub page: usize,
    /// Stacked pixels
    pub image: GrayImage,
    /// Columns in stacking order
    pub columns: Vec<ColumnContext>,
    /// Marker to prepend to the tile's recognised text
    pub marker: Option<SectionMarker>,
}

/// Groups a page's accepted columns into tiles.
#[derive(Debug, Clone, Default)]
pub struct BatchAssembler {
    config: BatchConfig,
}

impl BatchAssembler {
    /// Create an assembler.
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Tile the accepted columns of one page, preserving their order.
    pub fn assemble(&self, columns: &[SectionColumn]) -> Vec<Tile> {
        let Some(first) = columns.first() else {
            return Vec::new();
        };
        let page = first.context.page;
        let width = columns.iter().map(|c| c.image.width()).max().unwrap_or(0);
        let size = self.config.tile_size.max(1);

        columns
            .chunks(size)
            .enumerate()
            .map(|(index, chunk)| {
                let separators = self.config.separator_height * (chunk.len() as u32 - 1);
                let height = chunk.iter().map(|c| c.image.height()).sum::<u32>() + separators;
                let mut image = raster::white_canvas(width, height);

                let mut y = 0;
                for column in chunk {
                    raster::paste(&mut image, &column.image, 0, y);
                    y += column.image.height() + self.config.separator_height;
                }

                Tile {
                    index,
                    page,
                    image,
                    columns: chunk.iter().map(|c| c.context).collect(),
                    marker: chunk.iter().find_map(|c| c.marker.clone()),
                }
            })
            .collect()
    }
}

/// Encoded tile bytes ready for an OCR service.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    /// Encoded image
    pub bytes: Vec<u8>,
    /// Container format
    pub format: ImageFormat,
    /// JPEG quality used, when recompressed
    pub quality: Option<u8>,
}

impl EncodedTile {
    /// File extension for the format.
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            _ => "png",
        }
    }
}

/// Encode a tile losslessly, falling back to JPEG at decreasing quality
/// when the PNG exceeds the upload cap.
///
/// When even the lowest quality is over the cap the smallest attempt is
/// returned anyway.
pub fn encode_for_upload(tile: &Tile, config: &BatchConfig) -> Result<EncodedTile> {
    let mut png = Cursor::new(Vec::new());
    tile.image.write_to(&mut png, ImageFormat::Png)?;
    let png = png.into_inner();
    if png.len() <= config.upload_cap_bytes {
        return Ok(EncodedTile {
            bytes: png,
            format: ImageFormat::Png,
            quality: None,
        });
    }

    log::info!(
        "tile {} of page {} is {:.2} MB, recompressing",
        tile.index,
        tile.page,
        png.len() as f64 / (1024.0 * 1024.0)
    );
    let mut quality = config.jpeg_start_quality;
    loop {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&tile.image)
            .map_err(|e| Error::Encode(format!("JPEG encoding failed: {}", e)))?;

        if bytes.len() < config.upload_cap_bytes {
            log::debug!("tile {} recompressed to {} bytes (q={})", tile.index, bytes.len(), quality);
            return Ok(EncodedTile {
                bytes,
                format: ImageFormat::Jpeg,
                quality: Some(quality),
            });
        }
        if quality <= config.jpeg_min_quality {
            log::warn!(
                "tile {} still {} bytes at minimum quality, sending best effort",
                tile.index,
                bytes.len()
            );
            return Ok(EncodedTile {
                bytes,
                format: ImageFormat::Jpeg,
                quality: Some(quality),
            });
        }
        quality = quality
            .saturating_sub(config.jpeg_quality_step)
            .max(config.jpeg_min_quality);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionMarkerTag;
    use image::Luma;

    fn column(index: usize, width: u32, height: u32, start: bool) -> SectionColumn {
        let context = ColumnContext {
            page: 2,
            block: 0,
            column: index,
        };
        let image = GrayImage::from_pixel(width, height, Luma([0]));
        let mut col = SectionColumn::plain(context, image);
        if start {
            col.tag = SectionMarkerTag::Start;
            col.marker = Some(SectionMarker {
                code: "1612".to_string(),
            });
        }
        col
    }

    #[test]
    fn test_tiles_pad_to_page_width_and_stack() {
        let columns = vec![
            column(0, 100, 50, false),
            column(1, 120, 40, true),
            column(2, 80, 30, false),
        ];
        let tiles = BatchAssembler::default().assemble(&columns);
        assert_eq!(tiles.len(), 2);

        assert_eq!(tiles[0].image.dimensions(), (120, 110));
        // Padding right of the narrower column and the separator are white.
        assert_eq!(tiles[0].image.get_pixel(110, 10).0[0], 255);
        assert_eq!(tiles[0].image.get_pixel(10, 60).0[0], 255);
        assert_eq!(tiles[0].image.get_pixel(10, 75).0[0], 0);
        assert_eq!(tiles[0].marker.as_ref().map(|m| m.to_string()).as_deref(), Some("[CODE:1612]"));

        assert_eq!(tiles[1].image.dimensions(), (120, 30));
        assert!(tiles[1].marker.is_none());
        assert_eq!(tiles[1].columns[0].column, 2);
        assert_eq!(tiles[1].page, 2);
    }

    #[test]
    fn test_every_column_in_exactly_one_tile() {
        let columns: Vec<_> = (0..7).map(|i| column(i, 90, 20, false)).collect();
        let assembler = BatchAssembler::new(BatchConfig {
            tile_size: 3,
            ..Default::default()
        });
        let tiles = assembler.assemble(&columns);
        let order: Vec<usize> = tiles.iter().flat_map(|t| t.columns.iter().map(|c| c.column)).collect();
        assert_eq!(order, (0..7).collect::<Vec<_>>());
        assert!(assembler.assemble(&[]).is_empty());
    }

    #[test]
    fn test_encode_png_under_cap() {
        let tiles = BatchAssembler::default().assemble(&[column(0, 64, 64, false)]);
        let encoded = encode_for_upload(&tiles[0], &BatchConfig::default()).unwrap();
        assert_eq!(encoded.format, ImageFormat::Png);
        assert_eq!(encoded.extension(), "png");
        let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_encode_falls_back_to_jpeg() {
        let tiles = BatchAssembler::default().assemble(&[column(0, 64, 64, false)]);
        let config = BatchConfig {
            upload_cap_bytes: 16,
            ..Default::default()
        };
        let encoded = encode_for_upload(&tiles[0], &config).unwrap();
        assert_eq!(encoded.format, ImageFormat::Jpeg);
        // Nothing fits in 16 bytes, so the minimum quality is returned.
        assert_eq!(encoded.quality, Some(10));
    }
}
