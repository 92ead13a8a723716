//! Windowed reads of tiled GeoTIFFs (COGs).
//!
//! The IFD of a cloud-optimized GeoTIFF sits at the front of the file, so a
//! short prefix is enough to learn the tile grid and georeferencing. Only
//! the tiles under a window are then fetched and decoded; everything else
//! in the file is never read.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;

use super::native::{decoded_samples, read_geotransform};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use crate::vector::BBox;

/// Tile grid of a single-band tiled GeoTIFF
#[derive(Debug, Clone)]
pub struct CogLayout {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub transform: GeoTransform,
    tile_offsets: Vec<u64>,
    tile_byte_counts: Vec<u64>,
}

/// Tiles and pixel extent covering one bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct TileWindow {
    /// Linear tile indices, row-major
    pub tiles: Vec<usize>,
    /// (min_col, min_row, max_col, max_row), max exclusive
    pub pixels: (usize, usize, usize, usize),
}

impl TileWindow {
    /// (rows, cols) of the assembled window
    pub fn shape(&self) -> (usize, usize) {
        let (c0, r0, c1, r1) = self.pixels;
        (r1 - r0, c1 - c0)
    }
}

impl CogLayout {
    /// Parse the first IFD from the leading bytes of a file.
    ///
    /// Fails when `header` stops before the IFD and its tag data end, when
    /// the image is stored in strips, or when it has no georeferencing.
    pub fn from_header(header: &[u8]) -> Result<Self> {
        let mut decoder = open(SparseFile::prefix(header))?;

        let (width, height) = decoder.dimensions().map_err(tiff_error)?;
        let tile_width = decoder.get_tag_u32(Tag::TileWidth).map_err(|_| not_tiled())?;
        let tile_height = decoder.get_tag_u32(Tag::TileLength).map_err(|_| not_tiled())?;
        let tile_offsets = decoder.get_tag_u64_vec(Tag::TileOffsets).map_err(tiff_error)?;
        let tile_byte_counts = decoder
            .get_tag_u64_vec(Tag::TileByteCounts)
            .map_err(tiff_error)?;
        let transform = read_geotransform(&mut decoder)?;

        let layout = Self {
            width,
            height,
            tile_width,
            tile_height,
            transform,
            tile_offsets,
            tile_byte_counts,
        };
        if layout.tile_offsets.len() != layout.tile_count()
            || layout.tile_byte_counts.len() != layout.tile_count()
        {
            return Err(Error::Other(format!(
                "Tile table lists {} offsets for {} tiles",
                layout.tile_offsets.len(),
                layout.tile_count()
            )));
        }
        Ok(layout)
    }

    pub fn tiles_across(&self) -> usize {
        (self.width as usize).div_ceil(self.tile_width as usize)
    }

    pub fn tiles_down(&self) -> usize {
        (self.height as usize).div_ceil(self.tile_height as usize)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_across() * self.tiles_down()
    }

    /// Byte range `(offset, length)` of one tile in the file
    pub fn tile_range(&self, tile: usize) -> Option<(u64, u64)> {
        Some((*self.tile_offsets.get(tile)?, *self.tile_byte_counts.get(tile)?))
    }

    /// Tiles needed for `bbox`, or `None` when it misses the image.
    ///
    /// Pixel bounds round outwards, the same way [`Raster::crop`] does.
    pub fn window(&self, bbox: &BBox) -> Option<TileWindow> {
        let (col_a, row_a) = self.transform.geo_to_pixel(bbox.min_x, bbox.max_y);
        let (col_b, row_b) = self.transform.geo_to_pixel(bbox.max_x, bbox.min_y);

        let min_col = col_a.min(col_b).floor().max(0.0);
        let min_row = row_a.min(row_b).floor().max(0.0);
        let max_col = col_a.max(col_b).ceil().min(f64::from(self.width));
        let max_row = row_a.max(row_b).ceil().min(f64::from(self.height));
        if !(min_col < max_col && min_row < max_row) {
            return None;
        }
        let (c0, r0, c1, r1) = (
            min_col as usize,
            min_row as usize,
            max_col as usize,
            max_row as usize,
        );

        let tw = self.tile_width as usize;
        let th = self.tile_height as usize;
        let across = self.tiles_across();
        let tiles = (r0 / th..r1.div_ceil(th))
            .flat_map(|tr| (c0 / tw..c1.div_ceil(tw)).map(move |tc| tr * across + tc))
            .collect();

        Some(TileWindow {
            tiles,
            pixels: (c0, r0, c1, r1),
        })
    }

    /// Decode the tiles of `window` into a georeferenced raster.
    ///
    /// `header` is the prefix passed to [`CogLayout::from_header`] and
    /// `tiles` maps each tile index of the window to its fetched bytes.
    pub fn read_window<T: RasterElement>(
        &self,
        header: &[u8],
        window: &TileWindow,
        tiles: Vec<(usize, Vec<u8>)>,
    ) -> Result<Raster<T>> {
        let mut file = SparseFile::prefix(header);
        for (tile, bytes) in tiles {
            let (offset, _) = self
                .tile_range(tile)
                .ok_or_else(|| Error::Other(format!("Tile {} outside the tile grid", tile)))?;
            file.insert(offset, bytes);
        }
        let mut decoder = open(file)?;

        let (c0, r0, _, _) = window.pixels;
        let (rows, cols) = window.shape();
        let mut raster: Raster<T> = Raster::filled(rows, cols, T::default_nodata());
        let tw = self.tile_width as usize;
        let th = self.tile_height as usize;
        let across = self.tiles_across();

        for &tile in &window.tiles {
            let index = u32::try_from(tile)
                .map_err(|_| Error::Other(format!("Tile index {} too large", tile)))?;
            let (data_w, data_h) = decoder.chunk_data_dimensions(index);
            let (data_w, data_h) = (data_w as usize, data_h as usize);
            let samples: Vec<T> = decoded_samples(decoder.read_chunk(index).map_err(tiff_error)?)?;
            if samples.len() != data_w * data_h {
                return Err(Error::InvalidDimensions {
                    width: data_w,
                    height: data_h,
                });
            }

            let tile_c0 = (tile % across) * tw;
            let tile_r0 = (tile / across) * th;
            let out = raster.data_mut();
            for r in 0..data_h {
                let Some(out_r) = (tile_r0 + r).checked_sub(r0).filter(|&v| v < rows) else {
                    continue;
                };
                for c in 0..data_w {
                    let Some(out_c) = (tile_c0 + c).checked_sub(c0).filter(|&v| v < cols) else {
                        continue;
                    };
                    out[(out_r, out_c)] = samples[r * data_w + c];
                }
            }
        }

        raster.set_transform(self.transform.offset(c0, r0));
        Ok(raster)
    }
}

fn open(file: SparseFile) -> Result<Decoder<SparseFile>> {
    Ok(Decoder::new(file).map_err(tiff_error)?.with_limits(Limits::unlimited()))
}

fn tiff_error(e: tiff::TiffError) -> Error {
    Error::Other(format!("TIFF decode error: {}", e))
}

fn not_tiled() -> Error {
    Error::UnsupportedDataType("GeoTIFF is stored in strips, not tiles".into())
}

/// A file known only in fetched pieces.
///
/// Reads outside the fetched ranges fail with `UnexpectedEof`.
struct SparseFile {
    segments: BTreeMap<u64, Vec<u8>>,
    pos: u64,
}

impl SparseFile {
    fn prefix(header: &[u8]) -> Self {
        let mut segments = BTreeMap::new();
        segments.insert(0, header.to_vec());
        Self { segments, pos: 0 }
    }

    fn insert(&mut self, offset: u64, bytes: Vec<u8>) {
        self.segments.insert(offset, bytes);
    }

    fn end(&self) -> u64 {
        self.segments
            .iter()
            .map(|(offset, bytes)| offset + bytes.len() as u64)
            .max()
            .unwrap_or(0)
    }
}

impl Read for SparseFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let hit = self
            .segments
            .range(..=self.pos)
            .next_back()
            .and_then(|(offset, bytes)| bytes.get((self.pos - offset) as usize..))
            .filter(|rest| !rest.is_empty());
        let Some(rest) = hit else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("byte {} was not fetched", self.pos),
            ));
        };
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SparseFile {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.end().checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        Ok(self.pos)
    }
}
