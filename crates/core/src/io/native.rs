//! Native GeoTIFF reading/writing via the `tiff` crate.
//!
//! Whole-file decoding works on in-memory buffers; windowed reads of tiled
//! files live in `cog`. Georeferencing comes from ModelPixelScaleTag +
//! ModelTiepointTag; the CRS and nodata value are supplied by the caller
//! from catalog metadata.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Read a single-band GeoTIFF held in memory.
///
/// Fails when the file carries no ModelPixelScale/ModelTiepoint pair; a band
/// without georeferencing cannot be placed against a region.
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    // Full Sentinel-2 tiles exceed the crate's default buffer limits
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
    let data: Vec<T> = decoded_samples(result)?;

    // Multi-sample images decode interleaved; only single-band assets are valid here
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(read_geotransform(&mut decoder)?);

    Ok(raster)
}

/// Samples of a decoded image or tile, cast to `T`
pub(super) fn decoded_samples<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    Ok(match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

pub(super) fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|e| Error::Other(format!("No georeferencing (pixel scale tag): {}", e)))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|e| Error::Other(format!("No georeferencing (tiepoint tag): {}", e)))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Encode a Raster as a 32-bit float GeoTIFF in memory.
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    // GeoKey directory v1.1.0 with GTModelType=Projected and RasterPixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];

    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_georeferencing() {
        let mut band: Raster<f64> = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        band.set_transform(GeoTransform::new(801_500.0, 1_371_700.0, 10.0, -10.0));

        let bytes = write_geotiff_to_buffer(&band).unwrap();
        let decoded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(decoded.shape(), (2, 3));
        assert_eq!(decoded.get(1, 2).unwrap(), 6.0);
        assert_eq!(decoded.transform().origin_x, 801_500.0);
        assert_eq!(decoded.transform().origin_y, 1_371_700.0);
        assert_eq!(decoded.transform().pixel_height, -10.0);
    }

    #[test]
    fn decoded_band_crops_to_farm_window() {
        let mut band: Raster<f64> = Raster::filled(40, 40, 0.25);
        band.set_transform(GeoTransform::new(801_400.0, 1_371_700.0, 10.0, -10.0));

        let bytes = write_geotiff_to_buffer(&band).unwrap();
        let decoded: Raster<u16> = read_geotiff_from_buffer(&bytes).unwrap();
        let window = crate::vector::BBox::new(801_515.9, 1_371_314.4, 801_682.4, 1_371_511.4);

        let cropped = decoded.crop(&window).unwrap();
        assert_eq!(cropped.shape(), (21, 18));
        assert_eq!(cropped.transform().origin_x, 801_510.0);
    }

    #[test]
    fn missing_georeferencing_is_an_error() {
        let mut buf = Vec::new();
        TiffEncoder::new(Cursor::new(&mut buf))
            .unwrap()
            .write_image::<Gray32Float>(2, 2, &[0.1, 0.2, 0.3, 0.4])
            .unwrap();

        let err = read_geotiff_from_buffer::<f64>(&buf).unwrap_err();
        assert!(err.to_string().contains("georeferencing"), "{err}");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(read_geotiff_from_buffer::<f64>(b"not a tiff").is_err());
    }
}
