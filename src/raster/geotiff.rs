//! GeoTIFF reading and writing.
//!
//! Georeferencing is read from either the model transformation tag or the
//! pixel scale and tie point pair. Written files carry pixel scale, tie
//! point, WGS 84 geokeys and, for float rasters, the GDAL nodata tag.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Seek, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, Array3};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind},
    tags::Tag,
    TiffResult,
};

use super::{GeoTransform, Raster};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Tag for a GeoTIFF or GDAL code. The decoder reports known codes as named
/// variants, so lookups must not use `Tag::Unknown`.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Geographic WGS 84, pixel-is-area.
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, // header, three keys
    1024, 0, 1, 2, // GTModelTypeGeoKey = geographic
    1025, 0, 1, 1, // GTRasterTypeGeoKey = pixel is area
    2048, 0, 1, 4326, // GeographicTypeGeoKey = EPSG:4326
];

pub fn read_geotiff(path: &Path) -> Result<Raster> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let transform = read_transform(&mut decoder)
        .with_context(|| format!("{} is not georeferenced", path.display()))?;
    let nodata = decoder
        .find_tag(geo_tag(GDAL_NODATA))?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let values: Vec<f32> = match decoder.read_image()? {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(anyhow!("Unsupported sample type in {}", path.display())),
    };

    let (rows, cols) = (height as usize, width as usize);
    if values.len() != rows * cols {
        return Err(anyhow!(
            "Expected a single band in {}, found {} samples for {}x{} pixels",
            path.display(),
            values.len(),
            cols,
            rows
        ));
    }

    let data = Array2::from_shape_vec((rows, cols), values)?;
    Ok(Raster::new(data, transform, nodata))
}

fn read_transform<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Some(matrix) = decoder.find_tag(geo_tag(MODEL_TRANSFORMATION))? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(GeoTransform::new(m[3], m[0], m[7], m[5]));
        }
    }

    let scale = decoder
        .find_tag(geo_tag(MODEL_PIXEL_SCALE))?
        .ok_or_else(|| anyhow!("Missing pixel scale"))?
        .into_f64_vec()?;
    let tiepoint = decoder
        .find_tag(geo_tag(MODEL_TIEPOINT))?
        .ok_or_else(|| anyhow!("Missing tie point"))?
        .into_f64_vec()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(anyhow!("Malformed georeferencing tags"));
    }

    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Ok(GeoTransform::new(x - i * sx, sx, y + j * sy, -sy))
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    directory: &mut DirectoryEncoder<'_, W, K>,
    transform: &GeoTransform,
) -> TiffResult<()> {
    let scale = [transform.pixel_width, -transform.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];

    directory.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
    directory.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    directory.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &WGS84_GEO_KEYS[..])?;
    Ok(())
}

/// Writes a single-band float GeoTIFF.
pub fn write_geotiff(path: &Path, raster: &Raster) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    let mut image = encoder.new_image::<colortype::Gray32Float>(
        raster.width() as u32,
        raster.height() as u32,
    )?;
    write_geo_tags(image.encoder(), &raster.transform)?;
    if let Some(nodata) = raster.nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    let values: Vec<f32> = raster.data.iter().copied().collect();
    image.write_data(&values)?;

    Ok(())
}

/// Writes bands shaped (4, rows, cols) as a pixel-interleaved RGBA GeoTIFF.
pub fn write_rgba_geotiff(path: &Path, bands: &Array3<u8>, transform: &GeoTransform) -> Result<()> {
    let (count, rows, cols) = bands.dim();
    if count != 4 {
        return Err(anyhow!("Expected 4 bands, got {}", count));
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    let mut image = encoder.new_image::<colortype::RGBA8>(cols as u32, rows as u32)?;
    write_geo_tags(image.encoder(), transform)?;

    let mut pixels = Vec::with_capacity(count * rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            for band in 0..count {
                pixels.push(bands[[band, row, col]]);
            }
        }
    }
    image.write_data(&pixels)?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
