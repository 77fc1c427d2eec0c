//! Single-band rasters on a north-up affine grid.

pub mod geotiff;
pub mod ops;

use geo::Coord;
use ndarray::Array2;

pub use geotiff::{read_geotiff, write_geotiff, write_rgba_geotiff};
pub use ops::{mask, touched_cells, upscale_nearest};

/// Maps pixel (row, col) to map coordinates of the pixel's upper-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        GeoTransform {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// Fractional (row, col) of a map coordinate; pixel (r, c) spans
    /// `r..r + 1` and `c..c + 1`.
    pub fn to_pixel(&self, point: Coord<f64>) -> (f64, f64) {
        (
            (point.y - self.origin_y) / self.pixel_height,
            (point.x - self.origin_x) / self.pixel_width,
        )
    }

    /// Transform of a sub-grid starting at (row, col).
    pub fn offset(&self, row: usize, col: usize) -> GeoTransform {
        GeoTransform {
            origin_x: self.origin_x + col as f64 * self.pixel_width,
            origin_y: self.origin_y + row as f64 * self.pixel_height,
            ..*self
        }
    }

    /// Transform with pixels `factor` times smaller.
    pub fn upscale(&self, factor: usize) -> GeoTransform {
        GeoTransform {
            pixel_width: self.pixel_width / factor as f64,
            pixel_height: self.pixel_height / factor as f64,
            ..*self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Values indexed by (row, col).
    pub data: Array2<f32>,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
}

impl Raster {
    pub fn new(data: Array2<f32>, transform: GeoTransform, nodata: Option<f64>) -> Self {
        Raster {
            data,
            transform,
            nodata,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Whether a value is real data rather than nodata or NaN.
    pub fn is_valid(&self, value: f32) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.nodata {
            Some(nodata) => value as f64 != nodata && value != nodata as f32,
            None => true,
        }
    }
}

// -- Tests -------------------------------------------------------------------
