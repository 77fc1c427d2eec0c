//! Polygon masking and resampling.

use std::{
    collections::{BTreeMap, BTreeSet},
    iter,
    ops::Range,
};

use geo::MultiPolygon;
use ndarray::Array2;

use super::{GeoTransform, Raster};

/// A point in fractional pixel space, (row, col).
type Pixel = (f64, f64);

/// Every (row, col) of a `rows` x `cols` grid whose interior the geometry
/// reaches, in row-major order. Cells meeting the geometry only along their
/// border are not touched.
///
/// Cells crossed by an edge are found by walking each edge row by row; cells
/// inside the geometry by an even-odd scan of each row's centre line.
pub fn touched_cells(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    geometry: &MultiPolygon<f64>,
) -> Vec<(usize, usize)> {
    let mut cells = BTreeSet::new();

    for polygon in &geometry.0 {
        // Per polygon, so overlapping parts do not cancel out.
        let mut crossings: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for ring in iter::once(polygon.exterior()).chain(polygon.interiors()) {
            let points: Vec<Pixel> = ring.coords().map(|c| transform.to_pixel(*c)).collect();
            for edge in points.windows(2) {
                crossed_cells(edge[0], edge[1], rows, cols, &mut cells);
                centre_crossings(edge[0], edge[1], rows, &mut crossings);
            }
        }

        for (row, mut xs) in crossings {
            xs.sort_by(f64::total_cmp);
            for pair in xs.chunks_exact(2) {
                for col in centre_span(pair[0], pair[1], cols) {
                    cells.insert((row, col));
                }
            }
        }
    }

    cells.into_iter().collect()
}

/// Cells whose open interior the segment a-b passes through.
fn crossed_cells(a: Pixel, b: Pixel, rows: usize, cols: usize, cells: &mut BTreeSet<(usize, usize)>) {
    let ((ay, ax), (by, bx)) = (a, b);
    if ay == by {
        for row in open_span(ay, ay, rows) {
            for col in open_span(ax.min(bx), ax.max(bx), cols) {
                cells.insert((row, col));
            }
        }
        return;
    }

    let (low, high) = (ay.min(by), ay.max(by));
    let x_at = |y: f64| ax + (y - ay) * (bx - ax) / (by - ay);
    for row in open_span(low, high, rows) {
        let x0 = x_at((row as f64).max(low));
        let x1 = x_at(((row + 1) as f64).min(high));
        for col in open_span(x0.min(x1), x0.max(x1), cols) {
            cells.insert((row, col));
        }
    }
}

/// Where a-b crosses each row's centre line. Half-open in y, so a vertex on
/// a centre line is counted once.
fn centre_crossings(a: Pixel, b: Pixel, rows: usize, crossings: &mut BTreeMap<usize, Vec<f64>>) {
    let ((ay, ax), (by, bx)) = (a, b);
    if ay == by {
        return;
    }
    for row in centre_span(ay.min(by), ay.max(by), rows) {
        let y = row as f64 + 0.5;
        crossings
            .entry(row)
            .or_default()
            .push(ax + (y - ay) * (bx - ax) / (by - ay));
    }
}

/// Indices whose open unit interval meets `[lo, hi]`.
fn open_span(lo: f64, hi: f64, len: usize) -> Range<usize> {
    clamp_span(lo.floor(), hi.ceil(), len)
}

/// Indices whose centre lies in `[lo, hi)`.
fn centre_span(lo: f64, hi: f64, len: usize) -> Range<usize> {
    clamp_span((lo - 0.5).ceil(), (hi - 0.5).ceil(), len)
}

fn clamp_span(start: f64, end: f64, len: usize) -> Range<usize> {
    let (start, end) = (start.max(0.0), end.min(len as f64));
    if start >= end {
        return 0..0;
    }
    start as usize..end as usize
}

/// Clips a raster to a geometry, all-touched and cropped to the touched
/// extent. Pixels outside the geometry take the nodata value, or `f32::MIN`
/// when the raster has none. Returns `None` when no pixel is touched.
pub fn mask(raster: &Raster, geometry: &MultiPolygon<f64>) -> Option<Raster> {
    let cells = touched_cells(&raster.transform, raster.height(), raster.width(), geometry);

    let row0 = cells.iter().map(|&(r, _)| r).min()?;
    let row1 = cells.iter().map(|&(r, _)| r).max()?;
    let col0 = cells.iter().map(|&(_, c)| c).min()?;
    let col1 = cells.iter().map(|&(_, c)| c).max()?;

    let nodata = raster.nodata.unwrap_or(f32::MIN as f64);
    let mut data = Array2::from_elem((row1 - row0 + 1, col1 - col0 + 1), nodata as f32);
    for (row, col) in cells {
        data[[row - row0, col - col0]] = raster.data[[row, col]];
    }

    Some(Raster::new(
        data,
        raster.transform.offset(row0, col0),
        Some(nodata),
    ))
}

/// Nearest-neighbour upscale: each pixel becomes a `factor` x `factor` block.
pub fn upscale_nearest(raster: &Raster, factor: usize) -> Raster {
    let factor = factor.max(1);
    let shape = (raster.height() * factor, raster.width() * factor);
    let data = Array2::from_shape_fn(shape, |(row, col)| {
        raster.data[[row / factor, col / factor]]
    });

    Raster::new(data, raster.transform.upscale(factor), raster.nodata)
}

// -- Tests -------------------------------------------------------------------
