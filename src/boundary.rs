//! Administrative boundary layers loaded from GeoJSON.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{Dataset, Resource};

/// Country code column of the world layer.
pub const WORLD_COUNTRY_COLUMN: &str = "ISO_3";

/// How a layer's file name and columns map to admin level, country, P-code
/// and reference name.
pub trait BoundaryNaming: Send + Sync {
    fn admin_level(&self, layer: &Path) -> Result<u8>;
    fn country_column(&self) -> &str;
    fn pcode_column(&self, level: u8) -> String;
    fn reference_column(&self, level: u8) -> String;
}

/// OCHA layers, e.g. `polbnda_adm1_1m_ocha.geojson` with `alpha_3`,
/// `ADM1_PCODE` and `ADM1_REF` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct OchaNaming;

impl OchaNaming {
    const LEVEL_INDEX: usize = 11;
}

impl BoundaryNaming for OchaNaming {
    fn admin_level(&self, layer: &Path) -> Result<u8> {
        let name = layer
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        name.chars()
            .nth(Self::LEVEL_INDEX)
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
            .ok_or_else(|| anyhow!("No admin level in layer name `{}`", name))
    }

    fn country_column(&self) -> &str {
        "alpha_3"
    }

    fn pcode_column(&self, level: u8) -> String {
        format!("ADM{}_PCODE", level)
    }

    fn reference_column(&self, level: u8) -> String {
        format!("ADM{}_REF", level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub geometry: MultiPolygon<f64>,
    pub country: String,
    pub admin_level: u8,
    pub pcode: String,
    pub reference_name: String,
    /// Remaining attributes, stringified.
    pub properties: BTreeMap<String, String>,
}

/// Catalog resources holding the boundary layers.
#[derive(Debug, Default)]
pub struct BoundarySources<'a> {
    pub subnational: Vec<&'a Resource>,
    pub world: Option<&'a Resource>,
}

impl<'a> BoundarySources<'a> {
    pub fn from_dataset(dataset: &'a Dataset, subnational: &str, world: &str) -> Self {
        let mut sources = BoundarySources::default();
        for resource in &dataset.resources {
            if resource.name.contains(subnational) {
                sources.subnational.push(resource);
            }
            if resource.name.contains(world) {
                sources.world = Some(resource);
            }
        }
        sources
    }
}

/// Features of one admin layer for the given countries, sorted by P-code.
pub fn load_admin_layer(
    path: &Path,
    countries: &[String],
    naming: &dyn BoundaryNaming,
) -> Result<Vec<BoundaryFeature>> {
    let level = naming.admin_level(path)?;
    let country_column = naming.country_column();
    let pcode_column = naming.pcode_column(level);
    let reference_column = naming.reference_column(level);

    let mut features = Vec::new();
    for (geometry, properties) in read_features(path)? {
        let Some(country) = properties.get(country_column) else {
            continue;
        };
        if !countries.contains(country) {
            continue;
        }
        let Some(pcode) = properties.get(&pcode_column) else {
            warn!(layer = %path.display(), column = %pcode_column, "Feature without P-code");
            continue;
        };

        features.push(BoundaryFeature {
            geometry,
            country: country.clone(),
            admin_level: level,
            pcode: pcode.clone(),
            reference_name: properties.get(&reference_column).cloned().unwrap_or_default(),
            properties: properties
                .iter()
                .filter(|(k, _)| k.as_str() != country_column)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        });
    }

    features.sort_by(|a, b| a.pcode.cmp(&b.pcode));
    debug!(layer = %path.display(), level, features = features.len(), "Loaded admin layer");

    Ok(features)
}

/// Country outlines of the world layer, keyed by the `ISO_3` code.
pub struct WorldLayer {
    outlines: BTreeMap<String, MultiPolygon<f64>>,
}

impl WorldLayer {
    pub fn load(path: &Path) -> Result<Self> {
        let mut outlines: BTreeMap<String, MultiPolygon<f64>> = BTreeMap::new();
        for (geometry, properties) in read_features(path)? {
            if let Some(code) = properties.get(WORLD_COUNTRY_COLUMN) {
                outlines
                    .entry(code.clone())
                    .or_insert_with(|| MultiPolygon::new(Vec::new()))
                    .0
                    .extend(geometry.0);
            }
        }
        Ok(WorldLayer { outlines })
    }

    pub fn outline(&self, country: &str) -> Option<&MultiPolygon<f64>> {
        self.outlines.get(country)
    }
}

/// Polygonal features with their stringified properties. Features without
/// polygon geometry are skipped.
fn read_features(path: &Path) -> Result<Vec<(MultiPolygon<f64>, BTreeMap<String, String>)>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read boundary layer {}", path.display()))?;
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("Invalid GeoJSON in {}", path.display()))?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let Some(polygons) = into_multi_polygon(Geometry::try_from(geometry)?) else {
            debug!(layer = %path.display(), "Skipping non-polygon feature");
            continue;
        };

        let properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| stringify(v).map(|v| (k, v)))
            .collect();
        features.push((polygons, properties));
    }

    Ok(features)
}

fn into_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(m) => Some(m),
        Geometry::GeometryCollection(collection) => {
            let polygons: Vec<_> = collection
                .into_iter()
                .filter_map(into_multi_polygon)
                .flat_map(|m| m.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

fn stringify(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// -- Tests -------------------------------------------------------------------
