use anyhow::{Context, Result};
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use geo::Geometry as GeoGeometry;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry};
use log::{info, warn};
use serde_json::{Map, Value};
use std::path::Path;

use crate::geo_core::GeoCore;

/// One feature of a vector dataset: geometry plus attributes
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRow {
    pub geometry: Option<GeoGeometry<f64>>,
    pub properties: Map<String, Value>,
}

/// Vector dataset in EPSG:4326, rows in input order
/// Loaded from any GDAL vector format, written back as GeoJSON.
#[derive(Debug, Clone, Default)]
pub struct VectorDataset {
    rows: Vec<VectorRow>,
}

impl VectorDataset {
    pub fn new(rows: Vec<VectorRow>) -> Self {
        VectorDataset { rows }
    }

    /// Read the first layer of a vector file and reproject it to the GeoCore CRS
    pub fn load(path: &Path, geo_core: &GeoCore) -> Result<Self> {
        let dataset = Dataset::open(path).context(format!("Failed to open vector file: {:?}", path))?;

        let mut layer = dataset
            .layer(0)
            .context("Failed to access the first layer")?;

        let source_srs = layer
            .spatial_ref()
            .context("Input layer has no spatial reference (missing .prj?)")?;
        let source_wkt = source_srs
            .to_wkt()
            .context("Failed to export source spatial reference to WKT")?;
        let transformer = geo_core.transformer_from(&source_wkt)?;

        let mut rows = Vec::new();
        for (idx, feature) in layer.features().enumerate() {
            let properties: Map<String, Value> = feature
                .fields()
                .map(|(name, value)| (name, value.map(field_to_json).unwrap_or(Value::Null)))
                .collect();

            let geometry = match feature.geometry() {
                Some(geom) => match gdal_to_geo_geometry(geom) {
                    Ok(geo_geom) => Some(GeoCore::reproject(&transformer, &geo_geom)?),
                    Err(e) => {
                        warn!("Feature {}: unreadable geometry ({:#})", idx, e);
                        None
                    }
                },
                None => None,
            };

            rows.push(VectorRow {
                geometry,
                properties,
            });
        }

        info!(
            "Loaded {} features from {:?} (reprojected to {})",
            rows.len(),
            path,
            geo_core.target_crs()
        );

        Ok(VectorDataset { rows })
    }

    /// Build a dataset from a GeoJSON FeatureCollection (or single Feature) in EPSG:4326
    pub fn from_geojson(geojson: &GeoJson) -> Result<Self> {
        let features: Vec<&Feature> = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features.iter().collect(),
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => anyhow::bail!("Expected a Feature or FeatureCollection"),
        };

        let rows = features
            .into_iter()
            .map(|feature| {
                let geometry = match feature.geometry {
                    Some(ref geom) => {
                        let geo_geom: GeoGeometry<f64> = geom
                            .try_into()
                            .context("Failed to convert GeoJSON geometry to geo geometry")?;
                        Some(geo_geom)
                    }
                    None => None,
                };
                Ok(VectorRow {
                    geometry,
                    properties: feature.properties.clone().unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(VectorDataset { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[VectorRow] {
        &self.rows
    }

    /// Append a numeric column, `None` is written as null
    /// The column must have exactly one value per row.
    pub fn add_column(&mut self, name: &str, values: &[Option<f64>]) -> Result<()> {
        if values.len() != self.rows.len() {
            anyhow::bail!(
                "Column {} has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            );
        }

        for (row, value) in self.rows.iter_mut().zip(values) {
            let json_value = value.map(Value::from).unwrap_or(Value::Null);
            row.properties.insert(name.to_string(), json_value);
        }
        Ok(())
    }

    /// Convert to a GeoJSON FeatureCollection
    pub fn to_geojson(&self) -> GeoJson {
        let features = self
            .rows
            .iter()
            .map(|row| Feature {
                bbox: None,
                geometry: row
                    .geometry
                    .as_ref()
                    .map(|geom| Geometry::new(geojson::Value::from(geom))),
                id: None,
                properties: Some(row.properties.clone()),
                foreign_members: None,
            })
            .collect();

        GeoJson::from(FeatureCollection {
            bbox: None,
            foreign_members: None,
            features,
        })
    }

    /// Save to GeoJSON file, creating the parent directory
    pub fn to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context(format!("Failed to create output directory: {:?}", parent))?;
            }
        }

        let geojson_str = self.to_geojson().to_string();
        std::fs::write(path, geojson_str)
            .context(format!("Failed to write GeoJSON file: {:?}", path))?;

        info!("Saved {} features to {:?}", self.rows.len(), path);
        Ok(())
    }
}

/// Convert GDAL geometry to geo::Geometry through WKT and GEOS
fn gdal_to_geo_geometry(geom: &gdal::vector::Geometry) -> Result<GeoGeometry<f64>> {
    let wkt = geom.wkt().context("Failed to get WKT from GDAL geometry")?;

    use geos::Geometry as GeosGeometry;
    let geos_geom = GeosGeometry::new_from_wkt(&wkt).context("Failed to parse WKT with GEOS")?;

    let geo_geom: GeoGeometry<f64> = geos_geom
        .try_into()
        .context("Failed to convert GEOS geometry to geo")?;

    Ok(geo_geom)
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::IntegerValue(v) => Value::from(v),
        FieldValue::Integer64Value(v) => Value::from(v),
        FieldValue::RealValue(v) => Value::from(v),
        FieldValue::StringValue(v) => Value::from(v),
        FieldValue::IntegerListValue(v) => Value::from(v),
        FieldValue::Integer64ListValue(v) => Value::from(v),
        FieldValue::RealListValue(v) => Value::from(v),
        FieldValue::StringListValue(v) => Value::from(v),
        other => other.into_string().map(Value::from).unwrap_or(Value::Null),
    }
}
