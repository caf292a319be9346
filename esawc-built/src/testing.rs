//! In-process Earth Engine stand-in for unit tests.

use geo::{BooleanOps, ChamberlainDuquetteArea, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};
use std::cell::Cell;

use crate::collect::ee::expression::{Expression, ValueNode};
use crate::collect::ee::{ComputeBackend, MapRequest};
use crate::error::{BuiltupError, Result};

/// Synthetic WorldCover: every pixel inside `zone` is built-up, nothing exists outside it.
///
/// `reduceRegion` returns the intersected area in 10 m pixels, or `null` when
/// the region does not touch the zone.
pub struct FakeBackend {
    zone: MultiPolygon<f64>,
    fail_on_call: Option<usize>,
    calls: Cell<usize>,
}

impl FakeBackend {
    pub fn new(zone: Polygon<f64>) -> Self {
        FakeBackend {
            zone: MultiPolygon::new(vec![zone]),
            fail_on_call: None,
            calls: Cell::new(0),
        }
    }

    /// Fail with a service error on the n-th call (1-based)
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

fn parse_ring(value: &Value) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(|pair| Some((pair.get(0)?.as_f64()?, pair.get(1)?.as_f64()?)))
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::from(coords))
}

fn parse_polygon(value: &Value) -> Option<Polygon<f64>> {
    let exterior = parse_ring(value.as_array()?.first()?)?;
    Some(Polygon::new(exterior, vec![]))
}

/// Rebuild the geometry of a `GeometryConstructors.*` node
pub fn parse_geometry(node: &ValueNode) -> Option<MultiPolygon<f64>> {
    let coordinates = node.argument("coordinates")?.as_constant()?;
    match node.function_name()? {
        "GeometryConstructors.Polygon" => Some(MultiPolygon::new(vec![parse_polygon(coordinates)?])),
        "GeometryConstructors.MultiPolygon" => coordinates
            .as_array()?
            .iter()
            .map(parse_polygon)
            .collect::<Option<Vec<_>>>()
            .map(MultiPolygon::new),
        _ => None,
    }
}

impl ComputeBackend for FakeBackend {
    fn compute_value(&self, expression: &Expression) -> Result<Value> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if self.fail_on_call == Some(call) {
            return Err(BuiltupError::Service {
                status: 503,
                message: "connection reset".to_string(),
            });
        }

        let reduction = expression
            .root()
            .and_then(|root| root.find_invocation("Image.reduceRegion"))
            .ok_or_else(|| BuiltupError::DataUnavailable("not a reduceRegion".to_string()))?;
        let region = reduction
            .argument("geometry")
            .and_then(parse_geometry)
            .ok_or_else(|| BuiltupError::DataUnavailable("invalid geometry".to_string()))?;

        let overlap = region.intersection(&self.zone);
        let area = overlap.chamberlain_duquette_unsigned_area();
        if area <= 0.0 {
            return Ok(json!({ "Map": null }));
        }
        Ok(json!({ "Map": area / 100.0 }))
    }

    fn create_map(&self, _request: &MapRequest) -> Result<String> {
        Ok("projects/test/maps/fake".to_string())
    }

    fn tile_url(&self, map_name: &str) -> String {
        format!("https://tiles.test/v1/{}/tiles/{{z}}/{{x}}/{{y}}", map_name)
    }
}
