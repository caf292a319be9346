use geo::{Centroid, Geometry, MultiPolygon, Point, Polygon};
use serde_json::Value;

use crate::collect::ee::expression::ValueNode;
use crate::error::{BuiltupError, Result};
use crate::geo_core::BoundingBox;

/// Input region: a polygon or multipolygon in longitude/latitude degrees
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// Earth Engine geometry built from a region
/// Each ring is the exterior ring of one polygon, vertex order preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum EeGeometry {
    Polygon(Vec<[f64; 2]>),
    MultiPolygon(Vec<Vec<[f64; 2]>>),
}

impl EeGeometry {
    /// Number of polygon parts
    pub fn part_count(&self) -> usize {
        match self {
            EeGeometry::Polygon(_) => 1,
            EeGeometry::MultiPolygon(parts) => parts.len(),
        }
    }

    /// Exterior rings, one per part
    pub fn rings(&self) -> Vec<&[[f64; 2]]> {
        match self {
            EeGeometry::Polygon(ring) => vec![ring.as_slice()],
            EeGeometry::MultiPolygon(parts) => parts.iter().map(|ring| ring.as_slice()).collect(),
        }
    }

    /// `GeometryConstructors.*` node for an expression graph
    pub fn to_value_node(&self) -> ValueNode {
        let (function_name, coordinates) = match self {
            EeGeometry::Polygon(ring) => (
                "GeometryConstructors.Polygon",
                Value::from(vec![ring_to_value(ring)]),
            ),
            EeGeometry::MultiPolygon(parts) => (
                "GeometryConstructors.MultiPolygon",
                Value::from(
                    parts
                        .iter()
                        .map(|ring| Value::from(vec![ring_to_value(ring)]))
                        .collect::<Vec<_>>(),
                ),
            ),
        };

        ValueNode::invoke(
            function_name,
            [
                ("coordinates", ValueNode::constant(coordinates)),
                ("evenOdd", ValueNode::constant(true)),
            ],
        )
    }
}

fn ring_to_value(ring: &[[f64; 2]]) -> Value {
    Value::from(
        ring.iter()
            .map(|[x, y]| Value::from(vec![*x, *y]))
            .collect::<Vec<_>>(),
    )
}

/// Convert a polygon's exterior ring to an Earth Engine polygon
/// Holes are not sent, only the exterior ring coordinates in order.
pub fn polygon_to_ee(polygon: &Polygon<f64>) -> EeGeometry {
    EeGeometry::Polygon(exterior_ring(polygon))
}

fn exterior_ring(polygon: &Polygon<f64>) -> Vec<[f64; 2]> {
    polygon
        .exterior()
        .coords()
        .map(|coord| [coord.x, coord.y])
        .collect()
}

/// Convert a geometry (Polygon or MultiPolygon) to an Earth Engine geometry
pub fn geometry_to_ee(geometry: &Geometry<f64>) -> Result<EeGeometry> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(polygon_to_ee(polygon)),
        Geometry::MultiPolygon(multi) => Ok(multi_polygon_to_ee(multi)),
        other => Err(BuiltupError::UnsupportedGeometry(
            geometry_type(other).to_string(),
        )),
    }
}

fn multi_polygon_to_ee(multi: &MultiPolygon<f64>) -> EeGeometry {
    EeGeometry::MultiPolygon(multi.0.iter().map(exterior_ring).collect())
}

/// Geometry type name as written in GeoJSON / OGC
pub fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

impl TryFrom<Geometry<f64>> for Region {
    type Error = BuiltupError;

    fn try_from(geometry: Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(Region::Polygon(polygon)),
            Geometry::MultiPolygon(multi) => Ok(Region::MultiPolygon(multi)),
            other => Err(BuiltupError::UnsupportedGeometry(
                geometry_type(&other).to_string(),
            )),
        }
    }
}

impl Region {
    /// Region from an optional row geometry; a missing geometry is unsupported
    pub fn from_row_geometry(geometry: Option<&Geometry<f64>>) -> Result<Self> {
        match geometry {
            Some(geometry) => Region::try_from(geometry.clone()),
            None => Err(BuiltupError::UnsupportedGeometry("empty geometry".to_string())),
        }
    }

    /// Earth Engine geometry for this region
    pub fn to_ee(&self) -> EeGeometry {
        match self {
            Region::Polygon(polygon) => polygon_to_ee(polygon),
            Region::MultiPolygon(multi) => multi_polygon_to_ee(multi),
        }
    }

    /// Coordinate extent, None for an empty geometry
    pub fn extent(&self) -> Option<BoundingBox> {
        match self {
            Region::Polygon(polygon) => BoundingBox::extent_of(polygon),
            Region::MultiPolygon(multi) => BoundingBox::extent_of(multi),
        }
    }

    /// Bounding envelope used to clip the classification raster
    pub fn envelope(&self) -> Option<BoundingBox> {
        self.extent().map(|extent| extent.envelope())
    }

    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Region::Polygon(polygon) => polygon.centroid(),
            Region::MultiPolygon(multi) => multi.centroid(),
        }
    }
}
