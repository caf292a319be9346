//! Earth Engine REST collaborator: expression graph, authentication and session.

pub mod auth;
pub mod ee_session;
pub mod expression;

pub use ee_session::EeSession;
pub use expression::{Expression, ValueNode};

use serde::Serialize;

use crate::error::Result;

/// Visualization parameters of a map request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationOptions {
    pub ranges: Vec<VisRange>,
    pub palette_colors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisRange {
    pub min: f64,
    pub max: f64,
}

/// Body of a `maps` request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    pub expression: Expression,
    pub file_format: String,
    pub band_ids: Vec<String>,
    pub visualization_options: VisualizationOptions,
}

/// Remote computation seam used by the extractor and the batch driver.
///
/// [`EeSession`] implements it against the REST API; tests use an in-process fake.
pub trait ComputeBackend {
    /// Evaluate an expression and return the `result` member of the response.
    fn compute_value(&self, expression: &Expression) -> Result<serde_json::Value>;

    /// Register a map and return its resource name (`projects/.../maps/...`).
    fn create_map(&self, request: &MapRequest) -> Result<String>;

    /// Tile URL template (`{z}/{x}/{y}` placeholders) for a map resource name.
    fn tile_url(&self, map_name: &str) -> String;
}
