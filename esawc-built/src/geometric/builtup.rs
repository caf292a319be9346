use log::debug;
use serde_json::{json, Value};

use crate::collect::ee::expression::{Expression, ValueNode};
use crate::collect::ee::ComputeBackend;
use crate::collect::global_variables::{
    BUILTUP_CLASS, MAX_PIXELS, PIXEL_AREA_M2, PIXEL_SCALE_M, WORLDCOVER_BAND, WORLDCOVER_DATASET,
};
use crate::error::{BuiltupError, Result};
use crate::geometric::region::{polygon_to_ee, Region};

/// Built-up area extraction from ESA WorldCover
/// Builds the Earth Engine expression for a region and reduces it server-side.
#[derive(Debug, Clone)]
pub struct BuiltupExtractor {
    /// Image collection id
    pub dataset_id: String,
    /// Classification band
    pub band: String,
    /// Class code kept by the mask
    pub class_code: u8,
    /// Nominal scale of the reduction, in meters
    pub scale: f64,
    /// Pixel ceiling passed to reduceRegion
    pub max_pixels: f64,
    /// Area of one pixel, in m²
    pub pixel_area: f64,
    /// Sum pixel counts without partial-pixel weighting
    pub unweighted: bool,
}

impl Default for BuiltupExtractor {
    fn default() -> Self {
        BuiltupExtractor {
            dataset_id: WORLDCOVER_DATASET.to_string(),
            band: WORLDCOVER_BAND.to_string(),
            class_code: BUILTUP_CLASS,
            scale: PIXEL_SCALE_M,
            max_pixels: MAX_PIXELS,
            pixel_area: PIXEL_AREA_M2,
            unweighted: false,
        }
    }
}

impl BuiltupExtractor {
    pub fn new(unweighted: bool) -> Self {
        BuiltupExtractor {
            unweighted,
            ..Default::default()
        }
    }

    /// Built-up raster over the region's envelope
    ///
    /// First WorldCover image intersecting the envelope, clipped to it, masked
    /// to the built-up class, with surviving pixels set to 1.
    pub fn builtup_raster(&self, region: &Region) -> Result<ValueNode> {
        let envelope = region
            .envelope()
            .ok_or_else(|| BuiltupError::DataUnavailable("region has no coordinates".to_string()))?;
        let envelope_ee = polygon_to_ee(&envelope.to_polygon()).to_value_node();

        let collection = ValueNode::invoke(
            "ImageCollection.load",
            [("id", ValueNode::constant(self.dataset_id.as_str()))],
        );
        let filtered = ValueNode::invoke(
            "Collection.filter",
            [
                ("collection", collection),
                (
                    "filter",
                    ValueNode::invoke(
                        "Filter.intersects",
                        [
                            ("leftField", ValueNode::constant(".all")),
                            ("rightValue", envelope_ee.clone()),
                        ],
                    ),
                ),
            ],
        );
        let image = ValueNode::invoke("Collection.first", [("collection", filtered)]);
        let image = ValueNode::invoke("Image.clip", [("input", image), ("geometry", envelope_ee)]);

        let band = ValueNode::invoke(
            "Image.select",
            [
                ("input", image.clone()),
                ("bandSelectors", ValueNode::constant(json!([self.band]))),
            ],
        );
        let mask = ValueNode::invoke(
            "Image.eq",
            [("image1", band), ("image2", image_constant(self.class_code))],
        );
        let image = ValueNode::invoke("Image.updateMask", [("image", image), ("mask", mask)]);

        // where(50, 1): the test image is non-zero everywhere, so every unmasked pixel becomes 1
        Ok(ValueNode::invoke(
            "Image.where",
            [
                ("input", image),
                ("test", image_constant(self.class_code)),
                ("value", image_constant(1)),
            ],
        ))
    }

    fn reducer(&self) -> ValueNode {
        let sum = ValueNode::invoke("Reducer.sum", []);
        if self.unweighted {
            ValueNode::invoke("Reducer.unweighted", [("reducer", sum)])
        } else {
            sum
        }
    }

    /// reduceRegion expression over the region itself (not the envelope)
    pub fn reduction_expression(&self, region: &Region) -> Result<Expression> {
        let image = self.builtup_raster(region)?;
        let reduction = ValueNode::invoke(
            "Image.reduceRegion",
            [
                ("image", image),
                ("reducer", self.reducer()),
                ("geometry", region.to_ee().to_value_node()),
                ("scale", ValueNode::constant(self.scale)),
                ("maxPixels", ValueNode::constant(self.max_pixels)),
            ],
        );
        Ok(Expression::new(reduction))
    }

    /// Built-up area of a region in m²
    /// Fails with DataUnavailable when Earth Engine has no value for the region.
    pub fn get_builtup<B: ComputeBackend + ?Sized>(&self, backend: &B, region: &Region) -> Result<f64> {
        let expression = self.reduction_expression(region)?;
        let stats = backend.compute_value(&expression)?;
        debug!("reduceRegion result: {}", stats);
        self.area_from_stats(&stats)
    }

    /// Convert the reduceRegion dictionary to m²
    pub fn area_from_stats(&self, stats: &Value) -> Result<f64> {
        let pixels = match stats.get(&self.band) {
            Some(Value::Null) | None => {
                return Err(BuiltupError::DataUnavailable(format!(
                    "band {} missing from reduction result",
                    self.band
                )))
            }
            Some(value) => value.as_f64().ok_or_else(|| {
                BuiltupError::InvalidResponse(format!("non-numeric {} sum: {}", self.band, value))
            })?,
        };

        let area = pixels * self.pixel_area;
        if !area.is_finite() || area < 0.0 {
            return Err(BuiltupError::InvalidResponse(format!(
                "built-up area out of range: {}",
                area
            )));
        }
        Ok(area)
    }
}

fn image_constant(value: impl Into<Value>) -> ValueNode {
    ValueNode::invoke("Image.constant", [("value", ValueNode::constant(value))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use geo::{polygon, MultiPolygon, Polygon};

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    fn function_names(node: &ValueNode, names: &mut Vec<String>) {
        if let ValueNode::FunctionInvocationValue(call) = node {
            names.push(call.function_name.clone());
            for arg in call.arguments.values() {
                function_names(arg, names);
            }
        }
    }

    #[test]
    fn test_reduction_uses_region_not_envelope() {
        let region = Region::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 0.01, y: 0.0),
            (x: 0.0, y: 0.01),
        ]);
        let expression = BuiltupExtractor::default()
            .reduction_expression(&region)
            .unwrap();
        let root = expression.root().unwrap();
        assert_eq!(root.function_name(), Some("Image.reduceRegion"));

        let geometry = root.argument("geometry").unwrap();
        let coords = geometry
            .argument("coordinates")
            .and_then(|c| c.as_constant())
            .unwrap();
        // Triangle ring (4 vertices), the envelope would have 5
        assert_eq!(coords[0].as_array().unwrap().len(), 4);

        assert_eq!(root.argument("scale").unwrap().as_constant(), Some(&json!(10.0)));
        assert_eq!(root.argument("maxPixels").unwrap().as_constant(), Some(&json!(1e12)));
    }

    #[test]
    fn test_raster_chain() {
        let region = Region::Polygon(square(2.0, 48.0, 0.1));
        let raster = BuiltupExtractor::default().builtup_raster(&region).unwrap();

        let mut names = Vec::new();
        function_names(&raster, &mut names);
        for expected in [
            "Image.where",
            "Image.updateMask",
            "Image.eq",
            "Image.select",
            "Image.clip",
            "Collection.first",
            "Collection.filter",
            "Filter.intersects",
            "ImageCollection.load",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let load = raster.find_invocation("ImageCollection.load").unwrap();
        assert_eq!(
            load.argument("id").unwrap().as_constant(),
            Some(&json!("ESA/WorldCover/v100"))
        );

        let clip = raster.find_invocation("Image.clip").unwrap();
        let envelope = clip
            .argument("geometry")
            .and_then(|g| g.argument("coordinates"))
            .and_then(|c| c.as_constant())
            .unwrap();
        let first = envelope[0][0].as_array().unwrap();
        assert!((first[0].as_f64().unwrap() - 2.0).abs() < 1e-9);
        assert!((first[1].as_f64().unwrap() - 48.0).abs() < 1e-9);
        assert_eq!(envelope[0].as_array().unwrap().len(), 5);

        let eq = raster.find_invocation("Image.eq").unwrap();
        let class = eq
            .argument("image2")
            .and_then(|i| i.argument("value"))
            .and_then(|v| v.as_constant())
            .unwrap();
        assert_eq!(class, &json!(50));
    }

    #[test]
    fn test_reducer_modes() {
        let region = Region::Polygon(square(0.0, 0.0, 0.01));

        let weighted = BuiltupExtractor::new(false)
            .reduction_expression(&region)
            .unwrap();
        let reducer = weighted.root().unwrap().argument("reducer").unwrap();
        assert_eq!(reducer.function_name(), Some("Reducer.sum"));

        let unweighted = BuiltupExtractor::new(true)
            .reduction_expression(&region)
            .unwrap();
        let reducer = unweighted.root().unwrap().argument("reducer").unwrap();
        assert_eq!(reducer.function_name(), Some("Reducer.unweighted"));
        assert!(reducer.find_invocation("Reducer.sum").is_some());
    }

    #[test]
    fn test_area_from_stats() {
        let extractor = BuiltupExtractor::default();
        assert_eq!(extractor.area_from_stats(&json!({"Map": 12.5})).unwrap(), 1250.0);
        assert_eq!(extractor.area_from_stats(&json!({"Map": 0})).unwrap(), 0.0);

        assert!(extractor
            .area_from_stats(&json!({"Map": null}))
            .unwrap_err()
            .is_data_unavailable());
        assert!(extractor
            .area_from_stats(&json!({}))
            .unwrap_err()
            .is_data_unavailable());
        assert!(matches!(
            extractor.area_from_stats(&json!({"Map": -3.0})),
            Err(BuiltupError::InvalidResponse(_))
        ));
        assert!(matches!(
            extractor.area_from_stats(&json!({"Map": "many"})),
            Err(BuiltupError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_get_builtup_inside_zone() {
        let backend = FakeBackend::new(square(0.0, 0.0, 1.0));
        let region = Region::Polygon(square(0.1, 0.1, 0.01));
        let area = BuiltupExtractor::default().get_builtup(&backend, &region).unwrap();
        // ~1.11 km x 1.11 km near the equator
        assert!(area.is_finite());
        assert!(area > 1.2e6 && area < 1.3e6, "area = {}", area);
    }

    #[test]
    fn test_get_builtup_outside_zone() {
        let backend = FakeBackend::new(square(0.0, 0.0, 1.0));
        let region = Region::MultiPolygon(MultiPolygon::new(vec![square(5.0, 5.0, 0.01)]));
        let err = BuiltupExtractor::default()
            .get_builtup(&backend, &region)
            .unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
