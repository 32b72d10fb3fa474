//! Detection adaptor
//!
//! Turns per-lane object detections from a camera pipeline into lane
//! observations. Inference itself happens elsewhere; only the counting rules
//! live here.

use serde::{Deserialize, Serialize};

use junction_core::{JunctionError, JunctionResult, LaneId, Observation};

/// Axis-aligned box in pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        BoundingBox { x1, y1, x2, y2 }
    }

    /// Area on the whole-pixel grid; inverted boxes have zero area
    pub fn area(&self) -> f64 {
        let width = (self.x2.trunc() - self.x1.trunc()).max(0.0);
        let height = (self.y2.trunc() - self.y1.trunc()).max(0.0);
        width * height
    }
}

/// One detected object
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Counting rules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detections below this confidence are ignored
    pub min_confidence: f32,
    /// Classes counted as vehicles (car, motorcycle, bus, truck)
    pub vehicle_classes: Vec<u32>,
    /// Class an emergency vehicle is reported as
    pub ambulance_class: u32,
    /// Minimum box area for an `ambulance_class` detection to count as one
    pub ambulance_min_area: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_confidence: 0.25,
            vehicle_classes: vec![2, 3, 5, 7],
            ambulance_class: 7,
            ambulance_min_area: 15_000.0,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> JunctionResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(JunctionError::InvalidConfig(format!(
                "min_confidence {} outside [0, 1]",
                self.min_confidence
            )));
        }
        if self.ambulance_min_area.is_nan() || self.ambulance_min_area < 0.0 {
            return Err(JunctionError::InvalidConfig(
                "ambulance_min_area must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Maps detections to observations
#[derive(Clone, Debug, Default)]
pub struct DetectionAdaptor {
    config: DetectionConfig,
}

impl DetectionAdaptor {
    pub fn new(config: DetectionConfig) -> JunctionResult<Self> {
        config.validate()?;
        Ok(DetectionAdaptor { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Observation for one lane's frame
    pub fn observe_lane(&self, detections: &[Detection]) -> Observation {
        let mut observation = Observation::default();
        for detection in detections {
            if detection.confidence < self.config.min_confidence
                || !self.config.vehicle_classes.contains(&detection.class_id)
            {
                continue;
            }
            observation.vehicle_count += 1;
            if detection.class_id == self.config.ambulance_class
                && detection.bbox.area() > self.config.ambulance_min_area
            {
                observation.has_ambulance = true;
            }
        }
        observation
    }

    /// Observations for a set of lane frames, ready for `observe_all`
    pub fn observe_all<'a, I>(&self, frames: I) -> Vec<(LaneId, Observation)>
    where
        I: IntoIterator<Item = (LaneId, &'a [Detection])>,
    {
        frames
            .into_iter()
            .map(|(lane, detections)| (lane, self.observe_lane(detections)))
            .collect()
    }
}
