use serde_derive::Deserialize;
use std::path::{Path, PathBuf};

use crate::associator::IouAssociatorConfig;
use crate::error::Error;
use crate::filter::DetectionFilter;

/// Everything a tracking session needs to know up front. Deserializes from a
/// JSON object where every field is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub confidence_threshold: f32,
    /// Detector-space class ids passed on to the tracker.
    pub allowed_class_ids: Vec<i32>,
    pub class_id_offset: i32,
    /// Class names selected for tracking, empty means all allowed classes.
    pub selected_classes: Vec<String>,
    pub max_age: u32,
    pub n_init: u32,
    pub iou_threshold: f32,
    pub class_names_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            allowed_class_ids: vec![2, 3],
            class_id_offset: 2,
            selected_classes: Vec::new(),
            max_age: 30,
            n_init: 3,
            iou_threshold: 0.3,
            class_names_path: PathBuf::from("data_ext/classes.names"),
        }
    }
}

impl SessionConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;

        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter::new(
            self.allowed_class_ids.iter().copied(),
            self.confidence_threshold,
            self.class_id_offset,
        )
    }

    pub fn associator_config(&self) -> IouAssociatorConfig {
        IouAssociatorConfig {
            max_age: self.max_age.max(1),
            n_init: self.n_init.max(1),
            iou_threshold: self.iou_threshold,
        }
    }
}
