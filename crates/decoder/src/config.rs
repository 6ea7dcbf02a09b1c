// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{DecoderError, DecoderResult, nms::OverlapMode};

/// Class and size-cluster description of a dataset.
///
/// `mean_size_arr[c]` is the mean `(l, w, h)` of size cluster `c`. Size
/// clusters and semantic classes coincide for the datasets this decoder
/// targets, but the decoder never assumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub num_class: usize,
    #[serde(default)]
    pub mean_size_arr: Vec<[f32; 3]>,
    #[serde(default)]
    pub class_names: Vec<String>,
}

impl DatasetConfig {
    pub fn num_size_cluster(&self) -> usize {
        self.mean_size_arr.len()
    }

    /// Box size from a size cluster and its residual.
    pub fn class2size(&self, size_class: usize, residual: [f32; 3]) -> DecoderResult<[f32; 3]> {
        let mean = self
            .mean_size_arr
            .get(size_class)
            .ok_or(DecoderError::InvalidSizeClass(size_class))?;
        Ok(std::array::from_fn(|a| mean[a] + residual[a]))
    }

    /// Inverse of [`DatasetConfig::class2size`] for a known cluster.
    pub fn size2class(&self, size_class: usize, size: [f32; 3]) -> DecoderResult<(usize, [f32; 3])> {
        let mean = self
            .mean_size_arr
            .get(size_class)
            .ok_or(DecoderError::InvalidSizeClass(size_class))?;
        Ok((size_class, std::array::from_fn(|a| size[a] - mean[a])))
    }

    pub fn class_name(&self, class: usize) -> Option<&str> {
        self.class_names.get(class).map(String::as_str)
    }
}

/// Which suppression routine the prediction decoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmsMode {
    /// Top-down rectangles over camera X and Z.
    BirdsEye,
    /// Axis-aligned cuboids, class agnostic.
    Volume,
    /// Axis-aligned cuboids, only same-class pairs suppress each other.
    VolumeSameClass,
}

/// Post-processing options of the prediction and ground-truth decoders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub remove_empty_box: bool,
    #[serde(default = "default_true")]
    pub use_3d_nms: bool,
    #[serde(default = "default_true")]
    pub cls_nms: bool,
    #[serde(default = "default_nms_iou")]
    pub nms_iou: f32,
    #[serde(default)]
    pub use_old_type_nms: bool,
    #[serde(default = "default_conf_thresh")]
    pub conf_thresh: f32,
    #[serde(default = "default_true")]
    pub per_class_proposal: bool,
    #[serde(default)]
    pub size_cls_agnostic: bool,
    #[serde(default)]
    pub hungarian_loss: bool,
    pub dataset_config: DatasetConfig,
}

fn default_true() -> bool {
    true
}

fn default_nms_iou() -> f32 {
    0.25
}

fn default_conf_thresh() -> f32 {
    0.05
}

impl DecodeConfig {
    /// Options used when only the dataset is known.
    pub fn new(dataset_config: DatasetConfig) -> Self {
        Self {
            remove_empty_box: false,
            use_3d_nms: true,
            cls_nms: true,
            nms_iou: default_nms_iou(),
            use_old_type_nms: false,
            conf_thresh: default_conf_thresh(),
            per_class_proposal: true,
            size_cls_agnostic: false,
            hungarian_loss: false,
            dataset_config,
        }
    }

    pub fn nms_mode(&self) -> NmsMode {
        match (self.use_3d_nms, self.cls_nms) {
            (false, _) => NmsMode::BirdsEye,
            (true, false) => NmsMode::Volume,
            (true, true) => NmsMode::VolumeSameClass,
        }
    }

    pub fn overlap_mode(&self) -> OverlapMode {
        if self.use_old_type_nms {
            OverlapMode::OldType
        } else {
            OverlapMode::Union
        }
    }

    pub fn num_class(&self) -> usize {
        self.dataset_config.num_class
    }

    pub fn validate(&self) -> DecoderResult<()> {
        if !(0.0..=1.0).contains(&self.nms_iou) {
            return Err(DecoderError::InvalidConfig(format!(
                "nms_iou must be within [0, 1], got {}",
                self.nms_iou
            )));
        }
        if !(0.0..=1.0).contains(&self.conf_thresh) {
            return Err(DecoderError::InvalidConfig(format!(
                "conf_thresh must be within [0, 1], got {}",
                self.conf_thresh
            )));
        }
        let dataset = &self.dataset_config;
        if dataset.num_class == 0 {
            return Err(DecoderError::InvalidConfig(
                "dataset_config.num_class must be positive".to_string(),
            ));
        }
        if !self.size_cls_agnostic && dataset.mean_size_arr.is_empty() {
            return Err(DecoderError::InvalidConfig(
                "dataset_config.mean_size_arr is required unless size_cls_agnostic is set"
                    .to_string(),
            ));
        }
        if !dataset.class_names.is_empty() && dataset.class_names.len() != dataset.num_class {
            return Err(DecoderError::InvalidConfig(format!(
                "dataset_config has {} class names for {} classes",
                dataset.class_names.len(),
                dataset.num_class
            )));
        }
        Ok(())
    }
}
