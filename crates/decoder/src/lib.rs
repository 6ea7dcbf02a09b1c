// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Det3D - Decoders
//!
//! Turns the dense per-proposal outputs of a 3D detection network into
//! suppressed, scored boxes, and turns ground-truth label tensors into the
//! same box representation so both can be fed to an evaluator.
use det3d_geometry::{Aabb, Corners};
use ndarray::{Array, ArrayBase, Axis, Data, Dimension};
use num_traits::Float;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod groundtruth;
pub mod nms;
pub mod predictions;
pub mod tensors;

mod decoder;
pub use decoder::*;

pub use config::{DatasetConfig, DecodeConfig, NmsMode};
pub use error::{DecoderError, DecoderResult};
pub use groundtruth::parse_groundtruths;
pub use nms::{Candidate, OverlapMode, nms, nms_2d_faster, nms_3d_faster, nms_3d_faster_samecls};
pub use predictions::{MIN_POINTS_IN_BOX, ParsedPredictions, parse_predictions};
pub use tensors::{EndPoints, GroundTruthTensors, PredictionTensors, SizeHead, SizeLabels, Tensor};

/// A decoded box in the upright camera convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// semantic class index
    pub label: usize,
    pub corners: Corners,
    /// higher implies more confidence
    pub score: f32,
}

impl Detection {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_corners(&self.corners)
    }

    /// Check if one detection is equal to another detection, within the given
    /// delta
    pub fn equal_within_delta(&self, rhs: &Detection, delta: f32) -> bool {
        self.label == rhs.label
            && (self.score - rhs.score).abs() <= delta
            && corners_within_delta(&self.corners, &rhs.corners, delta)
    }
}

/// A labelled box in the upright camera convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub label: usize,
    pub corners: Corners,
}

impl GroundTruth {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_corners(&self.corners)
    }

    pub fn equal_within_delta(&self, rhs: &GroundTruth, delta: f32) -> bool {
        self.label == rhs.label && corners_within_delta(&self.corners, &rhs.corners, delta)
    }
}

fn corners_within_delta(a: &Corners, b: &Corners, delta: f32) -> bool {
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(a, b)| (a - b).abs() <= delta)
}

#[inline(always)]
pub fn sigmoid<T: Float>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

/// Softmax along the last axis.
pub fn softmax<T, S, D>(logits: &ArrayBase<S, D>) -> Array<T, D>
where
    T: Float,
    S: Data<Elem = T>,
    D: Dimension,
{
    let mut probs = logits.to_owned();
    if probs.ndim() == 0 {
        return probs;
    }
    let last = Axis(probs.ndim() - 1);
    for mut lane in probs.lanes_mut(last) {
        let max = lane.fold(T::neg_infinity(), |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.fold(T::zero(), |s, &v| s + v);
        lane.mapv_inplace(|v| v / sum);
    }
    probs
}
