// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use det3d_decoder::{Detection, GroundTruth};
use det3d_geometry::Aabb;

pub mod ap;
pub mod error;
pub mod metrics;

pub use ap::{ApCalculator, ScanRecord};
pub use error::{EvalError, EvalResult};
pub use metrics::{ApMetric, ApMetrics, ClassMetrics, average_precision};

/// A predicted box that can be ranked and matched.
pub trait ScoredBox: Debug {
    fn aabb(&self) -> Aabb;
    fn score(&self) -> f32;
    fn label(&self) -> usize;
}

/// A ground-truth box that can be matched.
pub trait LabeledBox: Debug {
    fn aabb(&self) -> Aabb;
    fn label(&self) -> usize;
}

impl ScoredBox for Detection {
    fn aabb(&self) -> Aabb {
        Detection::aabb(self)
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn label(&self) -> usize {
        self.label
    }
}

impl LabeledBox for GroundTruth {
    fn aabb(&self) -> Aabb {
        GroundTruth::aabb(self)
    }

    fn label(&self) -> usize {
        self.label
    }
}

pub trait Evaluator<P: ScoredBox, G: LabeledBox> {
    /// Accumulates one batch, one entry per scene on both sides.
    fn step_labeled(&mut self, predictions: &[Vec<P>], ground_truth: &[Vec<G>]) -> EvalResult<()>;

    fn compute_metrics(&self) -> ApMetrics;

    fn reset(&mut self);
}
