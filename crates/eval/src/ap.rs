// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use det3d_geometry::Aabb;
use log::trace;
use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::{
    EvalError, EvalResult, Evaluator, LabeledBox, ScoredBox,
    metrics::{ApMetric, ApMetrics, evaluate},
};

/// Boxes accumulated for one scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRecord {
    /// `(label, box)` of every valid ground-truth slot.
    pub gt: Vec<(usize, Aabb)>,
    /// `(label, box, score)` of every prediction.
    pub pred: Vec<(usize, Aabb, f32)>,
}

/// Accumulates predictions and ground truth over an evaluation run and
/// computes average precision on demand.
///
/// Every scene gets a fresh scan id; ids are never reused until
/// [`ApCalculator::reset`].
#[derive(Debug, Clone)]
pub struct ApCalculator {
    pub ap_iou_thresh: f32,
    pub metric: ApMetric,
    scans: BTreeMap<usize, ScanRecord>,
    scan_cnt: usize,
}

impl Default for ApCalculator {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl ApCalculator {
    pub fn new(ap_iou_thresh: f32) -> Self {
        Self {
            ap_iou_thresh,
            metric: ApMetric::default(),
            scans: BTreeMap::new(),
            scan_cnt: 0,
        }
    }

    pub fn with_metric(mut self, metric: ApMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn num_scans(&self) -> usize {
        self.scan_cnt
    }

    pub fn scan(&self, id: usize) -> Option<&ScanRecord> {
        self.scans.get(&id)
    }

    fn push(&mut self, record: ScanRecord) {
        trace!(
            "scan {}: {} ground-truth boxes, {} predictions",
            self.scan_cnt,
            record.gt.len(),
            record.pred.len()
        );
        self.scans.insert(self.scan_cnt, record);
        self.scan_cnt += 1;
    }

    /// Accumulates one batch of class-agnostic boxes given as
    /// `(cx, cy, cz, dx, dy, dz)`: `pred_boxes (B, Q, 6)`,
    /// `pred_scores (B, Q)`, `gt_boxes (B, M, 6)` and `gt_mask (B, M)`, where
    /// ground-truth slots with a non-zero mask are valid. Every box is
    /// counted as class 0.
    pub fn step(
        &mut self,
        pred_boxes: ArrayView3<f32>,
        pred_scores: ArrayView2<f32>,
        gt_boxes: ArrayView3<f32>,
        gt_mask: ArrayView2<f32>,
    ) -> EvalResult<()> {
        let bsize = pred_boxes.len_of(Axis(0));
        if bsize != gt_boxes.len_of(Axis(0)) {
            return Err(EvalError::ShapeMismatch {
                predictions: bsize,
                ground_truth: gt_boxes.len_of(Axis(0)),
            });
        }
        check_boxes("pred_boxes", pred_boxes, pred_scores)?;
        check_boxes("gt_boxes", gt_boxes, gt_mask)?;

        for i in 0..bsize {
            let gt = gt_boxes
                .index_axis(Axis(0), i)
                .outer_iter()
                .zip(gt_mask.index_axis(Axis(0), i))
                .filter(|(_, m)| **m != 0.0)
                .map(|(b, _)| (0, cxcyczdxdydz_to_aabb(b)))
                .collect();
            let pred = pred_boxes
                .index_axis(Axis(0), i)
                .outer_iter()
                .zip(pred_scores.index_axis(Axis(0), i))
                .map(|(b, s)| (0, cxcyczdxdydz_to_aabb(b), *s))
                .collect();
            self.push(ScanRecord { gt, pred });
        }
        Ok(())
    }

    /// Accumulates one batch of labelled boxes, one entry per scene.
    pub fn step_labeled<P: ScoredBox, G: LabeledBox>(
        &mut self,
        predictions: &[Vec<P>],
        ground_truth: &[Vec<G>],
    ) -> EvalResult<()> {
        if predictions.len() != ground_truth.len() {
            return Err(EvalError::ShapeMismatch {
                predictions: predictions.len(),
                ground_truth: ground_truth.len(),
            });
        }
        for (preds, gts) in predictions.iter().zip(ground_truth) {
            let gt = gts.iter().map(|g| (g.label(), g.aabb())).collect();
            let pred = preds
                .iter()
                .map(|p| (p.label(), p.aabb(), p.score()))
                .collect();
            self.push(ScanRecord { gt, pred });
        }
        Ok(())
    }

    /// Average precision over everything accumulated so far. Does not modify
    /// the accumulated state.
    pub fn compute_metrics(&self) -> ApMetrics {
        evaluate(&self.scans, self.ap_iou_thresh, self.metric)
    }

    pub fn reset(&mut self) {
        self.scans.clear();
        self.scan_cnt = 0;
    }
}

impl<P: ScoredBox, G: LabeledBox> Evaluator<P, G> for ApCalculator {
    fn step_labeled(&mut self, predictions: &[Vec<P>], ground_truth: &[Vec<G>]) -> EvalResult<()> {
        ApCalculator::step_labeled(self, predictions, ground_truth)
    }

    fn compute_metrics(&self) -> ApMetrics {
        ApCalculator::compute_metrics(self)
    }

    fn reset(&mut self) {
        ApCalculator::reset(self)
    }
}

fn check_boxes(name: &str, boxes: ArrayView3<f32>, per_box: ArrayView2<f32>) -> EvalResult<()> {
    let (b, n, d) = boxes.dim();
    if d != 6 || per_box.dim() != (b, n) {
        return Err(EvalError::InvalidShape(format!(
            "{} {:?} must be (B, N, 6) with a (B, N) companion, got {:?}",
            name,
            boxes.shape(),
            per_box.shape()
        )));
    }
    Ok(())
}

fn cxcyczdxdydz_to_aabb(b: ArrayView1<f32>) -> Aabb {
    Aabb::from_center_size([b[0], b[1], b[2]], [b[3], b[4], b[5]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use det3d_decoder::{Detection, GroundTruth};
    use det3d_geometry::{box_corners, flip_axis_to_camera};
    use ndarray::{Array2, Array3, array};

    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    /// One scene: a unit ground-truth cube at the origin and predictions
    /// given as `(x offset, score)`.
    fn single_scene(calc: &mut ApCalculator, preds: &[(f32, f32)]) {
        let pred_boxes = Array3::from_shape_fn((1, preds.len(), 6), |(_, q, a)| match a {
            0 => preds[q].0,
            1 | 2 => 0.0,
            _ => 1.0,
        });
        let pred_scores = Array2::from_shape_fn((1, preds.len()), |(_, q)| preds[q].1);
        let gt_boxes = array![[[0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0]]];
        let gt_mask = array![[1.0f32]];
        calc.step(
            pred_boxes.view(),
            pred_scores.view(),
            gt_boxes.view(),
            gt_mask.view(),
        )
        .unwrap();
    }

    #[test]
    fn test_exact_match() {
        let mut calc = ApCalculator::new(0.25);
        single_scene(&mut calc, &[(0.0, 0.9)]);
        let metrics = calc.compute_metrics();
        assert_eq!(metrics.ap(0), Some(1.0));
        assert_eq!(metrics.mean_ap, 1.0);
        assert_eq!(metrics.mean_recall, 1.0);
    }

    #[test]
    fn test_below_threshold() {
        let mut calc = ApCalculator::new(0.25);
        // intersection 0.2, iou 0.2 / 1.8
        single_scene(&mut calc, &[(0.8, 0.9)]);
        let metrics = calc.compute_metrics();
        assert_eq!(metrics.ap(0), Some(0.0));
        assert_eq!(metrics.per_class[&0].recall, 0.0);
        assert_eq!(metrics.per_class[&0].num_pred, 1);
    }

    #[test]
    fn test_duplicate_is_false_positive() {
        // both predictions overlap the ground truth with iou 0.8 / 1.2
        let mut calc = ApCalculator::new(0.25);
        single_scene(&mut calc, &[(0.2, 0.5), (-0.2, 0.9)]);
        let metrics = calc.compute_metrics();
        // the first-ranked prediction is the true positive, so precision
        // only drops after full recall
        assert_eq!(metrics.ap(0), Some(1.0));

        let mut calc = ApCalculator::new(0.25);
        single_scene(&mut calc, &[(5.0, 0.9), (0.0, 0.5)]);
        let metrics = calc.compute_metrics();
        assert!((metrics.ap(0).unwrap() - 0.5).abs() < 1e-6);

        let mut calc = ApCalculator::new(0.25).with_metric(ApMetric::ElevenPoint);
        single_scene(&mut calc, &[(5.0, 0.9), (0.0, 0.5)]);
        assert!((calc.compute_metrics().ap(0).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_compute_metrics_is_idempotent() {
        let mut calc = ApCalculator::new(0.25);
        single_scene(&mut calc, &[(0.2, 0.5), (5.0, 0.7), (0.1, 0.6)]);
        single_scene(&mut calc, &[(0.4, 0.8)]);
        let first = calc.compute_metrics();
        let second = calc.compute_metrics();
        assert_eq!(first, second);
        assert_eq!(first.mean_ap.to_bits(), second.mean_ap.to_bits());
        assert_eq!(calc.num_scans(), 2);
    }

    #[test]
    fn test_reset() {
        let mut calc = ApCalculator::new(0.25);
        let metrics = calc.compute_metrics();
        assert!(metrics.per_class.is_empty());
        assert_eq!(metrics.mean_ap, 0.0);

        single_scene(&mut calc, &[(0.0, 0.9)]);
        calc.reset();
        assert_eq!(calc.num_scans(), 0);
        assert!(calc.scan(0).is_none());
        let metrics = calc.compute_metrics();
        assert!(metrics.per_class.is_empty());
        assert_eq!(metrics.mean_ap, 0.0);
        assert_eq!(metrics.mean_recall, 0.0);
    }

    #[test]
    fn test_gt_mask() {
        let mut calc = ApCalculator::new(0.25);
        let pred_boxes = Array3::<f32>::zeros((2, 3, 6));
        let pred_scores = Array2::<f32>::zeros((2, 3));
        let gt_boxes = Array3::<f32>::ones((2, 4, 6));
        let gt_mask = array![[1.0f32, 1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]];
        calc.step(
            pred_boxes.view(),
            pred_scores.view(),
            gt_boxes.view(),
            gt_mask.view(),
        )
        .unwrap();
        assert_eq!(calc.num_scans(), 2);
        assert_eq!(calc.scan(0).unwrap().gt.len(), 2);
        assert_eq!(calc.scan(1).unwrap().gt.len(), 1);
        assert_eq!(calc.scan(1).unwrap().pred.len(), 3);
        assert_eq!(calc.compute_metrics().per_class[&0].num_gt, 3);
    }

    #[test]
    fn test_gt_mask_nonzero() {
        let mut calc = ApCalculator::new(0.25);
        let gt_mask = array![[0.25f32, 0.0, -1.0]];
        calc.step(
            Array3::<f32>::zeros((1, 1, 6)).view(),
            Array2::<f32>::zeros((1, 1)).view(),
            Array3::<f32>::ones((1, 3, 6)).view(),
            gt_mask.view(),
        )
        .unwrap();
        assert_eq!(calc.scan(0).unwrap().gt.len(), 2);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut calc = ApCalculator::new(0.25);
        let err = calc
            .step(
                Array3::<f32>::zeros((2, 3, 6)).view(),
                Array2::<f32>::zeros((2, 3)).view(),
                Array3::<f32>::zeros((1, 4, 6)).view(),
                Array2::<f32>::zeros((1, 4)).view(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::ShapeMismatch {
                predictions: 2,
                ground_truth: 1
            }
        );

        let err = calc
            .step(
                Array3::<f32>::zeros((1, 3, 7)).view(),
                Array2::<f32>::zeros((1, 3)).view(),
                Array3::<f32>::zeros((1, 4, 6)).view(),
                Array2::<f32>::zeros((1, 4)).view(),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidShape(_)));
        assert_eq!(calc.num_scans(), 0);

        let preds: Vec<Vec<Detection>> = vec![vec![], vec![]];
        let gts: Vec<Vec<GroundTruth>> = vec![vec![]];
        assert!(matches!(
            calc.step_labeled(&preds, &gts),
            Err(EvalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_step_labeled_per_class() {
        let corners = |x: f32| box_corners([1.0, 1.0, 1.0], 0.0, flip_axis_to_camera([x, 3.0, 0.0]));
        let gts = vec![vec![
            GroundTruth {
                label: 0,
                corners: corners(0.0),
            },
            GroundTruth {
                label: 2,
                corners: corners(4.0),
            },
        ]];
        let preds = vec![vec![
            // right place, wrong class
            Detection {
                label: 1,
                corners: corners(0.0),
                score: 0.9,
            },
            Detection {
                label: 0,
                corners: corners(0.1),
                score: 0.8,
            },
        ]];
        let mut calc = ApCalculator::new(0.25);
        Evaluator::step_labeled(&mut calc, &preds, &gts).unwrap();

        let metrics = Evaluator::<Detection, GroundTruth>::compute_metrics(&calc);
        // class 1 has no ground truth and is not reported
        assert_eq!(metrics.per_class.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(metrics.ap(0), Some(1.0));
        assert_eq!(metrics.ap(2), Some(0.0));
        assert_eq!(metrics.mean_ap, 0.5);
        assert_eq!(metrics.mean_recall, 0.5);

        Evaluator::<Detection, GroundTruth>::reset(&mut calc);
        assert_eq!(calc.num_scans(), 0);
    }
}
