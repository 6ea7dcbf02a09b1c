// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use det3d_geometry::{Aabb, Extent};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ap::ScanRecord;

/// How the precision/recall curve is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApMetric {
    /// Exact area under the monotone precision envelope.
    #[default]
    Area,
    /// Mean of the envelope sampled at recall 0, 0.1, ..., 1.
    ElevenPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub ap: f32,
    /// Recall once every prediction of the class has been swept.
    pub recall: f32,
    pub num_gt: usize,
    pub num_pred: usize,
}

/// Average precision at one IoU threshold. Only classes with at least one
/// ground-truth box are reported; with none the means are 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApMetrics {
    pub iou_threshold: f32,
    pub per_class: BTreeMap<usize, ClassMetrics>,
    pub mean_ap: f32,
    pub mean_recall: f32,
}

impl ApMetrics {
    pub fn ap(&self, class: usize) -> Option<f32> {
        self.per_class.get(&class).map(|m| m.ap)
    }

    /// Named scalars: `AP_<iou>`, `AR_<iou>` and `AP_<iou>/<class>` per
    /// class. Classes without a name are reported by index.
    pub fn scalars(&self, class_names: &[String]) -> Vec<(String, f32)> {
        let iou = self.iou_threshold;
        let mut scalars = vec![
            (format!("AP_{iou}"), self.mean_ap),
            (format!("AR_{iou}"), self.mean_recall),
        ];
        for (class, m) in &self.per_class {
            let name = class_names
                .get(*class)
                .cloned()
                .unwrap_or_else(|| class.to_string());
            scalars.push((format!("AP_{iou}/{name}"), m.ap));
        }
        scalars
    }

    pub fn log_summary(&self, class_names: &[String]) {
        for (name, value) in self.scalars(class_names) {
            info!("{name}: {value:.4}");
        }
    }
}

/// Area under a precision/recall curve. `recall` must be non-decreasing and
/// both slices of equal length.
pub fn average_precision(recall: &[f32], precision: &[f32], metric: ApMetric) -> f32 {
    assert_eq!(recall.len(), precision.len());
    match metric {
        ApMetric::ElevenPoint => (0..=10)
            .map(|t| {
                let t = t as f32 / 10.0;
                recall
                    .iter()
                    .zip(precision)
                    .filter(|(r, _)| **r >= t)
                    .map(|(_, p)| *p)
                    .fold(0.0, f32::max)
                    / 11.0
            })
            .sum(),
        ApMetric::Area => {
            let mut mrec = Vec::with_capacity(recall.len() + 2);
            mrec.push(0.0);
            mrec.extend_from_slice(recall);
            mrec.push(1.0);
            let mut mpre = Vec::with_capacity(precision.len() + 2);
            mpre.push(0.0);
            mpre.extend_from_slice(precision);
            mpre.push(0.0);

            // precision envelope
            for i in (0..mpre.len() - 1).rev() {
                mpre[i] = mpre[i].max(mpre[i + 1]);
            }
            (0..mrec.len() - 1)
                .filter(|&i| mrec[i + 1] != mrec[i])
                .map(|i| (mrec[i + 1] - mrec[i]) * mpre[i + 1])
                .sum()
        }
    }
}

pub(crate) fn evaluate(
    scans: &BTreeMap<usize, ScanRecord>,
    iou_threshold: f32,
    metric: ApMetric,
) -> ApMetrics {
    let classes: BTreeSet<usize> = scans
        .values()
        .flat_map(|scan| scan.gt.iter().map(|(label, _)| *label))
        .collect();

    let per_class: BTreeMap<usize, ClassMetrics> = classes
        .into_iter()
        .map(|class| {
            let m = evaluate_class(scans, class, iou_threshold, metric);
            debug!(
                "class {}: AP {:.4}, recall {:.4}, {} gt, {} predictions",
                class, m.ap, m.recall, m.num_gt, m.num_pred
            );
            (class, m)
        })
        .collect();

    let (mean_ap, mean_recall) = if per_class.is_empty() {
        (0.0, 0.0)
    } else {
        let n = per_class.len() as f32;
        (
            per_class.values().map(|m| m.ap).sum::<f32>() / n,
            per_class.values().map(|m| m.recall).sum::<f32>() / n,
        )
    };
    ApMetrics {
        iou_threshold,
        per_class,
        mean_ap,
        mean_recall,
    }
}

/// Ranked greedy matching of one class over every scan.
fn evaluate_class(
    scans: &BTreeMap<usize, ScanRecord>,
    class: usize,
    iou_threshold: f32,
    metric: ApMetric,
) -> ClassMetrics {
    let gt: BTreeMap<usize, Vec<Aabb>> = scans
        .iter()
        .map(|(&id, scan)| {
            let boxes = scan
                .gt
                .iter()
                .filter(|(label, _)| *label == class)
                .map(|(_, b)| *b)
                .collect();
            (id, boxes)
        })
        .collect();
    let num_gt: usize = gt.values().map(Vec::len).sum();
    let mut matched: BTreeMap<usize, Vec<bool>> =
        gt.iter().map(|(&id, b)| (id, vec![false; b.len()])).collect();

    // (scan, box, score) in accumulation order
    let mut preds: Vec<(usize, Aabb, f32)> = scans
        .iter()
        .flat_map(|(&id, scan)| {
            scan.pred
                .iter()
                .filter(|(label, _, _)| *label == class)
                .map(move |(_, b, score)| (id, *b, *score))
        })
        .collect();
    // Stable, so equal scores keep accumulation order.
    preds.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut recall = Vec::with_capacity(preds.len());
    let mut precision = Vec::with_capacity(preds.len());
    for (id, pred, _) in &preds {
        let best = gt.get(id).and_then(|boxes| {
            let taken = matched.get(id)?;
            boxes
                .iter()
                .enumerate()
                .filter(|(k, _)| !taken[*k])
                .map(|(k, b)| (k, pred.iou(b)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
        });
        match best {
            Some((k, iou)) if iou > iou_threshold => {
                if let Some(taken) = matched.get_mut(id) {
                    taken[k] = true;
                }
                tp += 1;
            }
            _ => fp += 1,
        }
        recall.push(tp as f32 / num_gt as f32);
        precision.push(tp as f32 / (tp + fp) as f32);
    }

    ClassMetrics {
        ap: average_precision(&recall, &precision, metric),
        recall: recall.last().copied().unwrap_or(0.0),
        num_gt,
        num_pred: preds.len(),
    }
}
