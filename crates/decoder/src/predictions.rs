// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use det3d_geometry::{
    Aabb, Corners, Rect, box_corners, corners_to_depth, count_points_in_box, flip_array_to_camera,
};
use log::{debug, trace, warn};
use ndarray::{Array2, Array3, ArrayView3, Axis, Zip, s};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;

use crate::{
    Candidate, DecodeConfig, DecoderError, DecoderResult, Detection, NmsMode, PredictionTensors,
    SizeHead, nms, sigmoid, softmax,
};

/// A box holding fewer input points than this is considered empty.
pub const MIN_POINTS_IN_BOX: usize = 5;

/// Decoded detections of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPredictions {
    /// Per scene: `(label, corners, score)` in emission order.
    pub detections: Vec<Vec<Detection>>,
    /// `(B, K)` proposals that are non-empty and survived NMS.
    pub pred_mask: Array2<bool>,
    /// `(B, K)` proposals holding at least [`MIN_POINTS_IN_BOX`] points. All
    /// true unless `remove_empty_box` is set.
    pub nonempty_mask: Array2<bool>,
}

impl ParsedPredictions {
    pub fn num_detections(&self) -> usize {
        self.detections.iter().map(Vec::len).sum()
    }
}

/// Confidence of each proposal and the class probabilities scored against it.
struct Scores {
    /// `(B, K)`
    obj_prob: Array2<f32>,
    /// `(B, K, C)` or `(B, K, C + 1)`; only the first `C` columns are read.
    sem_cls_probs: Array3<f32>,
}

/// Decodes one stage of network outputs into per-scene detections.
///
/// Boxes are built in the upright camera convention with a zero heading,
/// optionally dropped when they enclose too few input points, then suppressed
/// with the NMS variant selected by the configuration. A proposal is emitted
/// when it survived NMS and its objectness exceeds `conf_thresh`.
pub fn parse_predictions(
    tensors: &PredictionTensors,
    config: &DecodeConfig,
) -> DecoderResult<ParsedPredictions> {
    config.validate()?;
    tensors.validate(config)?;

    let corners = predicted_corners(tensors, config)?;
    let pred_sem_cls = predicted_class(tensors.sem_cls_scores, config.num_class())?;
    let scores = objectness(tensors, config)?;

    let nonempty_mask = match tensors.point_clouds {
        Some(points) if config.remove_empty_box => nonempty_mask(points, &corners)?,
        _ => Array2::from_elem(corners.dim(), true),
    };
    let pred_mask = suppress(&corners, &scores.obj_prob, &pred_sem_cls, &nonempty_mask, config)?;
    let detections = emit(&corners, &scores, &pred_sem_cls, &pred_mask, config);

    Ok(ParsedPredictions {
        detections,
        pred_mask,
        nonempty_mask,
    })
}

fn predicted_corners(
    tensors: &PredictionTensors,
    config: &DecodeConfig,
) -> DecoderResult<Array2<Corners>> {
    let (bsize, num_proposal) = (tensors.batch_size(), tensors.num_proposal());
    let centers = flip_array_to_camera(&tensors.center);
    let mut corners = Vec::with_capacity(bsize * num_proposal);
    for i in 0..bsize {
        for j in 0..num_proposal {
            let size = match &tensors.size {
                SizeHead::Direct(pred_size) => {
                    let s = pred_size.slice(s![i, j, ..]);
                    [s[0], s[1], s[2]]
                }
                SizeHead::Clustered {
                    size_scores,
                    size_residuals,
                } => {
                    let size_class = size_scores.slice(s![i, j, ..]).argmax()?;
                    let r = size_residuals.slice(s![i, j, size_class, ..]);
                    config
                        .dataset_config
                        .class2size(size_class, [r[0], r[1], r[2]])?
                }
            };
            let c = centers.slice(s![i, j, ..]);
            corners.push(box_corners(size, 0.0, [c[0], c[1], c[2]]));
        }
    }
    Ok(Array2::from_shape_vec((bsize, num_proposal), corners)?)
}

/// Best non-background class of every proposal.
fn predicted_class(sem_cls_scores: ArrayView3<f32>, num_class: usize) -> DecoderResult<Array2<usize>> {
    let (bsize, num_proposal, _) = sem_cls_scores.dim();
    let mut classes = Array2::zeros((bsize, num_proposal));
    for ((i, j), class) in classes.indexed_iter_mut() {
        *class = sem_cls_scores.slice(s![i, j, ..num_class]).argmax()?;
    }
    Ok(classes)
}

fn objectness(tensors: &PredictionTensors, config: &DecodeConfig) -> DecoderResult<Scores> {
    let sem_cls_probs = softmax(&tensors.sem_cls_scores);
    match tensors.objectness_scores {
        Some(logits) => Ok(Scores {
            obj_prob: logits.mapv(sigmoid),
            sem_cls_probs,
        }),
        // Without an objectness head the background column stands in for it,
        // and the class probabilities are renormalised over the foreground.
        None if config.hungarian_loss => {
            let num_class = config.num_class();
            let obj_prob = sem_cls_probs.index_axis(Axis(2), num_class).mapv(|bg| 1.0 - bg);
            let mut fg = sem_cls_probs.slice(s![.., .., ..num_class]).to_owned();
            Zip::from(fg.lanes_mut(Axis(2)))
                .and(&obj_prob)
                .for_each(|mut lane, &obj| lane.mapv_inplace(|p| p / obj));
            Ok(Scores {
                obj_prob,
                sem_cls_probs: fg,
            })
        }
        None => Err(DecoderError::MissingTensor("objectness_scores".to_string())),
    }
}

/// Marks the proposals enclosing at least [`MIN_POINTS_IN_BOX`] points. The
/// proposals of a scene are tested in parallel.
fn nonempty_mask(
    point_clouds: ArrayView3<f32>,
    corners: &Array2<Corners>,
) -> DecoderResult<Array2<bool>> {
    let (bsize, num_proposal) = corners.dim();
    let mut mask = Vec::with_capacity(bsize * num_proposal);
    for (i, points) in point_clouds.outer_iter().enumerate() {
        let boxes = corners.row(i);
        let scene: Vec<bool> = (0..num_proposal)
            .into_par_iter()
            .map(|j| {
                let n = count_points_in_box(points, &corners_to_depth(&boxes[j]));
                trace!("scene {} proposal {}: {} points", i, j, n);
                n >= MIN_POINTS_IN_BOX
            })
            .collect();
        mask.extend(scene);
    }
    Ok(Array2::from_shape_vec((bsize, num_proposal), mask)?)
}

/// Runs NMS over the non-empty proposals of every scene.
fn suppress(
    corners: &Array2<Corners>,
    obj_prob: &Array2<f32>,
    pred_sem_cls: &Array2<usize>,
    nonempty_mask: &Array2<bool>,
    config: &DecodeConfig,
) -> DecoderResult<Array2<bool>> {
    let mode = config.nms_mode();
    let overlap = config.overlap_mode();
    let mut pred_mask = Array2::from_elem(corners.dim(), false);

    for (i, nonempty) in nonempty_mask.outer_iter().enumerate() {
        let kept: Vec<usize> = nonempty
            .indexed_iter()
            .filter_map(|(j, &keep)| keep.then_some(j))
            .collect();
        let pick = match mode {
            NmsMode::BirdsEye => {
                let candidates: Vec<_> = kept
                    .iter()
                    .map(|&j| Candidate::new(Rect::from_corners(&corners[[i, j]]), obj_prob[[i, j]]))
                    .collect();
                nms(&candidates, config.nms_iou, overlap)
            }
            NmsMode::Volume => {
                let candidates: Vec<_> = kept
                    .iter()
                    .map(|&j| Candidate::new(Aabb::from_corners(&corners[[i, j]]), obj_prob[[i, j]]))
                    .collect();
                nms(&candidates, config.nms_iou, overlap)
            }
            NmsMode::VolumeSameClass => {
                let candidates: Vec<_> = kept
                    .iter()
                    .map(|&j| {
                        Candidate::with_label(
                            Aabb::from_corners(&corners[[i, j]]),
                            obj_prob[[i, j]],
                            pred_sem_cls[[i, j]],
                        )
                    })
                    .collect();
                nms(&candidates, config.nms_iou, overlap)
            }
        };

        if pick.is_empty() && mode != NmsMode::VolumeSameClass {
            warn!(
                "{:?} NMS kept no boxes in scene {} ({} non-empty proposals)",
                mode,
                i,
                kept.len()
            );
            return Err(DecoderError::DegenerateBatch { scene: i });
        }
        debug!(
            "scene {}: {} of {} non-empty proposals kept by {:?} NMS",
            i,
            pick.len(),
            kept.len(),
            mode
        );
        for p in pick {
            pred_mask[[i, kept[p]]] = true;
        }
    }
    Ok(pred_mask)
}

fn emit(
    corners: &Array2<Corners>,
    scores: &Scores,
    pred_sem_cls: &Array2<usize>,
    pred_mask: &Array2<bool>,
    config: &DecodeConfig,
) -> Vec<Vec<Detection>> {
    let (bsize, num_proposal) = corners.dim();
    let obj_prob = &scores.obj_prob;
    (0..bsize)
        .map(|i| -> Vec<Detection> {
            let survivors: Vec<usize> = (0..num_proposal)
                .filter(|&j| pred_mask[[i, j]] && obj_prob[[i, j]] > config.conf_thresh)
                .collect();
            if config.per_class_proposal {
                (0..config.num_class())
                    .flat_map(|class| {
                        survivors.iter().map(move |&j| Detection {
                            label: class,
                            corners: corners[[i, j]],
                            score: scores.sem_cls_probs[[i, j, class]] * obj_prob[[i, j]],
                        })
                    })
                    .collect()
            } else {
                survivors
                    .iter()
                    .map(|&j| Detection {
                        label: pred_sem_cls[[i, j]],
                        corners: corners[[i, j]],
                        score: obj_prob[[i, j]],
                    })
                    .collect()
            }
        })
        .collect()
}
