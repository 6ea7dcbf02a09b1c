// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use det3d_geometry::{Aabb, Extent, Rect};
use ndarray::ArrayView2;

use crate::{DecoderError, DecoderResult};

/// How the overlap between a kept box and a candidate is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapMode {
    /// Intersection over union.
    #[default]
    Union,
    /// Intersection over the volume of the lower-scored candidate.
    OldType,
}

impl OverlapMode {
    #[inline]
    pub fn overlap<E: Extent>(&self, kept: &E, candidate: &E) -> f32 {
        match self {
            OverlapMode::Union => kept.iou(candidate),
            OverlapMode::OldType => {
                let volume = candidate.volume();
                if volume <= 0.0 {
                    return 0.0;
                }
                kept.intersection(candidate) / volume
            }
        }
    }
}

/// One box entering suppression. Candidates with different labels never
/// suppress each other; leave `label` as `None` for class-agnostic NMS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<E: Extent> {
    pub extent: E,
    pub score: f32,
    pub label: Option<usize>,
}

impl<E: Extent> Candidate<E> {
    pub fn new(extent: E, score: f32) -> Self {
        Self {
            extent,
            score,
            label: None,
        }
    }

    pub fn with_label(extent: E, score: f32, label: usize) -> Self {
        Self {
            extent,
            score,
            label: Some(label),
        }
    }
}

/// Greedy non-maximum suppression. Returns the indices of the kept candidates
/// in the order they were picked, highest score first. Equal scores are
/// visited in ascending index order. A candidate is dropped when its overlap
/// with an already kept box is strictly greater than `threshold`.
pub fn nms<E: Extent>(candidates: &[Candidate<E>], threshold: f32, mode: OverlapMode) -> Vec<usize> {
    // Stable sort, so ties keep their input order.
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

    let mut suppressed = vec![false; candidates.len()];
    let mut pick = Vec::new();
    // Outer loop over candidates, best first.
    for (rank, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        pick.push(i);
        let kept = &candidates[i];
        // Inner loop over candidates with lower score (later in the order).
        for &j in &order[rank + 1..] {
            if suppressed[j] || candidates[j].label != kept.label {
                continue;
            }
            if mode.overlap(&kept.extent, &candidates[j].extent) > threshold {
                suppressed[j] = true;
            }
        }
    }
    pick
}

fn old_type_mode(old_type: bool) -> OverlapMode {
    if old_type {
        OverlapMode::OldType
    } else {
        OverlapMode::Union
    }
}

fn check_columns(boxes: &ArrayView2<f32>, cols: usize, layout: &str) -> DecoderResult<()> {
    if boxes.ncols() != cols {
        return Err(DecoderError::InvalidShape(format!(
            "expected {} columns ({}), got {}",
            cols,
            layout,
            boxes.ncols()
        )));
    }
    Ok(())
}

/// Top-down NMS over rows of `[x1, z1, x2, z2, score]`.
pub fn nms_2d_faster(
    boxes: ArrayView2<f32>,
    overlap_threshold: f32,
    old_type: bool,
) -> DecoderResult<Vec<usize>> {
    check_columns(&boxes, 5, "x1, z1, x2, z2, score")?;
    let candidates: Vec<_> = boxes
        .rows()
        .into_iter()
        .map(|r| Candidate::new(Rect::new([r[0], r[1]], [r[2], r[3]]), r[4]))
        .collect();
    Ok(nms(&candidates, overlap_threshold, old_type_mode(old_type)))
}

/// Class-agnostic 3D NMS over rows of `[x1, y1, z1, x2, y2, z2, score]`.
pub fn nms_3d_faster(
    boxes: ArrayView2<f32>,
    overlap_threshold: f32,
    old_type: bool,
) -> DecoderResult<Vec<usize>> {
    check_columns(&boxes, 7, "x1, y1, z1, x2, y2, z2, score")?;
    let candidates: Vec<_> = boxes
        .rows()
        .into_iter()
        .map(|r| Candidate::new(Aabb::new([r[0], r[1], r[2]], [r[3], r[4], r[5]]), r[6]))
        .collect();
    Ok(nms(&candidates, overlap_threshold, old_type_mode(old_type)))
}

/// Class-aware 3D NMS over rows of `[x1, y1, z1, x2, y2, z2, score, class]`.
pub fn nms_3d_faster_samecls(
    boxes: ArrayView2<f32>,
    overlap_threshold: f32,
    old_type: bool,
) -> DecoderResult<Vec<usize>> {
    check_columns(&boxes, 8, "x1, y1, z1, x2, y2, z2, score, class")?;
    let mut candidates = Vec::with_capacity(boxes.nrows());
    for r in boxes.rows() {
        let class = r[7];
        if class < 0.0 || class.fract() != 0.0 {
            return Err(DecoderError::InvalidLabel(class as i64));
        }
        candidates.push(Candidate::with_label(
            Aabb::new([r[0], r[1], r[2]], [r[3], r[4], r[5]]),
            r[6],
            class as usize,
        ));
    }
    Ok(nms(&candidates, overlap_threshold, old_type_mode(old_type)))
}
