// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::corners::Corners;

/// Edge frame of a box: one corner and the three edges leaving it. A point is
/// inside the box when its projection on every edge falls within the edge.
///
/// Only valid for corners laid out by [`crate::box_corners`], in any axis
/// convention reached by a linear flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxFrame {
    origin: [f32; 3],
    edges: [[f32; 3]; 3],
    lengths_sq: [f32; 3],
}

impl BoxFrame {
    pub fn new(corners: &Corners) -> Self {
        let origin = corners[0];
        // corner 1 differs in width, corner 3 in length, corner 4 in height
        let edges = [1, 3, 4].map(|i| sub(corners[i], origin));
        let lengths_sq = edges.map(|e| dot(e, e));
        Self {
            origin,
            edges,
            lengths_sq,
        }
    }

    /// A box with a zero-length edge encloses no volume.
    pub fn is_degenerate(&self) -> bool {
        !self.lengths_sq.iter().all(|&len_sq| len_sq > 0.0)
    }

    /// Inclusive inside test. Always false for a degenerate box.
    #[inline]
    pub fn contains(&self, p: [f32; 3]) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let d = sub(p, self.origin);
        self.edges
            .iter()
            .zip(self.lengths_sq)
            .all(|(e, len_sq)| {
                let t = dot(d, *e);
                (0.0..=len_sq).contains(&t)
            })
    }
}

/// Marks which rows of `points` (N, 3+) fall inside the box. Columns after the
/// first three are ignored.
///
/// # Panics
/// Panics if `points` has fewer than 3 columns.
pub fn points_in_box(points: ArrayView2<f32>, corners: &Corners) -> Array1<bool> {
    assert!(points.ncols() >= 3);
    let frame = BoxFrame::new(corners);
    points
        .rows()
        .into_iter()
        .map(|p| frame.contains(xyz(p)))
        .collect()
}

/// Counts the rows of `points` (N, 3+) that fall inside the box. A box with a
/// zero-length edge holds no points.
///
/// # Panics
/// Panics if `points` has fewer than 3 columns.
pub fn count_points_in_box(points: ArrayView2<f32>, corners: &Corners) -> usize {
    assert!(points.ncols() >= 3);
    let frame = BoxFrame::new(corners);
    if frame.is_degenerate() {
        return 0;
    }
    points
        .rows()
        .into_iter()
        .filter(|p| frame.contains(xyz(p.view())))
        .count()
}

#[inline(always)]
fn xyz(p: ArrayView1<f32>) -> [f32; 3] {
    [p[0], p[1], p[2]]
}

#[inline(always)]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline(always)]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
