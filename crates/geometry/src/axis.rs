// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array, ArrayBase, Axis, Data, Dimension};
use num_traits::Float;

/// Flips X-right, Y-forward, Z-up to X-right, Y-down, Z-forward.
///
/// Camera `(x, y, z)` is depth `(x, -z, y)`.
#[inline(always)]
pub fn flip_axis_to_camera<T: Float>(p: [T; 3]) -> [T; 3] {
    [p[0], -p[2], p[1]]
}

/// Inverse of [`flip_axis_to_camera`].
///
/// Depth `(x, y, z)` is camera `(x, z, -y)`.
#[inline(always)]
pub fn flip_axis_to_depth<T: Float>(p: [T; 3]) -> [T; 3] {
    [p[0], p[2], -p[1]]
}

/// Applies [`flip_axis_to_camera`] along the last axis of `points`. Columns
/// after the first three are copied unchanged.
///
/// # Panics
/// Panics if the last axis holds fewer than 3 values.
pub fn flip_array_to_camera<T, S, D>(points: &ArrayBase<S, D>) -> Array<T, D>
where
    T: Float,
    S: Data<Elem = T>,
    D: Dimension,
{
    flip_lanes(points, flip_axis_to_camera)
}

/// Applies [`flip_axis_to_depth`] along the last axis of `points`. Columns
/// after the first three are copied unchanged.
///
/// # Panics
/// Panics if the last axis holds fewer than 3 values.
pub fn flip_array_to_depth<T, S, D>(points: &ArrayBase<S, D>) -> Array<T, D>
where
    T: Float,
    S: Data<Elem = T>,
    D: Dimension,
{
    flip_lanes(points, flip_axis_to_depth)
}

fn flip_lanes<T, S, D>(points: &ArrayBase<S, D>, flip: fn([T; 3]) -> [T; 3]) -> Array<T, D>
where
    T: Float,
    S: Data<Elem = T>,
    D: Dimension,
{
    assert!(points.ndim() > 0);
    let last = Axis(points.ndim() - 1);
    assert!(points.len_of(last) >= 3);

    let mut out = points.to_owned();
    for mut lane in out.lanes_mut(last) {
        let [x, y, z] = flip([lane[0], lane[1], lane[2]]);
        lane[0] = x;
        lane[1] = y;
        lane[2] = z;
    }
    out
}
