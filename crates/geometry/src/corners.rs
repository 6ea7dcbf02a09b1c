// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use crate::axis::flip_axis_to_depth;

/// The 8 corners of a 3D box. The first four corners share the `+h/2` camera
/// Y coordinate, the last four share `-h/2`.
pub type Corners = [[f32; 3]; 8];

/// Rotation about the camera Y axis.
pub fn roty(t: f32) -> [[f32; 3]; 3] {
    let (s, c) = t.sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

/// Builds the corners of a box in the upright camera convention.
///
/// `size` is `(l, w, h)`: the length runs along camera X, the width along
/// camera Z and the height along camera Y, before rotating by `heading` about
/// the Y axis and translating to `center`.
///
/// # Examples
/// ```rust
/// use det3d_geometry::{Aabb, box_corners};
/// let corners = box_corners([2.0, 1.0, 0.5], 0.0, [0.0, 0.0, 4.0]);
/// let aabb = Aabb::from_corners(&corners);
/// assert_eq!(aabb.min, [-1.0, -0.25, 3.5]);
/// assert_eq!(aabb.max, [1.0, 0.25, 4.5]);
/// ```
pub fn box_corners(size: [f32; 3], heading: f32, center: [f32; 3]) -> Corners {
    let [l, w, h] = size.map(|v| v / 2.0);
    let x = [l, l, -l, -l, l, l, -l, -l];
    let y = [h, h, h, h, -h, -h, -h, -h];
    let z = [w, -w, -w, w, w, -w, -w, w];
    let r = roty(heading);

    std::array::from_fn(|i| {
        std::array::from_fn(|a| r[a][0] * x[i] + r[a][1] * y[i] + r[a][2] * z[i] + center[a])
    })
}

/// Re-expresses camera-convention corners in the depth convention.
pub fn corners_to_depth(corners: &Corners) -> Corners {
    corners.map(flip_axis_to_depth)
}
