// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Box geometry shared by the 3D decoder and the evaluator.
//!
//! Boxes are built in the upright camera convention (X-right, Y-down,
//! Z-forward) while point clouds live in the upright depth convention
//! (X-right, Y-forward, Z-up). [`axis`] converts between the two. All overlap
//! measures treat boxes as axis-aligned.

pub mod axis;
pub mod corners;
pub mod extent;
pub mod hull;

pub use axis::{flip_array_to_camera, flip_array_to_depth, flip_axis_to_camera, flip_axis_to_depth};
pub use corners::{Corners, box_corners, corners_to_depth, roty};
pub use extent::{Aabb, Extent, Rect};
pub use hull::{BoxFrame, count_points_in_box, points_in_box};
