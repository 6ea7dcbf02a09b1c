// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::corners::Corners;

/// An axis-aligned region that can be compared by overlap.
pub trait Extent: Copy + Debug {
    /// Area for 2D extents, volume for 3D extents. Never negative.
    fn volume(&self) -> f32;

    /// Size of the region shared by `self` and `other`.
    fn intersection(&self, other: &Self) -> f32;

    /// Intersection over union. Returns 0 when the union is empty.
    fn iou(&self, other: &Self) -> f32 {
        let inter = self.intersection(other);
        let union = self.volume() + other.volume() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// Top-down rectangle of a camera-convention box: `min`/`max` hold the X and Z
/// (depth) bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Rect {
    pub fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    /// Projects the corners onto the camera X/Z plane.
    pub fn from_corners(corners: &Corners) -> Self {
        let aabb = Aabb::from_corners(corners);
        Self {
            min: [aabb.min[0], aabb.min[2]],
            max: [aabb.max[0], aabb.max[2]],
        }
    }
}

impl Extent for Rect {
    fn volume(&self) -> f32 {
        (self.max[0] - self.min[0]).max(0.0) * (self.max[1] - self.min[1]).max(0.0)
    }

    fn intersection(&self, other: &Self) -> f32 {
        (0..2)
            .map(|a| (self.max[a].min(other.max[a]) - self.min[a].max(other.min[a])).max(0.0))
            .product()
    }
}

/// Axis-aligned cuboid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Per-axis bounds of the corners.
    pub fn from_corners(corners: &Corners) -> Self {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for c in corners {
            for a in 0..3 {
                min[a] = min[a].min(c[a]);
                max[a] = max[a].max(c[a]);
            }
        }
        Self { min, max }
    }

    /// Builds the cuboid from its centre and full edge lengths.
    pub fn from_center_size(center: [f32; 3], size: [f32; 3]) -> Self {
        Self {
            min: std::array::from_fn(|a| center[a] - size[a] / 2.0),
            max: std::array::from_fn(|a| center[a] + size[a] / 2.0),
        }
    }

    pub fn center(&self) -> [f32; 3] {
        std::array::from_fn(|a| (self.min[a] + self.max[a]) / 2.0)
    }

    pub fn size(&self) -> [f32; 3] {
        std::array::from_fn(|a| self.max[a] - self.min[a])
    }
}

impl Extent for Aabb {
    fn volume(&self) -> f32 {
        (0..3).map(|a| (self.max[a] - self.min[a]).max(0.0)).product()
    }

    fn intersection(&self, other: &Self) -> f32 {
        (0..3)
            .map(|a| (self.max[a].min(other.max[a]) - self.min[a].max(other.min[a])).max(0.0))
            .product()
    }
}
