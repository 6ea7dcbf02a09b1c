// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use ndarray::{
    Array, ArrayD, ArrayView, ArrayView2, ArrayView3, ArrayView4, Axis, Dimension, Ix2, Ix3, IxDyn,
};

use crate::{DecodeConfig, DecoderError, DecoderResult};

/// A dense network output or label tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

impl<D: Dimension> From<Array<f32, D>> for Tensor {
    fn from(arr: Array<f32, D>) -> Self {
        Self::F32(arr.into_dyn())
    }
}

impl<D: Dimension> From<Array<i64, D>> for Tensor {
    fn from(arr: Array<i64, D>) -> Self {
        Self::I64(arr.into_dyn())
    }
}

impl Tensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Tensor::F32(_) => "f32",
            Tensor::I64(_) => "i64",
        }
    }
}

/// Named tensors of one forward pass: network outputs, the input point
/// clouds, and optionally the ground-truth labels of the batch.
///
/// Network outputs may carry a per-stage prefix (`last_center`,
/// `proposal_center`, ...). `point_clouds` and the label tensors never do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndPoints {
    tensors: BTreeMap<String, Tensor>,
}

impl EndPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tensor, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, tensor: impl Into<Tensor>) -> Option<Tensor> {
        self.tensors.insert(name.into(), tensor.into())
    }

    pub fn with(mut self, name: impl Into<String>, tensor: impl Into<Tensor>) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    fn view_f32<D: Dimension>(&self, name: &str) -> DecoderResult<ArrayView<'_, f32, D>> {
        match self.get(name) {
            Some(Tensor::F32(a)) => into_dim(a.view(), name),
            Some(t) => Err(wrong_dtype(name, "f32", t)),
            None => Err(DecoderError::MissingTensor(name.to_string())),
        }
    }

    fn view_i64<D: Dimension>(&self, name: &str) -> DecoderResult<ArrayView<'_, i64, D>> {
        match self.get(name) {
            Some(Tensor::I64(a)) => into_dim(a.view(), name),
            Some(t) => Err(wrong_dtype(name, "i64", t)),
            None => Err(DecoderError::MissingTensor(name.to_string())),
        }
    }

    /// Objectness logits as `(B, K)`, accepting a trailing unit axis.
    fn objectness(&self, name: &str) -> DecoderResult<Option<ArrayView2<'_, f32>>> {
        if !self.contains(name) {
            return Ok(None);
        }
        let view = self.view_f32::<IxDyn>(name)?;
        match view.shape() {
            [_, _] => Ok(Some(view.into_dimensionality::<Ix2>()?)),
            [_, _, 1] => Ok(Some(
                view.into_dimensionality::<Ix3>()?.index_axis_move(Axis(2), 0),
            )),
            shape => Err(DecoderError::InvalidShape(format!(
                "{} must be (B, K) or (B, K, 1), got {:?}",
                name, shape
            ))),
        }
    }

    /// Borrows the prediction heads stored under `prefix`.
    pub fn predictions(
        &self,
        prefix: &str,
        size_cls_agnostic: bool,
    ) -> DecoderResult<PredictionTensors<'_>> {
        let name = |n: &str| format!("{prefix}{n}");
        let size = if size_cls_agnostic {
            SizeHead::Direct(self.view_f32(&name("pred_size"))?)
        } else {
            SizeHead::Clustered {
                size_scores: self.view_f32(&name("size_scores"))?,
                size_residuals: self.view_f32(&name("size_residuals"))?,
            }
        };
        let point_clouds = if self.contains("point_clouds") {
            Some(self.view_f32("point_clouds")?)
        } else {
            None
        };
        Ok(PredictionTensors {
            center: self.view_f32(&name("center"))?,
            size,
            sem_cls_scores: self.view_f32(&name("sem_cls_scores"))?,
            objectness_scores: self.objectness(&name("objectness_scores"))?,
            point_clouds,
        })
    }

    /// Borrows the ground-truth labels of the batch.
    pub fn groundtruths(&self, size_cls_agnostic: bool) -> DecoderResult<GroundTruthTensors<'_>> {
        let size = if size_cls_agnostic {
            SizeLabels::Direct(self.view_f32("size_gts")?)
        } else {
            SizeLabels::Clustered {
                size_class_label: self.view_i64("size_class_label")?,
                size_residual_label: self.view_f32("size_residual_label")?,
            }
        };
        Ok(GroundTruthTensors {
            center_label: self.view_f32("center_label")?,
            size,
            sem_cls_label: self.view_i64("sem_cls_label")?,
            box_label_mask: self.view_f32("box_label_mask")?,
        })
    }
}

fn into_dim<'a, T, D: Dimension>(
    view: ArrayView<'a, T, IxDyn>,
    name: &str,
) -> DecoderResult<ArrayView<'a, T, D>> {
    let shape = view.shape().to_vec();
    view.into_dimensionality::<D>().map_err(|_| {
        DecoderError::InvalidShape(format!(
            "{} must have {} axes, got {:?}",
            name,
            D::NDIM.unwrap_or(0),
            shape
        ))
    })
}

fn wrong_dtype(name: &str, expected: &str, found: &Tensor) -> DecoderError {
    DecoderError::InvalidShape(format!(
        "{} must hold {} values, got {}",
        name,
        expected,
        found.dtype()
    ))
}

fn expect_shape(name: &str, shape: &[usize], expected: &[Option<usize>]) -> DecoderResult<()> {
    let matches = shape.len() == expected.len()
        && shape
            .iter()
            .zip(expected)
            .all(|(s, e)| e.is_none_or(|e| e == *s));
    if matches {
        return Ok(());
    }
    let expected: Vec<String> = expected
        .iter()
        .map(|e| e.map_or("_".to_string(), |e| e.to_string()))
        .collect();
    Err(DecoderError::InvalidShape(format!(
        "{} must be ({}), got {:?}",
        name,
        expected.join(", "),
        shape
    )))
}

/// Size regression head of the network.
#[derive(Debug, Clone)]
pub enum SizeHead<'a> {
    /// `size_scores (B, K, S)` over size clusters and
    /// `size_residuals (B, K, S, 3)` added to the cluster mean.
    Clustered {
        size_scores: ArrayView3<'a, f32>,
        size_residuals: ArrayView4<'a, f32>,
    },
    /// `pred_size (B, K, 3)`, regressed directly.
    Direct(ArrayView3<'a, f32>),
}

/// Borrowed prediction heads of one decoding stage.
#[derive(Debug, Clone)]
pub struct PredictionTensors<'a> {
    /// `(B, K, 3)` box centres in the depth convention.
    pub center: ArrayView3<'a, f32>,
    pub size: SizeHead<'a>,
    /// `(B, K, C + 1)` semantic logits, background last.
    pub sem_cls_scores: ArrayView3<'a, f32>,
    /// `(B, K)` objectness logits.
    pub objectness_scores: Option<ArrayView2<'a, f32>>,
    /// `(B, N, 3+)` input points in the depth convention.
    pub point_clouds: Option<ArrayView3<'a, f32>>,
}

impl PredictionTensors<'_> {
    pub fn batch_size(&self) -> usize {
        self.center.len_of(Axis(0))
    }

    pub fn num_proposal(&self) -> usize {
        self.center.len_of(Axis(1))
    }

    /// Checks every head against the centres and the dataset.
    pub fn validate(&self, config: &DecodeConfig) -> DecoderResult<()> {
        let (b, k) = (Some(self.batch_size()), Some(self.num_proposal()));
        expect_shape("center", self.center.shape(), &[b, k, Some(3)])?;
        match &self.size {
            SizeHead::Clustered {
                size_scores,
                size_residuals,
            } => {
                let s = Some(config.dataset_config.num_size_cluster());
                expect_shape("size_scores", size_scores.shape(), &[b, k, s])?;
                expect_shape("size_residuals", size_residuals.shape(), &[b, k, s, Some(3)])?;
            }
            SizeHead::Direct(pred_size) => {
                expect_shape("pred_size", pred_size.shape(), &[b, k, Some(3)])?;
            }
        }
        let c = Some(config.num_class() + 1);
        expect_shape("sem_cls_scores", self.sem_cls_scores.shape(), &[b, k, c])?;
        match self.objectness_scores {
            Some(obj) => expect_shape("objectness_scores", obj.shape(), &[b, k])?,
            None if !config.hungarian_loss => {
                return Err(DecoderError::MissingTensor("objectness_scores".to_string()));
            }
            None => {}
        }
        match self.point_clouds {
            Some(pc) if pc.len_of(Axis(2)) < 3 => {
                return Err(DecoderError::InvalidShape(format!(
                    "point_clouds must be (B, N, 3+), got {:?}",
                    pc.shape()
                )));
            }
            Some(pc) => expect_shape("point_clouds", &pc.shape()[..1], &[b])?,
            None if config.remove_empty_box => {
                return Err(DecoderError::MissingTensor("point_clouds".to_string()));
            }
            None => {}
        }
        Ok(())
    }
}

/// Box size labels.
#[derive(Debug, Clone)]
pub enum SizeLabels<'a> {
    /// `size_class_label (B, K2)` and `size_residual_label (B, K2, 3)`.
    Clustered {
        size_class_label: ArrayView2<'a, i64>,
        size_residual_label: ArrayView3<'a, f32>,
    },
    /// `size_gts (B, K2, 3)`.
    Direct(ArrayView3<'a, f32>),
}

/// Borrowed ground-truth labels of a batch.
#[derive(Debug, Clone)]
pub struct GroundTruthTensors<'a> {
    /// `(B, K2, 3+)` object centres in the depth convention.
    pub center_label: ArrayView3<'a, f32>,
    pub size: SizeLabels<'a>,
    /// `(B, K2)`
    pub sem_cls_label: ArrayView2<'a, i64>,
    /// `(B, K2)`, non-zero slots hold an object.
    pub box_label_mask: ArrayView2<'a, f32>,
}

impl GroundTruthTensors<'_> {
    pub fn batch_size(&self) -> usize {
        self.center_label.len_of(Axis(0))
    }

    pub fn max_num_obj(&self) -> usize {
        self.center_label.len_of(Axis(1))
    }

    pub fn validate(&self) -> DecoderResult<()> {
        let (b, k2) = (Some(self.batch_size()), Some(self.max_num_obj()));
        if self.center_label.len_of(Axis(2)) < 3 {
            return Err(DecoderError::InvalidShape(format!(
                "center_label must be (B, K2, 3+), got {:?}",
                self.center_label.shape()
            )));
        }
        match &self.size {
            SizeLabels::Clustered {
                size_class_label,
                size_residual_label,
            } => {
                expect_shape("size_class_label", size_class_label.shape(), &[b, k2])?;
                expect_shape(
                    "size_residual_label",
                    size_residual_label.shape(),
                    &[b, k2, Some(3)],
                )?;
            }
            SizeLabels::Direct(size_gts) => {
                expect_shape("size_gts", size_gts.shape(), &[b, k2, Some(3)])?;
            }
        }
        expect_shape("sem_cls_label", self.sem_cls_label.shape(), &[b, k2])?;
        expect_shape("box_label_mask", self.box_label_mask.shape(), &[b, k2])?;
        Ok(())
    }
}
