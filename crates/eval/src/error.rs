// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

pub type EvalResult<T, E = EvalError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Predictions and ground truth cover a different number of scenes.
    ShapeMismatch {
        predictions: usize,
        ground_truth: usize,
    },
    InvalidShape(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::ShapeMismatch {
                predictions,
                ground_truth,
            } => write!(
                f,
                "Batch size mismatch: {} predicted scenes, {} ground-truth scenes",
                predictions, ground_truth
            ),
            EvalError::InvalidShape(msg) => write!(f, "Invalid shape: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}
