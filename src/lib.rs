// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Post-processing and evaluation for 3D object detection.
//!
//! [`decoder`] turns network outputs into suppressed, scored boxes and label
//! tensors into ground-truth boxes; [`eval`] accumulates both over an
//! evaluation run and reports average precision. Box geometry shared by the
//! two lives in [`geometry`].
use log::debug;

mod error;

pub use det3d_decoder as decoder;
pub use det3d_eval as eval;
pub use det3d_geometry as geometry;

pub use det3d_decoder::{
    DatasetConfig, DecodeConfig, Decoder, DecoderBuilder, Detection, EndPoints, GroundTruth,
    NmsMode, ParsedPredictions,
};
pub use det3d_eval::{ApCalculator, ApMetric, ApMetrics, ClassMetrics, Evaluator};
pub use error::{Error, Result};

/// Decodes the predictions stored under `prefix` and the ground-truth labels
/// of one batch, and accumulates both into `calculator`.
pub fn evaluate_batch(
    decoder: &Decoder,
    calculator: &mut ApCalculator,
    end_points: &EndPoints,
    prefix: &str,
) -> Result<ParsedPredictions> {
    let parsed = decoder.decode_predictions(end_points, prefix)?;
    let ground_truth = decoder.decode_groundtruths(end_points)?;
    calculator.step_labeled(&parsed.detections, &ground_truth)?;
    debug!(
        "accumulated {} detections, {} scans so far",
        parsed.num_detections(),
        calculator.num_scans()
    );
    Ok(parsed)
}
