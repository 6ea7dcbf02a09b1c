// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use det3d::decoder::DecoderError;
use det3d::eval::EvalError;
use det3d::{
    ApCalculator, ApMetric, DatasetConfig, DecodeConfig, DecoderBuilder, EndPoints, Error,
    NmsMode, evaluate_batch,
};
use ndarray::{Array2, Array3, Array4, array};

#[ctor::ctor]
fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn config() -> DecodeConfig {
    DecodeConfig::new(DatasetConfig {
        num_class: 2,
        mean_size_arr: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
        class_names: vec!["chair".to_string(), "table".to_string()],
    })
}

/// Three proposals: a chair at the origin, a weaker duplicate of it, and a
/// table three metres along x.
fn with_heads(end_points: EndPoints, prefix: &str, objectness: [f32; 3]) -> EndPoints {
    let center: Array3<f32> = array![[[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [3.0, 0.0, 0.0]]];
    let size_scores: Array3<f32> = array![[[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]]];
    let size_residuals = Array4::<f32>::zeros((1, 3, 2, 3));
    let sem_cls_scores: Array3<f32> =
        array![[[5.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 5.0, 0.0]]];
    let objectness_scores = Array2::from_shape_vec((1, 3), objectness.to_vec()).unwrap();
    end_points
        .with(format!("{prefix}center"), center)
        .with(format!("{prefix}size_scores"), size_scores)
        .with(format!("{prefix}size_residuals"), size_residuals)
        .with(format!("{prefix}sem_cls_scores"), sem_cls_scores)
        .with(format!("{prefix}objectness_scores"), objectness_scores)
}

/// The chair and the table, plus one padding slot.
fn with_labels(end_points: EndPoints) -> EndPoints {
    let center_label: Array3<f32> = array![[[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [9.0, 9.0, 9.0]]];
    let size_class_label: Array2<i64> = array![[0, 1, 0]];
    let sem_cls_label: Array2<i64> = array![[0, 1, 0]];
    let box_label_mask: Array2<f32> = array![[1.0, 1.0, 0.0]];
    end_points
        .with("center_label", center_label)
        .with("size_class_label", size_class_label)
        .with("size_residual_label", Array3::<f32>::zeros((1, 3, 3)))
        .with("sem_cls_label", sem_cls_label)
        .with("box_label_mask", box_label_mask)
}

#[test]
fn test_decode_and_evaluate() {
    let decoder = DecoderBuilder::new().with_config(config()).build().unwrap();
    assert_eq!(decoder.config().nms_mode(), NmsMode::VolumeSameClass);
    let end_points = with_labels(with_heads(EndPoints::new(), "", [5.0, 3.0, 5.0]));

    let mut calculator = ApCalculator::new(0.25);
    let parsed = evaluate_batch(&decoder, &mut calculator, &end_points, "").unwrap();

    // the duplicate chair is suppressed, the other two emit one box per class
    assert_eq!(parsed.pred_mask, array![[true, false, true]]);
    assert_eq!(parsed.num_detections(), 4);
    let best_chair = parsed.detections[0]
        .iter()
        .filter(|d| d.label == 0)
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .unwrap();
    assert!(best_chair.aabb().center().iter().all(|c| c.abs() < 1e-6));
    assert!(best_chair.score > 0.9);

    let metrics = calculator.compute_metrics();
    assert_eq!(metrics.per_class.len(), 2);
    assert_eq!(metrics.ap(0), Some(1.0));
    assert_eq!(metrics.ap(1), Some(1.0));
    assert_eq!(metrics.mean_ap, 1.0);
    assert_eq!(metrics.mean_recall, 1.0);

    let names = &decoder.config().dataset_config.class_names;
    let scalars = metrics.scalars(names);
    assert_eq!(scalars[0], ("AP_0.25".to_string(), 1.0));
    assert_eq!(scalars[3].0, "AP_0.25/table");
    metrics.log_summary(names);
}

#[test]
fn test_intermediate_stage_prefix() {
    let decoder = DecoderBuilder::new().with_config(config()).build().unwrap();
    // objectness below the confidence threshold at the intermediate stage
    let end_points = with_labels(with_heads(
        with_heads(EndPoints::new(), "", [5.0, 3.0, 5.0]),
        "last_",
        [-5.0, -5.0, -5.0],
    ));

    let mut last = ApCalculator::new(0.25);
    let parsed = evaluate_batch(&decoder, &mut last, &end_points, "last_").unwrap();
    assert_eq!(parsed.num_detections(), 0);
    let metrics = last.compute_metrics();
    assert_eq!(metrics.per_class.len(), 2);
    assert_eq!(metrics.mean_ap, 0.0);
    assert_eq!(metrics.mean_recall, 0.0);

    let mut fin = ApCalculator::new(0.25);
    evaluate_batch(&decoder, &mut fin, &end_points, "").unwrap();
    assert_eq!(fin.compute_metrics().mean_ap, 1.0);
}

#[test]
fn test_accumulates_across_batches() {
    let decoder = DecoderBuilder::new().with_config(config()).build().unwrap();
    let good = with_labels(with_heads(EndPoints::new(), "", [5.0, 3.0, 5.0]));
    let missed = with_labels(with_heads(EndPoints::new(), "", [-5.0, -5.0, -5.0]));

    let mut calculator = ApCalculator::new(0.25).with_metric(ApMetric::ElevenPoint);
    evaluate_batch(&decoder, &mut calculator, &good, "").unwrap();
    evaluate_batch(&decoder, &mut calculator, &missed, "").unwrap();
    assert_eq!(calculator.num_scans(), 2);

    // half of the objects are never predicted
    let metrics = calculator.compute_metrics();
    assert_eq!(metrics.mean_recall, 0.5);
    for class in [0, 1] {
        let ap = metrics.ap(class).unwrap();
        assert!((ap - 6.0 / 11.0).abs() < 1e-6, "class {class}: {ap}");
    }

    calculator.reset();
    assert_eq!(calculator.num_scans(), 0);
    assert_eq!(calculator.compute_metrics().mean_ap, 0.0);
}

#[test]
fn test_errors_are_wrapped() {
    let decoder = DecoderBuilder::new().with_config(config()).build().unwrap();
    let mut calculator = ApCalculator::new(0.25);

    let mut end_points = with_labels(with_heads(EndPoints::new(), "", [5.0, 3.0, 5.0]));
    end_points.remove("box_label_mask");
    let err = evaluate_batch(&decoder, &mut calculator, &end_points, "").unwrap_err();
    assert!(
        matches!(&err, Error::Decoder(DecoderError::MissingTensor(name)) if name == "box_label_mask"),
        "{err}"
    );

    // ground truth for two scenes, predictions for one
    let end_points = with_heads(EndPoints::new(), "", [5.0, 3.0, 5.0])
        .with("center_label", Array3::<f32>::zeros((2, 3, 3)))
        .with("size_class_label", Array2::<i64>::zeros((2, 3)))
        .with("size_residual_label", Array3::<f32>::zeros((2, 3, 3)))
        .with("sem_cls_label", Array2::<i64>::zeros((2, 3)))
        .with("box_label_mask", Array2::<f32>::zeros((2, 3)));
    let err = evaluate_batch(&decoder, &mut calculator, &end_points, "").unwrap_err();
    assert!(matches!(
        err,
        Error::Eval(EvalError::ShapeMismatch {
            predictions: 1,
            ground_truth: 2
        })
    ));
    assert_eq!(calculator.num_scans(), 0);
}

#[test]
fn test_scannet_config() {
    let decoder = DecoderBuilder::new()
        .with_config_yaml_str(include_str!("../testdata/votenet_scannet.yaml").to_string())
        .build()
        .unwrap();
    let config = decoder.config();
    assert_eq!(config.num_class(), 18);
    assert_eq!(config.dataset_config.num_size_cluster(), 18);
    assert_eq!(config.dataset_config.class_name(0), Some("cabinet"));
}
