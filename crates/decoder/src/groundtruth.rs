// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use det3d_geometry::{box_corners, flip_array_to_camera};
use log::debug;
use ndarray::s;

use crate::{DecodeConfig, DecoderError, DecoderResult, GroundTruth, GroundTruthTensors, SizeLabels};

/// Builds the labelled boxes of every scene, keeping slot order and skipping
/// padding slots (mask of zero). Labels are passed through as given, only
/// negative labels are rejected. Boxes use the upright camera
/// convention with a zero heading, like the decoded predictions.
pub fn parse_groundtruths(
    tensors: &GroundTruthTensors,
    config: &DecodeConfig,
) -> DecoderResult<Vec<Vec<GroundTruth>>> {
    config.validate()?;
    tensors.validate()?;

    let centers = flip_array_to_camera(&tensors.center_label.slice(s![.., .., ..3]));
    let mut batch = Vec::with_capacity(tensors.batch_size());

    for (i, mask) in tensors.box_label_mask.outer_iter().enumerate() {
        let mut objects = Vec::new();
        for (j, _) in mask.indexed_iter().filter(|(_, m)| **m != 0.0) {
            let size = match &tensors.size {
                SizeLabels::Direct(size_gts) => {
                    let s = size_gts.slice(s![i, j, ..]);
                    [s[0], s[1], s[2]]
                }
                SizeLabels::Clustered {
                    size_class_label,
                    size_residual_label,
                } => {
                    let size_class = size_class_label[[i, j]];
                    let size_class =
                        usize::try_from(size_class).map_err(|_| DecoderError::InvalidLabel(size_class))?;
                    let r = size_residual_label.slice(s![i, j, ..]);
                    config
                        .dataset_config
                        .class2size(size_class, [r[0], r[1], r[2]])?
                }
            };
            let label = tensors.sem_cls_label[[i, j]];
            let label = usize::try_from(label).map_err(|_| DecoderError::InvalidLabel(label))?;

            let c = centers.slice(s![i, j, ..]);
            objects.push(GroundTruth {
                label,
                corners: box_corners(size, 0.0, [c[0], c[1], c[2]]),
            });
        }
        debug!("scene {}: {} ground-truth objects", i, objects.len());
        batch.push(objects);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DatasetConfig, EndPoints};
    use ndarray::{Array2, Array3, array};

    fn config(size_cls_agnostic: bool) -> DecodeConfig {
        let mut config = DecodeConfig::new(DatasetConfig {
            num_class: 3,
            mean_size_arr: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 1.0], [0.5, 0.5, 0.5]],
            class_names: vec![],
        });
        config.size_cls_agnostic = size_cls_agnostic;
        config
    }

    fn end_points() -> EndPoints {
        let center_label = array![[[0.0f32, 2.0, 0.0], [1.0, 4.0, 0.5], [9.0, 9.0, 9.0]]];
        EndPoints::new()
            .with("center_label", center_label)
            .with("size_gts", Array3::from_elem((1, 3, 3), 1.0f32))
            .with("size_class_label", array![[1i64, 2, 0]])
            .with("size_residual_label", Array3::from_elem((1, 3, 3), 0.5f32))
            .with("sem_cls_label", array![[2i64, 0, 1]])
            .with("box_label_mask", array![[1.0f32, 1.0, 0.0]])
    }

    #[test]
    fn test_parse_groundtruths_masked() {
        let config = config(true);
        let ep = end_points();
        let gts = parse_groundtruths(&ep.groundtruths(true).unwrap(), &config).unwrap();
        assert_eq!(gts.len(), 1);
        assert_eq!(gts[0].len(), 2);
        assert_eq!(gts[0][0].label, 2);
        assert_eq!(gts[0][1].label, 0);

        let expected = box_corners([1.0, 1.0, 1.0], 0.0, [1.0, -0.5, 4.0]);
        assert!(gts[0][1].equal_within_delta(
            &GroundTruth {
                label: 0,
                corners: expected
            },
            1e-6
        ));
    }

    #[test]
    fn test_parse_groundtruths_clustered() {
        let config = config(false);
        let ep = end_points();
        let gts = parse_groundtruths(&ep.groundtruths(false).unwrap(), &config).unwrap();
        // cluster 1 (2, 2, 1) plus residual 0.5: camera axes hold (l, h, w)
        assert_eq!(gts[0][0].aabb().size(), [2.5, 1.5, 2.5]);
        assert_eq!(gts[0][1].aabb().size(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_parse_groundtruths_invalid_label() {
        let config = config(true);
        let mut ep = end_points();
        ep.insert("sem_cls_label", array![[2i64, -3, 1]]);
        let tensors = ep.groundtruths(true).unwrap();
        assert!(matches!(
            parse_groundtruths(&tensors, &config),
            Err(DecoderError::InvalidLabel(-3))
        ));

        // labels beyond the configured classes pass through unchanged
        ep.insert("sem_cls_label", array![[2i64, 7, 1]]);
        let gts = parse_groundtruths(&ep.groundtruths(true).unwrap(), &config).unwrap();
        assert_eq!(gts[0][1].label, 7);

        // padding slots are never read
        ep.insert("sem_cls_label", array![[2i64, 0, -1]]);
        let tensors = ep.groundtruths(true).unwrap();
        assert!(parse_groundtruths(&tensors, &config).is_ok());
    }

    #[test]
    fn test_parse_groundtruths_empty_scene() {
        let config = config(true);
        let mut ep = end_points();
        ep.insert("box_label_mask", Array2::<f32>::zeros((1, 3)));
        let gts = parse_groundtruths(&ep.groundtruths(true).unwrap(), &config).unwrap();
        assert_eq!(gts, vec![Vec::<GroundTruth>::new()]);
    }

    #[test]
    fn test_parse_groundtruths_nonzero_mask() {
        let config = config(true);
        let mut ep = end_points();
        ep.insert("box_label_mask", array![[0.25f32, 0.0, 2.0]]);
        let gts = parse_groundtruths(&ep.groundtruths(true).unwrap(), &config).unwrap();
        assert_eq!(gts[0].len(), 2);
        assert_eq!(gts[0][0].label, 2);
        assert_eq!(gts[0][1].label, 1);
    }
}
