// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::debug;

use crate::{
    DecodeConfig, DecoderError, DecoderResult, EndPoints, GroundTruth, ParsedPredictions,
    parse_groundtruths, parse_predictions,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecoderBuilder {
    config_src: Option<ConfigSource>,
    nms_iou: Option<f32>,
    conf_thresh: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(DecodeConfig),
}

impl DecoderBuilder {
    /// Creates a DecoderBuilder with no configuration.
    ///
    /// A valid configuration must be provided before building the Decoder.
    ///
    /// # Examples
    /// ```rust
    /// # use det3d_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// #  let config_yaml = include_str!("../../../testdata/votenet_scannet.yaml").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str(config_yaml)
    ///     .build()?;
    /// assert_eq!(decoder.config().nms_iou, 0.25);
    /// assert_eq!(decoder.config().conf_thresh, 0.05);
    ///
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a decoder configuration in YAML format. Does not check if the
    /// string is a correct configuration file. Use `DecoderBuilder.build()` to
    /// deserialize the YAML and validate the configuration.
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads a decoder configuration in JSON format. Does not check if the
    /// string is a correct configuration file. Use `DecoderBuilder.build()` to
    /// deserialize the JSON and validate the configuration.
    ///
    /// # Examples
    /// ```rust
    /// # use det3d_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let config_json = include_str!("../../../testdata/votenet_scannet.json").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_json_str(config_json)
    ///     .build()?;
    /// assert!(decoder.config().remove_empty_box);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    /// Loads an already deserialized configuration. Use
    /// `DecoderBuilder.build()` to validate it.
    pub fn with_config(mut self, config: DecodeConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Overrides the NMS overlap threshold of the configuration.
    ///
    /// # Examples
    /// ```rust
    /// # use det3d_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// # let config_json = include_str!("../../../testdata/votenet_scannet.json").to_string();
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_json_str(config_json)
    ///     .with_nms_iou(0.5)
    ///     .build()?;
    /// assert_eq!(decoder.config().nms_iou, 0.5);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_nms_iou(mut self, nms_iou: f32) -> Self {
        self.nms_iou = Some(nms_iou);
        self
    }

    /// Overrides the objectness threshold of the configuration.
    pub fn with_conf_thresh(mut self, conf_thresh: f32) -> Self {
        self.conf_thresh = Some(conf_thresh);
        self
    }

    /// Builds the decoder with the given settings. If the config is a JSON or
    /// YAML string, this will deserialize it first. The resulting
    /// configuration is validated.
    pub fn build(self) -> Result<Decoder, DecoderError> {
        let mut config = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => return Err(DecoderError::NoConfig),
        };
        if let Some(nms_iou) = self.nms_iou {
            config.nms_iou = nms_iou;
        }
        if let Some(conf_thresh) = self.conf_thresh {
            config.conf_thresh = conf_thresh;
        }
        config.validate()?;
        debug!(
            "decoder: {:?} NMS at {}, conf_thresh {}, {} classes",
            config.nms_mode(),
            config.nms_iou,
            config.conf_thresh,
            config.num_class()
        );
        Ok(Decoder { config })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoder {
    config: DecodeConfig,
}

impl Decoder {
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decodes the prediction heads stored under `prefix` (`""` for the final
    /// stage). Point clouds are read from the unprefixed `point_clouds` entry
    /// when empty boxes are removed.
    pub fn decode_predictions(
        &self,
        end_points: &EndPoints,
        prefix: &str,
    ) -> DecoderResult<ParsedPredictions> {
        let tensors = end_points.predictions(prefix, self.config.size_cls_agnostic)?;
        parse_predictions(&tensors, &self.config)
    }

    /// Decodes the ground-truth labels of the batch.
    pub fn decode_groundtruths(&self, end_points: &EndPoints) -> DecoderResult<Vec<Vec<GroundTruth>>> {
        let tensors = end_points.groundtruths(self.config.size_cls_agnostic)?;
        parse_groundtruths(&tensors, &self.config)
    }
}
