// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

pub type DecoderResult<T, E = DecoderError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum DecoderError {
    /// No configuration was given to the builder.
    NoConfig,
    InvalidConfig(String),
    /// A required network output or label tensor is absent.
    MissingTensor(String),
    InvalidShape(String),
    InvalidLabel(i64),
    InvalidSizeClass(usize),
    /// Suppression left no survivor in a scene where at least one is required.
    DegenerateBatch {
        scene: usize,
    },
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    Shape(ndarray::ShapeError),
    MinMax(ndarray_stats::errors::MinMaxError),
}

impl DecoderError {
    /// True for the errors a caller fixes by correcting its configuration or
    /// its tensor map.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DecoderError::NoConfig
                | DecoderError::InvalidConfig(_)
                | DecoderError::MissingTensor(_)
                | DecoderError::Json(_)
                | DecoderError::Yaml(_)
        )
    }
}

impl From<serde_json::Error> for DecoderError {
    fn from(err: serde_json::Error) -> Self {
        DecoderError::Json(err)
    }
}

impl From<serde_yaml::Error> for DecoderError {
    fn from(err: serde_yaml::Error) -> Self {
        DecoderError::Yaml(err)
    }
}

impl From<ndarray::ShapeError> for DecoderError {
    fn from(err: ndarray::ShapeError) -> Self {
        DecoderError::Shape(err)
    }
}

impl From<ndarray_stats::errors::MinMaxError> for DecoderError {
    fn from(err: ndarray_stats::errors::MinMaxError) -> Self {
        DecoderError::MinMax(err)
    }
}

impl std::fmt::Display for DecoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderError::NoConfig => write!(f, "No decoder configuration was provided"),
            DecoderError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            DecoderError::MissingTensor(name) => write!(f, "Missing tensor: {}", name),
            DecoderError::InvalidShape(msg) => write!(f, "Invalid shape: {}", msg),
            DecoderError::InvalidLabel(label) => write!(f, "Invalid label: {}", label),
            DecoderError::InvalidSizeClass(class) => write!(f, "Invalid size class: {}", class),
            DecoderError::DegenerateBatch { scene } => {
                write!(f, "NMS kept no boxes for scene {}", scene)
            }
            DecoderError::Json(e) => write!(f, "{}", e),
            DecoderError::Yaml(e) => write!(f, "{}", e),
            DecoderError::Shape(e) => write!(f, "{}", e),
            DecoderError::MinMax(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecoderError::Json(e) => Some(e),
            DecoderError::Yaml(e) => Some(e),
            DecoderError::Shape(e) => Some(e),
            DecoderError::MinMax(e) => Some(e),
            _ => None,
        }
    }
}
