use std::path::PathBuf;
use thiserror::Error;

/// 评估流程中的所有错误。任何一种都会终止本次运行。
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read NIfTI file: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("failed to write npy file: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    #[error("`{path}` holds a {ndim}-D image, expected a 3-D volume")]
    NotVolume { path: PathBuf, ndim: usize },

    #[error("axis {axis} has length {len}, smaller than the crop extent {roi}")]
    Undersized { axis: usize, len: usize, roi: usize },

    #[error("invalid network configuration: {0}")]
    Config(String),

    #[error("weights file `{0}` does not exist")]
    MissingWeights(PathBuf),

    #[error("failed to load model weights: {0}")]
    Record(String),

    #[error("weights carry {found} parameters, the topology expects {expected}")]
    ParamCount { expected: usize, found: usize },

    #[error("parameter #{index} has shape {found:?}, the topology expects {expected:?}")]
    ParamShape {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("failed to read model output: {0}")]
    Tensor(String),

    #[error("unexpected logits shape {0:?}")]
    LogitsShape(Vec<usize>),

    #[error("prediction shape {prediction:?} differs from ground truth shape {ground_truth:?}")]
    SpatialMismatch {
        prediction: Vec<usize>,
        ground_truth: Vec<usize>,
    },

    #[error("failed to render animation: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
