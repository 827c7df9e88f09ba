pub use super::error::{Error, Result};
pub use super::eval::engine::{EvalMetrics, EvalOutcome, Evaluator, PredictionRecord};
pub use super::eval::pipeline::{generate_output, EvalConfig};
pub use super::eval::predict::{derive_predictions, BurnSegmenter, Segmenter};
pub use super::model::{load_pytorch_weights, UNet, UNetConfig};
pub use super::prep::consts::{
    CT_WINDOW_MAX, CT_WINDOW_MIN, DEFAULT_ROI, DEFAULT_VOLUME_IDS, FOREGROUND, LITS_BACKGROUND,
    LABEL_PREFIX, LITS_LIVER, LITS_TUMOR, SCAN_PREFIX,
};
pub use super::prep::{
    AccTimer, CropAnchor, Orientation, PairDataset, Sample, ScaleIntensityRange, SpatialCrop,
    TransformChain, TransformConfig, Volume, VolumePair,
};
pub use super::render::{Colormap, GifOptions};
