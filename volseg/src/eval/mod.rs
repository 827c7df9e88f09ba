//! 推理、指标统计与整体评估流程。

pub mod engine;
pub mod metrics;
pub mod pipeline;
pub mod predict;

pub use engine::{EvalMetrics, EvalOutcome, Evaluator, PredictionRecord};
pub use metrics::{ConfusionMetric, DiceMetric};
pub use pipeline::{evaluate_with, generate_output, run, EvalConfig};
pub use predict::{derive_predictions, BurnSegmenter, Segmenter};
