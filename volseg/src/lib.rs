//! 三维肝脏分割模型的离线评估。
//!
//! 流程：读取NIfTI体数据并做确定性预处理，用残差U-Net推理，统计Dice系数、
//! 召回率与精确率，最后把预测与标注逐切片渲染为GIF动画。

pub mod error;
pub mod eval;
pub mod model;
pub mod prelude;
pub mod prep;
pub mod render;

pub use error::{Error, Result};
pub use eval::pipeline::generate_output;
