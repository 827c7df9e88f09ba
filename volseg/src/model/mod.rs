//! 三维残差U-Net及其PyTorch权重加载。

pub mod unet;
pub mod weights;

pub use unet::{ConvUnit, ResidualUnit, UNet, UNetConfig, UNetRecord, UpLayer};
pub use weights::{load_pytorch_weights, monai_key_remap, param_shapes};
