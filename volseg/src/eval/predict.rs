//! 前向推理与由logits得到标签。

use crate::model::UNet;
use crate::{Error, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{s, Array4, Array5};

/// 单通道输出时，sigmoid之后的前景阈值。
pub const BINARY_THRESHOLD: f32 = 0.5;

/// 分割模型的推理接口。
pub trait Segmenter {
    /// 对`(B, C_in, X, Y, Z)`输入做一次前向推理，返回`(B, C_out, X, Y, Z)`的原始logits。
    fn segment(&self, input: Array5<f32>) -> Result<Array5<f32>>;
}

/// 在burn后端上运行的U-Net。
///
/// 后端不带自动微分，因此推理不记录梯度；网络中没有dropout或running统计量，不区分训练与推理模式。
#[derive(Debug)]
pub struct BurnSegmenter<B: Backend> {
    model: UNet<B>,
    device: B::Device,
}

impl<B: Backend> BurnSegmenter<B> {
    #[inline]
    pub fn new(model: UNet<B>, device: B::Device) -> Self {
        Self { model, device }
    }
}

impl<B: Backend> Segmenter for BurnSegmenter<B> {
    fn segment(&self, input: Array5<f32>) -> Result<Array5<f32>> {
        let (b, c, x, y, z) = input.dim();
        let values: Vec<f32> = input.iter().copied().collect();
        let data = TensorData::new(values, [b, c, x, y, z]).convert::<B::FloatElem>();
        let output = self
            .model
            .forward(Tensor::<B, 5>::from_data(data, &self.device));

        let [ob, oc, ox, oy, oz] = output.dims();
        let values = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| Error::Tensor(format!("{e:?}")))?;
        Ok(Array5::from_shape_vec((ob, oc, ox, oy, oz), values)?)
    }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 由`(B, C, X, Y, Z)`的logits得到`(B, X, Y, Z)`的标签。
///
/// 单通道时`sigmoid(logit) > 0.5`为1，否则为0；多通道时取softmax之后概率最大的通道，
/// 并列时取下标最小者。
pub fn derive_predictions(logits: &Array5<f32>) -> Result<Array4<u8>> {
    let (b, c, x, y, z) = logits.dim();
    match c {
        0 => Err(Error::LogitsShape(logits.shape().to_vec())),
        1 => Ok(logits
            .slice(s![.., 0, .., .., ..])
            .mapv(|v| u8::from(sigmoid(v) > BINARY_THRESHOLD))),
        c if c > usize::from(u8::MAX) + 1 => Err(Error::LogitsShape(logits.shape().to_vec())),
        _ => Ok(Array4::from_shape_fn((b, x, y, z), |(n, i, j, k)| {
            let lane = logits.slice(s![n, .., i, j, k]);
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let sum: f32 = lane.iter().map(|&v| (v - max).exp()).sum();
            let mut best = (0_usize, f32::NEG_INFINITY);
            for (ch, &v) in lane.iter().enumerate() {
                let p = (v - max).exp() / sum;
                if p > best.1 {
                    best = (ch, p);
                }
            }
            best.0 as u8
        })),
    }
}
