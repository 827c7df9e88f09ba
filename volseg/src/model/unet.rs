//! 残差U-Net。
//!
//! 拓扑：`n`个编码器阶段（每个阶段是一个带步长的残差单元），一个步长为1的瓶颈残差单元，
//! 以及`n`个解码器阶段（转置卷积上采样后接一个单子单元的残差单元）。编码器输出与更深一层的
//! 结果按通道拼接后送入同层解码器。卷积单元的顺序是卷积、实例归一化、PReLU。

use crate::{Error, Result};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dConfig, ConvTranspose3d, ConvTranspose3dConfig};
use burn::nn::{PRelu, PReluConfig, PaddingConfig3d};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

const KERNEL_SIZE: usize = 3;
const INSTANCE_NORM_EPS: f64 = 1e-5;
const PRELU_INIT: f64 = 0.25;

/// 非仿射的实例归一化：每个样本的每个通道独立归一化为零均值、单位方差。
pub fn instance_norm<B: Backend>(x: Tensor<B, 5>, eps: f64) -> Tensor<B, 5> {
    let [b, c, d1, d2, d3] = x.dims();
    let flat = x.reshape([b, c, d1 * d2 * d3]);
    let mean = flat.clone().mean_dim(2);
    let centered = flat.sub(mean);
    let var = centered.clone().powf_scalar(2.0).mean_dim(2);
    centered
        .div(var.add_scalar(eps).sqrt())
        .reshape([b, c, d1, d2, d3])
}

fn prelu<B: Backend>(device: &B::Device) -> PRelu<B> {
    PReluConfig::new()
        .with_num_parameters(1)
        .with_alpha(PRELU_INIT)
        .init(device)
}

/// 卷积 + 实例归一化 + PReLU；`act`为`None`时只有卷积。
#[derive(Module, Debug)]
pub struct ConvUnit<B: Backend> {
    conv: Conv3d<B>,
    act: Option<PRelu<B>>,
}

impl<B: Backend> ConvUnit<B> {
    pub fn new(device: &B::Device, channels: [usize; 2], stride: usize, conv_only: bool) -> Self {
        let conv = Conv3dConfig::new(channels, [KERNEL_SIZE; 3])
            .with_stride([stride; 3])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .init(device);
        Self {
            conv,
            act: (!conv_only).then(|| prelu(device)),
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let x = self.conv.forward(x);
        match &self.act {
            Some(act) => act.forward(instance_norm(x, INSTANCE_NORM_EPS)),
            None => x,
        }
    }
}

/// 若干卷积单元串联，加上残差支路。通道数或步长改变时，残差支路是一个卷积，否则是恒等映射。
#[derive(Module, Debug)]
pub struct ResidualUnit<B: Backend> {
    units: Vec<ConvUnit<B>>,
    residual: Option<Conv3d<B>>,
}

impl<B: Backend> ResidualUnit<B> {
    pub fn new(
        device: &B::Device,
        [c_in, c_out]: [usize; 2],
        stride: usize,
        subunits: usize,
        last_conv_only: bool,
    ) -> Self {
        let units = (0..subunits)
            .map(|su| {
                let (c, s) = if su == 0 { (c_in, stride) } else { (c_out, 1) };
                ConvUnit::new(
                    device,
                    [c, c_out],
                    s,
                    last_conv_only && su + 1 == subunits,
                )
            })
            .collect();

        let residual = (stride != 1 || c_in != c_out).then(|| {
            // 只改变通道数时用1x1x1卷积
            let (k, p) = if stride == 1 { (1, 0) } else { (KERNEL_SIZE, 1) };
            Conv3dConfig::new([c_in, c_out], [k; 3])
                .with_stride([stride; 3])
                .with_padding(PaddingConfig3d::Explicit(p, p, p))
                .init(device)
        });

        Self { units, residual }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let res = match &self.residual {
            Some(conv) => conv.forward(x.clone()),
            None => x.clone(),
        };
        let cx = self.units.iter().fold(x, |x, unit| unit.forward(x));
        cx + res
    }
}

/// 转置卷积上采样 + PReLU。
#[derive(Module, Debug)]
pub struct TransposeUnit<B: Backend> {
    conv: ConvTranspose3d<B>,
    act: PRelu<B>,
}

impl<B: Backend> TransposeUnit<B> {
    pub fn new(device: &B::Device, channels: [usize; 2], stride: usize) -> Self {
        let conv = ConvTranspose3dConfig::new(channels, [KERNEL_SIZE; 3])
            .with_stride([stride; 3])
            .with_padding([1; 3])
            .with_padding_out([stride - 1; 3])
            .init(device);
        Self {
            conv,
            act: prelu(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        self.act
            .forward(instance_norm(self.conv.forward(x), INSTANCE_NORM_EPS))
    }
}

/// 解码器的一个阶段。
#[derive(Module, Debug)]
pub struct UpLayer<B: Backend> {
    transpose: TransposeUnit<B>,
    refine: ResidualUnit<B>,
}

impl<B: Backend> UpLayer<B> {
    /// `is_top`为真时，这是输出层：最后一个卷积不带归一化与激活。
    pub fn new(device: &B::Device, [c_in, c_out]: [usize; 2], stride: usize, is_top: bool) -> Self {
        Self {
            transpose: TransposeUnit::new(device, [c_in, c_out], stride),
            refine: ResidualUnit::new(device, [c_out, c_out], 1, 1, is_top),
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        self.refine.forward(self.transpose.forward(x))
    }
}

/// 网络超参数。
#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = 1)]
    pub in_channels: usize,
    #[config(default = 1)]
    pub out_channels: usize,
    /// 各阶段通道数，最后一个是瓶颈层。
    pub channels: Vec<usize>,
    /// 各编码器阶段的步长，比`channels`少一个。
    pub strides: Vec<usize>,
    #[config(default = 2)]
    pub num_res_units: usize,
}

impl UNetConfig {
    /// 通道`(16, 32, 64, 128, 256)`，步长`(2, 2, 2, 2)`，每阶段两个残差子单元。
    pub fn monai_default() -> Self {
        Self::new(vec![16, 32, 64, 128, 256], vec![2, 2, 2, 2])
    }

    /// 编码器阶段数。
    #[inline]
    pub fn depth(&self) -> usize {
        self.strides.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.len() < 2 {
            return Err(Error::Config(format!(
                "at least 2 channel entries are required, got {}",
                self.channels.len()
            )));
        }
        if self.strides.len() + 1 != self.channels.len() {
            return Err(Error::Config(format!(
                "{} strides given for {} channel entries",
                self.strides.len(),
                self.channels.len()
            )));
        }
        if self.strides.contains(&0) || self.channels.contains(&0) {
            return Err(Error::Config("strides and channels must be positive".into()));
        }
        if self.num_res_units == 0 {
            return Err(Error::Config("num_res_units must be at least 1".into()));
        }
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(Error::Config("in/out channels must be positive".into()));
        }
        Ok(())
    }

    /// 输入空间尺寸必须能被步长之积整除，否则上采样结果与跳跃连接对不齐。
    pub fn check_input(&self, spatial: [usize; 3]) -> Result<()> {
        let factor: usize = self.strides.iter().product();
        if factor == 0 || spatial.iter().any(|&d| d == 0 || d % factor != 0) {
            return Err(Error::Config(format!(
                "spatial size {spatial:?} is not a positive multiple of {factor}"
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<UNet<B>> {
        self.validate()?;
        let ch = &self.channels;
        let n = self.depth();

        let mut down = Vec::with_capacity(n);
        let mut c_in = self.in_channels;
        for (&c, &s) in ch.iter().zip(&self.strides) {
            down.push(ResidualUnit::new(device, [c_in, c], s, self.num_res_units, false));
            c_in = c;
        }
        let bottom = ResidualUnit::new(device, [ch[n - 1], ch[n]], 1, self.num_res_units, false);

        let up = (0..n)
            .map(|i| {
                // 最深一层拼接的是瓶颈输出，其余层拼接的是同宽的子网络输出
                let c_in = if i + 1 == n { ch[i] + ch[i + 1] } else { ch[i] * 2 };
                let c_out = if i == 0 { self.out_channels } else { ch[i - 1] };
                UpLayer::new(device, [c_in, c_out], self.strides[i], i == 0)
            })
            .collect();

        Ok(UNet { down, bottom, up })
    }
}

/// 三维残差U-Net。
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    down: Vec<ResidualUnit<B>>,
    bottom: ResidualUnit<B>,
    up: Vec<UpLayer<B>>,
}

impl<B: Backend> UNet<B> {
    /// `(B, C_in, X, Y, Z)` -> `(B, C_out, X, Y, Z)`。各空间尺寸需能被步长之积整除。
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        let mut skips = Vec::with_capacity(self.down.len());
        let mut x = input;
        for layer in &self.down {
            x = layer.forward(x);
            skips.push(x.clone());
        }
        let mut x = self.bottom.forward(x);
        for (layer, skip) in self.up.iter().zip(skips).rev() {
            x = layer.forward(Tensor::cat(vec![skip, x], 1));
        }
        x
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.down.len()
    }
}
