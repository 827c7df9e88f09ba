//! 确定性的预处理变换链：通道维、强度缩放、RAS重排与固定位置裁剪。

use super::consts::{CT_WINDOW_MAX, CT_WINDOW_MIN, DEFAULT_ROI, FOREGROUND, LITS_BACKGROUND};
use super::nii::Volume;
use super::orient::Orientation;
use crate::{Error, Result};
use ndarray::{s, Array4, Axis};
use std::path::Path;

/// 把`[a_min, a_max]`线性映射到`[b_min, b_max]`，可选截断。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleIntensityRange {
    pub a_min: f32,
    pub a_max: f32,
    pub b_min: f32,
    pub b_max: f32,
    pub clip: bool,
}

impl ScaleIntensityRange {
    /// 肝脏CT窗口`[-22.18, 450.0]`到`[0, 1]`。
    pub const CT_LIVER: Self = Self {
        a_min: CT_WINDOW_MIN,
        a_max: CT_WINDOW_MAX,
        b_min: 0.0,
        b_max: 1.0,
        clip: true,
    };

    /// 把`[a_min, a_max]`映射到`[0, 1]`并截断。
    #[inline]
    pub fn new(a_min: f32, a_max: f32) -> Self {
        Self {
            a_min,
            a_max,
            ..Self::CT_LIVER
        }
    }

    #[inline]
    pub fn scale(&self, v: f32) -> f32 {
        let span = self.a_max - self.a_min;
        let t = if span == 0.0 {
            v - self.a_min
        } else {
            (v - self.a_min) / span
        };
        let out = t * (self.b_max - self.b_min) + self.b_min;
        if self.clip {
            out.clamp(self.b_min, self.b_max)
        } else {
            out
        }
    }

    pub fn apply(&self, volume: &mut Array4<f32>) {
        volume.mapv_inplace(|v| self.scale(v));
    }
}

impl Default for ScaleIntensityRange {
    fn default() -> Self {
        Self::CT_LIVER
    }
}

/// 裁剪窗口的锚定方式。两者都不含随机性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropAnchor {
    /// 从每个轴的下标0开始。
    #[default]
    Corner,
    /// 以每个轴的中点`len / 2`为中心。
    Center,
}

/// 固定尺寸的空间裁剪。任一轴短于裁剪尺寸时报错，不做填充。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialCrop {
    pub roi: [usize; 3],
    pub anchor: CropAnchor,
}

impl SpatialCrop {
    #[inline]
    pub fn new(roi: [usize; 3], anchor: CropAnchor) -> Self {
        Self { roi, anchor }
    }

    /// 在空间尺寸为`shape`的体数据中，裁剪窗口每个轴的起点。
    pub fn start(&self, shape: [usize; 3]) -> Result<[usize; 3]> {
        let mut start = [0_usize; 3];
        for axis in 0..3 {
            let (len, roi) = (shape[axis], self.roi[axis]);
            if len < roi {
                return Err(Error::Undersized { axis, len, roi });
            }
            start[axis] = match self.anchor {
                CropAnchor::Corner => 0,
                CropAnchor::Center => (len / 2).saturating_sub(roi / 2).min(len - roi),
            };
        }
        Ok(start)
    }

    /// 裁剪通道在前的体数据`(C, X, Y, Z)`。
    pub fn apply<A: Clone>(&self, volume: &Array4<A>) -> Result<Array4<A>> {
        let (_, x, y, z) = volume.dim();
        let [s0, s1, s2] = self.start([x, y, z])?;
        let [r0, r1, r2] = self.roi;
        Ok(volume
            .slice(s![.., s0..s0 + r0, s1..s1 + r1, s2..s2 + r2])
            .to_owned())
    }
}

impl Default for SpatialCrop {
    fn default() -> Self {
        Self::new(DEFAULT_ROI, CropAnchor::Corner)
    }
}

/// 图像链与标注链共享的预处理参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    pub intensity: ScaleIntensityRange,
    pub crop: SpatialCrop,
    /// 标注中所有非背景标签（肝脏、肿瘤）都视为前景。
    pub binarize_masks: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            intensity: ScaleIntensityRange::CT_LIVER,
            crop: SpatialCrop::default(),
            binarize_masks: true,
        }
    }
}

/// 一条变换链。图像链与标注链只在强度缩放与二值化上不同，
/// 空间变换完全一致，以保证预测与标注逐体素对应。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChain {
    intensity: Option<ScaleIntensityRange>,
    crop: SpatialCrop,
    binarize: bool,
}

impl TransformChain {
    /// 扫描图像的变换链。
    pub fn image(cfg: &TransformConfig) -> Self {
        Self {
            intensity: Some(cfg.intensity),
            crop: cfg.crop,
            binarize: false,
        }
    }

    /// 分割标注的变换链。
    pub fn mask(cfg: &TransformConfig) -> Self {
        Self {
            intensity: None,
            crop: cfg.crop,
            binarize: cfg.binarize_masks,
        }
    }

    /// 读取文件并应用整条变换链。
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Array4<f32>> {
        let path = path.as_ref();
        let volume = Volume::open(path)?;
        log::debug!("读取`{}`，尺寸{:?}", path.display(), volume.shape());
        self.apply(volume)
    }

    /// 返回`(1, X', Y', Z')`，其中空间尺寸等于裁剪尺寸。
    pub fn apply(&self, volume: Volume) -> Result<Array4<f32>> {
        let orientation = Orientation::from_header(&volume.header);
        let mut data = volume.data.insert_axis(Axis(0));
        if let Some(intensity) = &self.intensity {
            intensity.apply(&mut data);
        }
        if !orientation.is_identity() {
            log::debug!("方位`{}`重排为RAS", orientation.axcodes());
        }
        let data = orientation.apply(data);
        let mut data = self.crop.apply(&data)?;
        if self.binarize {
            let background = f32::from(LITS_BACKGROUND);
            let foreground = f32::from(FOREGROUND);
            data.mapv_inplace(|v| if v != background { foreground } else { background });
        }
        Ok(data)
    }
}
