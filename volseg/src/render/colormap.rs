//! 灰度切片到RGB图像的映射。

use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use plotters::style::colors::colormaps::{BlackWhite, Bone, ColorMap};
use plotters::style::RGBColor;

/// 颜色映射。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    /// 带一点蓝色调的灰度。
    #[default]
    Bone,
    Gray,
}

impl Colormap {
    /// 把`v`按`window`映射为颜色，窗口外的值截断到两端，`NaN`视为下界。
    pub fn rgb(self, v: f32, window: Window) -> Rgb<u8> {
        let v = if v.is_nan() { window.lo } else { v };
        let RGBColor(r, g, b) = match self {
            Colormap::Bone => Bone.get_color_normalized(v, window.lo, window.hi),
            Colormap::Gray => BlackWhite.get_color_normalized(v, window.lo, window.hi),
        };
        Rgb([r, g, b])
    }
}

/// 显示窗口`[lo, hi]`，保证`hi > lo`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub lo: f32,
    pub hi: f32,
}

impl Window {
    /// 取所有有限值的最小值与最大值；没有有限值时为`[0, 1]`，所有值相同时为`[v, v + 1]`。
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Self {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if lo > hi {
            Self { lo: 0.0, hi: 1.0 }
        } else if lo == hi {
            Self { lo, hi: lo + 1.0 }
        } else {
            Self { lo, hi }
        }
    }
}

/// 把`(H, W)`切片渲染为`W x H`的RGB图像。
pub fn slice_to_rgb(slice: ArrayView2<f32>, window: Window, cmap: Colormap) -> RgbImage {
    let (h, w) = slice.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        cmap.rgb(slice[[y as usize, x as usize]], window)
    })
}
