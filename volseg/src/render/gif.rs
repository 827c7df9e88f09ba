//! 把三维标签体逐切片渲染为GIF。

use super::colormap::{slice_to_rgb, Colormap, Window};
use crate::eval::PredictionRecord;
use crate::prep::consts::FRAME_INTERVAL_MS;
use crate::{Error, Result};
use ndarray::ArrayView3;
use plotters::backend::RGBPixel;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::{Path, PathBuf};

/// 标题栏高度（像素）。
const TITLE_BAND: u32 = 28;
const TITLE_FONT_SIZE: u32 = 18;

/// 动画参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// 帧间隔（毫秒）。
    pub interval_ms: u32,
    pub colormap: Colormap,
    /// 是否在每帧上方绘制`Slice {k}`标题。
    pub title: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            interval_ms: FRAME_INTERVAL_MS,
            colormap: Colormap::Bone,
            title: true,
        }
    }
}

#[inline]
fn render_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Render(e.to_string())
}

/// 渲染`(X, Y, Z)`体数据：转置为`(Z, Y, X)`后，每个`Z`切片是一帧，帧高`Y`、宽`X`。
///
/// 显示窗口取整个体数据的最小值与最大值，各帧一致。返回写入的帧数。
pub fn render_volume_gif<P: AsRef<Path>>(
    volume: ArrayView3<f32>,
    path: P,
    opts: &GifOptions,
) -> Result<usize> {
    let frames = volume.permuted_axes([2, 1, 0]);
    let (n, h, w) = frames.dim();
    if n == 0 || h == 0 || w == 0 {
        return Err(Error::Render(format!(
            "cannot animate an empty volume {:?}",
            volume.shape()
        )));
    }
    let (w, h) = (w as u32, h as u32);
    let band = if opts.title { TITLE_BAND } else { 0 };
    let window = Window::from_values(volume.iter().copied());

    let root = BitMapBackend::gif(path.as_ref(), (w, h + band), opts.interval_ms)
        .map_err(render_err)?
        .into_drawing_area();
    let title_style = TextStyle::from(("sans-serif", TITLE_FONT_SIZE).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));

    for (k, slice) in frames.outer_iter().enumerate() {
        root.fill(&WHITE).map_err(render_err)?;
        let pixels = slice_to_rgb(slice, window, opts.colormap).into_raw();
        let element = BitMapElement::<(i32, i32), RGBPixel>::with_owned_buffer(
            (0, band as i32),
            (w, h),
            pixels,
        )
        .ok_or_else(|| Error::Render("slice buffer does not match frame size".into()))?;
        root.draw(&element).map_err(render_err)?;
        if opts.title {
            root.draw(&Text::new(
                format!("Slice {k}"),
                ((w / 2) as i32, (band / 2) as i32),
                title_style.clone(),
            ))
            .map_err(render_err)?;
        }
        root.present().map_err(render_err)?;
    }
    Ok(n)
}

/// 依次渲染`[pred_0, gt_0, pred_1, gt_1, ...]`为`dir/mask{idx}.gif`，目录不存在时创建。
pub fn render_records(
    records: &[PredictionRecord],
    dir: &Path,
    opts: &GifOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let volumes = records
        .iter()
        .flat_map(|r| [&r.prediction, &r.ground_truth]);

    let mut paths = Vec::with_capacity(records.len() * 2);
    for (idx, volume) in volumes.enumerate() {
        let path = dir.join(format!("mask{idx}.gif"));
        let frames = render_volume_gif(volume.mapv(f32::from).view(), &path, opts)?;
        log::info!("写入`{}`，共{frames}帧", path.display());
        paths.push(path);
    }
    Ok(paths)
}
