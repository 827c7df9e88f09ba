use clap::ValueEnum;
use std::collections::BTreeSet;
use volseg::prep::CropAnchor;
use volseg::render::Colormap;

pub fn ranges_to_integers(s: &str) -> Result<BTreeSet<usize>, &'static str> {
    // 从形如`20,25`或`20-25,30`的字符串中提取编号。
    const ERR: &str = "整数范围格式错误";
    let mut set = BTreeSet::<usize>::new();
    for ranges in s.split(',') {
        let mut d_iter = ranges.trim().split('-');
        let d1: usize = d_iter.next().ok_or(ERR)?.parse().map_err(|_| ERR)?;
        if let Some(d2) = d_iter.next() {
            let d2: usize = d2.parse().map_err(|_| ERR)?;
            if d2 < d1 {
                return Err(ERR);
            }
            set.extend(d1..=d2);
            if d_iter.next().is_some() {
                return Err(ERR);
            }
        } else {
            set.insert(d1);
        }
    }
    Ok(set)
}

pub fn roi_legal(s: &str) -> Result<[usize; 3], String> {
    let dims: Vec<usize> = s
        .split(',')
        .map(|d| d.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("`{s}` is not a legal crop extent"))?;
    match dims.as_slice() {
        &[x, y, z] if x > 0 && y > 0 && z > 0 => Ok([x, y, z]),
        _ => Err(format!(
            "crop extent must be 3 positive integers like `512,512,160`, but got `{s}`"
        )),
    }
}

pub fn hu_legal_range(s: &str) -> Result<f32, String> {
    let hu: f32 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal intensity value"))?;
    if hu.is_nan() || hu.is_infinite() {
        return Err(format!("`{s}` is not a legal intensity value"));
    }
    if hu.abs() >= 10000.0 {
        return Err(format!(
            "intensity value should be in range (-10000, 10000), but got `{hu}`"
        ));
    }
    Ok(hu)
}

pub fn interval_legal_range(s: &str) -> Result<u32, String> {
    let ms: u32 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal frame interval"))?;
    if ms == 0 {
        return Err("frame interval must be positive".to_string());
    }
    Ok(ms)
}

#[derive(ValueEnum, Clone, Copy, Debug)]
/// 裁剪窗口的锚点。
pub enum AnchorArg {
    /// 从每个轴的下标0开始。
    Corner,
    /// 以每个轴的中点为中心。
    Center,
}

impl From<AnchorArg> for CropAnchor {
    fn from(a: AnchorArg) -> Self {
        match a {
            AnchorArg::Corner => CropAnchor::Corner,
            AnchorArg::Center => CropAnchor::Center,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
/// 动画使用的颜色映射。
pub enum CmapArg {
    /// 带蓝色调的灰度。
    Bone,
    /// 纯灰度。
    Gray,
}

impl From<CmapArg> for Colormap {
    fn from(c: CmapArg) -> Self {
        match c {
            CmapArg::Bone => Colormap::Bone,
            CmapArg::Gray => Colormap::Gray,
        }
    }
}
