//! NIfTI体数据读取与体素到世界坐标的方向矩阵。

use crate::{Error, Result};
use ndarray::{Array3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

/// 一个三维体数据`(X, Y, Z)`及其头信息。
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f32>,
    pub header: NiftiHeader,
}

impl Volume {
    #[inline]
    pub fn new(data: Array3<f32>, header: NiftiHeader) -> Self {
        Self { data, header }
    }

    /// 读取`.nii`或`.nii.gz`文件。体素值已经按照头信息中的`scl_slope`与`scl_inter`缩放。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new().read_file(path)?;
        let header = obj.header().clone();
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let data = match data.ndim() {
            3 => data,
            // 部分导出工具会写出长度为1的时间维
            4 if data.shape()[3] == 1 => data.index_axis_move(Axis(3), 0),
            ndim => {
                return Err(Error::NotVolume {
                    path: path.to_path_buf(),
                    ndim,
                })
            }
        };
        let data = data.into_dimensionality::<Ix3>()?;
        Ok(Self { data, header })
    }

    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        let (x, y, z) = self.data.dim();
        [x, y, z]
    }
}

/// 按照sform、qform、像素间距的优先级，求体素坐标到世界坐标(RAS+)仿射变换的3x3线性部分。
///
/// 两种form都缺失时，与ANALYZE约定一致，x轴取负方向。
pub fn spatial_matrix(header: &NiftiHeader) -> [[f64; 3]; 3] {
    let mut m = [[0.0_f64; 3]; 3];
    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        for (r, row) in rows.iter().enumerate() {
            for c in 0..3 {
                m[r][c] = f64::from(row[c]);
            }
        }
        return m;
    }

    let spacing: [f64; 3] = [1, 2, 3].map(|i| {
        let d = f64::from(header.pixdim[i]).abs();
        if d == 0.0 {
            1.0
        } else {
            d
        }
    });

    if header.qform_code > 0 {
        let b = f64::from(header.quatern_b);
        let c = f64::from(header.quatern_c);
        let d = f64::from(header.quatern_d);
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let r = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - b * b - c * c,
            ],
        ];
        let scale = [spacing[0], spacing[1], spacing[2] * qfac];
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] = r[i][j] * scale[j];
            }
        }
        return m;
    }

    m[0][0] = -spacing[0];
    m[1][1] = spacing[1];
    m[2][2] = spacing[2];
    m
}

/// 测试用：生成带有给定sform的头信息。
#[cfg(test)]
pub(crate) fn test_header(srow: [[f32; 4]; 3]) -> NiftiHeader {
    NiftiHeader {
        pixdim: [1.0; 8],
        scl_slope: 1.0,
        scl_inter: 0.0,
        sform_code: 1,
        srow_x: srow[0],
        srow_y: srow[1],
        srow_z: srow[2],
        ..NiftiHeader::default()
    }
}

/// 测试用：RAS单位方向的头信息。
#[cfg(test)]
pub(crate) fn ras_header() -> NiftiHeader {
    test_header([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ])
}

/// 测试用：把体数据写入NIfTI文件。
#[cfg(test)]
pub(crate) fn write_test_volume(path: &Path, data: &Array3<f32>, header: &NiftiHeader) {
    nifti::writer::WriterOptions::new(path)
        .reference_header(header)
        .write_nifti(data)
        .unwrap();
}
