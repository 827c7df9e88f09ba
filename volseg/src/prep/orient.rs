//! 重排体数据到RAS方位。

use super::nii::spatial_matrix;
use ndarray::{Array4, Axis};
use nifti::NiftiHeader;

const POSITIVE_CODES: [char; 3] = ['R', 'A', 'S'];
const NEGATIVE_CODES: [char; 3] = ['L', 'P', 'I'];

/// 从体素轴到RAS+世界轴的重排方案。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    /// 输出第`a`个空间轴取自输入的第`source[a]`个空间轴。
    source: [usize; 3],
    /// 输出第`a`个空间轴是否需要翻转。
    flip: [bool; 3],
}

impl Orientation {
    pub const IDENTITY: Self = Self {
        source: [0, 1, 2],
        flip: [false; 3],
    };

    /// 由体素到世界坐标的3x3矩阵求重排方案。
    ///
    /// 每次在尚未分配的行列中选出绝对值最大的元素，把该列（体素轴）分配给该行（世界轴），
    /// 元素为负则需要翻转。
    pub fn from_matrix(m: &[[f64; 3]; 3]) -> Self {
        let mut source = [0_usize; 3];
        let mut flip = [false; 3];
        let mut world_used = [false; 3];
        let mut voxel_used = [false; 3];

        for _ in 0..3 {
            let mut best: Option<(usize, usize, f64)> = None;
            for (w, row) in m.iter().enumerate() {
                if world_used[w] {
                    continue;
                }
                for (v, &value) in row.iter().enumerate() {
                    if voxel_used[v] {
                        continue;
                    }
                    if best.map_or(true, |(_, _, b)| value.abs() > b) {
                        best = Some((w, v, value.abs()));
                    }
                }
            }
            if let Some((w, v, _)) = best {
                world_used[w] = true;
                voxel_used[v] = true;
                source[w] = v;
                flip[w] = m[w][v] < 0.0;
            }
        }
        Self { source, flip }
    }

    #[inline]
    pub fn from_header(header: &NiftiHeader) -> Self {
        Self::from_matrix(&spatial_matrix(header))
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// 输入体素轴的方位码，例如LiTS常见的`"LPS"`。
    pub fn axcodes(&self) -> String {
        let mut codes = ['?'; 3];
        for (w, &v) in self.source.iter().enumerate() {
            codes[v] = if self.flip[w] {
                NEGATIVE_CODES[w]
            } else {
                POSITIVE_CODES[w]
            };
        }
        codes.iter().collect()
    }

    /// 把通道在前的体数据`(C, X, Y, Z)`重排为RAS轴序。返回标准内存布局的新数组。
    pub fn apply<A: Clone>(&self, volume: Array4<A>) -> Array4<A> {
        if self.is_identity() {
            return volume;
        }
        let [s0, s1, s2] = self.source;
        let mut out = volume.permuted_axes([0, s0 + 1, s1 + 1, s2 + 1]);
        for (a, &f) in self.flip.iter().enumerate() {
            if f {
                out.invert_axis(Axis(a + 1));
            }
        }
        out.as_standard_layout().into_owned()
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}
