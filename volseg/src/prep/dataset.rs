//! 扫描与标注成对的数据集，按迭代顺序惰性加载。

use super::consts::{LABEL_PREFIX, SCAN_PREFIX};
use super::transform::{TransformChain, TransformConfig};
use crate::Result;
use ndarray::Array4;
use std::path::{Path, PathBuf};

/// 一对扫描与标注文件路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePair {
    pub image: PathBuf,
    pub mask: PathBuf,
}

impl VolumePair {
    #[inline]
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(image: P, mask: Q) -> Self {
        Self {
            image: image.into(),
            mask: mask.into(),
        }
    }

    /// LiTS命名约定下编号为`id`的一对文件：`{scan_prefix}-{id}.nii`与`{label_prefix}-{id}.nii`。
    pub fn lits(data_dir: &Path, id: usize, scan_prefix: &str, label_prefix: &str) -> Self {
        Self::new(
            data_dir.join(format!("{scan_prefix}-{id}.nii")),
            data_dir.join(format!("{label_prefix}-{id}.nii")),
        )
    }

    /// 使用默认前缀`volume`与`new-segmentation`。
    #[inline]
    pub fn lits_default(data_dir: &Path, id: usize) -> Self {
        Self::lits(data_dir, id, SCAN_PREFIX, LABEL_PREFIX)
    }
}

/// 变换后的一个样本，两者形状都是`(1, X, Y, Z)`。
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: Array4<f32>,
    pub mask: Array4<f32>,
}

/// 成对数据集。
#[derive(Debug, Clone)]
pub struct PairDataset {
    pairs: Vec<VolumePair>,
    image_chain: TransformChain,
    mask_chain: TransformChain,
}

impl PairDataset {
    pub fn new(pairs: Vec<VolumePair>, cfg: &TransformConfig) -> Self {
        Self {
            pairs,
            image_chain: TransformChain::image(cfg),
            mask_chain: TransformChain::mask(cfg),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// 读取并变换第`idx`对。
    ///
    /// # Panics
    ///
    /// `idx`越界时panic。
    pub fn get(&self, idx: usize) -> Result<Sample> {
        let pair = &self.pairs[idx];
        log::info!("加载第{idx}对: `{}`", pair.image.display());
        Ok(Sample {
            image: self.image_chain.load(&pair.image)?,
            mask: self.mask_chain.load(&pair.mask)?,
        })
    }

    /// 按输入顺序惰性地产生样本。
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.pairs.len()).map(move |idx| self.get(idx))
    }
}
