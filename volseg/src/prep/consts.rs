//! 数据集与预处理常量。

/// LiTS数据集中，背景的标签值。
pub const LITS_BACKGROUND: u8 = 0;

/// LiTS数据集中，肝脏的标签值。
pub const LITS_LIVER: u8 = 1;

/// LiTS数据集中，肿瘤的标签值。
pub const LITS_TUMOR: u8 = 2;

/// 二值化之后的前景标签值。肝脏与肿瘤都视为前景。
pub const FOREGROUND: u8 = 1;

/// 强度缩放的源区间下界（HU）。
pub const CT_WINDOW_MIN: f32 = -22.18;

/// 强度缩放的源区间上界（HU）。
pub const CT_WINDOW_MAX: f32 = 450.0;

/// 裁剪后的空间尺寸`(X, Y, Z)`。
pub const DEFAULT_ROI: [usize; 3] = [512, 512, 160];

/// 默认参与评估的体数据编号。
pub const DEFAULT_VOLUME_IDS: [usize; 2] = [20, 25];

/// 扫描文件名前缀，文件名形如`volume-20.nii`。
pub const SCAN_PREFIX: &str = "volume";

/// 标注文件名前缀，文件名形如`new-segmentation-20.nii`。
pub const LABEL_PREFIX: &str = "new-segmentation";

/// GIF帧间隔（毫秒）。
pub const FRAME_INTERVAL_MS: u32 = 300;
