use super::utils::{
    hu_legal_range, interval_legal_range, ranges_to_integers, roi_legal, AnchorArg, CmapArg,
};
use anyhow::{ensure, Context};
use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;
use volseg::eval::{self, EvalConfig};
use volseg::prelude::{LABEL_PREFIX, SCAN_PREFIX};
use volseg::prep::{ScaleIntensityRange, SpatialCrop, VolumePair};

#[derive(Args, Debug)]
pub struct Evaluate {
    /// 工作根目录，其余相对路径均相对于此。
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// 模型权重文件（PyTorch `state_dict`）。
    #[arg(long, default_value = "models/model.pth")]
    model: PathBuf,
    /// 存放扫描与标签的目录。
    #[arg(long = "data-dir", default_value = "data")]
    data_dir: PathBuf,
    /// 参与评估的体数据编号，如`20,25`或`20-25`。编号去重后按升序评估，GIF序号也按此顺序。
    #[arg(long, value_parser = ranges_to_integers, default_value = "20,25")]
    ids: BTreeSet<usize>,
    /// 扫描文件名前缀。
    #[arg(long = "scan-prefix", default_value = SCAN_PREFIX)]
    scan_prefix: String,
    /// 标签文件名前缀。
    #[arg(long = "label-prefix", default_value = LABEL_PREFIX)]
    label_prefix: String,
    /// 强度窗下界。
    #[arg(
        long = "a-min",
        value_parser = hu_legal_range,
        default_value_t = -22.18,
        allow_hyphen_values = true
    )]
    a_min: f32,
    /// 强度窗上界。
    #[arg(
        long = "a-max",
        value_parser = hu_legal_range,
        default_value_t = 450.0,
        allow_hyphen_values = true
    )]
    a_max: f32,
    /// 裁剪尺寸，形如`512,512,160`。
    #[arg(long, value_parser = roi_legal, default_value = "512,512,160")]
    roi: [usize; 3],
    /// 裁剪锚点。
    #[arg(long, value_enum, default_value_t = AnchorArg::Corner)]
    anchor: AnchorArg,
    /// 动画颜色映射。
    #[arg(long, value_enum, default_value_t = CmapArg::Bone)]
    cmap: CmapArg,
    /// 帧间隔（毫秒）。
    #[arg(long = "interval-ms", value_parser = interval_legal_range, default_value_t = 300)]
    interval_ms: u32,
    /// 不在帧上方绘制`Slice k`标题。
    #[arg(long = "no-title")]
    no_title: bool,
    /// 保留原始标签值，不把非零标签二值化。
    #[arg(long = "keep-labels")]
    keep_labels: bool,
    /// GIF输出目录。
    #[arg(long = "output-dir", default_value = "saved_gifs")]
    output_dir: PathBuf,
    /// 另存预测与标注为`.npy`的目录。
    #[arg(long = "save-npy")]
    save_npy: Option<PathBuf>,
}

impl Evaluate {
    pub fn run(&mut self) -> anyhow::Result<()> {
        let cfg = self.config()?;
        log::info!(
            "评估{}对体数据，模型`{}`",
            cfg.pairs.len(),
            cfg.model_path.display()
        );
        let metrics = eval::run(&cfg)
            .with_context(|| format!("evaluating with `{}`", cfg.model_path.display()))?;
        log::info!(
            "完成：Dice {:.4}，召回率{}，GIF已保存到`{}`",
            metrics.mean_dice,
            metrics.recall,
            cfg.output_dir.display()
        );
        Ok(())
    }

    fn config(&self) -> anyhow::Result<EvalConfig> {
        ensure!(
            self.a_min < self.a_max,
            "`--a-min` ({}) must be less than `--a-max` ({})",
            self.a_min,
            self.a_max
        );
        let mut cfg = EvalConfig::with_root(&self.root);
        let data_dir = self.root.join(&self.data_dir);
        cfg.model_path = self.root.join(&self.model);
        cfg.pairs = self
            .ids
            .iter()
            .map(|&id| VolumePair::lits(&data_dir, id, &self.scan_prefix, &self.label_prefix))
            .collect();
        cfg.transforms.intensity = ScaleIntensityRange::new(self.a_min, self.a_max);
        cfg.transforms.crop = SpatialCrop::new(self.roi, self.anchor.into());
        cfg.transforms.binarize_masks = !self.keep_labels;
        cfg.output_dir = self.root.join(&self.output_dir);
        cfg.gif.interval_ms = self.interval_ms;
        cfg.gif.colormap = self.cmap.into();
        cfg.gif.title = !self.no_title;
        cfg.npy_dir = self.save_npy.as_ref().map(|d| self.root.join(d));
        Ok(cfg)
    }
}
