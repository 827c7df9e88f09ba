use super::utils::{interval_legal_range, roi_legal, AnchorArg, CmapArg};
use anyhow::Context;
use clap::{Args, ValueEnum};
use ndarray::Axis;
use std::path::PathBuf;
use volseg::prep::{SpatialCrop, TransformChain, TransformConfig};
use volseg::render::{render_volume_gif, GifOptions};

#[derive(Args, Debug)]
pub struct Nii2gif {
    /// 输入的nii文件。
    #[arg(long, short)]
    input: PathBuf,
    /// 输入是扫描还是标签，决定是否做强度缩放。
    #[arg(short, long, value_enum, default_value_t = TargetType::Scan)]
    target: TargetType,
    /// 输出GIF路径。
    #[arg(long, short, default_value = "volume.gif")]
    output: PathBuf,
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
}

#[derive(ValueEnum, Clone, Copy, Debug)]
/// 表明输入是扫描还是标签(Ground Truth)。
enum TargetType {
    /// 扫描，按肝脏窗缩放强度。
    Scan,
    /// 标签，非零值二值化。
    Label,
}

impl TargetType {
    #[inline]
    fn chain(self, cfg: &TransformConfig) -> TransformChain {
        match self {
            TargetType::Scan => TransformChain::image(cfg),
            TargetType::Label => TransformChain::mask(cfg),
        }
    }
}

impl Nii2gif {
    pub fn run(&mut self) -> anyhow::Result<()> {
        let cfg = TransformConfig {
            crop: SpatialCrop::new(self.roi, self.anchor.into()),
            ..TransformConfig::default()
        };
        let volume = self
            .target
            .chain(&cfg)
            .load(&self.input)
            .with_context(|| format!("loading `{}`", self.input.display()))?;
        let opts = GifOptions {
            interval_ms: self.interval_ms,
            colormap: self.cmap.into(),
            title: !self.no_title,
        };
        if let Some(dir) = self.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let frames = render_volume_gif(volume.index_axis(Axis(0), 0), &self.output, &opts)
            .with_context(|| format!("rendering `{}`", self.output.display()))?;
        println!("`{}` -> `{}`：{frames}帧", self.input.display(), self.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subcmd_impls::args::Commands;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.gif");
        let mut cli = Cli::try_parse_from([
            "evaluation",
            "nii2gif",
            "--input",
            dir.path().join("absent.nii").to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--target",
            "label",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Nii2gif(_)));
        assert!(cli.run_program().is_err());
        assert!(!output.exists());
    }
}
