//! 整体评估流程：加载模型、构建数据集、评估、导出与渲染。

use super::engine::{EvalMetrics, Evaluator, PredictionRecord};
use super::predict::{BurnSegmenter, Segmenter};
use crate::model::{load_pytorch_weights, UNetConfig};
use crate::prep::consts::DEFAULT_VOLUME_IDS;
use crate::prep::{PairDataset, TransformConfig, VolumePair};
use crate::render::{render_records, GifOptions};
use crate::Result;
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use std::fs;
use std::path::{Path, PathBuf};

/// 一次评估的全部配置。
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub model_path: PathBuf,
    pub network: UNetConfig,
    pub pairs: Vec<VolumePair>,
    pub transforms: TransformConfig,
    /// GIF输出目录。
    pub output_dir: PathBuf,
    pub gif: GifOptions,
    /// 若指定，把每条预测记录另存为`pred{i}.npy`与`gt{i}.npy`。
    pub npy_dir: Option<PathBuf>,
}

impl EvalConfig {
    /// 以`root`为根的默认布局：`models/model.pth`、`data/`下的两对体数据、输出到`saved_gifs/`。
    pub fn with_root(root: &Path) -> Self {
        let data_dir = root.join("data");
        Self {
            model_path: root.join("models").join("model.pth"),
            network: UNetConfig::monai_default(),
            pairs: DEFAULT_VOLUME_IDS
                .iter()
                .map(|&id| VolumePair::lits_default(&data_dir, id))
                .collect(),
            transforms: TransformConfig::default(),
            output_dir: root.join("saved_gifs"),
            gif: GifOptions::default(),
            npy_dir: None,
        }
    }

    /// 以当前工作目录为根的默认布局。
    pub fn from_cwd() -> Result<Self> {
        Ok(Self::with_root(&std::env::current_dir()?))
    }
}

/// 在CPU上加载模型并运行完整评估。
pub fn run(cfg: &EvalConfig) -> Result<EvalMetrics> {
    cfg.network.check_input(cfg.transforms.crop.roi)?;
    let device = NdArrayDevice::Cpu;
    let model = load_pytorch_weights::<NdArray<f32>>(&cfg.network, &cfg.model_path, &device)?;
    let segmenter = BurnSegmenter::new(model, device);
    evaluate_with(&segmenter, cfg)
}

/// 用给定的推理器运行评估、导出与渲染，打印并返回汇总指标。
pub fn evaluate_with<S: Segmenter>(segmenter: &S, cfg: &EvalConfig) -> Result<EvalMetrics> {
    let dataset = PairDataset::new(cfg.pairs.clone(), &cfg.transforms);
    fs::create_dir_all(&cfg.output_dir)?;

    println!("Initiating testing...");
    let outcome = Evaluator::new(segmenter).run(dataset.iter())?;
    let metrics = outcome.metrics;
    println!("Mean Dice Score: {:.4}", metrics.mean_dice);
    println!(
        "Recall: {} | Precision {:?}",
        metrics.recall, metrics.precision
    );

    if let Some(dir) = &cfg.npy_dir {
        save_npy(&outcome.records, dir)?;
    }

    println!("Initiating GIF Generation");
    render_records(&outcome.records, &cfg.output_dir, &cfg.gif)?;
    Ok(metrics)
}

/// 把每条记录的预测与标注写为`.npy`。
pub fn save_npy(records: &[PredictionRecord], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (i, record) in records.iter().enumerate() {
        ndarray_npy::write_npy(dir.join(format!("pred{i}.npy")), &record.prediction)?;
        ndarray_npy::write_npy(dir.join(format!("gt{i}.npy")), &record.ground_truth)?;
    }
    log::info!("已导出{}条记录到`{}`", records.len(), dir.display());
    Ok(())
}

/// 以当前工作目录为根、全部使用默认配置运行评估，返回`(平均Dice, 召回率, 精确率)`。
pub fn generate_output() -> Result<(f64, f64, Vec<f64>)> {
    run(&EvalConfig::from_cwd()?).map(EvalMetrics::into_triple)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::engine::tests::Passthrough;
    use crate::prep::nii::{ras_header, write_test_volume};
    use crate::prep::{CropAnchor, SpatialCrop};
    use crate::render::gif::tests::{decode_frames, untitled};
    use crate::Error;
    use ndarray::{Array3, Ix3};

    /// 在`root/data`下写两对`(6, 5, 4)`的体数据，扫描中的高亮体素就是模型会预测的前景。
    fn write_dataset(root: &Path, overlap: bool) {
        let data_dir = root.join("data");
        fs::create_dir_all(&data_dir).unwrap();
        for (n, &id) in DEFAULT_VOLUME_IDS.iter().enumerate() {
            let pair = VolumePair::lits_default(&data_dir, id);
            let mut scan = Array3::<f32>::from_elem((6, 5, 4), -100.0);
            let mut seg = Array3::<f32>::zeros((6, 5, 4));
            scan[[n, 1, 2]] = 400.0;
            scan[[n + 1, 1, 2]] = 400.0;
            if overlap {
                seg[[n, 1, 2]] = 1.0;
                seg[[n + 1, 1, 2]] = 2.0;
            } else {
                seg[[4, 4, 0]] = 1.0;
            }
            write_test_volume(&pair.image, &scan, &ras_header());
            write_test_volume(&pair.mask, &seg, &ras_header());
        }
    }

    fn config(root: &Path) -> EvalConfig {
        let mut cfg = EvalConfig::with_root(root);
        cfg.transforms.crop = SpatialCrop::new([6, 5, 3], CropAnchor::Corner);
        cfg.gif = untitled();
        cfg
    }

    #[test]
    fn test_default_layout() {
        let cfg = EvalConfig::with_root(Path::new("/work"));
        assert_eq!(cfg.model_path, Path::new("/work/models/model.pth"));
        assert_eq!(cfg.pairs.len(), 2);
        assert_eq!(cfg.pairs[1].image, Path::new("/work/data/volume-25.nii"));
        assert_eq!(
            cfg.pairs[0].mask,
            Path::new("/work/data/new-segmentation-20.nii")
        );
        assert_eq!(cfg.output_dir, Path::new("/work/saved_gifs"));
        assert_eq!(cfg.transforms.crop.roi, [512, 512, 160]);
        assert_eq!(cfg.gif.interval_ms, 300);
    }

    #[test]
    fn test_end_to_end_perfect() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), true);
        let mut cfg = config(dir.path());
        cfg.npy_dir = Some(dir.path().join("npy"));

        let metrics = evaluate_with(&Passthrough, &cfg).unwrap();
        assert_eq!(metrics.mean_dice, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.precision, vec![1.0]);

        // 两对输入 -> 四个GIF，每个GIF的帧数等于裁剪后的Z
        for idx in 0..4 {
            let path = cfg.output_dir.join(format!("mask{idx}.gif"));
            assert!(fs::metadata(&path).unwrap().len() > 0);
            assert_eq!(decode_frames(&path), (3, (6, 5)));
        }
        assert!(!cfg.output_dir.join("mask4.gif").exists());

        let pred1: ndarray::ArrayD<u8> =
            ndarray_npy::read_npy(dir.path().join("npy").join("pred1.npy")).unwrap();
        let pred1 = pred1.into_dimensionality::<Ix3>().unwrap();
        assert_eq!(pred1[[1, 1, 2]], 1);
        assert_eq!(pred1[[2, 1, 2]], 1);
        assert_eq!(pred1.iter().map(|&v| u32::from(v)).sum::<u32>(), 2);
    }

    #[test]
    fn test_end_to_end_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), false);
        let metrics = evaluate_with(&Passthrough, &config(dir.path())).unwrap();
        assert_eq!(metrics.mean_dice, 0.0);
        assert_eq!(metrics.precision, vec![0.0]);
    }

    fn tiny_network(cfg: &mut EvalConfig) {
        cfg.network = UNetConfig::new(vec![2, 4, 8], vec![2, 2]);
        cfg.transforms.crop = SpatialCrop::new([4, 4, 4], CropAnchor::Corner);
    }

    #[test]
    fn test_missing_model_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), true);
        let mut cfg = config(dir.path());
        tiny_network(&mut cfg);
        assert!(matches!(run(&cfg), Err(Error::MissingWeights(_))));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn test_roi_not_divisible_by_strides() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), true);
        let mut cfg = config(dir.path());
        tiny_network(&mut cfg);
        cfg.transforms.crop = SpatialCrop::new([6, 5, 4], CropAnchor::Corner);
        assert!(matches!(run(&cfg), Err(Error::Config(_))));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn test_undersized_volume_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), true);
        let mut cfg = config(dir.path());
        cfg.transforms.crop = SpatialCrop::new([6, 5, 5], CropAnchor::Corner);
        assert!(matches!(
            evaluate_with(&Passthrough, &cfg),
            Err(Error::Undersized { axis: 2, .. })
        ));
    }
}
