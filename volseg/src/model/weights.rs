//! 从PyTorch state dict（MONAI `UNet`导出的`.pth`）加载权重。
//!
//! MONAI以递归方式嵌套各层：第`k`层编码器位于`model` + `.1.submodule` × `k` + `.0`，
//! 同层解码器位于同一前缀 + `.2`，最深处的`submodule`是瓶颈层。这里把这些名字展平为
//! `down.k`、`up.k`与`bottom`。

use super::unet::{UNet, UNetConfig, UNetRecord};
use crate::{Error, Result};
use burn::module::{Module, ModuleVisitor, ParamId};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::Path;

/// 参数名重映射规则`(正则, 替换)`，按顺序依次作用在同一个名字上。`depth`是编码器阶段数。
pub fn monai_key_remap(depth: usize) -> Vec<(String, String)> {
    let nest = |level: usize| r"\.1\.submodule".repeat(level);
    let mut rules = vec![(format!(r"^model{}\.(.+)$", nest(depth)), "bottom.$1".to_string())];
    for level in (0..depth).rev() {
        let prefix = format!("^model{}", nest(level));
        rules.push((format!(r"{prefix}\.0\.(.+)$"), format!("down.{level}.$1")));
        rules.push((format!(r"{prefix}\.2\.0\.(.+)$"), format!("up.{level}.transpose.$1")));
        rules.push((format!(r"{prefix}\.2\.1\.(.+)$"), format!("up.{level}.refine.$1")));
    }
    rules.push((r"\.conv\.unit(\d+)\.".to_string(), ".units.$1.".to_string()));
    rules.push((r"\.adn\.A\.weight$".to_string(), ".act.alpha".to_string()));
    rules
}

#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

/// 按遍历顺序列出模块中所有浮点参数的形状。
pub fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut collector = ShapeCollector::default();
    module.visit(&mut collector);
    collector.shapes
}

/// 逐个比较参数形状。
pub fn check_shapes(expected: &[Vec<usize>], found: &[Vec<usize>]) -> Result<()> {
    if expected.len() != found.len() {
        return Err(Error::ParamCount {
            expected: expected.len(),
            found: found.len(),
        });
    }
    for (index, (e, f)) in expected.iter().zip(found).enumerate() {
        if e != f {
            return Err(Error::ParamShape {
                index,
                expected: e.clone(),
                found: f.clone(),
            });
        }
    }
    Ok(())
}

/// 构建`config`描述的网络并加载`path`处的权重。
///
/// 文件不存在、缺少参数或参数形状与拓扑不一致时返回错误。
pub fn load_pytorch_weights<B: Backend>(
    config: &UNetConfig,
    path: &Path,
    device: &B::Device,
) -> Result<UNet<B>> {
    if !path.is_file() {
        return Err(Error::MissingWeights(path.to_path_buf()));
    }
    let model = config.init::<B>(device)?;
    let expected = param_shapes(&model);

    let args = monai_key_remap(config.depth())
        .into_iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(&pattern, &replacement)
        });
    let record: UNetRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| Error::Record(e.to_string()))?;

    let model = model.load_record(record);
    check_shapes(&expected, &param_shapes(&model))?;
    log::info!(
        "从`{}`加载了{}个参数张量",
        path.display(),
        expected.len()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use regex::Regex;
    use std::path::PathBuf;

    type TestBackend = NdArray<f32>;

    /// `fixtures/tiny_unet.pth`：通道`(2, 4, 8)`、步长`(2, 2)`的网络权重，
    /// 由`fixtures/make_tiny_unet.py`生成。第`n`个张量的第`i`个元素是`n + 0.001 * i`，PReLU系数均为0.25。
    fn tiny_fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("tiny_unet.pth")
    }

    fn tiny_config() -> UNetConfig {
        UNetConfig::new(vec![2, 4, 8], vec![2, 2])
    }

    #[derive(Default)]
    struct ValueCollector {
        values: Vec<Vec<f32>>,
    }

    impl<B: Backend> ModuleVisitor<B> for ValueCollector {
        fn visit_float<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D>) {
            let data = tensor.to_data().convert::<f32>();
            self.values.push(data.to_vec::<f32>().unwrap());
        }
    }

    fn remap(key: &str, depth: usize) -> String {
        let mut name = key.to_string();
        for (pattern, replacement) in monai_key_remap(depth) {
            let re = Regex::new(&pattern).unwrap();
            if re.is_match(&name) {
                name = re.replace_all(&name, replacement.as_str()).to_string();
            }
        }
        name
    }

    #[test]
    fn test_remap_encoder_and_bottom() {
        assert_eq!(
            remap("model.0.conv.unit0.conv.weight", 4),
            "down.0.units.0.conv.weight"
        );
        assert_eq!(
            remap("model.0.conv.unit1.adn.A.weight", 4),
            "down.0.units.1.act.alpha"
        );
        assert_eq!(remap("model.0.residual.bias", 4), "down.0.residual.bias");
        assert_eq!(
            remap("model.1.submodule.1.submodule.0.conv.unit0.conv.bias", 4),
            "down.2.units.0.conv.bias"
        );
        assert_eq!(
            remap(
                "model.1.submodule.1.submodule.1.submodule.1.submodule.conv.unit1.conv.weight",
                4
            ),
            "bottom.units.1.conv.weight"
        );
        assert_eq!(
            remap(
                "model.1.submodule.1.submodule.1.submodule.1.submodule.residual.weight",
                4
            ),
            "bottom.residual.weight"
        );
    }

    #[test]
    fn test_remap_decoder() {
        assert_eq!(remap("model.2.0.conv.weight", 4), "up.0.transpose.conv.weight");
        assert_eq!(remap("model.2.0.adn.A.weight", 4), "up.0.transpose.act.alpha");
        assert_eq!(
            remap("model.2.1.conv.unit0.conv.bias", 4),
            "up.0.refine.units.0.conv.bias"
        );
        assert_eq!(
            remap("model.1.submodule.1.submodule.1.submodule.2.1.conv.unit0.adn.A.weight", 4),
            "up.3.refine.units.0.act.alpha"
        );
    }

    #[test]
    fn test_shape_check() {
        let device = Default::default();
        let a = UNetConfig::new(vec![2, 4, 8], vec![2, 2])
            .init::<TestBackend>(&device)
            .unwrap();
        let b = UNetConfig::new(vec![2, 4, 16], vec![2, 2])
            .init::<TestBackend>(&device)
            .unwrap();
        let c = UNetConfig::new(vec![2, 4], vec![2])
            .init::<TestBackend>(&device)
            .unwrap();

        let sa = param_shapes(&a);
        assert!(check_shapes(&sa, &sa).is_ok());
        assert!(matches!(
            check_shapes(&sa, &param_shapes(&b)),
            Err(Error::ParamShape { .. })
        ));
        assert!(matches!(
            check_shapes(&sa, &param_shapes(&c)),
            Err(Error::ParamCount { .. })
        ));
    }

    #[test]
    fn test_default_parameter_count() {
        let device = Default::default();
        let model = UNetConfig::monai_default()
            .init::<TestBackend>(&device)
            .unwrap();
        let shapes = param_shapes(&model);
        // 第一个参数是第一层卷积核
        assert_eq!(shapes[0], vec![16, 1, 3, 3, 3]);
        assert!(shapes.contains(&vec![384, 64, 3, 3, 3]));
        assert!(shapes.contains(&vec![256, 128, 1, 1, 1]));
    }

    #[test]
    fn test_load_state_dict() {
        let device = Default::default();
        let model =
            load_pytorch_weights::<TestBackend>(&tiny_config(), &tiny_fixture(), &device).unwrap();
        assert_eq!(model.depth(), 2);

        let mut collector = ValueCollector::default();
        model.visit(&mut collector);
        assert_eq!(collector.values.len(), 35);
        // down.0.units.0：卷积核、偏置、PReLU系数
        let kernel = &collector.values[0];
        assert_eq!(kernel.len(), 2 * 27);
        assert!(kernel[0].abs() < 1e-6);
        assert!((kernel[53] - 0.053).abs() < 1e-5);
        assert!((collector.values[1][1] - 1.001).abs() < 1e-5);
        assert_eq!(collector.values[2], vec![0.25]);
        // 输出层`up.0`的转置卷积核：模块中排第24个，文件中是第30个张量
        assert_eq!(param_shapes(&model)[24], vec![4, 1, 3, 3, 3]);
        assert!((collector.values[24][0] - 30.0).abs() < 1e-5);

        let input = Tensor::<TestBackend, 5>::zeros([1, 1, 4, 4, 4], &device);
        assert_eq!(model.forward(input).dims(), [1, 1, 4, 4, 4]);
    }

    #[test]
    fn test_load_wrong_shape_fails() {
        let device = Default::default();
        let wider = UNetConfig::new(vec![2, 4, 16], vec![2, 2]);
        let result = load_pytorch_weights::<TestBackend>(&wider, &tiny_fixture(), &device);
        assert!(matches!(result, Err(Error::ParamShape { .. })));

        let two_classes = tiny_config().with_out_channels(2);
        let result = load_pytorch_weights::<TestBackend>(&two_classes, &tiny_fixture(), &device);
        assert!(matches!(result, Err(Error::ParamShape { .. })));
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pth");
        std::fs::write(&path, b"not a state dict").unwrap();
        let result = load_pytorch_weights::<TestBackend>(&tiny_config(), &path, &device);
        assert!(matches!(result, Err(Error::Record(_))));
    }

    #[test]
    fn test_missing_weights_file() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let result = load_pytorch_weights::<TestBackend>(
            &UNetConfig::monai_default(),
            &dir.path().join("model.pth"),
            &device,
        );
        assert!(matches!(result, Err(Error::MissingWeights(_))));
    }
}
