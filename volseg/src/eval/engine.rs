//! 单趟评估循环。

use super::metrics::{classes_for, ConfusionMetric, DiceMetric, LabelCounts};
use super::predict::{derive_predictions, Segmenter};
use crate::prep::{AccTimer, Sample};
use crate::{Error, Result};
use ndarray::{Array3, Axis};

/// 一个样本的预测与标注，两者都是`(X, Y, Z)`的标签体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRecord {
    pub prediction: Array3<u8>,
    pub ground_truth: Array3<u8>,
}

/// 整趟评估的汇总指标。
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
    pub mean_dice: f64,
    pub recall: f64,
    /// 每个类别一个值；单通道输出时只有前景一项。
    pub precision: Vec<f64>,
}

impl EvalMetrics {
    #[inline]
    pub fn into_triple(self) -> (f64, f64, Vec<f64>) {
        (self.mean_dice, self.recall, self.precision)
    }
}

/// 评估结果：汇总指标与按输入顺序保存的预测记录。
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub metrics: EvalMetrics,
    pub records: Vec<PredictionRecord>,
}

/// 评估器。每个样本依次经过推理、求标签、更新指标、保存记录。
pub struct Evaluator<'a, S: Segmenter> {
    segmenter: &'a S,
    dice: DiceMetric,
    confusion: ConfusionMetric,
    records: Vec<PredictionRecord>,
    timer: AccTimer,
}

impl<'a, S: Segmenter> Evaluator<'a, S> {
    #[inline]
    pub fn new(segmenter: &'a S) -> Self {
        Self {
            segmenter,
            dice: DiceMetric::new(),
            confusion: ConfusionMetric::new(),
            records: Vec::new(),
            timer: AccTimer::new(),
        }
    }

    /// 推理一个样本，返回预测记录与输出通道数。
    fn step(&mut self, sample: Sample) -> Result<(PredictionRecord, usize)> {
        let input = sample.image.insert_axis(Axis(0));
        self.timer.start();
        let logits = self.segmenter.segment(input)?;
        let lap = self.timer.elapsed();

        let channels = logits.dim().1;
        let predictions = derive_predictions(&logits)?;
        if predictions.dim().0 != 1 {
            return Err(Error::LogitsShape(logits.shape().to_vec()));
        }
        let prediction = predictions.index_axis_move(Axis(0), 0);
        let ground_truth = sample
            .mask
            .index_axis_move(Axis(0), 0)
            .mapv(|v| v.round().clamp(0.0, f32::from(u8::MAX)) as u8);
        if prediction.shape() != ground_truth.shape() {
            return Err(Error::SpatialMismatch {
                prediction: prediction.shape().to_vec(),
                ground_truth: ground_truth.shape().to_vec(),
            });
        }
        log::debug!("推理耗时{}ms", lap.as_millis());
        Ok((
            PredictionRecord {
                prediction,
                ground_truth,
            },
            channels,
        ))
    }

    fn on_iteration_completed(&mut self, record: PredictionRecord, channels: usize) {
        let classes = classes_for(channels);
        let counts = LabelCounts::new(record.prediction.view(), record.ground_truth.view());
        let item = self.dice.update(&counts, &classes);
        self.confusion.update(&counts, &classes);
        match item {
            Some(score) => log::info!("第{}个样本 Dice: {score:.4}", self.records.len()),
            None => log::warn!("第{}个样本的标注为空，Dice无定义", self.records.len()),
        }
        self.records.push(record);
    }

    /// 依次评估`samples`中的所有样本。任何一个样本出错都会中止整趟评估。
    pub fn run<I>(mut self, samples: I) -> Result<EvalOutcome>
    where
        I: IntoIterator<Item = Result<Sample>>,
    {
        for sample in samples {
            let (record, channels) = self.step(sample?)?;
            self.on_iteration_completed(record, channels);
        }
        log::info!(
            "共评估{}个样本，推理总耗时{}ms，平均{:.1}ms",
            self.timer.laps(),
            self.timer.get_total_ms(),
            self.timer.get_mean_ms()
        );
        Ok(EvalOutcome {
            metrics: EvalMetrics {
                mean_dice: self.dice.aggregate(),
                recall: self.confusion.recall(),
                precision: self.confusion.precision(),
            },
            records: self.records,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::{Array4, Array5};

    /// 测试用：logits取自输入本身，输入大于0.5处预测为前景。
    pub(crate) struct Passthrough;

    impl Segmenter for Passthrough {
        fn segment(&self, input: Array5<f32>) -> Result<Array5<f32>> {
            Ok(input.mapv(|v| if v > 0.5 { 10.0 } else { -10.0 }))
        }
    }

    struct Failing;

    impl Segmenter for Failing {
        fn segment(&self, _input: Array5<f32>) -> Result<Array5<f32>> {
            Err(Error::Tensor("forward failed".into()))
        }
    }

    fn sample(image_fg: &[(usize, usize, usize)], mask_fg: &[(usize, usize, usize)]) -> Sample {
        let mut image = Array4::<f32>::zeros((1, 3, 3, 2));
        let mut mask = Array4::<f32>::zeros((1, 3, 3, 2));
        for &(x, y, z) in image_fg {
            image[[0, x, y, z]] = 1.0;
        }
        for &(x, y, z) in mask_fg {
            mask[[0, x, y, z]] = 1.0;
        }
        Sample { image, mask }
    }

    #[test]
    fn test_perfect_prediction() {
        let fg = [(0, 0, 0), (2, 1, 1)];
        let outcome = Evaluator::new(&Passthrough)
            .run(vec![Ok(sample(&fg, &fg)), Ok(sample(&fg[..1], &fg[..1]))])
            .unwrap();
        assert_eq!(outcome.metrics.mean_dice, 1.0);
        assert_eq!(outcome.metrics.recall, 1.0);
        assert_eq!(outcome.metrics.precision, vec![1.0]);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn test_disjoint_prediction() {
        let outcome = Evaluator::new(&Passthrough)
            .run(vec![Ok(sample(&[(0, 0, 0)], &[(1, 1, 1)]))])
            .unwrap();
        assert_eq!(outcome.metrics.mean_dice, 0.0);
        assert_eq!(outcome.metrics.recall, 0.0);
    }

    #[test]
    fn test_records_follow_input_order() {
        let first = sample(&[(0, 0, 0)], &[(0, 0, 0)]);
        let second = sample(&[(2, 2, 1)], &[(1, 0, 0)]);
        let outcome = Evaluator::new(&Passthrough)
            .run(vec![Ok(first), Ok(second)])
            .unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].prediction[[0, 0, 0]], 1);
        assert_eq!(outcome.records[1].prediction[[2, 2, 1]], 1);
        assert_eq!(outcome.records[1].ground_truth[[1, 0, 0]], 1);
        assert_eq!(outcome.records[1].ground_truth.sum(), 1);
        // 第一个完全重合，第二个不重合
        assert!((outcome.metrics.mean_dice - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_forward_error_aborts() {
        let result = Evaluator::new(&Failing).run(vec![Ok(sample(&[], &[]))]);
        assert!(matches!(result, Err(Error::Tensor(_))));
    }

    #[test]
    fn test_load_error_aborts() {
        let result = Evaluator::new(&Passthrough).run(vec![
            Ok(sample(&[], &[])),
            Err(Error::Io(std::io::ErrorKind::NotFound.into())),
        ]);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
