//! Dice系数与逐类别的混淆统计。

use ndarray::{ArrayView3, Zip};

const LABELS: usize = u8::MAX as usize + 1;

/// 参与统计的类别。单通道输出只统计前景1；多通道输出统计包括背景在内的`0..channels`。
pub fn classes_for(channels: usize) -> Vec<u8> {
    if channels <= 1 {
        vec![1]
    } else {
        (0..channels.min(LABELS)).map(|c| c as u8).collect()
    }
}

/// 一对预测与标注中各标签的体素计数。
#[derive(Clone)]
pub struct LabelCounts {
    pred: [u64; LABELS],
    truth: [u64; LABELS],
    both: [u64; LABELS],
}

impl LabelCounts {
    /// 两者形状必须一致，否则panic。
    pub fn new(pred: ArrayView3<u8>, truth: ArrayView3<u8>) -> Self {
        let mut counts = Self {
            pred: [0; LABELS],
            truth: [0; LABELS],
            both: [0; LABELS],
        };
        Zip::from(&pred).and(&truth).for_each(|&p, &t| {
            counts.pred[p as usize] += 1;
            counts.truth[t as usize] += 1;
            if p == t {
                counts.both[p as usize] += 1;
            }
        });
        counts
    }

    #[inline]
    pub fn true_positive(&self, class: u8) -> u64 {
        self.both[class as usize]
    }

    #[inline]
    pub fn false_positive(&self, class: u8) -> u64 {
        self.pred[class as usize] - self.both[class as usize]
    }

    #[inline]
    pub fn false_negative(&self, class: u8) -> u64 {
        self.truth[class as usize] - self.both[class as usize]
    }

    /// `2|P∩G| / (|P| + |G|)`；标注中没有该类别时无定义。
    pub fn dice(&self, class: u8) -> Option<f64> {
        let c = class as usize;
        if self.truth[c] == 0 {
            return None;
        }
        Some(2.0 * self.both[c] as f64 / (self.pred[c] + self.truth[c]) as f64)
    }
}

/// 逐样本累积的平均Dice。无定义的（样本, 类别）项不参与平均。
#[derive(Debug, Clone, Default)]
pub struct DiceMetric {
    sum: f64,
    count: usize,
}

impl DiceMetric {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 累积一个样本，返回该样本各类别的平均Dice。
    pub fn update(&mut self, counts: &LabelCounts, classes: &[u8]) -> Option<f64> {
        let scores: Vec<f64> = classes.iter().filter_map(|&c| counts.dice(c)).collect();
        self.sum += scores.iter().sum::<f64>();
        self.count += scores.len();
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// 所有有定义项的平均值；没有任何有定义项时为0。
    pub fn aggregate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// 在所有样本的所有体素上累积的逐类别TP/FP/FN。
#[derive(Debug, Clone, Default)]
pub struct ConfusionMetric {
    classes: Vec<u8>,
    tp: Vec<u64>,
    fp: Vec<u64>,
    fn_: Vec<u64>,
}

impl ConfusionMetric {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 类别集合由第一次调用确定。
    pub fn update(&mut self, counts: &LabelCounts, classes: &[u8]) {
        if self.classes.is_empty() {
            self.classes = classes.to_vec();
            self.tp = vec![0; classes.len()];
            self.fp = vec![0; classes.len()];
            self.fn_ = vec![0; classes.len()];
        }
        for (i, &c) in self.classes.iter().enumerate() {
            self.tp[i] += counts.true_positive(c);
            self.fp[i] += counts.false_positive(c);
            self.fn_[i] += counts.false_negative(c);
        }
    }

    #[inline]
    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    /// 各类别召回率的平均值。
    pub fn recall(&self) -> f64 {
        if self.classes.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .tp
            .iter()
            .zip(&self.fn_)
            .map(|(&tp, &fn_)| ratio(tp, tp + fn_))
            .sum();
        total / self.classes.len() as f64
    }

    /// 各类别的精确率，不做平均。
    pub fn precision(&self) -> Vec<f64> {
        self.tp
            .iter()
            .zip(&self.fp)
            .map(|(&tp, &fp)| ratio(tp, tp + fp))
            .collect()
    }
}

#[inline]
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
