use std::time::{Duration, Instant};

/// 累积计时器，用于统计推理耗时。
#[derive(Clone, Debug)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
    laps: usize,
}

impl AccTimer {
    /// 初始化计时器。初始化时会视为已经调用一次`self.start()`。
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
            laps: 0,
        }
    }

    /// 开始一段计时。
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束当前一段计时，累计并返回这一段的耗时。上一次调用必须是`self.start()`，否则返回值无意义。
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let lap = self.since.elapsed();
        self.consumed += lap;
        self.laps += 1;
        lap
    }

    /// 已经累计的计时段数。
    #[inline]
    pub fn laps(&self) -> usize {
        self.laps
    }

    /// 累计总耗时（毫秒）。
    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }

    /// 平均每段耗时（毫秒）；尚未计时则为0。
    pub fn get_mean_ms(&self) -> f64 {
        if self.laps == 0 {
            0.0
        } else {
            self.consumed.as_secs_f64() * 1000.0 / self.laps as f64
        }
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}
