use std::io;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::types::Sample;

use super::device::DataSource;

/// 模拟的加速度计来源，用于没有硬件时运行完整采集管线
/// 波形模式生成正弦波加噪声，常量模式重复输出同一个样本（测试用）
pub struct SimulatedSource {
    mode: Mode,
    start: Instant,
    next_emit: Instant,
    interval: Duration,
}

enum Mode {
    Wave,
    Constant(Sample),
}

impl SimulatedSource {
    /// 以固定采样率生成 sin/cos 波形加均匀噪声
    pub fn wave(sample_rate_hz: usize) -> Self {
        Self::with_mode(Mode::Wave, sample_rate_hz)
    }

    /// 以固定采样率重复输出同一个样本
    pub fn constant(sample: Sample, sample_rate_hz: usize) -> Self {
        Self::with_mode(Mode::Constant(sample), sample_rate_hz)
    }

    fn with_mode(mode: Mode, sample_rate_hz: usize) -> Self {
        let interval = Duration::from_secs_f64(1.0 / sample_rate_hz.max(1) as f64);
        let now = Instant::now();
        Self {
            mode,
            start: now,
            next_emit: now,
            interval,
        }
    }

    fn generate(&self) -> Sample {
        match self.mode {
            Mode::Constant(sample) => sample,
            Mode::Wave => {
                // 与真实传感器相近的平滑波形：正弦/余弦加 ±0.1 的均匀噪声
                let t = self.start.elapsed().as_secs_f64();
                let mut rng = rand::rng();
                Sample::new(
                    t.sin() + rng.random_range(-0.1..0.1),
                    t.cos() + rng.random_range(-0.1..0.1),
                    (t + 1.0).sin() + rng.random_range(-0.1..0.1),
                )
            }
        }
    }
}

impl DataSource for SimulatedSource {
    fn poll_line(&mut self) -> io::Result<Option<String>> {
        if Instant::now() < self.next_emit {
            return Ok(None);
        }
        self.next_emit += self.interval;
        let sample = self.generate();
        Ok(Some(format!(
            "{:.4},{:.4},{:.4}\n",
            sample.x, sample.y, sample.z
        )))
    }

    fn description(&self) -> String {
        match self.mode {
            Mode::Wave => "simulated accelerometer (wave)".to_string(),
            Mode::Constant(_) => "simulated accelerometer (constant)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_source_emits_the_configured_sample() {
        let mut source = SimulatedSource::constant(Sample::new(1.0, 2.0, 3.0), 1000);
        // 第一次轮询立即产出一行
        let line = source.poll_line().unwrap().unwrap();
        assert_eq!(line, "1.0000,2.0000,3.0000\n");
    }

    #[test]
    fn wave_source_respects_its_emit_interval() {
        let mut source = SimulatedSource::wave(10);
        assert!(source.poll_line().unwrap().is_some());
        // 100ms 的间隔还没过去，不应该有新行
        assert!(source.poll_line().unwrap().is_none());
    }
}
