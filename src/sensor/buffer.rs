use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::types::{BufferSnapshot, Sample};

/// 固定容量的滚动缓冲区
/// 三个轴各自保存最近 capacity 个样本，初始化时用 0 预填满，
/// 之后长度始终等于 capacity：每次写入都淘汰最旧的一个槽位
#[derive(Debug)]
pub struct RollingBuffer {
    buffer_x: VecDeque<f64>,
    buffer_y: VecDeque<f64>,
    buffer_z: VecDeque<f64>,
    latest: Sample,
    capacity: usize,
    // 自构造或上次 fill 以来接受的样本数，用于计算窗口填充比例
    samples_seen: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer_x: VecDeque::from(vec![0.0; capacity]),
            buffer_y: VecDeque::from(vec![0.0; capacity]),
            buffer_z: VecDeque::from(vec![0.0; capacity]),
            latest: Sample::splat(0.0),
            capacity,
            samples_seen: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Sample {
        self.latest
    }

    /// 将新样本添加到缓冲区末尾，同时移除最旧的数据 - O(1)操作
    pub fn push(&mut self, sample: Sample) {
        self.buffer_x.push_back(sample.x);
        self.buffer_y.push_back(sample.y);
        self.buffer_z.push_back(sample.z);
        self.buffer_x.pop_front();
        self.buffer_y.pop_front();
        self.buffer_z.pop_front();
        self.latest = sample;
        self.samples_seen = self.samples_seen.saturating_add(1);
    }

    /// 将每个轴的所有槽位重置为同一个常量，用于重新开始一次测量
    pub fn fill(&mut self, value: f64) {
        for slot in self.buffer_x.iter_mut() {
            *slot = value;
        }
        for slot in self.buffer_y.iter_mut() {
            *slot = value;
        }
        for slot in self.buffer_z.iter_mut() {
            *slot = value;
        }
        self.latest = Sample::splat(value);
        self.samples_seen = 0;
    }

    /// Population mean per axis, over the full window. Before the window has
    /// seen `capacity` real samples this includes the zero padding from
    /// construction; that startup transient is intentional and observable
    /// through `fill_fraction`.
    pub fn mean(&self) -> (f64, f64, f64) {
        (
            mean_of(&self.buffer_x),
            mean_of(&self.buffer_y),
            mean_of(&self.buffer_z),
        )
    }

    /// Population standard deviation per axis (divide by N, not N-1),
    /// with the same startup-transient caveat as `mean`.
    pub fn stddev(&self) -> (f64, f64, f64) {
        (
            stddev_of(&self.buffer_x),
            stddev_of(&self.buffer_y),
            stddev_of(&self.buffer_z),
        )
    }

    /// 窗口中真实样本所占比例，达到 1.0 表示统计量不再包含启动时的零填充
    pub fn fill_fraction(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.samples_seen.min(self.capacity) as f64 / self.capacity as f64
    }

    /// 拷贝出当前缓冲区的完整状态
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            x: self.buffer_x.iter().copied().collect(),
            y: self.buffer_y.iter().copied().collect(),
            z: self.buffer_z.iter().copied().collect(),
            latest: self.latest,
            mean: self.mean(),
            stddev: self.stddev(),
            capacity: self.capacity,
            fill_fraction: self.fill_fraction(),
        }
    }
}

fn mean_of(buffer: &VecDeque<f64>) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    buffer.iter().sum::<f64>() / buffer.len() as f64
}

fn stddev_of(buffer: &VecDeque<f64>) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    let mean = mean_of(buffer);
    let variance =
        buffer.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / buffer.len() as f64;
    variance.sqrt()
}

/// 读写线程共享的缓冲区
/// 所有修改和快照读取都在同一把锁内完成，消费者永远看不到半更新的窗口
#[derive(Debug)]
pub struct SharedBuffer {
    inner: Mutex<RollingBuffer>,
}

impl SharedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RollingBuffer::new(capacity)),
        }
    }

    pub fn push(&self, sample: Sample) {
        self.lock().push(sample);
    }

    pub fn fill(&self, value: f64) {
        self.lock().fill(value);
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        self.lock().snapshot()
    }

    // 写线程不会在持锁状态下 panic，锁中毒时直接复用内部数据
    fn lock(&self) -> MutexGuard<'_, RollingBuffer> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_prefilled_with_zeros_at_capacity() {
        let buffer = RollingBuffer::new(100);
        let snap = buffer.snapshot();
        assert_eq!(snap.x.len(), 100);
        assert_eq!(snap.y.len(), 100);
        assert_eq!(snap.z.len(), 100);
        assert!(snap.x.iter().all(|&v| v == 0.0));
        assert_eq!(snap.latest, Sample::splat(0.0));
        assert_eq!(snap.fill_fraction, 0.0);
    }

    #[test]
    fn push_keeps_length_and_evicts_oldest() {
        let mut buffer = RollingBuffer::new(5);
        for i in 0..5 {
            buffer.push(Sample::splat(i as f64 + 1.0));
        }
        let snap = buffer.snapshot();
        assert_eq!(snap.x, vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        buffer.push(Sample::splat(6.0));
        let snap = buffer.snapshot();
        assert_eq!(snap.x.len(), 5);
        // 最旧的 1.0 被淘汰，顺序保持 FIFO
        assert_eq!(snap.x, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(snap.latest, Sample::splat(6.0));
    }

    #[test]
    fn latest_reflects_last_push_before_window_is_warm() {
        let mut buffer = RollingBuffer::new(10);
        buffer.push(Sample::new(0.5, -0.5, 1.0));
        assert_eq!(buffer.latest(), Sample::new(0.5, -0.5, 1.0));
        assert_eq!(buffer.fill_fraction(), 0.1);
    }

    #[test]
    fn mean_of_zero_window_is_zero() {
        let buffer = RollingBuffer::new(100);
        assert_eq!(buffer.mean(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn stddev_of_constant_window_is_zero() {
        let mut buffer = RollingBuffer::new(8);
        for _ in 0..8 {
            buffer.push(Sample::new(1.5, 1.5, 1.5));
        }
        let (sx, sy, sz) = buffer.stddev();
        assert!(sx.abs() < 1e-12);
        assert!(sy.abs() < 1e-12);
        assert!(sz.abs() < 1e-12);
        assert_eq!(buffer.mean(), (1.5, 1.5, 1.5));
    }

    #[test]
    fn mean_includes_startup_zero_padding() {
        let mut buffer = RollingBuffer::new(4);
        buffer.push(Sample::splat(4.0));
        // 窗口是 [0, 0, 0, 4]，均值刻意包含零填充
        assert_eq!(buffer.mean(), (1.0, 1.0, 1.0));
        assert!(!buffer.snapshot().is_warm());
    }

    #[test]
    fn fill_resets_slots_and_fill_fraction() {
        let mut buffer = RollingBuffer::new(4);
        for i in 0..4 {
            buffer.push(Sample::splat(i as f64));
        }
        assert_eq!(buffer.fill_fraction(), 1.0);

        buffer.fill(0.0);
        let snap = buffer.snapshot();
        assert!(snap.x.iter().all(|&v| v == 0.0));
        assert_eq!(snap.latest, Sample::splat(0.0));
        assert_eq!(snap.fill_fraction, 0.0);
    }

    #[test]
    fn becomes_warm_after_capacity_pushes() {
        let mut buffer = RollingBuffer::new(3);
        for _ in 0..3 {
            buffer.push(Sample::splat(1.0));
        }
        assert!(buffer.snapshot().is_warm());
    }

    #[test]
    fn concurrent_snapshots_never_observe_torn_state() {
        let shared = Arc::new(SharedBuffer::new(50));
        let writer_buffer = Arc::clone(&shared);

        // 写线程推送编码过的样本：y = x + 0.25, z = x + 0.5
        let writer = thread::spawn(move || {
            for i in 0..20_000 {
                let base = i as f64;
                writer_buffer.push(Sample::new(base, base + 0.25, base + 0.5));
            }
        });

        let mut readers = Vec::new();
        for _ in 0..4 {
            let reader_buffer = Arc::clone(&shared);
            readers.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    let snap = reader_buffer.snapshot();
                    assert_eq!(snap.x.len(), snap.y.len());
                    assert_eq!(snap.y.len(), snap.z.len());
                    assert_eq!(snap.x.len(), snap.capacity);
                    // latest 必须与各轴序列的末尾来自同一个样本
                    assert_eq!(snap.x.last().copied(), Some(snap.latest.x));
                    assert_eq!(snap.y.last().copied(), Some(snap.latest.y));
                    assert_eq!(snap.z.last().copied(), Some(snap.latest.z));
                    if snap.fill_fraction > 0.0 {
                        assert_eq!(snap.latest.y, snap.latest.x + 0.25);
                        assert_eq!(snap.latest.z, snap.latest.x + 0.5);
                    }
                }
            }));
        }

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
