use super::Sample;

/// Immutable copy of the rolling buffer state, taken under the buffer lock
/// so the three axis series, the latest sample and the statistics always
/// belong together.
#[derive(Clone, Debug)]
pub struct BufferSnapshot {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub latest: Sample,
    /// 每个轴的总体均值 (x, y, z)
    pub mean: (f64, f64, f64),
    /// 每个轴的总体标准差 (x, y, z)
    pub stddev: (f64, f64, f64),
    pub capacity: usize,
    /// 窗口中真实样本所占比例，0.0 到 1.0
    pub fill_fraction: f64,
}

impl BufferSnapshot {
    /// The statistics intentionally include the zero padding present before
    /// the window has seen `capacity` real samples. Consumers that want to
    /// skip that startup transient can check this flag.
    pub fn is_warm(&self) -> bool {
        self.fill_fraction >= 1.0
    }
}
