use serde::{Deserialize, Serialize};

/// 应用配置管理模块
/// 集中管理所有配置项，提供默认值和配置验证
/// 取代原始实现里的全局 PORT/BAUD_RATE 常量

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub buffer: BufferConfig,
    pub publisher: PublisherConfig,
    pub export: ExportConfig,
    pub measurement: MeasurementConfig,
}

/// 设备配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    pub baud_rate: u32,
    /// 单次读取的超时上限，保证读循环不会无限期阻塞
    pub timeout_ms: u64,
    /// 为 true 时使用模拟数据源代替真实串口
    pub simulate: bool,
    /// 模拟数据源的采样率 (Hz)
    pub simulate_rate_hz: usize,
}

/// 滚动缓冲区配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    pub capacity: usize,
}

/// 周期发布器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub interval_ms: u64,
}

/// 导出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub directory: String,
}

/// 测量运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub duration_seconds: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            buffer: BufferConfig::default(),
            publisher: PublisherConfig::default(),
            export: ExportConfig::default(),
            measurement: MeasurementConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
            simulate: false,
            simulate_rate_hz: 100,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: "data_export".to_string(),
        }
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 10.0,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.address.is_empty() {
            return Err(ConfigError::ValidationError(
                "Device address must not be empty".to_string(),
            ));
        }

        if self.device.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "Baud rate must be positive".to_string(),
            ));
        }

        if self.device.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Read timeout must be positive".to_string(),
            ));
        }

        if self.device.simulate_rate_hz == 0 {
            return Err(ConfigError::ValidationError(
                "Simulated sample rate must be positive".to_string(),
            ));
        }

        if self.buffer.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Buffer capacity must be positive".to_string(),
            ));
        }

        if self.publisher.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Publisher interval must be positive".to_string(),
            ));
        }

        if self.measurement.duration_seconds <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Measurement duration must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_buffer_capacity() {
        let mut config = AppConfig::default();
        config.buffer.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn round_trips_through_a_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.device.address = "/dev/ttyUSB3".to_string();
        config.buffer.capacity = 250;
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.device.address, "/dev/ttyUSB3");
        assert_eq!(loaded.buffer.capacity, 250);
    }

    #[test]
    fn load_rejects_invalid_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml {").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
