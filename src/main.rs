mod config;
mod export;
mod logger;
mod publisher;
mod sensor;
mod types;

use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{bounded, RecvTimeoutError};
use dotenv::dotenv;
use log::{error, info, warn};

use config::AppConfig;
use publisher::PeriodicPublisher;
use sensor::{AcquisitionSession, SessionState, SimulatedSource};

fn main() {
    logger::init_logger();
    dotenv().ok(); // 加载 .env 文件
    info!("Application starting");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 列出当前可用的串口，便于诊断连接问题
    let devices = sensor::list_devices();
    if devices.is_empty() {
        info!("No serial ports found");
    }
    for (name, description) in &devices {
        info!("Serial port found: {} ({})", name, description);
    }

    let mut session = AcquisitionSession::new(config.device.clone(), config.buffer.capacity);

    let connected = if config.device.simulate {
        info!("Simulation mode enabled, generating synthetic samples");
        session.connect_source(Box::new(SimulatedSource::wave(
            config.device.simulate_rate_hz,
        )))
    } else {
        session.connect()
    };
    if let Err(e) = connected {
        error!("Failed to connect: {}", e);
        std::process::exit(1);
    }

    // 新的测量运行从干净的窗口开始
    session.reset_window();
    if let Err(e) = session.start() {
        error!("Failed to start acquisition: {}", e);
        std::process::exit(1);
    }

    let (snapshot_sender, snapshot_receiver) = bounded(16);
    let publisher = PeriodicPublisher::start(
        session.handle(),
        Duration::from_millis(config.publisher.interval_ms),
        snapshot_sender,
    );

    // 按配置的时长运行一次有界测量
    info!(
        "Measuring for {:.1}s with a {}-sample window",
        config.measurement.duration_seconds, config.buffer.capacity
    );
    let deadline = Instant::now()
        + Duration::from_secs_f64(config.measurement.duration_seconds);

    while Instant::now() < deadline {
        match snapshot_receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(snap) => {
                let (mx, my, mz) = snap.mean;
                let (sx, sy, sz) = snap.stddev;
                // 窗口填满前统计量仍包含启动时的零填充
                let window_status = if snap.is_warm() {
                    "full".to_string()
                } else {
                    format!("warming up, {:.0}%", snap.fill_fraction * 100.0)
                };
                info!(
                    "ACC x: {:.3}, y: {:.3}, z: {:.3} | mean x: {:.3}, y: {:.3}, z: {:.3} | std x: {:.3}, y: {:.3}, z: {:.3} | window {}",
                    snap.latest.x,
                    snap.latest.y,
                    snap.latest.z,
                    mx, my, mz,
                    sx, sy, sz,
                    window_status
                );
            }
            Err(RecvTimeoutError::Timeout) => {
                // 发布器没有快照可交付，检查会话是否因 I/O 故障离开了读取状态
                if session.state() != SessionState::Reading {
                    warn!("Session left the reading state, ending measurement early");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    publisher.stop();
    session.stop();

    // 导出最终窗口
    let filename = format!(
        "accel_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = PathBuf::from(&config.export.directory).join(filename);
    let export_receiver = session.export_async(path);
    match export_receiver.recv_timeout(Duration::from_secs(10)) {
        Ok(result) if result.is_success() => {
            info!("Data saved to {}", result.path.display());
        }
        Ok(result) => {
            error!(
                "Failed to save data to {}: {}",
                result.path.display(),
                result.message
            );
        }
        Err(_) => error!("Export worker did not report a result"),
    }

    session.disconnect();
    info!("Shutdown complete");
}

/// 加载配置：配置文件（可选）加环境变量覆盖
fn load_config() -> Result<AppConfig, config::ConfigError> {
    let config_path =
        env::var("ACCELHUB_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    let mut config = if Path::new(&config_path).exists() {
        info!("Loading configuration from {}", config_path);
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    if let Ok(address) = env::var("ACCEL_PORT") {
        config.device.address = address;
    }
    if let Ok(simulate) = env::var("ACCEL_SIMULATE") {
        config.device.simulate = simulate == "1" || simulate.eq_ignore_ascii_case("true");
    }

    config.validate()?;
    Ok(config)
}
