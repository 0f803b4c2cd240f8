use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::types::{BufferSnapshot, ExportResult};

use super::buffer::SharedBuffer;
use super::device::{DataSource, SerialSource};
use super::parser::parse_sample_line;

/// 读循环每次迭代后的休眠时长
/// 用少量延迟换取明显更低的 CPU 占用
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// stop() 等待读循环确认退出的上限
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// 采集会话的可观测状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// 没有设备连接（或连接已因 I/O 故障不可用）
    Idle,
    /// 设备已打开，读循环未运行
    Connected,
    /// 后台读循环正在写入缓冲区
    Reading,
    /// 已请求取消，读循环尚未退出
    Stopping,
}

/// 会话级错误
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to open device {address}: {message}")]
    Connection { address: String, message: String },
    #[error("device is not connected")]
    NotConnected,
    #[error("device already connected, disconnect first")]
    AlreadyConnected,
    #[error("read loop is already running")]
    AlreadyReading,
}

/// 采集会话：拥有一个设备来源和一个共享滚动缓冲区，
/// 读循环作为唯一写者在独立线程上运行，任意数量的消费者
/// 通过 snapshot()/handle() 并发读取一致的窗口拷贝
pub struct AcquisitionSession {
    config: DeviceConfig,
    buffer: Arc<SharedBuffer>,
    source: Option<Arc<Mutex<Box<dyn DataSource>>>>,
    stop_flag: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    done_receiver: Option<Receiver<()>>,
}

impl AcquisitionSession {
    pub fn new(config: DeviceConfig, buffer_capacity: usize) -> Self {
        Self {
            config,
            buffer: Arc::new(SharedBuffer::new(buffer_capacity)),
            source: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            reading: Arc::new(AtomicBool::new(false)),
            failed: Arc::new(AtomicBool::new(false)),
            thread: None,
            done_receiver: None,
        }
    }

    /// 按配置打开串口设备；失败时会话保持 Idle
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let address = self.config.address.clone();
        let source = SerialSource::open(
            &address,
            self.config.baud_rate,
            Duration::from_millis(self.config.timeout_ms),
        )
        .map_err(|e| SessionError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;
        self.attach_source(Box::new(source))?;
        info!("Connected to {}", address);
        Ok(())
    }

    /// 挂载任意数据来源（模拟器、测试替身）
    pub fn connect_source(&mut self, source: Box<dyn DataSource>) -> Result<(), SessionError> {
        let description = source.description();
        self.attach_source(source)?;
        info!("Connected to {}", description);
        Ok(())
    }

    fn attach_source(&mut self, source: Box<dyn DataSource>) -> Result<(), SessionError> {
        if self.source.is_some() {
            return Err(SessionError::AlreadyConnected);
        }
        self.failed.store(false, Ordering::Relaxed);
        self.source = Some(Arc::new(Mutex::new(source)));
        Ok(())
    }

    /// 启动后台读循环；一个会话同一时间只有一个读循环
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Reading | SessionState::Stopping => {
                return Err(SessionError::AlreadyReading)
            }
            SessionState::Idle => return Err(SessionError::NotConnected),
            SessionState::Connected => {}
        }

        // state() 已经保证 source 存在
        let source = match self.source.as_ref() {
            Some(source) => Arc::clone(source),
            None => return Err(SessionError::NotConnected),
        };

        self.stop_flag.store(false, Ordering::Relaxed);
        self.reading.store(true, Ordering::Relaxed);

        let (done_sender, done_receiver) = bounded(1);
        self.done_receiver = Some(done_receiver);

        let buffer = Arc::clone(&self.buffer);
        let stop_flag = Arc::clone(&self.stop_flag);
        let reading = Arc::clone(&self.reading);
        let failed = Arc::clone(&self.failed);
        self.thread = Some(thread::spawn(move || {
            read_loop(source, buffer, stop_flag, reading, failed, done_sender);
        }));

        info!("Read loop started");
        Ok(())
    }

    /// 请求取消并等待读循环退出，最多等待 STOP_TIMEOUT
    /// 超时后线程被放弃（它会在下一次有界读返回后自行退出），会话仍报告已停止
    pub fn stop(&mut self) {
        if self.thread.is_none() {
            return;
        }
        self.stop_flag.store(true, Ordering::Relaxed);

        let acknowledged = match self.done_receiver.take() {
            Some(done) => match done.recv_timeout(STOP_TIMEOUT) {
                Ok(()) => true,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => true,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => false,
            },
            None => false,
        };

        if let Some(handle) = self.thread.take() {
            if acknowledged {
                if handle.join().is_err() {
                    error!("Read loop thread panicked");
                }
                info!("Read loop shut down gracefully");
            } else {
                warn!("Read loop did not shut down within timeout, detaching");
            }
        }
    }

    /// 停止读循环并释放设备句柄，任何状态下调用都是安全的
    pub fn disconnect(&mut self) {
        self.stop();
        if let Some(source) = self.source.take() {
            let description = lock_source(&source).description();
            info!("Disconnected from {}", description);
        }
        self.failed.store(false, Ordering::Relaxed);
    }

    pub fn state(&self) -> SessionState {
        // I/O 故障后连接不可用，对外表现为 Idle，必须重新 connect
        if self.source.is_none() || self.failed.load(Ordering::Relaxed) {
            return SessionState::Idle;
        }
        if self.reading.load(Ordering::Relaxed) {
            if self.stop_flag.load(Ordering::Relaxed) {
                return SessionState::Stopping;
            }
            return SessionState::Reading;
        }
        SessionState::Connected
    }

    /// 取一份内部一致的缓冲区快照，可与读循环并发调用
    pub fn snapshot(&self) -> BufferSnapshot {
        self.buffer.snapshot()
    }

    /// 将窗口重置为零，用于重新开始一次测量
    pub fn reset_window(&self) {
        self.buffer.fill(0.0);
    }

    /// 在后台线程中导出当前窗口，完成结果通过返回的通道报告
    pub fn export_async(&self, path: std::path::PathBuf) -> Receiver<ExportResult> {
        crate::export::export_snapshot_async(self.snapshot(), path)
    }

    /// 面向只读消费者（周期发布器等）的轻量句柄
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            buffer: Arc::clone(&self.buffer),
            reading: Arc::clone(&self.reading),
        }
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// 只读会话句柄，可以廉价克隆并跨线程传递
#[derive(Clone)]
pub struct SessionHandle {
    buffer: Arc<SharedBuffer>,
    reading: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> BufferSnapshot {
        self.buffer.snapshot()
    }

    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Relaxed)
    }
}

fn lock_source<'a>(
    source: &'a Arc<Mutex<Box<dyn DataSource>>>,
) -> MutexGuard<'a, Box<dyn DataSource>> {
    match source.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 后台读循环：缓冲区的唯一写者
/// 每次迭代轮询一行、解析、推入缓冲区，然后短暂休眠；
/// 每次迭代都检查取消标志，所以 stop() 在一个休眠间隔内就能得到响应
fn read_loop(
    source: Arc<Mutex<Box<dyn DataSource>>>,
    buffer: Arc<SharedBuffer>,
    stop_flag: Arc<AtomicBool>,
    reading: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    done_sender: Sender<()>,
) {
    let mut malformed_lines = 0usize;

    while !stop_flag.load(Ordering::Relaxed) {
        let polled = lock_source(&source).poll_line();
        match polled {
            Ok(Some(line)) => match parse_sample_line(&line) {
                Ok(sample) => buffer.push(sample),
                Err(e) => {
                    // 格式错误的行是线路上预期的瞬时噪声，丢弃后继续
                    malformed_lines += 1;
                    debug!("Discarding malformed line {:?}: {}", line.trim(), e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                error!("Device read failed, leaving reading state: {}", e);
                failed.store(true, Ordering::Relaxed);
                break;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }

    if malformed_lines > 0 {
        warn!("Read loop discarded {} malformed lines", malformed_lines);
    }
    reading.store(false, Ordering::Relaxed);
    let _ = done_sender.try_send(());
}
