use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info};

use crate::sensor::SessionHandle;
use crate::types::BufferSnapshot;

/// 周期发布器：按固定节奏从会话拉取快照并交给消费者通道
/// 自己的节奏与读循环的采样率无关，消费者必须容忍重复快照和被跳过的样本
pub struct PeriodicPublisher {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicPublisher {
    pub fn start(
        handle: SessionHandle,
        interval: Duration,
        sender: Sender<BufferSnapshot>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let thread = thread::spawn(move || {
            info!("Publisher started with {:?} interval", interval);
            while !thread_shutdown.load(Ordering::Relaxed) {
                // 会话不在读取状态时跳过投递，而不是发布过期数据
                if handle.is_reading() {
                    match sender.try_send(handle.snapshot()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            // 消费者落后于发布节奏，丢掉这一份快照
                            debug!("Snapshot channel full, skipping delivery");
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            info!("Snapshot consumer disconnected, publisher exiting");
                            break;
                        }
                    }
                }
                thread::sleep(interval);
            }
            info!("Publisher stopped");
        });

        Self {
            shutdown,
            thread: Some(thread),
        }
    }

    /// 发出关闭信号并等待发布线程退出
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PeriodicPublisher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::sensor::{AcquisitionSession, SimulatedSource};
    use crate::types::Sample;
    use crossbeam_channel::bounded;

    #[test]
    fn delivers_snapshots_while_reading() {
        let mut session = AcquisitionSession::new(DeviceConfig::default(), 5);
        session
            .connect_source(Box::new(SimulatedSource::constant(
                Sample::new(1.0, 2.0, 3.0),
                100,
            )))
            .unwrap();
        session.start().unwrap();

        let (sender, receiver) = bounded(16);
        let publisher =
            PeriodicPublisher::start(session.handle(), Duration::from_millis(20), sender);

        let snap = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(snap.capacity, 5);

        publisher.stop();
        session.stop();
        session.disconnect();
    }

    #[test]
    fn skips_delivery_when_session_is_not_reading() {
        let mut session = AcquisitionSession::new(DeviceConfig::default(), 5);
        session
            .connect_source(Box::new(SimulatedSource::wave(100)))
            .unwrap();
        // 会话保持 Connected，从未进入 Reading

        let (sender, receiver) = bounded(16);
        let publisher =
            PeriodicPublisher::start(session.handle(), Duration::from_millis(10), sender);

        thread::sleep(Duration::from_millis(100));
        assert!(receiver.try_recv().is_err());

        publisher.stop();
    }

    #[test]
    fn stops_delivering_after_the_session_stops() {
        let mut session = AcquisitionSession::new(DeviceConfig::default(), 5);
        session
            .connect_source(Box::new(SimulatedSource::wave(100)))
            .unwrap();
        session.start().unwrap();

        let (sender, receiver) = bounded(64);
        let publisher =
            PeriodicPublisher::start(session.handle(), Duration::from_millis(10), sender);
        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());

        session.stop();
        // 让正在进行中的发布迭代结束，再清空停止前已经投递的快照
        thread::sleep(Duration::from_millis(50));
        while receiver.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(100));
        assert!(receiver.try_recv().is_err());

        publisher.stop();
        session.disconnect();
    }
}
