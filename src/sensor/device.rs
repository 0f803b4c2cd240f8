use std::io;
use std::io::Read;
use std::time::Duration;

use log::warn;
use serialport::{SerialPort, SerialPortType};

/// 采集会话的数据来源抽象
/// 读循环每次迭代询问一次"有没有一整行待处理的数据"，
/// 没有数据时返回 Ok(None)，读循环据此短暂休眠而不是忙等
pub trait DataSource: Send {
    /// Returns one complete pending line (including its terminator), or
    /// `Ok(None)` when nothing is pending yet. An `Err` means the device is
    /// gone and the read loop must exit.
    fn poll_line(&mut self) -> io::Result<Option<String>>;

    /// 用于日志的来源描述
    fn description(&self) -> String;
}

/// 基于 serialport 的真实设备来源
/// 打开时带有限的读超时，保证读循环永远不会无限期阻塞在一次读取上
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    address: String,
    // 跨 poll 调用保留的未完成行
    pending: Vec<u8>,
}

impl SerialSource {
    pub fn open(
        address: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(address, baud_rate)
            .timeout(timeout)
            .open()?;
        Ok(Self {
            port,
            address: address.to_string(),
            pending: Vec::new(),
        })
    }
}

impl DataSource for SerialSource {
    fn poll_line(&mut self) -> io::Result<Option<String>> {
        // 检查是否有待读数据，对应原始设备的 in_waiting 语义
        let available = self.port.bytes_to_read()? as usize;
        if available > 0 {
            let mut chunk = vec![0u8; available];
            match self.port.read(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                // 读超时不是设备故障，下一轮迭代再试
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }

        Ok(None)
    }

    fn description(&self) -> String {
        self.address.clone()
    }
}

/// 枚举当前可用的串口设备，返回 (路径, 描述) 列表
pub fn list_devices() -> Vec<(String, String)> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|port| {
                let description = match port.port_type {
                    SerialPortType::UsbPort(info) => info
                        .product
                        .unwrap_or_else(|| "USB serial device".to_string()),
                    SerialPortType::BluetoothPort => "Bluetooth serial device".to_string(),
                    SerialPortType::PciPort => "PCI serial device".to_string(),
                    SerialPortType::Unknown => "Unknown serial device".to_string(),
                };
                (port.port_name, description)
            })
            .collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
