use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use log::{error, info, warn};

use crate::types::{BufferSnapshot, ExportResult};

/// 导出失败只通过 ExportResult 报告，绝不影响采集会话
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// 在后台线程中将一份缓冲区快照导出为 CSV
/// 慢速文件系统的写入不会阻塞读循环或任何实时消费者，
/// 完成结果通过返回的通道报告，不做重试
pub fn export_snapshot_async(snapshot: BufferSnapshot, path: PathBuf) -> Receiver<ExportResult> {
    let (sender, receiver) = bounded(1);

    thread::spawn(move || {
        let result = match write_snapshot_csv(&snapshot, &path) {
            Ok(rows) => {
                info!("Exported {} rows to {}", rows, path.display());
                ExportResult::success(path)
            }
            Err(e) => {
                error!("Export failed: {}", e);
                ExportResult::failure(path, e.to_string())
            }
        };
        if sender.try_send(result).is_err() {
            warn!("Export result receiver dropped before completion");
        }
    });

    receiver
}

/// 写出 `Sample,X,Y,Z` 表头和每个槽位一行的数据
/// 数值固定 3 位小数，与传感器 ±2g 量程下的灵敏度匹配
pub fn write_snapshot_csv(snapshot: &BufferSnapshot, path: &Path) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ExportError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let mut file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;

    writeln!(file, "Sample,X,Y,Z").map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    for i in 0..snapshot.x.len() {
        writeln!(
            file,
            "{},{:.3},{:.3},{:.3}",
            i, snapshot.x[i], snapshot.y[i], snapshot.z[i]
        )
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    Ok(snapshot.x.len())
}
