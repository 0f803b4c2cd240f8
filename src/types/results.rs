use std::path::PathBuf;

/// Result of an export operation
#[derive(Debug)]
pub struct ExportResult {
    pub success: bool,
    pub path: PathBuf,
    pub message: String,
}

impl ExportResult {
    pub fn success(path: PathBuf) -> Self {
        Self {
            success: true,
            message: format!("Successfully exported to {}", path.display()),
            path,
        }
    }

    pub fn failure(path: PathBuf, message: String) -> Self {
        Self {
            success: false,
            path,
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
