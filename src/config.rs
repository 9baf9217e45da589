use std::{fmt, path::Path, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Interval between two captions when frames are captured periodically.
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(3);

/// Largest accepted request body, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Compute device handed to the captioning model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl Device {
    /// Picks the accelerated device when one is usable, otherwise the CPU.
    pub fn detect() -> Self {
        if cfg!(feature = "cuda") && cuda_available() {
            Device::Cuda(0)
        } else {
            Device::Cpu
        }
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

fn cuda_available() -> bool {
    let visible = std::env::var("CUDA_VISIBLE_DEVICES").ok();
    if matches!(visible.as_deref(), Some("") | Some("-1")) {
        return false;
    }
    Path::new("/proc/driver/nvidia/version").exists()
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|ordinal| ordinal.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| ConfigError::UnknownDevice(s.to_string())),
        }
    }
}

/// Process-wide settings, resolved once at startup and passed down explicitly.
#[derive(Clone, Debug)]
pub struct CaptionConfig {
    pub device: Device,
    /// Not read by the server; kept for clients that capture frames on a timer.
    pub capture_interval: Duration,
    pub max_upload_bytes: usize,
}

impl CaptionConfig {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self::new(Device::detect())
    }
}
