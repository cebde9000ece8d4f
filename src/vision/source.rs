//! Vision collaborator seam and a file-backed replay implementation

use crate::core::error::Result;
use crate::vision::detection::Frame;
use std::collections::VecDeque;
use std::fs;
use std::future::Future;
use std::path::Path;

/// Supplies one frame of raw detections per capture
///
/// `Ok(None)` means the source is exhausted and the capture task should stop.
pub trait VisionSource: Send + 'static {
    fn capture(&mut self) -> impl Future<Output = Result<Option<Frame>>> + Send;
}

/// Replays frames recorded as JSON lines (one [`Frame`] per line)
#[derive(Debug, Clone, Default)]
pub struct ReplayVision {
    frames: VecDeque<Frame>,
}

impl ReplayVision {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Load a recording; blank lines and `#` comments are skipped
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let replay = Self::from_json_lines(&content)?;
        tracing::info!("Loaded {} frames from {}", replay.remaining(), path.display());
        Ok(replay)
    }

    pub fn from_json_lines(content: &str) -> Result<Self> {
        let frames = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(serde_json::from_str::<Frame>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl VisionSource for ReplayVision {
    fn capture(&mut self) -> impl Future<Output = Result<Option<Frame>>> + Send {
        let next = self.frames.pop_front();
        async move { Ok(next) }
    }
}
