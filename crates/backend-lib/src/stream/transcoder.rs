// ============================
// watchparty-backend/src/stream/transcoder.rs
// ============================
//! External transcode job. Anything that writes the standard playlist and
//! segment layout into an [`HlsOutput`] can stand in for ffmpeg.
use std::process::Stdio;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::process::Command;
use tracing::info;

use super::output::HlsOutput;
use crate::config::StreamSettings;
use crate::error::AppError;

/// A running job. Resolves when the job exits; `Err` carries the failure
/// reason. Dropping the future stops the job.
pub type TranscodeJob = BoxFuture<'static, Result<(), String>>;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Start converting `source_url` into `output`
    async fn launch(&self, source_url: &str, output: &HlsOutput) -> Result<TranscodeJob, AppError>;
}

/// Live-style HLS via an `ffmpeg` child process
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    segment_secs: u32,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, segment_secs: u32) -> Self {
        Self {
            program: program.into(),
            segment_secs,
        }
    }

    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::new(settings.ffmpeg_path.clone(), settings.segment_secs)
    }

    /// Command line: independently decodable segments, unbounded playlist
    pub fn args(&self, source_url: &str, output: &HlsOutput) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(source_url.to_string());
        args.extend(
            [
                "-preset",
                "veryfast",
                "-g",
                "50",
                "-sc_threshold",
                "0",
                "-hls_time",
            ]
            .map(String::from),
        );
        args.push(self.segment_secs.to_string());
        args.extend(
            [
                "-hls_list_size",
                "0",
                "-hls_flags",
                "independent_segments",
                "-hls_segment_filename",
            ]
            .map(String::from),
        );
        args.push(output.segment_template().to_string_lossy().into_owned());
        args.extend(["-f", "hls"].map(String::from));
        args.push(output.manifest_path().to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn launch(&self, source_url: &str, output: &HlsOutput) -> Result<TranscodeJob, AppError> {
        let child = Command::new(&self.program)
            .args(self.args(source_url, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Upstream(format!("failed to start {}: {e}", self.program)))?;

        info!(pid = ?child.id(), dir = %output.dir().display(), "ffmpeg started");

        Ok(Box::pin(async move {
            let result = child.wait_with_output().await.map_err(|e| e.to_string())?;
            if result.status.success() {
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| result.status.to_string());
            Err(reason)
        }))
    }
}
