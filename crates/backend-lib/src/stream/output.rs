// ============================
// watchparty-backend/src/stream/output.rs
// ============================
//! Per-party HLS output directory and the readiness check.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs as tokio_fs;

/// Playlist written by the transcode job
pub const MANIFEST_NAME: &str = "stream.m3u8";
/// Segment file template handed to the transcode job
pub const SEGMENT_TEMPLATE: &str = "stream%03d.ts";

static SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^stream\d+\.ts$").unwrap());

/// Output location of one party's stream: `<root>/<party_id>/`
#[derive(Debug, Clone)]
pub struct HlsOutput {
    dir: PathBuf,
}

impl HlsOutput {
    pub fn new(root: impl AsRef<Path>, party_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(party_id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_NAME)
    }

    pub fn segment_template(&self) -> PathBuf {
        self.dir.join(SEGMENT_TEMPLATE)
    }

    /// Discard any previous output and recreate an empty directory
    pub async fn reset(&self) -> io::Result<()> {
        self.remove().await?;
        tokio_fs::create_dir_all(&self.dir).await
    }

    /// Delete the directory; a missing directory is not an error
    pub async fn remove(&self) -> io::Result<()> {
        match tokio_fs::remove_dir_all(&self.dir).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Completed segment file names, sorted
    pub async fn segments(&self) -> io::Result<Vec<String>> {
        let mut entries = match tokio_fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut segments = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if SEGMENT_REGEX.is_match(name) {
                    segments.push(name.to_string());
                }
            }
        }
        segments.sort();
        Ok(segments)
    }

    /// Playable once the playlist exists and at least one segment was written
    pub async fn is_ready(&self) -> io::Result<bool> {
        if !tokio_fs::try_exists(self.manifest_path()).await? {
            return Ok(false);
        }
        Ok(!self.segments().await?.is_empty())
    }
}
