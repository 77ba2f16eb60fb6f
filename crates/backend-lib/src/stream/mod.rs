// ============================
// watchparty-backend/src/stream/mod.rs
// ============================
//! Stream orchestration: turn a source URL into a joinable HLS stream.
//!
//! `start_stream` wipes the party's output directory, launches a transcode
//! job, then polls the directory until a playlist and one finished segment
//! exist. The job is owned by the orchestrator: it is cancelled when the
//! wait times out, when the same party starts a new stream, or when the
//! party is discarded. A job that fails on its own after the caller got its
//! answer is reported to the party as `streamError`.

pub mod output;
pub mod transcoder;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub use output::{HlsOutput, MANIFEST_NAME, SEGMENT_TEMPLATE};
pub use transcoder::{FfmpegTranscoder, TranscodeJob, Transcoder};

use crate::config::StreamSettings;
use crate::error::AppError;
use crate::metrics::{STREAM_FAILED, STREAM_READY, STREAM_TIMEOUT};
use crate::party::PartyId;
use crate::party_actor::PartyHandle;
use crate::registry::PartyRegistry;

const STREAM_ERROR_MESSAGE: &str = "Failed to generate stream";

/// Ownership of a running job; dropping it cancels the job
struct JobHandle {
    generation: u64,
    _cancel: oneshot::Sender<()>,
}

pub struct StreamOrchestrator {
    registry: Arc<PartyRegistry>,
    transcoder: Arc<dyn Transcoder>,
    settings: StreamSettings,
    public_url: String,
    jobs: Arc<DashMap<PartyId, JobHandle>>,
    next_generation: AtomicU64,
}

impl StreamOrchestrator {
    pub fn new(
        registry: Arc<PartyRegistry>,
        transcoder: Arc<dyn Transcoder>,
        settings: StreamSettings,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            transcoder,
            settings,
            public_url: public_url.into(),
            jobs: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn output_for(&self, party_id: &str) -> HlsOutput {
        HlsOutput::new(&self.settings.streams_dir, party_id)
    }

    /// Transcode `source_url` for `party_id` and wait until it is playable
    pub async fn start_stream(&self, party_id: &str, source_url: &str) -> Result<String, AppError> {
        let party = self.registry.get(party_id).ok_or(AppError::PartyNotFound)?;

        self.cancel_job(party_id);
        // the old playlist disappears below; stop advertising it first
        party.reset_stream().await?;
        let output = self.output_for(party_id);
        output.reset().await?;
        info!(%party_id, %source_url, "starting stream");

        let job = self.transcoder.launch(source_url, &output).await?;
        let generation = self.supervise(party.clone(), job);

        // reaped while we were launching: nobody else will reclaim this job
        if self.registry.get(party_id).is_none() {
            self.abandon(party_id, generation);
            if let Err(e) = output.remove().await {
                warn!(%party_id, error = %e, "failed to delete stream output");
            }
            return Err(AppError::PartyNotFound);
        }

        let ready = match self.wait_until_ready(&output).await {
            Ok(ready) => ready,
            Err(e) => {
                self.abandon(party_id, generation);
                warn!(%party_id, error = %e, "cannot inspect stream output, job cancelled");
                return Err(e);
            },
        };

        if ready {
            let url = self.stream_url(party_id);
            party.stream_ready(url.clone())?;
            info!(%party_id, %url, "stream ready");
            counter!(STREAM_READY).increment(1);
            Ok(url)
        } else {
            self.abandon(party_id, generation);
            warn!(%party_id, "stream not ready in time, job cancelled");
            counter!(STREAM_TIMEOUT).increment(1);
            Err(AppError::Timeout(format!(
                "no segment after {}s",
                self.settings.ready_timeout_secs
            )))
        }
    }

    /// Stop the party's job and delete its output
    pub async fn discard(&self, party_id: &str) -> Result<(), AppError> {
        self.cancel_job(party_id);
        self.output_for(party_id).remove().await?;
        Ok(())
    }

    pub fn is_running(&self, party_id: &str) -> bool {
        self.jobs.contains_key(party_id)
    }

    /// Cancel the job started as `generation`, leaving any newer one alone
    fn abandon(&self, party_id: &str, generation: u64) {
        self.jobs
            .remove_if(party_id, |_, job| job.generation == generation);
    }

    fn cancel_job(&self, party_id: &str) {
        if self.jobs.remove(party_id).is_some() {
            debug!(%party_id, "cancelled previous transcode job");
        }
    }

    /// Cache-busted public URL of the party's playlist
    fn stream_url(&self, party_id: &str) -> String {
        format!(
            "{}/streams/{}/{}?v={}",
            self.public_url.trim_end_matches('/'),
            party_id,
            MANIFEST_NAME,
            chrono::Utc::now().timestamp_millis()
        )
    }

    async fn wait_until_ready(&self, output: &HlsOutput) -> Result<bool, AppError> {
        let poll = async {
            let mut ticker = tokio::time::interval(self.settings.poll_interval());
            loop {
                ticker.tick().await;
                if output.is_ready().await? {
                    return Ok::<bool, std::io::Error>(true);
                }
            }
        };

        match tokio::time::timeout(self.settings.ready_timeout(), poll).await {
            Ok(ready) => Ok(ready?),
            Err(_) => Ok(false),
        }
    }

    /// Register the job and watch it in the background
    fn supervise(&self, party: PartyHandle, job: TranscodeJob) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let party_id = party.id().to_string();

        // registered before the watcher runs so its cleanup always finds it
        self.jobs.insert(
            party_id.clone(),
            JobHandle {
                generation,
                _cancel: cancel_tx,
            },
        );

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            tokio::select! {
                result = job => {
                    jobs.remove_if(&party_id, |_, job| job.generation == generation);
                    match result {
                        Ok(()) => info!(%party_id, "transcode finished"),
                        Err(reason) => {
                            warn!(%party_id, %reason, "transcode failed");
                            counter!(STREAM_FAILED).increment(1);
                            let _ = party.stream_failed(STREAM_ERROR_MESSAGE.to_string());
                        },
                    }
                }
                _ = cancel_rx => {
                    debug!(%party_id, generation, "transcode job stopped");
                }
            }
        });

        generation
    }
}
