use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use analysis::scoring;
use analysis::signals;
use analysis::{estimate_gaze, AnalysisConfig, Classification, FaceScan, FrameAnalysis, SessionId};

use crate::frame::{self, FrameDecodeError, RawFrame};
use crate::provider::LandmarkProvider;
use crate::server::{ServerCommand, ServerTx};

/// One raw frame waiting for analysis, stamped at arrival.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub raw: RawFrame,
    pub arrived_at: f64,
}

/// Latest-wins mailbox for one session. Broadcasting a new job while the
/// worker is busy replaces the pending one, so at most one frame ever waits
/// per session and a slow inference call cannot queue frames behind it.
pub type FrameTx = watch::Sender<Option<Arc<FrameJob>>>;
pub type FrameRx = watch::Receiver<Option<Arc<FrameJob>>>;

pub fn frame_mailbox() -> (FrameTx, FrameRx) {
    watch::channel(None)
}

#[derive(Debug)]
enum IngestError {
    Decode(FrameDecodeError),
    WorkerGone,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IngestError::Decode(err) => write!(f, "decode failed: {}", err),
            IngestError::WorkerGone => write!(f, "blocking worker terminated"),
        }
    }
}

/// Spawns the per-session pipeline task. Frames within one session are
/// processed strictly one at a time; the task ends when the session's
/// mailbox sender is dropped.
pub fn spawn_ingest_worker(
    session_id: SessionId,
    mut rx: FrameRx,
    provider: Arc<dyn LandmarkProvider>,
    config: AnalysisConfig,
    provider_timeout: Duration,
    hub_tx: ServerTx,
) {
    tokio::spawn(async move {
        let mut hub_tx = hub_tx;
        log::debug!("ingest worker started for session {}", session_id);
        while let Some(slot) = rx.recv().await {
            let job = match slot {
                Some(job) => job,
                None => continue,
            };
            match analyze(&job, &provider, &config, provider_timeout).await {
                Ok(analysis) => {
                    let command = ServerCommand::FrameAnalyzed {
                        session_id: session_id.clone(),
                        analysis,
                    };
                    if hub_tx.send(command).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("dropping frame for session {}: {}", session_id, err);
                }
            }
        }
        log::debug!("ingest worker stopped for session {}", session_id);
    });
}

async fn analyze(
    job: &Arc<FrameJob>,
    provider: &Arc<dyn LandmarkProvider>,
    config: &AnalysisConfig,
    provider_timeout: Duration,
) -> Result<FrameAnalysis, IngestError> {
    let decode_job = job.clone();
    let decoded = tokio::task::spawn_blocking(move || frame::decode(&decode_job.raw))
        .await
        .map_err(|_| IngestError::WorkerGone)?
        .map_err(IngestError::Decode)?;

    let data_uri = decoded.data_uri.clone();
    let scan_provider = provider.clone();
    let image = decoded.image;
    let scan_task = tokio::task::spawn_blocking(move || scan_provider.scan(&image));
    // A provider fault is a per-frame event, not an error: the frame counts
    // as having no face and the pipeline moves on.
    let scan = match tokio::time::timeout(provider_timeout, scan_task).await {
        Ok(Ok(Ok(scan))) => scan,
        Ok(Ok(Err(err))) => {
            log::warn!("landmark provider error, treating frame as no face: {}", err);
            FaceScan::no_face()
        }
        Ok(Err(err)) => {
            log::warn!("landmark worker failed, treating frame as no face: {}", err);
            FaceScan::no_face()
        }
        Err(_) => {
            log::warn!(
                "landmark inference exceeded {:?}, treating frame as no face",
                provider_timeout
            );
            FaceScan::no_face()
        }
    };

    Ok(build_analysis(job.arrived_at, scan, data_uri, config))
}

/// Turns one face scan into the frame's analysis record. Pure; all the
/// scoring decisions live in the analysis crate.
fn build_analysis(
    timestamp: f64,
    scan: FaceScan,
    frame: Arc<String>,
    config: &AnalysisConfig,
) -> FrameAnalysis {
    let landmarks = match (scan.face_count, scan.landmarks) {
        (1, Some(landmarks)) => landmarks,
        (count, _) => return FrameAnalysis::faceless(timestamp, count, Some(frame)),
    };

    let measurements = signals::measure(&landmarks);
    let signal_vector = signals::signals_from(&measurements, &config.signals);
    let score = scoring::score(&signal_vector, &config.weights);
    let classification = scoring::classify(score, &config.thresholds);
    if classification == Classification::Confused {
        log::debug!(
            "confusion cues: score={:.2} furrowed={} tilted={} {:?}",
            score,
            measurements
                .brow_ratio
                .map(|r| config.signals.is_furrowed(r))
                .unwrap_or(false),
            measurements
                .tilt_degrees
                .map(|d| config.signals.is_tilted(d))
                .unwrap_or(false),
            signal_vector,
        );
    }

    FrameAnalysis {
        timestamp,
        face_count: 1,
        gaze: estimate_gaze(&landmarks),
        signals: signal_vector,
        score: Some(score),
        classification: Some(classification),
        frame: Some(frame),
    }
}
