//! Best-effort duration probe for newly added tracks.

use crate::events::EventSender;
use crate::registry::MediaSource;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::io::Cursor;
use std::sync::mpsc;

/// Read the duration of a source with lofty. Blocks on IO.
pub fn probe_duration(source: &MediaSource) -> Result<f64, String> {
    let tagged_file = match source {
        MediaSource::Path(path) => lofty::read_from_path(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?,
        MediaSource::Bytes(bytes) => Probe::new(Cursor::new(&bytes[..]))
            .guess_file_type()
            .map_err(|e| format!("Failed to probe buffer: {}", e))?
            .read()
            .map_err(|e| format!("Failed to read buffer: {}", e))?,
    };
    Ok(tagged_file.properties().duration().as_secs_f64())
}

type ProbeJob = (String, MediaSource);

/// One background thread that probes queued sources in order. Dropping the
/// worker closes the queue and lets the thread finish.
pub struct ProbeWorker {
    tx: mpsc::Sender<ProbeJob>,
}

impl ProbeWorker {
    pub fn spawn(events: EventSender) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<ProbeJob>();
        std::thread::Builder::new()
            .name("duration-probe".into())
            .spawn(move || {
                for (track_id, source) in rx {
                    probe_and_post(&track_id, &source, &events);
                }
            })?;
        Ok(ProbeWorker { tx })
    }

    /// Queue a source. Returns false if the worker thread is gone.
    pub fn submit(&self, track_id: String, source: MediaSource) -> bool {
        self.tx.send((track_id, source)).is_ok()
    }
}

/// Failures post nothing, so the track keeps an unknown (0) duration.
fn probe_and_post(track_id: &str, source: &MediaSource, events: &EventSender) {
    match probe_duration(source) {
        Ok(secs) if secs > 0.0 => events.duration_probed(track_id.to_string(), secs),
        Ok(_) => tracing::debug!(track_id, "probe found no duration"),
        Err(e) => tracing::warn!(track_id, error = %e, "duration probe failed"),
    }
}
