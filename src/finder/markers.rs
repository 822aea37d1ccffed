//! Deferred marker mutation.
//!
//! The finder never touches the marker sink from inside a change notification.
//! It enqueues [`MarkerEffect`]s instead, and a dedicated worker thread applies
//! them in order while the project's `refreshing` flag is raised, so the
//! notifications caused by the marker changes themselves can be recognized and
//! dropped.
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::IncludeGraphError;
use crate::project::{Marker, MarkerSink};

/// Prefix of every cycle report; markers starting with it belong to the finder.
pub const CYCLE_MESSAGE_PREFIX: &str = "Found cyclical <include> chain";

/// Line cycle markers are attached to.
pub const CYCLE_MARKER_LINE: usize = 1;

#[derive(Debug)]
pub enum MarkerEffect {
    /// Make `message` the only cycle marker on `resource`.
    Report { resource: PathBuf, message: String },
    /// Drop every cycle marker on `resource`.
    Retract { resource: PathBuf },
    /// Acknowledge once everything queued before it has been applied.
    Flush(Sender<()>),
}

#[must_use]
pub fn cycle_message(chain: &impl std::fmt::Display) -> String {
    format!("{CYCLE_MESSAGE_PREFIX}: {chain}")
}

/// Markers without a message are treated as ours too.
#[must_use]
pub fn is_cycle_marker(marker: &Marker) -> bool {
    marker.message.as_deref().map_or(true, |m| m.starts_with(CYCLE_MESSAGE_PREFIX))
}

/// Sending half of the marker worker's queue.
#[derive(Debug, Clone)]
pub struct MarkerQueue {
    tx: Sender<MarkerEffect>,
}

impl MarkerQueue {
    pub fn enqueue(&self, effect: MarkerEffect) {
        if self.tx.send(effect).is_err() {
            tracing::warn!("marker worker has stopped; dropping marker update");
        }
    }

    /// Block until every effect enqueued so far has been applied.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(MarkerEffect::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

/// Start the worker for one project. It stops once every queue handle is dropped.
///
/// # Errors
/// Returns `IncludeGraphError::Io` if the thread can't be spawned.
pub fn spawn_marker_worker(
    name: &str,
    sink: Arc<dyn MarkerSink>,
    refreshing: Arc<AtomicBool>,
) -> Result<MarkerQueue, IncludeGraphError> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name(format!("layout-markers:{name}"))
        .spawn(move || run_worker(&rx, sink.as_ref(), &refreshing))?;
    Ok(MarkerQueue { tx })
}

// Raised for the duration of a sink mutation, lowered even on panic
struct Refreshing<'a>(&'a AtomicBool);

impl<'a> Refreshing<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Refreshing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn run_worker(rx: &Receiver<MarkerEffect>, sink: &dyn MarkerSink, refreshing: &AtomicBool) {
    for effect in rx {
        match effect {
            MarkerEffect::Report { resource, message } => {
                let _guard = Refreshing::raise(refreshing);
                apply_report(sink, &resource, message);
            }
            MarkerEffect::Retract { resource } => {
                let _guard = Refreshing::raise(refreshing);
                apply_retract(sink, &resource);
            }
            MarkerEffect::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("marker worker stopped");
}

fn apply_report(sink: &dyn MarkerSink, resource: &std::path::Path, message: String) {
    let wanted = Marker::error(message, CYCLE_MARKER_LINE);
    let existing = match sink.markers(resource) {
        Ok(m) => m,
        Err(e) => {
            // Can't tell what's there; add ours and let the sink sort out duplicates
            tracing::debug!("can't list markers of {}: {e}", resource.display());
            Vec::new()
        }
    };
    for stale in existing.iter().filter(|m| is_cycle_marker(m) && **m != wanted) {
        if let Err(e) = sink.delete_marker(resource, stale) {
            tracing::warn!("can't delete problem marker on {}: {e}", resource.display());
        }
    }
    if existing.contains(&wanted) {
        return;
    }
    if let Err(e) = sink.add_marker(resource, wanted) {
        tracing::warn!("can't add problem marker on {}: {e}", resource.display());
    }
}

fn apply_retract(sink: &dyn MarkerSink, resource: &std::path::Path) {
    let existing = match sink.markers(resource) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("can't list markers of {}: {e}", resource.display());
            return;
        }
    };
    for marker in existing.iter().filter(|m| is_cycle_marker(m)) {
        if let Err(e) = sink.delete_marker(resource, marker) {
            tracing::warn!("can't delete problem marker on {}: {e}", resource.display());
        }
    }
}
