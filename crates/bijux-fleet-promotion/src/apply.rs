// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use bijux_fleet_model::{PolicySet, RingName};

use crate::collaborators::{ApplyBackend, CollaboratorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyFailure {
    Backend(CollaboratorError),
    TimedOut(Duration),
    Aborted(String),
}

impl ApplyFailure {
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Backend(_) => "apply-failed",
            Self::TimedOut(_) => "apply-timeout",
            Self::Aborted(_) => "apply-aborted",
        }
    }
}

impl Display for ApplyFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::TimedOut(limit) => write!(f, "apply did not return within {}ms", limit.as_millis()),
            Self::Aborted(message) => write!(f, "apply worker aborted: {message}"),
        }
    }
}

/// Runs one apply on a worker thread and waits at most `timeout`. A timed
/// out worker is left to finish on its own; its result is discarded.
pub(crate) fn apply_with_timeout(
    backend: &Arc<dyn ApplyBackend>,
    set: &PolicySet,
    ring: &RingName,
    timeout: Duration,
) -> Result<(), ApplyFailure> {
    let (tx, rx) = mpsc::channel();
    let backend = Arc::clone(backend);
    let set = set.clone();
    let ring = ring.clone();
    thread::Builder::new()
        .name(format!("fleet-apply-{ring}"))
        .spawn(move || {
            let _ = tx.send(backend.apply(&set, &ring));
        })
        .map_err(|e| ApplyFailure::Aborted(e.to_string()))?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(ApplyFailure::Backend),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ApplyFailure::TimedOut(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ApplyFailure::Aborted(
            "worker exited without reporting".to_string(),
        )),
    }
}
