//! Session bookkeeping for analysis runs
//!
//! A [`SessionRegistry`] is shared by everything that starts, watches or
//! cancels analyses in one process. It enforces single flight: one run at
//! a time, with a restart under the same session id replacing the old run.
//! The registry's lock is never held across an await point.

use super::state::AnalysisState;
use crate::error::AnalysisError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot of the process-wide analyzer bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalyzerProcessState {
    /// LLM calls currently in flight
    pub active_requests: usize,
    pub is_analyzing: bool,
    /// Set when a run was torn down by cancellation; consumed by the next
    /// `begin`
    pub previously_canceled: bool,
    pub last_session_id: Option<String>,
}

struct SessionEntry {
    run_id: u64,
    token: CancellationToken,
    canceled: Arc<AtomicBool>,
    state: AnalysisState,
}

impl SessionEntry {
    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.token.cancel();
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, SessionEntry>,
    active_requests: HashMap<u64, CancellationToken>,
    /// Session id and run id holding the single-flight slot
    running: Option<(String, u64)>,
    previously_canceled: bool,
    last_session_id: Option<String>,
    next_run_id: u64,
    next_request_id: u64,
}

impl RegistryInner {
    fn clear_requests(&mut self) {
        for (_, token) in self.active_requests.drain() {
            token.cancel();
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new run for `session_id`.
    ///
    /// Fails with [`AnalysisError::AlreadyAnalyzing`] when a different
    /// session holds the slot. A live run under the same id is canceled and
    /// evicted before the new one is registered. When `parent` is given the
    /// run is also canceled whenever `parent` is.
    pub fn begin(
        self: &Arc<Self>,
        session_id: &str,
        parent: Option<&CancellationToken>,
    ) -> Result<SessionHandle, AnalysisError> {
        let mut inner = self.lock();

        if let Some((active, _)) = &inner.running {
            if active != session_id {
                return Err(AnalysisError::AlreadyAnalyzing {
                    active_session: active.clone(),
                });
            }
        }

        if let Some(previous) = inner.sessions.remove(session_id) {
            info!(
                session = session_id,
                run = previous.run_id,
                "Evicting previous run for session"
            );
            previous.cancel();
        }

        if inner.previously_canceled {
            debug!("Previous run was canceled, clearing leftover requests");
            inner.previously_canceled = false;
        }
        inner.clear_requests();

        inner.next_run_id += 1;
        let run_id = inner.next_run_id;
        let token = match parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let canceled = Arc::new(AtomicBool::new(false));

        inner.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                run_id,
                token: token.clone(),
                canceled: canceled.clone(),
                state: AnalysisState::Idle,
            },
        );
        inner.running = Some((session_id.to_string(), run_id));
        inner.last_session_id = Some(session_id.to_string());

        debug!(session = session_id, run = run_id, "Session registered");

        Ok(SessionHandle {
            registry: Arc::clone(self),
            session_id: session_id.to_string(),
            run_id,
            token,
            canceled,
        })
    }

    /// Cancels the run registered under `session_id`, tears down every
    /// in-flight request and removes the session. Returns `false` when no
    /// such session exists.
    pub fn cancel(&self, session_id: &str) -> bool {
        let found = {
            let mut inner = self.lock();
            match inner.sessions.remove(session_id) {
                Some(entry) => {
                    entry.cancel();
                    true
                }
                None => false,
            }
        };

        if !found {
            debug!(session = session_id, "No active analysis for session");
            return false;
        }

        info!(session = session_id, "Canceling analysis");
        self.force_terminate_all();
        self.reset_state();
        true
    }

    /// Cancels every session and every in-flight request
    pub fn force_terminate_all(&self) {
        let mut inner = self.lock();
        let sessions = inner.sessions.len();
        let requests = inner.active_requests.len();

        for (_, entry) in inner.sessions.drain() {
            entry.cancel();
        }
        inner.clear_requests();
        inner.running = None;
        inner.previously_canceled = true;

        if sessions > 0 || requests > 0 {
            warn!(sessions, requests, "Force-terminated all analysis work");
        }
    }

    /// Clears the in-flight request set and the analyzing flag. Sessions and
    /// the `previously_canceled` marker survive.
    pub fn reset_state(&self) {
        let mut inner = self.lock();
        inner.clear_requests();
        inner.running = None;
    }

    pub fn state(&self) -> AnalyzerProcessState {
        let inner = self.lock();
        AnalyzerProcessState {
            active_requests: inner.active_requests.len(),
            is_analyzing: inner.running.is_some(),
            previously_canceled: inner.previously_canceled,
            last_session_id: inner.last_session_id.clone(),
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.lock().sessions.contains_key(session_id)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Last state reported by the session's current run
    pub fn session_state(&self, session_id: &str) -> Option<AnalysisState> {
        self.lock().sessions.get(session_id).map(|entry| entry.state)
    }

    fn set_state(&self, session_id: &str, run_id: u64, state: AnalysisState) {
        let mut inner = self.lock();
        if let Some(entry) = inner.sessions.get_mut(session_id) {
            if entry.run_id == run_id {
                entry.state = state;
            }
        }
    }

    fn track_request(&self, parent: &CancellationToken) -> (u64, CancellationToken) {
        let mut inner = self.lock();
        inner.next_request_id += 1;
        let id = inner.next_request_id;
        let token = parent.child_token();
        inner.active_requests.insert(id, token.clone());
        (id, token)
    }

    fn untrack_request(&self, id: u64) {
        self.lock().active_requests.remove(&id);
    }

    /// Releases whatever `run_id` still owns. A run that was evicted by a
    /// restart owns nothing any more and leaves the newer run untouched.
    fn finish(&self, session_id: &str, run_id: u64, canceled: bool) {
        let mut inner = self.lock();

        let owns_entry = inner
            .sessions
            .get(session_id)
            .is_some_and(|entry| entry.run_id == run_id);
        if owns_entry {
            inner.sessions.remove(session_id);
        }

        let owns_slot = inner
            .running
            .as_ref()
            .is_some_and(|(_, running)| *running == run_id);
        if owns_slot {
            inner.running = None;
            inner.clear_requests();
        }

        if canceled && (owns_entry || owns_slot) {
            inner.previously_canceled = true;
        }
        debug!(session = session_id, run = run_id, canceled, "Session finished");
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("state", &self.state())
            .field("sessions", &self.active_sessions())
            .finish()
    }
}

/// A registered run. Dropping it deregisters the run.
pub struct SessionHandle {
    registry: Arc<SessionRegistry>,
    session_id: String,
    run_id: u64,
    token: CancellationToken,
    canceled: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Abort signal for this run
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst) || self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.token.cancel();
    }

    pub fn set_state(&self, state: AnalysisState) {
        self.registry.set_state(&self.session_id, self.run_id, state);
    }

    /// Registers one outbound call; the returned guard's token fires when
    /// this run is canceled or all work is force-terminated
    pub fn track_request(&self) -> RequestGuard {
        let (id, token) = self.registry.track_request(&self.token);
        RequestGuard {
            registry: Arc::clone(&self.registry),
            id,
            token,
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let canceled = self.is_canceled();
        self.registry.finish(&self.session_id, self.run_id, canceled);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("run_id", &self.run_id)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// One tracked in-flight request
pub struct RequestGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
    token: CancellationToken,
}

impl RequestGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.registry.untrack_request(self.id);
    }
}
