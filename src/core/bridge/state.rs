use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// State shared by the two relay tasks of one session.
///
/// Both flags only ever move to their terminal value: `active` goes from
/// true to false once, `session_ready` goes from false to true once.
#[derive(Debug)]
pub struct SessionState {
    active: AtomicBool,
    session_ready: AtomicBool,
    upstream_session_id: OnceLock<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            session_ready: AtomicBool::new(false),
            upstream_session_id: OnceLock::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the session inactive. Returns `true` only for the call that
    /// actually performed the transition.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn is_ready(&self) -> bool {
        self.session_ready.load(Ordering::Acquire)
    }

    /// Record that the upstream accepted the configuration.
    ///
    /// The first session id wins; later `session.updated` events keep the flag set.
    pub fn mark_ready(&self, session_id: &str) {
        let _ = self.upstream_session_id.set(session_id.to_string());
        self.session_ready.store(true, Ordering::Release);
    }

    pub fn upstream_session_id(&self) -> Option<&str> {
        self.upstream_session_id.get().map(String::as_str)
    }
}
