//! Session registry.
//!
//! # Responsibilities
//! - Mint collision-free session ids on session creation
//! - Hold the backing state of each stateful component instance
//! - Serialize concurrent invocations against the same session
//! - Track the Created → Active transition

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::affinity::Affinity;
use crate::error::ProtocolError;
use crate::observability::metrics;
use crate::protocol::{ComponentTarget, StatefulLocator};
use crate::session::SessionId;

/// Backing state of one stateful component instance.
pub type SessionState = Box<dyn Any + Send>;

/// Supplies the initial state for newly created sessions.
pub trait SessionStateProvider: Send + Sync + 'static {
    fn create_state(&self, locator: &StatefulLocator) -> SessionState;
}

/// Provider for components that keep no state of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitStateProvider;

impl SessionStateProvider for UnitStateProvider {
    fn create_state(&self, _locator: &StatefulLocator) -> SessionState {
        Box::new(())
    }
}

/// Externally observable session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, no successful invocation yet.
    Created,
    /// At least one invocation completed successfully.
    Active,
}

struct SessionEntry {
    locator: StatefulLocator,
    active: AtomicBool,
    state: Arc<Mutex<SessionState>>,
}

impl SessionEntry {
    fn phase(&self) -> SessionPhase {
        if self.active.load(Ordering::Acquire) {
            SessionPhase::Active
        } else {
            SessionPhase::Created
        }
    }
}

/// Exclusive access to one session for the duration of an invocation.
pub struct SessionGuard {
    entry: Arc<SessionEntry>,
    state: OwnedMutexGuard<SessionState>,
}

impl SessionGuard {
    pub fn locator(&self) -> &StatefulLocator {
        &self.entry.locator
    }

    pub fn phase(&self) -> SessionPhase {
        self.entry.phase()
    }

    /// Typed access to the backing state.
    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.downcast_mut::<T>()
    }

    pub fn state_ref<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    /// Record a successful invocation.
    pub fn mark_active(&self) {
        self.entry.active.store(true, Ordering::Release);
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session_id", &self.entry.locator.session_id)
            .field("phase", &self.phase())
            .finish()
    }
}

pub struct SessionRegistry {
    entries: DashMap<SessionId, Arc<SessionEntry>>,
    provider: Arc<dyn SessionStateProvider>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn SessionStateProvider>) -> Self {
        Self {
            entries: DashMap::new(),
            provider,
        }
    }

    /// Create a session for `target`/`view` and return its locator.
    pub fn create(&self, target: &ComponentTarget, view: &str, affinity: Affinity) -> StatefulLocator {
        loop {
            let locator = StatefulLocator {
                target: target.clone(),
                view: view.to_string(),
                session_id: SessionId::generate(),
                affinity: affinity.clone(),
            };
            // Provider code runs before any shard lock is taken.
            let state = self.provider.create_state(&locator);
            let entry = Arc::new(SessionEntry {
                locator: locator.clone(),
                active: AtomicBool::new(false),
                state: Arc::new(Mutex::new(state)),
            });

            match self.entries.entry(locator.session_id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(session_id = %locator.session_id, "Session id collision, minting another");
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }

            metrics::record_session_created();
            metrics::record_active_sessions(self.entries.len());
            tracing::debug!(
                session_id = %locator.session_id,
                bean = %target.bean,
                view = %view,
                "Session created"
            );
            return locator;
        }
    }

    /// Locator of an existing session.
    pub fn lookup(&self, id: &SessionId) -> Result<StatefulLocator, ProtocolError> {
        self.entries
            .get(id)
            .map(|entry| entry.locator.clone())
            .ok_or_else(|| ProtocolError::SessionNotFound(id.clone()))
    }

    pub fn phase(&self, id: &SessionId) -> Option<SessionPhase> {
        self.entries.get(id).map(|entry| entry.phase())
    }

    /// Wait for exclusive access to a session that belongs to `target`.
    ///
    /// A session id that exists but was created for another component is
    /// reported as not found.
    pub async fn acquire(
        &self,
        id: &SessionId,
        target: &ComponentTarget,
    ) -> Result<SessionGuard, ProtocolError> {
        // Clone the entry out so no shard lock is held across the await.
        let entry = self
            .entries
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProtocolError::SessionNotFound(id.clone()))?;

        if &entry.locator.target != target {
            tracing::debug!(session_id = %id, "Session belongs to a different component");
            return Err(ProtocolError::SessionNotFound(id.clone()));
        }

        let state = Arc::clone(&entry.state).lock_owned().await;
        Ok(SessionGuard { entry, state })
    }

    /// Drop a session. Called by whoever owns the component lifecycle.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            metrics::record_active_sessions(self.entries.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.entries.len())
            .finish()
    }
}
