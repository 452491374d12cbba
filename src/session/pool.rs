use crate::session::Session;
use crate::{CrawlError, Result};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-size pool of authenticated HTTP sessions
///
/// The pool is filled once at startup with exactly `capacity` sessions,
/// where capacity equals the worker concurrency. That bounds concurrent
/// outbound connections and guarantees `acquire` can never deadlock a
/// worker: each worker holds at most one session at a time.
#[derive(Debug)]
pub struct SessionPool {
    slots: Mutex<VecDeque<Session>>,
    available: Arc<Semaphore>,
    capacity: usize,
}

impl SessionPool {
    /// Creates a pool pre-filled with `capacity` fresh sessions
    ///
    /// No sessions are created after this initial fill.
    pub fn new(capacity: usize, user_agent: &str, login_url: &str) -> Result<Self> {
        let mut slots = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push_back(Session::new(user_agent, login_url)?);
        }

        Ok(Self {
            slots: Mutex::new(slots),
            available: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Checks a session out of the pool, suspending until one is free
    ///
    /// The guard returns the session on drop, including on error or panic
    /// paths through the holding worker.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession> {
        let permit = self
            .available
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Pool("session pool is closed".to_string()))?;

        // The permit guarantees a free slot
        let session = self
            .slots
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CrawlError::Pool("no session behind acquired permit".to_string()))?;

        Ok(PooledSession {
            pool: Arc::clone(self),
            session: Some(session),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sessions currently checked in
    pub fn idle(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    fn check_in(&self, session: Session) {
        self.slots.lock().unwrap().push_back(session);
    }
}

/// RAII checkout guard for a pooled session
///
/// Derefs to [`Session`]; dropping the guard returns the session to the
/// pool and then releases the capacity permit.
pub struct PooledSession {
    pool: Arc<SessionPool>,
    session: Option<Session>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session.as_ref().expect("session present until drop")
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Session {
        self.session.as_mut().expect("session present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.check_in(session);
        }
        // _permit drops afterwards, making the slot visible to waiters
    }
}
