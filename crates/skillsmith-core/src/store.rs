//! Owner-checked session API over a map of per-session locks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillsmith_llm::LlmProvider;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::dimension::Dimension;
use crate::draft::{MergedAnswers, SkillDraft};
use crate::error::ElicitError;
use crate::judge::Judge;
use crate::session::{AdvanceOutcome, DimensionPrompt, ElicitationSession, Progress, SessionStatus};

pub const DEFAULT_IDLE_TIMEOUT_MINS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub prompt: DimensionPrompt,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEnded {
    pub session_id: Uuid,
    pub complete: bool,
    pub skill_metadata: SkillDraft,
    pub answers: MergedAnswers,
}

struct Entry {
    owner_id: String,
    session: Arc<Mutex<ElicitationSession>>,
}

pub struct SessionStore<P> {
    judge: Judge<P>,
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: chrono::Duration,
}

impl<P: LlmProvider> SessionStore<P> {
    #[must_use]
    pub fn new(judge: Judge<P>, idle_timeout: chrono::Duration) -> Self {
        Self {
            judge,
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    #[must_use]
    pub fn judge(&self) -> &Judge<P> {
        &self.judge
    }

    #[must_use]
    pub fn idle_timeout(&self) -> chrono::Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create_session(&self, owner_id: &str) -> SessionCreated {
        let session = ElicitationSession::new(owner_id);
        let created = SessionCreated {
            session_id: session.id(),
            prompt: DimensionPrompt::for_dimension(Dimension::CoreValue),
            progress: session.progress(),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                session.id(),
                Entry {
                    owner_id: owner_id.to_owned(),
                    session: Arc::new(Mutex::new(session)),
                },
            );
        tracing::info!(session_id = %created.session_id, owner = owner_id, "session created");
        created
    }

    /// Submit one answer to a session.
    ///
    /// # Errors
    ///
    /// [`ElicitError::SessionNotFound`] for unknown or expired sessions, including one
    /// swept while the judge was scoring; [`ElicitError::PermissionDenied`] when
    /// `owner_id` does not own the session; anything [`ElicitationSession::advance`] returns.
    pub async fn chat(
        &self,
        session_id: Uuid,
        owner_id: &str,
        text: &str,
    ) -> Result<AdvanceOutcome, ElicitError> {
        let handle = self.checked_handle(session_id, owner_id)?;
        let mut session = handle.lock().await;
        if session.is_expired(self.idle_timeout) {
            drop(session);
            self.remove_if_same(session_id, &handle);
            return Err(ElicitError::SessionNotFound(session_id));
        }

        let outcome = session.advance(text, &self.judge).await?;
        drop(session);

        if !self.holds(session_id, &handle) {
            tracing::warn!(%session_id, "session expired while the judge was scoring");
            return Err(ElicitError::SessionNotFound(session_id));
        }
        Ok(outcome)
    }

    /// Close a session and return its draft, synthesized from partial answers if needed.
    ///
    /// # Errors
    ///
    /// [`ElicitError::SessionNotFound`] or [`ElicitError::PermissionDenied`].
    pub async fn end_session(
        &self,
        session_id: Uuid,
        owner_id: &str,
    ) -> Result<SessionEnded, ElicitError> {
        let handle = self.checked_handle(session_id, owner_id)?;
        let session = handle.lock().await;
        self.remove_if_same(session_id, &handle);
        if session.is_expired(self.idle_timeout) {
            return Err(ElicitError::SessionNotFound(session_id));
        }
        tracing::info!(%session_id, complete = session.is_complete(), "session ended");
        Ok(SessionEnded {
            session_id,
            complete: session.is_complete(),
            skill_metadata: session.final_draft(),
            answers: session.merged_answers(),
        })
    }

    /// # Errors
    ///
    /// [`ElicitError::SessionNotFound`] or [`ElicitError::PermissionDenied`].
    pub async fn get_session_status(
        &self,
        session_id: Uuid,
        owner_id: &str,
    ) -> Result<SessionStatus, ElicitError> {
        let handle = self.checked_handle(session_id, owner_id)?;
        let session = handle.lock().await;
        if session.is_expired(self.idle_timeout) {
            drop(session);
            self.remove_if_same(session_id, &handle);
            return Err(ElicitError::SessionNotFound(session_id));
        }
        Ok(session.status())
    }

    /// Drop every session idle longer than the timeout as of `now`.
    ///
    /// Sessions locked by an in-flight call are left for the next sweep.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| match entry.session.try_lock() {
            Ok(session) => !session.is_expired_at(now, self.idle_timeout),
            Err(_) => true,
        });
        before - sessions.len()
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    fn checked_handle(
        &self,
        session_id: Uuid,
        owner_id: &str,
    ) -> Result<Arc<Mutex<ElicitationSession>>, ElicitError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions
            .get(&session_id)
            .ok_or(ElicitError::SessionNotFound(session_id))?;
        if entry.owner_id != owner_id {
            // An expired session is unknown to everyone, owner or not.
            if entry
                .session
                .try_lock()
                .is_ok_and(|session| session.is_expired(self.idle_timeout))
            {
                return Err(ElicitError::SessionNotFound(session_id));
            }
            tracing::warn!(%session_id, caller = owner_id, "session owner mismatch");
            return Err(ElicitError::PermissionDenied {
                session_id,
                caller: owner_id.to_owned(),
            });
        }
        Ok(Arc::clone(&entry.session))
    }

    fn holds(&self, session_id: Uuid, handle: &Arc<Mutex<ElicitationSession>>) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.session, handle))
    }

    fn remove_if_same(&self, session_id: Uuid, handle: &Arc<Mutex<ElicitationSession>>) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions
            .get(&session_id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.session, handle))
        {
            sessions.remove(&session_id);
        }
    }
}

impl<P: LlmProvider + 'static> SessionStore<P> {
    /// Periodically remove expired sessions until `shutdown_rx` flips to `true`.
    pub async fn run_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        tracing::info!(removed, remaining = self.len(), "expired sessions swept");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("session sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_sweeper(every, shutdown_rx))
    }
}
