use skillsmith_skills::SkillError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ElicitError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("user {caller} is not allowed to access session {session_id}")]
    PermissionDenied { session_id: Uuid, caller: String },

    #[error("session {0} is already complete")]
    SessionComplete(Uuid),

    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error(transparent)]
    Skill(#[from] SkillError),
}

impl ElicitError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_)) || matches!(self, Self::Skill(e) if e.is_not_found())
    }
}
