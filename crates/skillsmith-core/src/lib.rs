//! Skill elicitation: dimension-by-dimension guided Q&A scored by a judge model,
//! metadata synthesis, the owner-checked session API, and the process-wide registry.

pub mod bootstrap;
pub mod config;
pub mod dimension;
pub mod draft;
pub mod error;
pub mod judge;
pub mod registry;
pub mod session;
pub mod store;
pub mod synthesizer;

pub use dimension::{DIMENSION_COUNT, Dimension, SUFFICIENT_SCORE};
pub use draft::{Complexity, MergedAnswers, SkillDraft, SuggestedCapability};
pub use error::ElicitError;
pub use judge::{Judge, JudgeReply, PARSE_ERROR_SCORE, RecommendedOption};
pub use registry::Registry;
pub use session::{AdvanceOutcome, DimensionPrompt, ElicitationSession, Progress, SessionStatus};
pub use store::{SessionCreated, SessionEnded, SessionStore};
pub use synthesizer::{is_kebab_case, synthesize};
