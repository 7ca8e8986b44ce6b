//! SKILL.md manifests, scoped resolution, tiered caching, capability discovery, and the
//! progressive-disclosure tool surface exposed to an agent.

pub mod cache;
pub mod capability;
pub mod error;
pub mod manifest;
pub mod prompt;
pub mod resolver;
pub mod resource;
pub mod surface;

pub use cache::SkillCache;
pub use capability::{
    Callable, CapabilityError, CapabilityFunction, CapabilityLoader, CapabilityProvider,
    CapabilityRegistry, FunctionRegistry, ManifestCapabilityProvider, RegistrationReport,
};
pub use error::{SkillError, ValidationCause};
pub use manifest::{SkillInstructions, SkillManifest, SkillMetadata, SkillScope, scaffold_skill};
pub use prompt::format_metadata_prompt;
pub use resolver::SkillResolver;
pub use resource::{ResourceKind, ResourceListing};
pub use surface::{LoadedInstructions, ProgressiveToolSurface, ToolCall, ToolDef};
