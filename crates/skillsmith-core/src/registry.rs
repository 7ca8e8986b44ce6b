//! The process-wide object tying the skill tool surface to elicitation sessions.

use std::path::PathBuf;
use std::sync::Arc;

use skillsmith_llm::LlmProvider;
use skillsmith_skills::{
    CapabilityLoader, ManifestCapabilityProvider, ProgressiveToolSurface, SkillCache, SkillError,
    SkillResolver, SkillScope, scaffold_skill,
};

use crate::config::Config;
use crate::draft::SkillDraft;
use crate::judge::Judge;
use crate::store::SessionStore;
use crate::synthesizer::is_kebab_case;

/// Built once at startup and shared by handle with every caller.
pub struct Registry<P> {
    surface: Arc<ProgressiveToolSurface>,
    sessions: Arc<SessionStore<P>>,
}

impl<P> Clone for Registry<P> {
    fn clone(&self) -> Self {
        Self {
            surface: Arc::clone(&self.surface),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<P: LlmProvider> Registry<P> {
    #[must_use]
    pub fn new(surface: ProgressiveToolSurface, sessions: SessionStore<P>) -> Self {
        Self {
            surface: Arc::new(surface),
            sessions: Arc::new(sessions),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, provider: P) -> Self {
        let cache = Arc::new(SkillCache::new(SkillResolver::new(&config.skills.root)));
        let loader = CapabilityLoader::new(Box::new(ManifestCapabilityProvider::new(
            config.script_timeout(),
        )));
        let surface = ProgressiveToolSurface::new(cache, loader)
            .with_display_limit(config.skills.display_limit);
        let sessions = SessionStore::new(
            Judge::new(provider, config.judge_timeout()),
            config.idle_timeout(),
        );
        Self::new(surface, sessions)
    }

    #[must_use]
    pub fn surface(&self) -> &Arc<ProgressiveToolSurface> {
        &self.surface
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore<P>> {
        &self.sessions
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SkillCache> {
        self.surface.cache()
    }

    /// Write `draft` as a new internal skill and return its directory.
    ///
    /// # Errors
    ///
    /// [`SkillError::InvalidArgument`] for a name that is not kebab-case,
    /// [`SkillError::AlreadyExists`] when a skill of that name is already in the
    /// internal scope, or an IO error.
    pub fn publish_draft(&self, draft: &SkillDraft) -> Result<PathBuf, SkillError> {
        if !is_kebab_case(&draft.skill_name) {
            return Err(SkillError::InvalidArgument(format!(
                "skill name '{}' is not kebab-case",
                draft.skill_name
            )));
        }
        let scope_dir = self.cache().resolver().scope_dir(SkillScope::Internal);
        scaffold_skill(
            &scope_dir,
            SkillScope::Internal,
            &draft.skill_name,
            &draft.description(),
            &draft.manifest_fields(),
            &draft.manifest_body(),
        )
    }
}
