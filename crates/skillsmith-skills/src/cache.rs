use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SkillError;
use crate::manifest::{SkillInstructions, SkillManifest, SkillMetadata, SkillScope, load_manifest};
use crate::resolver::SkillResolver;

type CacheKey = (SkillScope, String);

/// Two independent tiers (metadata and full instructions) keyed by the scope a lookup resolved
/// to, so `External` and `Internal` requests for an overridden skill share one entry.
///
/// Entries are never evicted. Populating an entry twice yields equal values, so concurrent
/// misses only cost a duplicate parse.
#[derive(Debug)]
pub struct SkillCache {
    resolver: SkillResolver,
    metadata: RwLock<HashMap<CacheKey, Arc<SkillMetadata>>>,
    instructions: RwLock<HashMap<CacheKey, Arc<SkillInstructions>>>,
    manifest_reads: AtomicUsize,
}

impl SkillCache {
    #[must_use]
    pub fn new(resolver: SkillResolver) -> Self {
        Self {
            resolver,
            metadata: RwLock::new(HashMap::new()),
            instructions: RwLock::new(HashMap::new()),
            manifest_reads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &SkillResolver {
        &self.resolver
    }

    /// Tier-1 lookup.
    ///
    /// # Errors
    ///
    /// Resolution and validation errors from the first (uncached) load.
    pub fn get_metadata(
        &self,
        name: &str,
        scope: SkillScope,
    ) -> Result<Arc<SkillMetadata>, SkillError> {
        let (effective, dir) = self.resolver.locate(name, scope)?;
        let key = (effective, name.to_owned());

        if let Some(hit) = self
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        let manifest = self.read_manifest(&dir, effective)?;
        let entry = Arc::new(manifest.metadata());
        self.metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Tier-2 lookup.
    ///
    /// # Errors
    ///
    /// Resolution and validation errors from the first (uncached) load.
    pub fn get_instructions(
        &self,
        name: &str,
        scope: SkillScope,
    ) -> Result<Arc<SkillInstructions>, SkillError> {
        let (effective, dir) = self.resolver.locate(name, scope)?;
        let key = (effective, name.to_owned());

        if let Some(hit) = self
            .instructions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        let manifest = self.read_manifest(&dir, effective)?;
        let entry = Arc::new(SkillInstructions {
            name: manifest.name,
            scope: effective,
            body: manifest.raw_body,
        });
        self.instructions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Metadata for every skill directory under `scope`, sorted by name.
    ///
    /// Invalid skills are logged and skipped.
    #[must_use]
    pub fn list_metadata(&self, scope: SkillScope) -> Vec<Arc<SkillMetadata>> {
        let mut out: Vec<Arc<SkillMetadata>> = Vec::new();
        for dir_name in self.resolver.skill_names(scope) {
            match self.get_metadata(&dir_name, scope) {
                Ok(meta) => out.push(meta),
                Err(e) => tracing::warn!(skill = %dir_name, %scope, "skipping skill: {e}"),
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Number of SKILL.md files parsed so far. Cache hits never increment it.
    #[must_use]
    pub fn manifest_reads(&self) -> usize {
        self.manifest_reads.load(Ordering::Relaxed)
    }

    fn read_manifest(
        &self,
        dir: &std::path::Path,
        scope: SkillScope,
    ) -> Result<SkillManifest, SkillError> {
        self.manifest_reads.fetch_add(1, Ordering::Relaxed);
        let manifest = load_manifest(dir, scope)?;
        tracing::debug!(skill = %manifest.name, %scope, "loaded skill manifest");
        Ok(manifest)
    }
}
