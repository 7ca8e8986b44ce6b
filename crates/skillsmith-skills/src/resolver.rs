use std::path::{Path, PathBuf};

use crate::error::SkillError;
use crate::manifest::{
    MANIFEST_FILE, SkillManifest, SkillScope, load_manifest, validate_skill_name,
};

/// Precedence order used by [`SkillResolver::resolve`].
pub const SCOPE_PRECEDENCE: [SkillScope; 2] = [SkillScope::Internal, SkillScope::External];

/// Finds the authoritative skill directory for a name across the `internal/` and `external/`
/// subdirectories of a skills root.
#[derive(Debug, Clone)]
pub struct SkillResolver {
    root: PathBuf,
}

impl SkillResolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scope_dir(&self, scope: SkillScope) -> PathBuf {
        self.root.join(scope.as_str())
    }

    /// Find the directory that serves `name`, returning the effective scope.
    ///
    /// An `internal/<name>` directory holding a SKILL.md wins over `external/<name>` whatever
    /// scope the caller asked for. Only the filesystem is probed; nothing is read.
    ///
    /// # Errors
    ///
    /// [`SkillError::NotFound`] when no scope has a directory for `name`,
    /// [`SkillError::InvalidArgument`] for names that are not a single path segment.
    pub fn locate(
        &self,
        name: &str,
        requested: SkillScope,
    ) -> Result<(SkillScope, PathBuf), SkillError> {
        validate_skill_name(name)?;

        let internal = self.scope_dir(SkillScope::Internal).join(name);
        if internal.join(MANIFEST_FILE).is_file() {
            if requested != SkillScope::Internal {
                tracing::debug!(skill = name, %requested, "internal skill overrides requested scope");
            }
            return Ok((SkillScope::Internal, internal));
        }

        // No internal override: the first existing directory decides, manifest or not.
        for scope in SCOPE_PRECEDENCE.into_iter().rev() {
            let dir = self.scope_dir(scope).join(name);
            if dir.is_dir() {
                return Ok((scope, dir));
            }
        }
        Err(SkillError::NotFound {
            name: name.to_owned(),
        })
    }

    /// Like [`Self::locate`] but confined to a single scope.
    ///
    /// # Errors
    ///
    /// [`SkillError::NotFound`] when `scope` has no directory for `name`.
    pub fn locate_exact(&self, name: &str, scope: SkillScope) -> Result<PathBuf, SkillError> {
        validate_skill_name(name)?;
        let dir = self.scope_dir(scope).join(name);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(SkillError::NotFound {
                name: name.to_owned(),
            })
        }
    }

    /// Resolve and parse the manifest for `name` with Internal-over-External precedence.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::locate`] errors and manifest validation failures.
    pub fn resolve(&self, name: &str, requested: SkillScope) -> Result<SkillManifest, SkillError> {
        let (scope, dir) = self.locate(name, requested)?;
        load_manifest(&dir, scope)
    }

    /// Resolve and parse the manifest for `name` in exactly `scope`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::locate_exact`] errors and manifest validation failures.
    pub fn resolve_exact(&self, name: &str, scope: SkillScope) -> Result<SkillManifest, SkillError> {
        let dir = self.locate_exact(name, scope)?;
        load_manifest(&dir, scope)
    }

    /// Directory names under a scope that look like skills (contain SKILL.md), sorted.
    ///
    /// A missing scope directory yields an empty list.
    #[must_use]
    pub fn skill_names(&self, scope: SkillScope) -> Vec<String> {
        let dir = self.scope_dir(scope);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            tracing::debug!(path = %dir.display(), "skill scope directory not readable");
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().join(MANIFEST_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }
}
