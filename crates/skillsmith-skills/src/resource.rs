use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SkillError;
use crate::manifest::MANIFEST_FILE;

pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

const REFERENCES_PREFIX: &str = "references/";
const SCRIPT_EXTENSIONS: &[&str] = &["py", "sh", "js", "ts"];

/// Resource subdirectories of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "references")]
    Reference,
    #[serde(rename = "assets")]
    Asset,
    #[serde(rename = "scripts")]
    Script,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Script, Self::Asset, Self::Reference];

    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Reference => "references",
            Self::Asset => "assets",
            Self::Script => "scripts",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ResourceKind {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "references" => Ok(Self::Reference),
            "assets" => Ok(Self::Asset),
            "scripts" => Ok(Self::Script),
            other => Err(SkillError::InvalidArgument(format!(
                "invalid resource type '{other}', expected one of: scripts, assets, references"
            ))),
        }
    }
}

/// Ordered, de-duplicated probe locations for a reference document.
///
/// Skill root first (flat layout), then `references/`, then the path with a leading
/// `references/` stripped.
#[must_use]
pub fn reference_candidates(skill_dir: &Path, reference: &str) -> Vec<PathBuf> {
    let stripped = reference.strip_prefix(REFERENCES_PREFIX).unwrap_or(reference);
    let mut candidates: Vec<PathBuf> = Vec::with_capacity(3);
    for path in [
        skill_dir.join(reference),
        skill_dir.join("references").join(reference),
        skill_dir.join(stripped),
    ] {
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}

/// Read a reference document, probing [`reference_candidates`] in order.
///
/// # Errors
///
/// [`SkillError::ReferenceNotFound`] naming every probed path when none is a regular file,
/// [`SkillError::PathTraversal`] when the match resolves outside the skill directory.
pub fn load_reference(
    skill_name: &str,
    skill_dir: &Path,
    reference: &str,
) -> Result<String, SkillError> {
    if reference.trim().is_empty() || Path::new(reference).is_absolute() {
        return Err(SkillError::InvalidArgument(format!(
            "invalid reference path: '{reference}'"
        )));
    }

    let candidates = reference_candidates(skill_dir, reference);
    let Some(found) = candidates.iter().find(|p| p.is_file()) else {
        return Err(SkillError::ReferenceNotFound {
            skill: skill_name.to_owned(),
            reference: reference.to_owned(),
            attempted: candidates,
        });
    };

    let canonical = ensure_within(skill_dir, found, reference)?;
    tracing::debug!(skill = skill_name, path = %canonical.display(), "loading skill reference");
    Ok(std::fs::read_to_string(&canonical)?)
}

/// Absolute path of a resource subdirectory.
///
/// # Errors
///
/// [`SkillError::ResourceNotFound`] when the skill has no such directory.
pub fn resource_dir(
    skill_name: &str,
    skill_dir: &Path,
    kind: ResourceKind,
) -> Result<PathBuf, SkillError> {
    let dir = skill_dir.join(kind.dir_name());
    if !dir.is_dir() {
        return Err(SkillError::ResourceNotFound {
            skill: skill_name.to_owned(),
            kind,
        });
    }
    Ok(dir.canonicalize()?)
}

fn ensure_within(skill_dir: &Path, target: &Path, requested: &str) -> Result<PathBuf, SkillError> {
    let base = skill_dir.canonicalize()?;
    let canonical = target.canonicalize()?;
    if !canonical.starts_with(&base) {
        return Err(SkillError::PathTraversal {
            path: requested.to_owned(),
            root: skill_dir.to_path_buf(),
        });
    }
    Ok(canonical)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    /// Path relative to the group's directory.
    pub path: String,
    pub size: u64,
}

/// Snapshot of a skill's resource files, rendered for an agent's context.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceListing {
    pub skill: String,
    pub references: Vec<ResourceEntry>,
    pub root_documents: Vec<ResourceEntry>,
    pub assets: Vec<ResourceEntry>,
    pub scripts: Vec<ResourceEntry>,
    #[serde(skip)]
    pub display_limit: usize,
}

impl ResourceListing {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
            && self.root_documents.is_empty()
            && self.assets.is_empty()
            && self.scripts.is_empty()
    }
}

impl fmt::Display for ResourceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Skill {} has no resource files.", self.skill);
        }

        writeln!(f, "Resources for skill {}:", self.skill)?;
        for (title, entries) in [
            ("references/", &self.references),
            ("root documents", &self.root_documents),
            ("assets/", &self.assets),
            ("scripts/", &self.scripts),
        ] {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "\n{title} ({} files):", entries.len())?;
            for entry in entries.iter().take(self.display_limit) {
                writeln!(f, "  - {} ({} bytes)", entry.path, entry.size)?;
            }
            if entries.len() > self.display_limit {
                writeln!(f, "  ... {} more", entries.len() - self.display_limit)?;
            }
        }
        write!(
            f,
            "\nUse load_skill_reference to read a reference document and \
             get_skill_resource_path for filesystem access."
        )
    }
}

/// Collect the resource files of a skill. Missing directories contribute nothing.
///
/// # Errors
///
/// IO errors while walking existing directories.
pub fn list_resources(
    skill_name: &str,
    skill_dir: &Path,
    display_limit: usize,
) -> Result<ResourceListing, SkillError> {
    let references = collect(&skill_dir.join("references"), false, |_| true)?;
    let root_documents = collect(skill_dir, false, |p| {
        p.extension().is_some_and(|e| e == "md")
            && p.file_name().is_some_and(|n| n != MANIFEST_FILE)
    })?;
    let assets = collect(&skill_dir.join("assets"), true, |_| true)?;
    let scripts = collect(&skill_dir.join("scripts"), true, |p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e))
    })?;

    Ok(ResourceListing {
        skill: skill_name.to_owned(),
        references,
        root_documents,
        assets,
        scripts,
        display_limit,
    })
}

fn collect(
    dir: &Path,
    recursive: bool,
    keep: impl Fn(&Path) -> bool + Copy,
) -> Result<Vec<ResourceEntry>, SkillError> {
    let mut out = Vec::new();
    if dir.is_dir() {
        walk(dir, dir, recursive, keep, &mut out)?;
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn walk(
    base: &Path,
    dir: &Path,
    recursive: bool,
    keep: impl Fn(&Path) -> bool + Copy,
    out: &mut Vec<ResourceEntry>,
) -> Result<(), SkillError> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                walk(base, &path, recursive, keep, out)?;
            }
            continue;
        }
        if !path.is_file() || !keep(&path) {
            continue;
        }
        let rel = path.strip_prefix(base).unwrap_or(&path);
        out.push(ResourceEntry {
            path: rel.to_string_lossy().replace('\\', "/"),
            size: entry.metadata()?.len(),
        });
    }
    Ok(())
}
