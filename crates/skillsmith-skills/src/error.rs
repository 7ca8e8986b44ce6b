use std::fmt;
use std::path::PathBuf;

use crate::manifest::SkillScope;
use crate::resource::ResourceKind;

/// Why a skill source failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationCause {
    MissingManifest,
    MissingFrontmatter,
    UnclosedFrontmatter,
    MissingField(&'static str),
}

impl fmt::Display for ValidationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingManifest => f.write_str("SKILL.md not found"),
            Self::MissingFrontmatter => f.write_str("missing frontmatter delimiter"),
            Self::UnclosedFrontmatter => f.write_str("unclosed frontmatter"),
            Self::MissingField(field) => write!(f, "missing '{field}' in frontmatter"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("invalid skill at {}: {cause}", path.display())]
    Validation { path: PathBuf, cause: ValidationCause },

    #[error("skill not found: {name}")]
    NotFound { name: String },

    #[error("reference '{reference}' not found for skill {skill} (tried: {})", display_paths(attempted))]
    ReferenceNotFound {
        skill: String,
        reference: String,
        attempted: Vec<PathBuf>,
    },

    #[error("skill {skill} has no {kind}/ directory")]
    ResourceNotFound { skill: String, kind: ResourceKind },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("path traversal detected: {path} escapes {}", root.display())]
    PathTraversal { path: String, root: PathBuf },

    #[error("skill already exists: {name} ({scope})")]
    AlreadyExists { name: String, scope: SkillScope },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SkillError {
    pub(crate) fn validation(path: impl Into<PathBuf>, cause: ValidationCause) -> Self {
        Self::Validation {
            path: path.into(),
            cause,
        }
    }

    /// True for every variant a caller can recover from by choosing a different input.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::ReferenceNotFound { .. } | Self::ResourceNotFound { .. }
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
