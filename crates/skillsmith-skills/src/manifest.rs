use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SkillError, ValidationCause};

pub const MANIFEST_FILE: &str = "SKILL.md";

const DELIMITER: &str = "---";

/// Namespace a skill is registered under. `Internal` overrides `External` of the same name.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SkillScope {
    Internal,
    #[default]
    External,
}

impl SkillScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl fmt::Display for SkillScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillScope {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            other => Err(SkillError::InvalidArgument(format!(
                "unknown skill scope '{other}', expected internal or external"
            ))),
        }
    }
}

/// A parsed SKILL.md.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillManifest {
    pub name: String,
    pub description: String,
    pub scope: SkillScope,
    /// Frontmatter keys other than `name` and `description`.
    pub extra: BTreeMap<String, String>,
    pub raw_body: String,
    /// Skill root directory (the directory holding SKILL.md).
    pub source_path: PathBuf,
}

impl SkillManifest {
    #[must_use]
    pub fn metadata(&self) -> SkillMetadata {
        SkillMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            scope: self.scope,
            source_path: self.source_path.clone(),
        }
    }
}

/// Tier-1 projection: what an agent sees before asking for a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
    pub scope: SkillScope,
    pub source_path: PathBuf,
}

/// Tier-2 payload: the full manifest body, loaded only on explicit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillInstructions {
    pub name: String,
    pub scope: SkillScope,
    pub body: String,
}

/// Load and validate a skill manifest from its root directory.
///
/// # Errors
///
/// Returns [`SkillError::Validation`] when SKILL.md is absent, has no frontmatter block, or
/// lacks `name`/`description`, and [`SkillError::Io`] when the file cannot be read.
pub fn load_manifest(skill_dir: &Path, scope: SkillScope) -> Result<SkillManifest, SkillError> {
    let path = skill_dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(SkillError::validation(path, ValidationCause::MissingManifest));
    }
    let content = std::fs::read_to_string(&path)?;
    parse_manifest(&content, &path).map(|parsed| SkillManifest {
        name: parsed.name,
        description: parsed.description,
        scope,
        extra: parsed.extra,
        raw_body: parsed.body,
        source_path: skill_dir.to_path_buf(),
    })
}

#[derive(Debug)]
pub(crate) struct ParsedManifest {
    pub name: String,
    pub description: String,
    pub extra: BTreeMap<String, String>,
    pub body: String,
}

/// Split a SKILL.md into frontmatter fields and body.
///
/// The first line must be `---`, followed by `key: value` lines and a closing `---` line.
pub(crate) fn parse_manifest(content: &str, path: &Path) -> Result<ParsedManifest, SkillError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => {}
        _ => {
            return Err(SkillError::validation(
                path,
                ValidationCause::MissingFrontmatter,
            ));
        }
    }

    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut closed = false;
    let mut consumed = 0;
    for line in lines.by_ref() {
        consumed += line.len();
        let trimmed = line.trim();
        if line.trim_end() == DELIMITER {
            closed = true;
            break;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            fields.insert(key.to_owned(), unquote(value.trim()).to_owned());
        }
    }

    if !closed {
        return Err(SkillError::validation(
            path,
            ValidationCause::UnclosedFrontmatter,
        ));
    }

    let first_len = content.split_inclusive('\n').next().map_or(0, str::len);
    let body = content[first_len + consumed..].trim().to_owned();

    let name = take_required(&mut fields, "name", path)?;
    let description = take_required(&mut fields, "description", path)?;

    Ok(ParsedManifest {
        name,
        description,
        extra: fields,
        body,
    })
}

fn take_required(
    fields: &mut BTreeMap<String, String>,
    key: &'static str,
    path: &Path,
) -> Result<String, SkillError> {
    fields
        .remove(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SkillError::validation(path, ValidationCause::MissingField(key)))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Render a SKILL.md document from its parts.
#[must_use]
pub fn render_manifest(
    name: &str,
    description: &str,
    extra: &BTreeMap<String, String>,
    body: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{DELIMITER}");
    let _ = writeln!(out, "name: {name}");
    let _ = writeln!(out, "description: {}", single_line(description));
    for (key, value) in extra {
        let _ = writeln!(out, "{key}: {}", single_line(value));
    }
    let _ = writeln!(out, "{DELIMITER}");
    out.push('\n');
    out.push_str(body.trim());
    out.push('\n');
    out
}

/// A skill name must be a single path component.
pub(crate) fn validate_skill_name(name: &str) -> Result<(), SkillError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(SkillError::InvalidArgument(format!(
            "invalid skill name: '{name}'"
        )));
    }
    Ok(())
}

/// Write a new skill directory `<scope_dir>/<name>/SKILL.md`.
///
/// # Errors
///
/// Returns [`SkillError::AlreadyExists`] if the directory is already present, or an IO error.
pub fn scaffold_skill(
    scope_dir: &Path,
    scope: SkillScope,
    name: &str,
    description: &str,
    extra: &BTreeMap<String, String>,
    body: &str,
) -> Result<PathBuf, SkillError> {
    validate_skill_name(name)?;
    let skill_dir = scope_dir.join(name);
    if skill_dir.exists() {
        return Err(SkillError::AlreadyExists {
            name: name.to_owned(),
            scope,
        });
    }
    std::fs::create_dir_all(&skill_dir)?;
    std::fs::write(
        skill_dir.join(MANIFEST_FILE),
        render_manifest(name, description, extra, body),
    )?;
    tracing::info!(skill = name, %scope, path = %skill_dir.display(), "scaffolded skill");
    Ok(skill_dir)
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
