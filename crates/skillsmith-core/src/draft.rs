use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::dimension::Dimension;

/// Every answer of one dimension joined with spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedAnswers {
    pub core_value: String,
    pub usage_scenario: String,
    pub alias_preference: String,
    pub boundaries: String,
}

impl MergedAnswers {
    pub(crate) fn from_lists(lists: &[Vec<String>; 4]) -> Self {
        let join = |d: Dimension| lists[d.index()].join(" ");
        Self {
            core_value: join(Dimension::CoreValue),
            usage_scenario: join(Dimension::UsageScenario),
            alias_preference: join(Dimension::AliasPreference),
            boundaries: join(Dimension::Boundaries),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedCapability {
    pub id: String,
    pub name: String,
    pub complexity: Complexity,
}

/// Canonical skill identity produced when every dimension is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDraft {
    pub skill_name: String,
    pub core_value: String,
    pub usage_scenario: String,
    pub main_alias: String,
    pub context_aliases: Vec<String>,
    pub command_alias: String,
    pub api_alias: String,
    pub boundaries: String,
    pub category: String,
    pub target_users: Vec<String>,
    pub compliance_requirements: Vec<String>,
    pub suggested_capabilities: Vec<SuggestedCapability>,
}

impl SkillDraft {
    /// One-line description used in the manifest front matter.
    #[must_use]
    pub fn description(&self) -> String {
        let core = self.core_value.split_whitespace().collect::<Vec<_>>().join(" ");
        if core.is_empty() {
            format!("{} skill", self.category)
        } else {
            core
        }
    }

    /// Front-matter keys other than `name` and `description`.
    #[must_use]
    pub fn manifest_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("category".to_owned(), self.category.clone());
        let mut aliases = vec![self.main_alias.clone()];
        aliases.extend(
            self.context_aliases
                .iter()
                .filter(|a| **a != self.main_alias)
                .cloned(),
        );
        fields.insert("aliases".to_owned(), aliases.join(", "));
        fields.insert("command".to_owned(), self.command_alias.clone());
        fields
    }

    /// Markdown body of the skill's SKILL.md.
    #[must_use]
    pub fn manifest_body(&self) -> String {
        let mut out = format!("# {}\n\n", self.skill_name);
        section(&mut out, "Core value", &self.core_value);
        section(&mut out, "Usage scenario", &self.usage_scenario);

        out.push_str("## Aliases\n\n");
        let _ = writeln!(out, "- Main: {}", self.main_alias);
        if !self.context_aliases.is_empty() {
            let _ = writeln!(out, "- Context: {}", self.context_aliases.join(", "));
        }
        let _ = writeln!(out, "- Command: /{}", self.command_alias);
        let _ = writeln!(out, "- API: {}\n", self.api_alias);

        section(&mut out, "Boundaries", &self.boundaries);
        list_section(&mut out, "Target users", &self.target_users);
        list_section(&mut out, "Compliance", &self.compliance_requirements);

        if !self.suggested_capabilities.is_empty() {
            out.push_str("## Capabilities\n\n");
            for cap in &self.suggested_capabilities {
                let _ = writeln!(
                    out,
                    "- `{}`: {} ({})",
                    cap.id,
                    cap.name,
                    cap.complexity.as_str()
                );
            }
        }
        out
    }
}

fn section(out: &mut String, title: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let _ = write!(out, "## {title}\n\n{text}\n\n");
}

fn list_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "## {title}\n\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}
