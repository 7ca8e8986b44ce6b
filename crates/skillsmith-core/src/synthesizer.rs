//! Deterministic keyword heuristics that turn merged answers into a [`SkillDraft`].
//!
//! Keyword tables carry both Chinese and English triggers. Matching is substring-based on
//! lowercased text.

use crate::draft::{Complexity, MergedAnswers, SkillDraft, SuggestedCapability};

pub const PLACEHOLDER_SKILL_NAME: &str = "custom-skill";
pub const DEFAULT_MAIN_ALIAS: &str = "skill";

/// Name tokens in priority order; the first two that match form the skill name.
const NAME_TOKENS: &[(&str, &[&str])] = &[
    ("sop", &["sop"]),
    ("compliance", &["合规", "compliance"]),
    ("review", &["审查", "review"]),
    ("qa", &["qa"]),
    ("image", &["图片", "image", "photo"]),
    ("optimizer", &["优化", "optimi"]),
    ("ecommerce", &["电商", "e-commerce", "ecommerce"]),
    ("data", &["数据", "data"]),
    ("analyzer", &["分析", "analy"]),
    ("clinical-trials", &["临床试验", "clinical trial"]),
    ("report", &["报告", "report"]),
    ("generator", &["生成", "generat"]),
];

const COMMAND_ALIASES: &[(&str, &str)] = &[
    ("审查SOP", "sop"),
    ("检查合规", "check"),
    ("优化图片", "img"),
    ("分析数据", "data"),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("compliance", &["sop", "合规", "审查", "qa", "gxp", "compliance", "audit"]),
    ("ecommerce", &["图片", "电商", "产品", "e-commerce", "ecommerce", "product", "image"]),
    ("clinical", &["临床", "试验", "nct", "数据", "clinical", "trial", "data"]),
    ("document", &["文档", "pdf", "word", "document"]),
];

const TARGET_USERS: &[(&str, &[&str])] = &[
    ("QA specialist", &["qa", "质量", "合规", "quality", "compliance"]),
    ("E-commerce operator", &["运营", "电商", "卖家", "e-commerce", "ecommerce", "seller"]),
    ("Clinical researcher", &["临床", "研究员", "cra", "clinical", "researcher"]),
    ("Sales representative", &["销售", "客户", "sales", "customer"]),
];

const COMPLIANCE: &[(&str, &[&str])] = &[
    ("21 CFR Part 11", &["21 cfr", "part 11"]),
    ("GxP", &["gxp"]),
    ("Data privacy", &["个人身份", "pii", "personal data", "privacy"]),
    ("Data retention", &["存储", "保留", "retention", "storage"]),
];

type CapabilityTemplate = (&'static str, &'static str, Complexity);

const CAPABILITY_TEMPLATES: &[(&[&str], &[CapabilityTemplate])] = &[
    (
        &["sop", "合规", "审查", "compliance", "review"],
        &[
            ("parse", "Document parsing", Complexity::Medium),
            ("check", "Compliance check", Complexity::Low),
            ("report", "Report generation", Complexity::Medium),
        ],
    ),
    (
        &["图片", "优化", "image", "optimi"],
        &[
            ("remove-bg", "Background removal", Complexity::Medium),
            ("resize", "Resizing", Complexity::Low),
            ("format", "Format conversion", Complexity::Low),
        ],
    ),
    (
        &["数据", "分析", "data", "analy"],
        &[
            ("collect", "Data collection", Complexity::Medium),
            ("analyze", "Data analysis", Complexity::High),
            ("visualize", "Visualization", Complexity::Medium),
        ],
    ),
];

const DEFAULT_CAPABILITIES: &[CapabilityTemplate] =
    &[("main", "Main function", Complexity::Medium)];

/// Build a complete draft from the four merged answers. Pure and deterministic.
#[must_use]
pub fn synthesize(answers: &MergedAnswers) -> SkillDraft {
    let main_alias = main_alias(&answers.alias_preference);
    let skill_name = skill_name(&answers.core_value, &answers.alias_preference, &main_alias);
    let context_aliases = context_aliases(&main_alias, &answers.core_value);
    let command_alias = command_alias(&main_alias, &skill_name);
    let api_alias = skill_name.replace('-', "_");
    let scan_text = format!("{} {}", answers.core_value, answers.usage_scenario);

    SkillDraft {
        category: category(&scan_text),
        target_users: target_users(&answers.usage_scenario),
        compliance_requirements: compliance_requirements(&answers.boundaries),
        suggested_capabilities: suggested_capabilities(&scan_text),
        skill_name,
        core_value: answers.core_value.clone(),
        usage_scenario: answers.usage_scenario.clone(),
        main_alias,
        context_aliases,
        command_alias,
        api_alias,
        boundaries: answers.boundaries.clone(),
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn main_alias(alias_answer: &str) -> String {
    alias_answer
        .split_whitespace()
        .next()
        .unwrap_or(DEFAULT_MAIN_ALIAS)
        .to_owned()
}

fn skill_name(core_value: &str, alias_answer: &str, main_alias: &str) -> String {
    let text = core_value.to_lowercase();
    let tokens: Vec<&str> = NAME_TOKENS
        .iter()
        .filter(|(_, keywords)| contains_any(&text, keywords))
        .map(|(token, _)| *token)
        .take(2)
        .collect();
    if tokens.len() == 2 {
        return tokens.join("-");
    }
    if alias_answer.trim().is_empty() {
        return PLACEHOLDER_SKILL_NAME.to_owned();
    }
    let slug = slugify(&main_alias.replace('_', " "));
    if is_kebab_case(&slug) {
        slug
    } else {
        PLACEHOLDER_SKILL_NAME.to_owned()
    }
}

/// `true` for names like `sop-review`: ASCII lowercase letters and digits in
/// non-empty segments joined by single dashes.
#[must_use]
pub fn is_kebab_case(name: &str) -> bool {
    !name.is_empty()
        && name.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// Bring a judge-written draft in line with the naming rules `synthesize` follows.
///
/// The name is slugified; `None` when it still is not kebab-case. The API alias is
/// always derived from the name, and a command alias that is not plain lowercase
/// ASCII is replaced by the synthesized one.
#[must_use]
pub fn normalize_draft(mut draft: SkillDraft) -> Option<SkillDraft> {
    let name = slugify(&draft.skill_name.replace('_', " "));
    if !is_kebab_case(&name) {
        return None;
    }
    draft.skill_name = name;
    draft.api_alias = draft.skill_name.replace('-', "_");

    let command: String = draft
        .command_alias
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    draft.command_alias = if command.is_empty() {
        command_alias(&draft.main_alias, &draft.skill_name)
    } else {
        command
    };
    Some(draft)
}

/// Lowercase; runs of characters other than letters, digits and `_` become one `-`.
pub(crate) fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

fn context_aliases(main_alias: &str, core_value: &str) -> Vec<String> {
    let mut aliases = vec![main_alias.to_owned()];
    if main_alias.chars().count() > 2 {
        aliases.push(main_alias.chars().take(2).collect());
    }

    let text = core_value.to_lowercase();
    if contains_any(&text, &["检查", "审查", "check", "review"]) {
        aliases.extend(["check".to_owned(), "verify".to_owned()]);
    } else if contains_any(&text, &["优化", "optimi"]) {
        aliases.extend(["process".to_owned(), "adjust".to_owned()]);
    }

    let mut seen = std::collections::HashSet::new();
    aliases.retain(|a| seen.insert(a.clone()));
    aliases
}

fn command_alias(main_alias: &str, skill_name: &str) -> String {
    if let Some((_, alias)) = COMMAND_ALIASES.iter().find(|(k, _)| *k == main_alias) {
        return (*alias).to_owned();
    }
    if skill_name.contains('-') {
        let first = skill_name.split('-').next().unwrap_or(skill_name);
        first.chars().take(4).collect()
    } else {
        main_alias.chars().take(3).collect()
    }
}

fn category(text: &str) -> String {
    let text = text.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| contains_any(&text, keywords))
        .map_or("general", |(name, _)| *name)
        .to_owned()
}

fn target_users(scenario: &str) -> Vec<String> {
    let text = scenario.to_lowercase();
    let users: Vec<String> = TARGET_USERS
        .iter()
        .filter(|(_, keywords)| contains_any(&text, keywords))
        .map(|(label, _)| (*label).to_owned())
        .collect();
    if users.is_empty() {
        vec!["General user".to_owned()]
    } else {
        users
    }
}

fn compliance_requirements(boundaries: &str) -> Vec<String> {
    let text = boundaries.to_lowercase();
    COMPLIANCE
        .iter()
        .filter(|(_, keywords)| contains_any(&text, keywords))
        .map(|(label, _)| (*label).to_owned())
        .collect()
}

fn suggested_capabilities(text: &str) -> Vec<SuggestedCapability> {
    let text = text.to_lowercase();
    let templates = CAPABILITY_TEMPLATES
        .iter()
        .find(|(keywords, _)| contains_any(&text, keywords))
        .map_or(DEFAULT_CAPABILITIES, |(_, t)| *t);
    templates
        .iter()
        .map(|(id, name, complexity)| SuggestedCapability {
            id: (*id).to_owned(),
            name: (*name).to_owned(),
            complexity: *complexity,
        })
        .collect()
}
