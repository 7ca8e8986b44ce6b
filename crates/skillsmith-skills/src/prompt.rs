use std::fmt::Write;

use crate::manifest::SkillMetadata;

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Tier-1 system-prompt block: names and descriptions only, plus how to get the rest.
#[must_use]
pub fn format_metadata_prompt<T: AsRef<SkillMetadata>>(skills: &[T]) -> String {
    if skills.is_empty() {
        return String::new();
    }

    let mut out = String::from("<available_skills>\n");
    for skill in skills {
        let skill = skill.as_ref();
        let _ = writeln!(
            out,
            "  <skill name=\"{}\" scope=\"{}\" description=\"{}\" />",
            escape_attr(&skill.name),
            skill.scope,
            escape_attr(&skill.description),
        );
    }
    out.push_str("</available_skills>\n\n");
    out.push_str(
        "Before using a skill, call load_skill_instructions(skill_name) to read its full \
         instructions. Use list_skill_resources and load_skill_reference for supporting \
         documents, and get_skill_resource_path when you need direct filesystem access.",
    );
    out
}
