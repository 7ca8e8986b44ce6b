use std::fmt;

use serde::{Deserialize, Serialize};

/// The four topics an elicitation walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CoreValue,
    UsageScenario,
    AliasPreference,
    Boundaries,
}

pub const DIMENSION_COUNT: usize = 4;

/// Minimum judge score for an answer set to be considered sufficient.
pub const SUFFICIENT_SCORE: i32 = 91;

impl Dimension {
    pub const ALL: [Self; DIMENSION_COUNT] = [
        Self::CoreValue,
        Self::UsageScenario,
        Self::AliasPreference,
        Self::Boundaries,
    ];

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::CoreValue => "core_value",
            Self::UsageScenario => "usage_scenario",
            Self::AliasPreference => "alias_preference",
            Self::Boundaries => "boundaries",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::CoreValue => "Core value",
            Self::UsageScenario => "Usage scenario",
            Self::AliasPreference => "Alias preference",
            Self::Boundaries => "Boundaries",
        }
    }

    /// Weighted checklist the judge scores against. Weights sum to 100.
    #[must_use]
    pub fn rubric(self) -> &'static [(&'static str, u8)] {
        match self {
            Self::CoreValue => &[
                ("Does it clearly describe the problem being solved?", 20),
                ("Can the target users be identified?", 20),
                ("Can the skill category be inferred?", 20),
                ("Is the wording specific?", 20),
                ("Is the expected effect clear?", 20),
            ],
            Self::UsageScenario => &[
                ("Is there a concrete usage scenario?", 25),
                ("Is the input known?", 25),
                ("Is the expected output known?", 25),
                ("Is the frequency of use understood?", 25),
            ],
            Self::AliasPreference => &[
                ("Is it short (one to three words)?", 40),
                ("Does it read like natural language?", 30),
                ("Is it easy to remember?", 30),
            ],
            Self::Boundaries => &[
                ("Are the limits stated explicitly?", 40),
                ("Are compliance requirements identified?", 30),
                ("Is it clear what the skill must not do?", 30),
            ],
        }
    }

    #[must_use]
    pub fn question(self) -> &'static str {
        match self {
            Self::CoreValue => "What problem does this skill solve for its users, or what task does it complete?",
            Self::UsageScenario => "In which concrete situation would someone use this skill? Describe a typical workflow.",
            Self::AliasPreference => "If you had to call this skill by a short name of a few words, what would you call it?",
            Self::Boundaries => "What should this skill never do, and what explicit limits does it have?",
        }
    }

    #[must_use]
    pub fn guidance(self) -> &'static str {
        match self {
            Self::CoreValue => "Let's start with the most basic question. Describe it in a sentence or two:",
            Self::UsageScenario => "Great. Now let's look more closely at how it will be used.",
            Self::AliasPreference => "To make the skill easy to invoke, we need a short way to call it.",
            Self::Boundaries => "Finally, let's pin down the skill's limits so it does not over-promise.",
        }
    }

    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::CoreValue => "e.g. Help the QA team review SOP documents for compliance quickly",
            Self::UsageScenario => "e.g. A QA specialist uploads a Word SOP and gets a checklist report",
            Self::AliasPreference => "e.g. sop-check",
            Self::Boundaries => "e.g. Never edits the source document; no personal data is stored",
        }
    }

    #[must_use]
    pub fn examples(self) -> &'static [&'static str] {
        match self {
            Self::CoreValue => &[
                "Optimize e-commerce product images automatically: remove backgrounds and resize for each platform",
                "Analyze clinical trial data and generate reports in FDA submission format",
                "Generate personalized customer proposals for the sales team",
            ],
            Self::UsageScenario => &[
                "Every morning an operator uploads the new product photos and downloads the processed set",
                "A clinical researcher exports trial data as CSV and asks for a summary report",
            ],
            Self::AliasPreference => &["image-fix", "trial report", "proposal"],
            Self::Boundaries => &[
                "Only gives suggestions; final approval stays with a human reviewer",
                "Must comply with 21 CFR Part 11 and never keep personal data",
            ],
        }
    }

    /// Fallback follow-up question when the judge supplies none.
    #[must_use]
    pub fn follow_up_question(self) -> &'static str {
        match self {
            Self::CoreValue => "Could you say more about who has this problem and what result they expect?",
            Self::UsageScenario => "What does the user provide as input, what do they get back, and how often?",
            Self::AliasPreference => "Could you pick a shorter name that is easy to remember?",
            Self::Boundaries => "What must the skill never do, and are there compliance rules it has to follow?",
        }
    }

    /// Concrete candidate answers built from what the user already said on this dimension.
    ///
    /// Always returns at least one option.
    #[must_use]
    pub fn candidate_answers(self, latest: &str) -> Vec<String> {
        let base = truncate_chars(latest.trim().trim_end_matches(['.', '。']), 80);
        if base.is_empty() {
            return self.examples().iter().map(|&e| e.to_owned()).collect();
        }
        match self {
            Self::CoreValue => vec![
                format!(
                    "{base}, for the team that does this by hand today, producing a report they can act on"
                ),
                format!("{base}, so each run takes minutes instead of hours and follows one checklist"),
            ],
            Self::UsageScenario => vec![
                format!("{base}; the user uploads the input files and gets a structured result back"),
                format!("{base}; it is used several times a day and the output is saved as a document"),
            ],
            Self::AliasPreference => {
                let token = base.split_whitespace().next().unwrap_or(&base).to_owned();
                let short = truncate_chars(&token, 4);
                let mut options = vec![token];
                if short != options[0] {
                    options.push(short);
                }
                options
            }
            Self::Boundaries => vec![
                format!("{base}; it never modifies the original files and does not store personal data"),
                format!("{base}; it only makes suggestions and does not take final approval decisions"),
            ],
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_fixed() {
        for (i, d) in Dimension::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
            assert_eq!(Dimension::from_index(i), Some(*d));
        }
        assert_eq!(Dimension::from_index(DIMENSION_COUNT), None);
    }

    #[test]
    fn rubric_weights_sum_to_100() {
        for d in Dimension::ALL {
            let total: u32 = d.rubric().iter().map(|(_, w)| u32::from(*w)).sum();
            assert_eq!(total, 100, "{d}");
        }
    }

    #[test]
    fn serde_uses_snake_case_keys() {
        assert_eq!(
            serde_json::to_string(&Dimension::AliasPreference).unwrap(),
            "\"alias_preference\""
        );
    }

    #[test]
    fn candidates_paraphrase_the_answer() {
        let options = Dimension::CoreValue.candidate_answers("automates SOP review.");
        assert!(!options.is_empty());
        assert!(options.iter().all(|o| o.starts_with("automates SOP review")));

        let aliases = Dimension::AliasPreference.candidate_answers("sopcheck for QA");
        assert_eq!(aliases, vec!["sopcheck", "sopc"]);
    }

    #[test]
    fn candidates_never_empty() {
        for d in Dimension::ALL {
            assert!(!d.candidate_answers("").is_empty());
            assert!(!d.candidate_answers("   ").is_empty());
            assert!(!d.candidate_answers("x").is_empty());
        }
    }
}
