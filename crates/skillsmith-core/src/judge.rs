//! Judge-model prompt construction and reply parsing.
//!
//! The judge is asked for a single JSON object tagged by `type`. Replies are
//! recovered through three strategies in order: a fenced code block, the first
//! balanced `{...}` span, then the raw text. Anything that still fails becomes
//! [`JudgeReply::Unparsed`], which scores [`PARSE_ERROR_SCORE`].

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillsmith_llm::{LlmProvider, Message};

use crate::dimension::{Dimension, SUFFICIENT_SCORE, truncate_chars};
use crate::draft::SkillDraft;

/// Score reported for a reply that could not be parsed. Never a real judge score.
pub const PARSE_ERROR_SCORE: i32 = -1;

/// Score assumed when a `next_dimension` reply omits one.
const IMPLIED_NEXT_DIMENSION_SCORE: u8 = 95;

const RAW_PREVIEW_CHARS: usize = 200;

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedOption {
    pub id: String,
    pub text: String,
}

/// A judge reply, reduced to the shapes the session state machine understands.
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeReply {
    FollowUp {
        score: u8,
        reasoning: String,
        question: Option<String>,
        guidance: Option<String>,
        options: Vec<RecommendedOption>,
    },
    NextDimension {
        score: u8,
        reasoning: String,
    },
    Summary {
        message: Option<String>,
        draft: Option<SkillDraft>,
    },
    Unparsed {
        raw_text: String,
        reason: String,
    },
}

impl JudgeReply {
    /// Numeric score in `[0, 100]`, or [`PARSE_ERROR_SCORE`] for [`JudgeReply::Unparsed`].
    #[must_use]
    pub fn score(&self) -> i32 {
        match self {
            Self::FollowUp { score, .. } | Self::NextDimension { score, .. } => i32::from(*score),
            Self::Summary { .. } => 100,
            Self::Unparsed { .. } => PARSE_ERROR_SCORE,
        }
    }

    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        matches!(self, Self::Summary { .. }) || self.score() >= SUFFICIENT_SCORE
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FollowUp { .. } => "follow_up",
            Self::NextDimension { .. } => "next_dimension",
            Self::Summary { .. } => "summary",
            Self::Unparsed { .. } => "parse_error",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireReply {
    FollowUp {
        #[serde(default)]
        score: Option<Value>,
        #[serde(default)]
        reasoning: Option<String>,
        #[serde(default)]
        follow_up_question: Option<String>,
        #[serde(default)]
        guidance: Option<String>,
        #[serde(default)]
        recommended_options: Vec<WireOption>,
    },
    NextDimension {
        #[serde(default)]
        score: Option<Value>,
        #[serde(default)]
        reasoning: Option<String>,
    },
    Summary {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        skill_metadata: Option<Value>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireOption {
    Text(String),
    Entry {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
}

fn parse_score(value: Option<&Value>, missing: u8) -> Result<u8, String> {
    let number = match value {
        None | Some(Value::Null) => return Ok(missing),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    let Some(number) = number else {
        return Err("score is not a number".into());
    };
    if !(0.0..=100.0).contains(&number) {
        return Err(format!("score {number} is outside [0, 100]"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(number.round() as u8)
}

fn convert_options(options: Vec<WireOption>) -> Vec<RecommendedOption> {
    options
        .into_iter()
        .map(|option| match option {
            WireOption::Text(text) => (None, text),
            WireOption::Entry { id, text } => (id, text),
        })
        .filter(|(_, text)| !text.trim().is_empty())
        .enumerate()
        .map(|(i, (id, text))| RecommendedOption {
            id: id.unwrap_or_else(|| format!("opt{}", i + 1)),
            text: text.trim().to_owned(),
        })
        .collect()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn convert(reply: WireReply) -> Result<JudgeReply, String> {
    Ok(match reply {
        WireReply::FollowUp {
            score,
            reasoning,
            follow_up_question,
            guidance,
            recommended_options,
        } => JudgeReply::FollowUp {
            score: parse_score(score.as_ref(), 0)?,
            reasoning: reasoning.unwrap_or_default(),
            question: non_empty(follow_up_question),
            guidance: non_empty(guidance),
            options: convert_options(recommended_options),
        },
        WireReply::NextDimension { score, reasoning } => JudgeReply::NextDimension {
            score: parse_score(score.as_ref(), IMPLIED_NEXT_DIMENSION_SCORE)?,
            reasoning: reasoning.unwrap_or_default(),
        },
        WireReply::Summary {
            message,
            skill_metadata,
        } => JudgeReply::Summary {
            message: non_empty(message),
            draft: skill_metadata
                .and_then(|v| serde_json::from_value::<SkillDraft>(v).ok())
                .filter(|d| !d.skill_name.trim().is_empty()),
        },
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    FENCED_JSON_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First balanced `{...}` span, ignoring braces inside JSON strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a raw judge reply. Never fails: unrecoverable text becomes [`JudgeReply::Unparsed`].
#[must_use]
pub fn parse_reply(raw: &str) -> JudgeReply {
    let candidates = [fenced_block(raw), balanced_object(raw), Some(raw.trim())];
    let mut reason = String::from("empty reply");
    for candidate in candidates.into_iter().flatten() {
        if candidate.is_empty() {
            continue;
        }
        match serde_json::from_str::<WireReply>(candidate).map_err(|e| e.to_string()) {
            Ok(wire) => match convert(wire) {
                Ok(reply) => return reply,
                Err(e) => reason = e,
            },
            Err(e) => reason = e,
        }
    }
    JudgeReply::Unparsed {
        raw_text: raw.to_owned(),
        reason,
    }
}

const SYSTEM_PROMPT: &str = "You are an expert reviewer helping a user define a new AI skill. \
You score how well the user's answers cover one topic and reply with a single JSON object and nothing else.";

/// Build the scoring request for one dimension.
///
/// `answers` holds every answer given on this dimension, oldest first; the last one is the latest.
#[must_use]
pub fn build_judge_messages(dimension: Dimension, answers: &[String]) -> Vec<Message> {
    let (latest, earlier) = match answers.split_last() {
        Some((latest, earlier)) => (latest.as_str(), earlier),
        None => ("", answers),
    };

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Topic: {}", dimension.display_name());
    let _ = writeln!(prompt, "Question asked: {}\n", dimension.question());
    let _ = writeln!(prompt, "Latest answer:\n{latest}\n");
    if !earlier.is_empty() {
        prompt.push_str("Earlier answers on this topic:\n");
        for (i, answer) in earlier.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {answer}", i + 1);
        }
        prompt.push('\n');
    }

    prompt.push_str("Scoring rubric (100 points):\n");
    for (item, weight) in dimension.rubric() {
        let _ = writeln!(prompt, "- {item} ({weight} points)");
    }

    let _ = write!(
        prompt,
        "\nTasks:\n\
         1. Score the answers on this topic together, from 0 to 100.\n\
         2. If the score is {SUFFICIENT_SCORE} or higher, reply with type \"next_dimension\".\n\
         3. Otherwise reply with type \"follow_up\" with one focused question and recommended options.\n\n\
         Recommended options must be concrete answers the user could send as-is, built on what they \
         already said. Never write a hint about what to answer.\n\
         Wrong: {{\"id\": \"opt1\", \"text\": \"Describe the problem the skill solves\"}}\n\
         Right: {{\"id\": \"opt1\", \"text\": \"Help the QA team check SOP documents for missing sections before release\"}}\n\n\
         Reply format when sufficient:\n\
         ```json\n\
         {{\"type\": \"next_dimension\", \"score\": 93, \"reasoning\": \"...\"}}\n\
         ```\n\
         Reply format when more detail is needed:\n\
         ```json\n\
         {{\"type\": \"follow_up\", \"score\": 60, \"reasoning\": \"...\", \"follow_up_question\": \"...\", \
         \"guidance\": \"...\", \"recommended_options\": [{{\"id\": \"opt1\", \"text\": \"...\"}}]}}\n\
         ```\n"
    );

    vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)]
}

/// Scores answers through an [`LlmProvider`] with a bounded wait.
pub struct Judge<P> {
    provider: P,
    timeout: Duration,
}

impl<P: LlmProvider> Judge<P> {
    #[must_use]
    pub fn new(provider: P, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Ask the judge about `answers` on `dimension`.
    ///
    /// Provider errors, timeouts and unparseable replies all come back as
    /// [`JudgeReply::Unparsed`] and are logged.
    pub async fn evaluate(&self, dimension: Dimension, answers: &[String]) -> JudgeReply {
        let messages = build_judge_messages(dimension, answers);
        match tokio::time::timeout(self.timeout, self.provider.chat(&messages)).await {
            Ok(Ok(text)) => {
                let reply = parse_reply(&text);
                if let JudgeReply::Unparsed { reason, .. } = &reply {
                    tracing::warn!(
                        %dimension,
                        reason = %reason,
                        preview = %truncate_chars(&text, RAW_PREVIEW_CHARS),
                        "unparseable judge reply"
                    );
                } else {
                    tracing::debug!(%dimension, kind = reply.kind(), score = reply.score(), "judge replied");
                }
                reply
            }
            Ok(Err(e)) => {
                tracing::warn!(%dimension, provider = self.provider.name(), "judge request failed: {e}");
                JudgeReply::Unparsed {
                    raw_text: String::new(),
                    reason: format!("judge request failed: {e}"),
                }
            }
            Err(_) => {
                tracing::warn!(
                    %dimension,
                    timeout_secs = self.timeout.as_secs(),
                    "judge request timed out"
                );
                JudgeReply::Unparsed {
                    raw_text: String::new(),
                    reason: format!("judge timed out after {}s", self.timeout.as_secs()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use skillsmith_llm::Role;
    use skillsmith_llm::mock::MockProvider;

    use super::*;

    #[test]
    fn parses_fenced_block_with_prose() {
        let raw = "Here is my verdict:\n```json\n{\"type\": \"follow_up\", \"score\": 65, \
                   \"reasoning\": \"vague\", \"follow_up_question\": \"Who uses it?\", \
                   \"recommended_options\": [\"QA reviewers\", {\"id\": \"b\", \"text\": \"Auditors\"}]}\n```\nThanks";
        let JudgeReply::FollowUp {
            score,
            question,
            options,
            ..
        } = parse_reply(raw)
        else {
            panic!("expected follow_up");
        };
        assert_eq!(score, 65);
        assert_eq!(question.as_deref(), Some("Who uses it?"));
        assert_eq!(options[0].id, "opt1");
        assert_eq!(options[1].id, "b");
        assert_eq!(options[1].text, "Auditors");
    }

    #[test]
    fn parses_first_balanced_object() {
        let raw = "Sure! {\"type\": \"next_dimension\", \"score\": \"92\", \"reasoning\": \"has {braces}\"} trailing";
        assert_eq!(
            parse_reply(raw),
            JudgeReply::NextDimension {
                score: 92,
                reasoning: "has {braces}".into()
            }
        );
    }

    #[test]
    fn malformed_first_object_is_unparsed() {
        let raw = "```json\n{\"type\": \"next_dimension\", \"score\": 91,}\n```\n{\"type\": \"follow_up\", \"score\": 10}";
        assert_eq!(parse_reply(raw).score(), PARSE_ERROR_SCORE);
    }

    #[test]
    fn parses_raw_json() {
        let reply = parse_reply("  {\"type\":\"summary\",\"message\":\"done\"}  ");
        assert_eq!(
            reply,
            JudgeReply::Summary {
                message: Some("done".into()),
                draft: None
            }
        );
        assert!(reply.is_sufficient());
    }

    #[test]
    fn missing_scores_use_defaults() {
        assert_eq!(parse_reply(r#"{"type":"next_dimension"}"#).score(), 95);
        assert_eq!(parse_reply(r#"{"type":"follow_up"}"#).score(), 0);
    }

    #[test]
    fn out_of_range_or_unknown_is_unparsed() {
        for raw in [
            r#"{"type":"follow_up","score":150}"#,
            r#"{"type":"follow_up","score":-1}"#,
            r#"{"type":"follow_up","score":"high"}"#,
            r#"{"type":"celebrate","score":99}"#,
            "I think this is fine",
            "",
        ] {
            let reply = parse_reply(raw);
            assert_eq!(reply.kind(), "parse_error", "{raw}");
            assert_eq!(reply.score(), PARSE_ERROR_SCORE);
            assert!(!reply.is_sufficient());
        }
    }

    #[test]
    fn summary_draft_requires_skill_name() {
        let raw = r#"{"type":"summary","skill_metadata":{"skill_name":""}}"#;
        assert_eq!(
            parse_reply(raw),
            JudgeReply::Summary {
                message: None,
                draft: None
            }
        );
    }

    #[test]
    fn prompt_only_includes_current_dimension_answers() {
        let answers = vec!["first try".to_owned(), "second try".to_owned()];
        let messages = build_judge_messages(Dimension::CoreValue, &answers);
        assert_eq!(messages[0].role, Role::System);
        let prompt = &messages[1].content;
        assert!(prompt.contains("Latest answer:\nsecond try"));
        assert!(prompt.contains("1. first try"));
        assert!(prompt.contains("(20 points)"));
        assert!(prompt.contains("next_dimension"));
        assert!(prompt.contains("concrete answers"));
    }

    #[tokio::test]
    async fn evaluate_parses_provider_reply() {
        let provider =
            MockProvider::with_responses(vec![r#"{"type":"next_dimension","score":97}"#.into()]);
        let judge = Judge::new(provider, Duration::from_secs(5));
        let reply = judge
            .evaluate(Dimension::UsageScenario, &["daily reports".into()])
            .await;
        assert_eq!(reply.score(), 97);
        assert_eq!(judge.provider().requests().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_becomes_sentinel() {
        let judge = Judge::new(MockProvider::failing(), Duration::from_secs(5));
        let reply = judge.evaluate(Dimension::CoreValue, &["x".into()]).await;
        assert_eq!(reply.score(), PARSE_ERROR_SCORE);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_sentinel() {
        let provider = MockProvider::default().with_delay(10_000);
        let judge = Judge::new(provider, Duration::from_secs(1));
        let reply = judge.evaluate(Dimension::CoreValue, &["x".into()]).await;
        let JudgeReply::Unparsed { reason, .. } = reply else {
            panic!("expected unparsed");
        };
        assert!(reason.contains("timed out"));
    }

    proptest! {
        #[test]
        fn sentinel_never_collides_with_real_scores(raw in ".{0,200}", score in -500i64..500) {
            for text in [raw.clone(), format!(r#"{{"type":"follow_up","score":{score}}}"#)] {
                let reply = parse_reply(&text);
                if reply.score() == PARSE_ERROR_SCORE {
                    prop_assert_eq!(reply.kind(), "parse_error");
                } else {
                    prop_assert!((0..=100).contains(&reply.score()));
                }
            }
        }
    }
}
