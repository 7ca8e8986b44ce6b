//! The elicitation state machine: one state per [`Dimension`] plus a terminal state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillsmith_llm::LlmProvider;
use uuid::Uuid;

use crate::dimension::{DIMENSION_COUNT, Dimension};
use crate::draft::{MergedAnswers, SkillDraft};
use crate::error::ElicitError;
use crate::judge::{Judge, JudgeReply, RecommendedOption};
use crate::synthesizer::{normalize_draft, synthesize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl Progress {
    #[must_use]
    pub fn at(index: usize) -> Self {
        let index = index.min(DIMENSION_COUNT);
        Self {
            current: (index + 1).min(DIMENSION_COUNT),
            total: DIMENSION_COUNT,
            percentage: u8::try_from(index * 100 / DIMENSION_COUNT).unwrap_or(100),
        }
    }
}

/// Opening question of a dimension, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionPrompt {
    pub dimension: Dimension,
    pub dimension_name: &'static str,
    pub question: &'static str,
    pub guidance: &'static str,
    pub placeholder: &'static str,
    pub examples: Vec<&'static str>,
}

impl DimensionPrompt {
    #[must_use]
    pub fn for_dimension(dimension: Dimension) -> Self {
        Self {
            dimension,
            dimension_name: dimension.display_name(),
            question: dimension.question(),
            guidance: dimension.guidance(),
            placeholder: dimension.placeholder(),
            examples: dimension.examples().to_vec(),
        }
    }
}

pub const SUMMARY_MESSAGE: &str = "All four topics are covered. Here is the skill definition.";
pub const SUMMARY_NEXT_STEP: &str = "Review the draft and publish it to create the skill.";

/// Result of one [`ElicitationSession::advance`] call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    FollowUp {
        dimension: Dimension,
        dimension_name: &'static str,
        follow_up_question: String,
        guidance: String,
        recommended_options: Vec<RecommendedOption>,
        score: i32,
        reasoning: String,
        progress: Progress,
    },
    NextDimension {
        #[serde(flatten)]
        prompt: DimensionPrompt,
        score: i32,
        reasoning: String,
        progress: Progress,
    },
    Summary {
        message: String,
        skill_metadata: SkillDraft,
        next_step: &'static str,
        progress: Progress,
    },
}

impl AdvanceOutcome {
    #[must_use]
    pub fn progress(&self) -> Progress {
        match self {
            Self::FollowUp { progress, .. }
            | Self::NextDimension { progress, .. }
            | Self::Summary { progress, .. } => *progress,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FollowUp { .. } => "follow_up",
            Self::NextDimension { .. } => "next_dimension",
            Self::Summary { .. } => "summary",
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub current_dimension: Option<Dimension>,
    pub dimension_index: usize,
    pub complete: bool,
    pub progress: Progress,
    pub answers: BTreeMap<Dimension, Vec<String>>,
    pub skill_metadata: Option<SkillDraft>,
}

#[derive(Debug, Clone)]
pub struct ElicitationSession {
    id: Uuid,
    owner_id: String,
    created_at: DateTime<Utc>,
    pub(crate) last_activity_at: DateTime<Utc>,
    index: usize,
    answers: [Vec<String>; DIMENSION_COUNT],
    draft: Option<SkillDraft>,
}

impl ElicitationSession {
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            created_at: now,
            last_activity_at: now,
            index: 0,
            answers: Default::default(),
            draft: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// In `[0, 4]`; 4 means complete.
    #[must_use]
    pub fn dimension_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn current_dimension(&self) -> Option<Dimension> {
        Dimension::from_index(self.index)
    }

    #[must_use]
    pub fn answers(&self, dimension: Dimension) -> &[String] {
        &self.answers[dimension.index()]
    }

    #[must_use]
    pub fn draft(&self) -> Option<&SkillDraft> {
        self.draft.as_ref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index >= DIMENSION_COUNT
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::at(self.index)
    }

    #[must_use]
    pub fn is_expired(&self, idle_timeout: chrono::Duration) -> bool {
        self.is_expired_at(Utc::now(), idle_timeout)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, idle_timeout: chrono::Duration) -> bool {
        now - self.last_activity_at > idle_timeout
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    #[must_use]
    pub fn merged_answers(&self) -> MergedAnswers {
        MergedAnswers::from_lists(&self.answers)
    }

    /// The judged draft when complete, otherwise one synthesized from whatever was answered.
    #[must_use]
    pub fn final_draft(&self) -> SkillDraft {
        self.draft
            .clone()
            .unwrap_or_else(|| synthesize(&self.merged_answers()))
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            owner_id: self.owner_id.clone(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            current_dimension: self.current_dimension(),
            dimension_index: self.index,
            complete: self.is_complete(),
            progress: self.progress(),
            answers: Dimension::ALL
                .iter()
                .map(|&d| (d, self.answers[d.index()].clone()))
                .collect(),
            skill_metadata: self.draft.clone(),
        }
    }

    /// Record `answer` on the current dimension, have the judge score it, and transition.
    ///
    /// # Errors
    ///
    /// Returns [`ElicitError::SessionComplete`] once all dimensions are done and
    /// [`ElicitError::EmptyAnswer`] for blank input. Judge failures never surface
    /// as errors; they produce a follow-up.
    pub async fn advance<P: LlmProvider>(
        &mut self,
        answer: &str,
        judge: &Judge<P>,
    ) -> Result<AdvanceOutcome, ElicitError> {
        let Some(dimension) = self.current_dimension() else {
            return Err(ElicitError::SessionComplete(self.id));
        };
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ElicitError::EmptyAnswer);
        }

        self.touch();
        self.answers[dimension.index()].push(answer.to_owned());
        let reply = judge.evaluate(dimension, &self.answers[dimension.index()]).await;
        self.touch();
        Ok(self.apply(dimension, reply))
    }

    pub(crate) fn apply(&mut self, dimension: Dimension, reply: JudgeReply) -> AdvanceOutcome {
        let score = reply.score();
        let sufficient = reply.is_sufficient();
        let (reasoning, question, guidance, options, message, judged_draft) = match reply {
            JudgeReply::FollowUp {
                reasoning,
                question,
                guidance,
                options,
                ..
            } => (reasoning, question, guidance, options, None, None),
            JudgeReply::NextDimension { reasoning, .. } => {
                (reasoning, None, None, Vec::new(), None, None)
            }
            JudgeReply::Summary { message, draft } => {
                (String::new(), None, None, Vec::new(), message, draft)
            }
            JudgeReply::Unparsed { reason, .. } => (
                format!("The answer could not be scored ({reason})."),
                None,
                None,
                Vec::new(),
                None,
                None,
            ),
        };

        if !sufficient {
            tracing::info!(session_id = %self.id, %dimension, score, "follow-up requested");
            let latest = self.answers[dimension.index()]
                .last()
                .map_or("", String::as_str);
            let options = if options.is_empty() {
                dimension
                    .candidate_answers(latest)
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| RecommendedOption {
                        id: format!("opt{}", i + 1),
                        text,
                    })
                    .collect()
            } else {
                options
            };
            return AdvanceOutcome::FollowUp {
                dimension,
                dimension_name: dimension.display_name(),
                follow_up_question: question
                    .unwrap_or_else(|| dimension.follow_up_question().to_owned()),
                guidance: guidance.unwrap_or_else(|| {
                    "Pick one of the suggested answers or write your own.".to_owned()
                }),
                recommended_options: options,
                score,
                reasoning,
                progress: self.progress(),
            };
        }

        self.index += 1;
        tracing::info!(session_id = %self.id, %dimension, score, index = self.index, "dimension satisfied");

        match self.current_dimension() {
            Some(next) => AdvanceOutcome::NextDimension {
                prompt: DimensionPrompt::for_dimension(next),
                score,
                reasoning,
                progress: self.progress(),
            },
            None => {
                let draft = judged_draft
                    .and_then(|judged| {
                        let name = judged.skill_name.clone();
                        let normalized = normalize_draft(judged);
                        if normalized.is_none() {
                            tracing::warn!(
                                session_id = %self.id,
                                name = %name,
                                "judge skill name unusable, synthesizing draft"
                            );
                        }
                        normalized
                    })
                    .unwrap_or_else(|| synthesize(&self.merged_answers()));
                tracing::info!(session_id = %self.id, skill = %draft.skill_name, "elicitation complete");
                self.draft = Some(draft.clone());
                AdvanceOutcome::Summary {
                    message: message.unwrap_or_else(|| SUMMARY_MESSAGE.to_owned()),
                    skill_metadata: draft,
                    next_step: SUMMARY_NEXT_STEP,
                    progress: self.progress(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use skillsmith_llm::mock::MockProvider;

    use super::*;
    use crate::judge::PARSE_ERROR_SCORE;

    fn judge(replies: &[&str]) -> Judge<MockProvider> {
        let provider =
            MockProvider::with_responses(replies.iter().map(|r| (*r).to_owned()).collect());
        Judge::new(provider, Duration::from_secs(5))
    }

    fn reply_with_score(score: u8) -> JudgeReply {
        if i32::from(score) >= crate::dimension::SUFFICIENT_SCORE {
            JudgeReply::NextDimension {
                score,
                reasoning: String::new(),
            }
        } else {
            JudgeReply::FollowUp {
                score,
                reasoning: String::new(),
                question: None,
                guidance: None,
                options: Vec::new(),
            }
        }
    }

    #[test]
    fn progress_percentages() {
        assert_eq!(
            Progress::at(0),
            Progress {
                current: 1,
                total: 4,
                percentage: 0
            }
        );
        assert_eq!(Progress::at(3).percentage, 75);
        let done = Progress::at(4);
        assert_eq!((done.current, done.percentage), (4, 100));
    }

    #[test]
    fn expiry_uses_idle_time() {
        let mut session = ElicitationSession::new("u1");
        let ttl = chrono::Duration::minutes(30);
        let now = Utc::now();
        session.last_activity_at = now - chrono::Duration::minutes(31);
        assert!(session.is_expired_at(now, ttl));
        session.last_activity_at = now - chrono::Duration::minutes(29);
        assert!(!session.is_expired_at(now, ttl));
    }

    #[tokio::test]
    async fn low_score_stays_with_judge_question() {
        let judge = judge(&[
            r#"{"type":"follow_up","score":65,"reasoning":"vague","follow_up_question":"Who?","recommended_options":[{"id":"a","text":"QA team"}]}"#,
        ]);
        let mut session = ElicitationSession::new("u1");
        let outcome = session.advance("automates SOP review", &judge).await.unwrap();
        let AdvanceOutcome::FollowUp {
            follow_up_question,
            recommended_options,
            score,
            progress,
            ..
        } = outcome
        else {
            panic!("expected follow_up");
        };
        assert_eq!(follow_up_question, "Who?");
        assert_eq!(recommended_options[0].text, "QA team");
        assert_eq!(score, 65);
        assert_eq!(progress.percentage, 0);
        assert_eq!(session.dimension_index(), 0);
        assert_eq!(session.answers(Dimension::CoreValue), ["automates SOP review"]);
    }

    #[tokio::test]
    async fn unparsed_reply_falls_back_to_candidates() {
        let judge = judge(&["no json here"]);
        let mut session = ElicitationSession::new("u1");
        let outcome = session.advance("sop review helper", &judge).await.unwrap();
        let AdvanceOutcome::FollowUp {
            score,
            recommended_options,
            follow_up_question,
            ..
        } = outcome
        else {
            panic!("expected follow_up");
        };
        assert_eq!(score, PARSE_ERROR_SCORE);
        assert!(!recommended_options.is_empty());
        assert!(recommended_options[0].text.starts_with("sop review helper"));
        assert_eq!(follow_up_question, Dimension::CoreValue.follow_up_question());
        assert_eq!(session.dimension_index(), 0);
    }

    #[tokio::test]
    async fn empty_answer_is_rejected() {
        let judge = judge(&[]);
        let mut session = ElicitationSession::new("u1");
        assert!(matches!(
            session.advance("   ", &judge).await,
            Err(ElicitError::EmptyAnswer)
        ));
        assert!(session.answers(Dimension::CoreValue).is_empty());
        assert!(judge.provider().requests().is_empty());
    }

    #[tokio::test]
    async fn judge_sees_only_current_dimension_answers() {
        let judge = judge(&[
            r#"{"type":"next_dimension","score":95}"#,
            r#"{"type":"follow_up","score":40}"#,
        ]);
        let mut session = ElicitationSession::new("u1");
        session.advance("core answer", &judge).await.unwrap();
        session.advance("scenario answer", &judge).await.unwrap();
        let requests = judge.provider().requests();
        let second = &requests[1][1].content;
        assert!(second.contains("scenario answer"));
        assert!(!second.contains("core answer"));
    }

    #[tokio::test]
    async fn four_sufficient_answers_complete_with_summary() {
        let judge = judge(&[
            r#"{"type":"next_dimension","score":95}"#,
            r#"{"type":"next_dimension","score":92}"#,
            r#"{"type":"next_dimension","score":99}"#,
            r#"{"type":"next_dimension","score":95}"#,
        ]);
        let mut session = ElicitationSession::new("u1");
        let answers = [
            "Review SOP documents for compliance",
            "QA uploads a Word file and gets a report",
            "sopcheck",
            "Never edits the original document",
        ];
        let mut last = None;
        for answer in answers {
            last = Some(session.advance(answer, &judge).await.unwrap());
        }
        let Some(AdvanceOutcome::Summary {
            skill_metadata,
            progress,
            ..
        }) = last
        else {
            panic!("expected summary");
        };
        assert!(!skill_metadata.skill_name.is_empty());
        assert_eq!(progress.percentage, 100);
        assert_eq!(session.dimension_index(), 4);
        assert!(session.draft().is_some());
        assert!(matches!(
            session.advance("more", &judge).await,
            Err(ElicitError::SessionComplete(_))
        ));
    }

    #[test]
    fn summary_reply_uses_judge_draft_when_valid() {
        let mut session = ElicitationSession::new("u1");
        session.index = 3;
        let mut draft = synthesize(&MergedAnswers::default());
        draft.skill_name = "from-judge".into();
        let outcome = session.apply(
            Dimension::Boundaries,
            JudgeReply::Summary {
                message: Some("done".into()),
                draft: Some(draft),
            },
        );
        let AdvanceOutcome::Summary {
            message,
            skill_metadata,
            ..
        } = outcome
        else {
            panic!("expected summary");
        };
        assert_eq!(message, "done");
        assert_eq!(skill_metadata.skill_name, "from-judge");
    }

    #[test]
    fn next_dimension_reports_new_progress() {
        let mut session = ElicitationSession::new("u1");
        let outcome = session.apply(Dimension::CoreValue, reply_with_score(93));
        assert_eq!(outcome.kind(), "next_dimension");
        assert_eq!(outcome.progress().percentage, 25);
        assert_eq!(outcome.progress().current, 2);
    }

    #[test]
    fn status_snapshot() {
        let mut session = ElicitationSession::new("owner");
        session.answers[0].push("a".into());
        let status = session.status();
        assert_eq!(status.owner_id, "owner");
        assert_eq!(status.current_dimension, Some(Dimension::CoreValue));
        assert_eq!(status.answers[&Dimension::CoreValue], ["a"]);
        assert!(!status.complete);
        assert!(status.skill_metadata.is_none());
    }

    proptest! {
        #[test]
        fn index_is_monotonic_and_draft_iff_complete(
            scores in proptest::collection::vec(prop_oneof![Just(None), (0u8..=100).prop_map(Some)], 1..40)
        ) {
            let mut session = ElicitationSession::new("u1");
            let mut previous = 0;
            for score in scores {
                let Some(dimension) = session.current_dimension() else { break };
                session.answers[dimension.index()].push("answer".into());
                let reply = score.map_or_else(
                    || JudgeReply::Unparsed { raw_text: String::new(), reason: "bad".into() },
                    reply_with_score,
                );
                let advanced = reply.is_sufficient();
                session.apply(dimension, reply);
                prop_assert!(session.dimension_index() >= previous);
                prop_assert_eq!(session.dimension_index() > previous, advanced);
                prop_assert_eq!(session.draft().is_some(), session.dimension_index() == 4);
                previous = session.dimension_index();
            }
        }
    }
}
