use std::time::Duration;

use chrono::Utc;
use skillsmith_core::config::Config;
use skillsmith_core::{
    AdvanceOutcome, Dimension, ElicitError, ElicitationSession, Judge, Registry, SessionStore,
    SkillDraft, is_kebab_case,
};
use skillsmith_llm::mock::MockProvider;
use uuid::Uuid;

fn store(replies: &[&str]) -> SessionStore<MockProvider> {
    let provider = MockProvider::with_responses(replies.iter().map(|r| (*r).to_owned()).collect());
    SessionStore::new(
        Judge::new(provider, Duration::from_secs(5)),
        chrono::Duration::minutes(30),
    )
}

#[tokio::test]
async fn low_score_keeps_dimension_and_progress() {
    let store = store(&[r#"{"type": "follow_up", "score": 65, "reasoning": "who is the user?"}"#]);
    let id = store.create_session("alice").session_id;

    let outcome = store.chat(id, "alice", "automates SOP review").await.unwrap();
    let AdvanceOutcome::FollowUp {
        dimension,
        progress,
        recommended_options,
        ..
    } = outcome
    else {
        panic!("expected follow_up");
    };
    assert_eq!(dimension, Dimension::CoreValue);
    assert_eq!(progress.percentage, 0);
    assert!(!recommended_options.is_empty());

    let status = store.get_session_status(id, "alice").await.unwrap();
    assert_eq!(status.current_dimension, Some(Dimension::CoreValue));
}

#[tokio::test]
async fn fourth_sufficient_answer_produces_summary() {
    let store = store(&[
        r#"```json
{"type": "next_dimension", "score": 93, "reasoning": "clear"}
```"#,
        r#"Verdict: {"type": "next_dimension", "score": 91}"#,
        r#"{"type": "next_dimension", "score": 100}"#,
        r#"{"type": "next_dimension", "score": 95, "reasoning": "limits are explicit"}"#,
    ]);
    let id = store.create_session("alice").session_id;

    let mut kinds = Vec::new();
    let mut last = None;
    for answer in [
        "Review SOP documents for compliance and formatting",
        "A QA specialist uploads a Word SOP and downloads a checklist report",
        "sopcheck",
        "Never edits the source document and keeps no personal data",
    ] {
        let outcome = store.chat(id, "alice", answer).await.unwrap();
        kinds.push(outcome.kind());
        last = Some(outcome);
    }
    assert_eq!(
        kinds,
        ["next_dimension", "next_dimension", "next_dimension", "summary"]
    );

    let Some(AdvanceOutcome::Summary { skill_metadata, .. }) = last else {
        panic!("expected summary");
    };
    assert!(!skill_metadata.skill_name.is_empty());
    assert_eq!(skill_metadata.main_alias, "sopcheck");

    let status = store.get_session_status(id, "alice").await.unwrap();
    assert!(status.complete);
    assert_eq!(status.dimension_index, 4);
    assert_eq!(status.skill_metadata.as_ref(), Some(&skill_metadata));

    assert!(matches!(
        store.chat(id, "alice", "one more").await,
        Err(ElicitError::SessionComplete(_))
    ));

    let ended = store.end_session(id, "alice").await.unwrap();
    assert!(ended.complete);
    assert_eq!(ended.skill_metadata, skill_metadata);
}

#[tokio::test]
async fn idle_session_is_indistinguishable_from_unknown() {
    let session = ElicitationSession::new("alice");
    let later = Utc::now() + chrono::Duration::minutes(31);
    assert!(session.is_expired_at(later, chrono::Duration::minutes(30)));

    let store = store(&[]);
    let id = store.create_session("alice").session_id;
    assert_eq!(store.sweep_expired_at(later), 1);

    let swept = store.chat(id, "alice", "hello").await.unwrap_err();
    let never = store.chat(Uuid::new_v4(), "alice", "hello").await.unwrap_err();
    assert!(matches!(swept, ElicitError::SessionNotFound(_)));
    assert!(matches!(never, ElicitError::SessionNotFound(_)));
    assert!(swept.is_not_found());
}

#[tokio::test]
async fn parse_failure_reprompts_same_dimension() {
    let store = store(&["I would rate this a solid eight out of ten."]);
    let id = store.create_session("alice").session_id;

    let outcome = store.chat(id, "alice", "image optimizer").await.unwrap();
    let AdvanceOutcome::FollowUp {
        score,
        follow_up_question,
        recommended_options,
        ..
    } = outcome
    else {
        panic!("expected follow_up");
    };
    assert_eq!(score, skillsmith_core::PARSE_ERROR_SCORE);
    assert!(!follow_up_question.is_empty());
    assert!(!recommended_options.is_empty());
}

#[tokio::test]
async fn other_users_cannot_touch_a_session() {
    let store = store(&[]);
    let id = store.create_session("alice").session_id;
    let err = store.chat(id, "bob", "hi").await.unwrap_err();
    let ElicitError::PermissionDenied { session_id, caller } = err else {
        panic!("expected permission error");
    };
    assert_eq!(session_id, id);
    assert_eq!(caller, "bob");
}

#[tokio::test]
async fn outcomes_serialize_with_type_tag() {
    let store = store(&[r#"{"type": "next_dimension", "score": 97}"#]);
    let id = store.create_session("alice").session_id;
    let outcome = store.chat(id, "alice", "Generate proposals for sales").await.unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["type"], "next_dimension");
    assert_eq!(json["dimension"], "usage_scenario");
    assert_eq!(json["progress"]["current"], 2);
    assert_eq!(json["progress"]["percentage"], 25);
    assert!(json["examples"].as_array().is_some_and(|e| !e.is_empty()));
}

const JUDGE_SUMMARY_WITH_LOOSE_NAMES: &str = r#"{"type": "summary", "message": "all set",
  "skill_metadata": {
    "skill_name": "SOP Review Tool",
    "core_value": "Review SOP documents",
    "usage_scenario": "QA uploads a Word SOP",
    "main_alias": "sopcheck",
    "context_aliases": ["sopcheck"],
    "command_alias": "/SOP check",
    "api_alias": "x",
    "boundaries": "read only",
    "category": "compliance",
    "target_users": ["QA specialist"],
    "compliance_requirements": [],
    "suggested_capabilities": [{"id": "check", "name": "Check", "complexity": "low"}]
  }}"#;

async fn finish(registry: &Registry<MockProvider>) -> SkillDraft {
    let sessions = registry.sessions();
    let id = sessions.create_session("alice").session_id;
    let mut last = None;
    for answer in ["Review SOP documents", "QA uploads a Word SOP", "sopcheck", "read only"] {
        last = Some(sessions.chat(id, "alice", answer).await.unwrap());
    }
    let Some(AdvanceOutcome::Summary { skill_metadata, .. }) = last else {
        panic!("expected summary");
    };
    skill_metadata
}

fn registry_with(root: &std::path::Path, summary: &str) -> Registry<MockProvider> {
    let mut config = Config::default();
    config.skills.root = root.to_path_buf();
    let mut replies = vec![r#"{"type": "next_dimension", "score": 95}"#.to_owned(); 3];
    replies.push(summary.to_owned());
    Registry::from_config(&config, MockProvider::with_responses(replies))
}

#[tokio::test]
async fn judge_draft_names_are_normalized_before_publishing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_with(dir.path(), JUDGE_SUMMARY_WITH_LOOSE_NAMES);

    let draft = finish(&registry).await;
    assert_eq!(draft.skill_name, "sop-review-tool");
    assert_eq!(draft.api_alias, "sop_review_tool");
    assert_eq!(draft.command_alias, "sopcheck");
    assert_eq!(draft.category, "compliance");

    let path = registry.publish_draft(&draft).unwrap();
    assert_eq!(path, dir.path().join("internal").join("sop-review-tool"));
}

#[tokio::test]
async fn unusable_judge_name_falls_back_to_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let summary = JUDGE_SUMMARY_WITH_LOOSE_NAMES.replace("SOP Review Tool", "审查工具");
    let registry = registry_with(dir.path(), &summary);

    let draft = finish(&registry).await;
    assert!(is_kebab_case(&draft.skill_name));
    assert_eq!(draft.skill_name, "sop-review");
    assert_eq!(draft.api_alias, "sop_review");
}

#[tokio::test]
async fn publishing_rejects_non_kebab_names() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_with(dir.path(), r#"{"type": "summary"}"#);
    let mut draft = finish(&registry).await;
    draft.skill_name = "SOP Review Tool".into();

    assert!(matches!(
        registry.publish_draft(&draft),
        Err(skillsmith_skills::SkillError::InvalidArgument(_))
    ));
    assert!(!dir.path().join("internal").join("SOP Review Tool").exists());
}
