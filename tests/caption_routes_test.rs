// ABOUTME: Integration tests for caption ingestion, batch and SSE streaming
// ABOUTME: Covers merge-in-place, duplicate skip, gating, and the event protocol

mod common;
mod helpers;

use helpers::axum_test::AxumTestRequest;
use helpers::scripted_llm::{ScriptedProvider, ScriptedTurn};
use serde_json::json;

use apuntador::config::environment::AiConfig;
use apuntador::server::build_router;

#[tokio::test]
async fn interviewer_question_commits_and_gets_a_suggestion() {
    let provider = ScriptedProvider::replying("Lead with your backend experience.");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({
        "text": "Can you tell me about yourself?",
        "speaker": "Jane Doe",
        "platform": "meet"
    }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    let body = response.json();
    assert_eq!(
        body["caption_message"]["content"],
        "Jane Doe (meet): Can you tell me about yourself?"
    );
    assert_eq!(body["caption_message"]["role"], "interviewer");
    assert_eq!(body["assistant_message"]["status"], "suggestion");
    assert_eq!(
        body["assistant_message"]["content"],
        "Lead with your backend experience."
    );
    assert!(body["error"].is_null());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn keyed_config_runs_the_summary_pass_after_the_suggestion() {
    // First turn answers the suggestion call, second the summary call
    let provider = ScriptedProvider::with_script(vec![
        ScriptedTurn::Reply("Anchor on the migration project.".to_owned()),
        ScriptedTurn::Reply("- Asked for a project walkthrough.".to_owned()),
    ]);
    let mut config = common::test_config();
    config.ai = AiConfig {
        api_key: Some("test-key".to_owned()),
        ..AiConfig::default()
    };
    let resources = common::create_test_resources_with_config(provider.clone(), config).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "Can you walk me through your last project?" }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    assert_eq!(
        response.json()["assistant_message"]["content"],
        "Anchor on the migration project."
    );
    assert_eq!(provider.calls(), 2);

    let refreshed = resources
        .database
        .get_conversation(&conversation.id, &user.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        refreshed.ai_summary.as_deref(),
        Some("- Asked for a project walkthrough.")
    );
}

#[tokio::test]
async fn identical_resubmission_is_skipped() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let uri = format!("/api/v1/conversations/{}/captions", conversation.id);
    let payload = json!({ "text": "My name is John and I build compilers." });

    let first = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&payload)
        .send(app.clone())
        .await;
    assert_eq!(first.status(), 201);

    let second = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&payload)
        .send(app)
        .await;
    assert_eq!(second.status(), 200);
    assert_eq!(second.json()["skipped"], true);

    let stored = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn growing_caption_merges_into_the_same_row() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let uri = format!("/api/v1/conversations/{}/captions", conversation.id);
    let first = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&json!({ "text": "I worked with" }))
        .send(app.clone())
        .await;
    assert_eq!(first.status(), 201);
    let first_id = first.json()["caption_message"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let grown = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&json!({ "text": "I worked with Ruby on Rails for three years" }))
        .send(app)
        .await;
    assert_eq!(grown.status(), 201);
    let body = grown.json();
    assert_eq!(body["caption_message"]["id"], first_id);
    assert_eq!(
        body["caption_message"]["content"],
        "Interviewer: I worked with Ruby on Rails for three years"
    );

    let stored = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn manual_mode_suppresses_automatic_suggestions() {
    let provider = ScriptedProvider::replying("should not be called");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({
        "text": "Why do you want this role?",
        "response_mode": "manual_last_interviewer"
    }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    assert!(response.json()["assistant_message"].is_null());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn candidate_captions_never_trigger_suggestions() {
    let provider = ScriptedProvider::replying("should not be called");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "Could you repeat the question?", "speaker": "You" }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    let body = response.json();
    assert_eq!(body["caption_message"]["role"], "user");
    assert!(body["assistant_message"].is_null());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn statements_do_not_trigger_suggestions() {
    let provider = ScriptedProvider::replying("should not be called");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "Great, let's move to the next topic." }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    assert!(response.json()["assistant_message"].is_null());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn second_question_inside_the_throttle_window_is_not_answered() {
    let provider = ScriptedProvider::replying("answer");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let uri = format!("/api/v1/conversations/{}/captions", conversation.id);
    let first = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&json!({ "text": "What is your biggest strength?" }))
        .send(app.clone())
        .await;
    assert!(first.json()["assistant_message"].is_object());

    let second = AxumTestRequest::post(&uri)
        .bearer(&token)
        .json(&json!({ "text": "And your biggest weakness?" }))
        .send(app)
        .await;
    assert_eq!(second.status(), 201);
    assert!(second.json()["assistant_message"].is_null());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn oversized_caption_bodies_are_rejected() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    // Two MiB of text, double the request body cap
    let oversized = "a".repeat(2 * 1024 * 1024);
    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": oversized }))
    .send(app)
    .await;
    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn blank_caption_text_is_rejected() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "   " }))
    .send(app)
    .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn provider_failure_stays_in_band() {
    let resources = common::create_test_resources(ScriptedProvider::failing("quota hit")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "Tell me about a hard bug?" }))
    .send(app)
    .await;

    // The caption still commits; only the suggestion failed
    assert_eq!(response.status(), 201);
    let body = response.json();
    assert!(body["caption_message"].is_object());
    assert!(body["assistant_message"].is_null());
    assert!(body["error"].as_str().unwrap().contains("quota hit"));
}

#[tokio::test]
async fn stream_narrates_the_full_event_sequence() {
    let provider = ScriptedProvider::replying("Walk them through the design first.");
    let resources = common::create_test_resources(provider).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions/stream",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "How would you design a rate limiter?" }))
    .send(app)
    .await;

    assert_eq!(response.status(), 200);
    assert!(response
        .content_type()
        .is_some_and(|ct| ct.starts_with("text/event-stream")));

    let events = response.sse_events();
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names.first(), Some(&"caption"));
    assert_eq!(names.get(1), Some(&"assistant_start"));
    assert!(names.contains(&"assistant_chunk"));
    assert_eq!(names[names.len() - 2], "assistant_complete");
    assert_eq!(names.last(), Some(&"done"));

    let chunks: String = events
        .iter()
        .filter(|(name, _)| name == "assistant_chunk")
        .filter_map(|(_, data)| data["delta"].as_str())
        .collect();
    assert_eq!(chunks, "Walk them through the design first.");

    let complete = events
        .iter()
        .find(|(name, _)| name == "assistant_complete")
        .map(|(_, data)| data.clone())
        .unwrap();
    assert_eq!(complete["status"], "suggestion");
    assert_eq!(complete["content"], "Walk them through the design first.");
}

#[tokio::test]
async fn stream_reports_duplicates_as_skipped() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let batch_uri = format!("/api/v1/conversations/{}/captions", conversation.id);
    AxumTestRequest::post(&batch_uri)
        .bearer(&token)
        .json(&json!({ "text": "So that is the context." }))
        .send(app.clone())
        .await;

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/captions/stream",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "text": "So that is the context." }))
    .send(app)
    .await;

    let names: Vec<String> = response
        .sse_events()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["skipped", "done"]);
}
