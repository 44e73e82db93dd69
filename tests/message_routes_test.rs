// ABOUTME: Integration tests for message creation, auto-replies, and manual respond
// ABOUTME: Provider failures stay in-band; the Spanish 422 guard is exercised verbatim

mod common;
mod helpers;

use helpers::axum_test::AxumTestRequest;
use helpers::scripted_llm::ScriptedProvider;
use serde_json::json;

use apuntador::models::{MessageRole, MessageStatus};
use apuntador::server::build_router;

#[tokio::test]
async fn user_message_gets_a_completed_assistant_reply() {
    let provider = ScriptedProvider::replying("You could mention your Rust background.");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/messages",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "content": "How should I open?" }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    let body = response.json();
    assert_eq!(body["message"]["role"], "user");
    assert_eq!(body["message"]["content"], "How should I open?");
    assert_eq!(body["assistant_message"]["role"], "assistant");
    assert_eq!(body["assistant_message"]["status"], "completed");
    assert_eq!(
        body["assistant_message"]["content"],
        "You could mention your Rust background."
    );
    assert!(body["error"].is_null());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn provider_failure_is_reported_in_band() {
    let resources =
        common::create_test_resources(ScriptedProvider::failing("model overloaded")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/messages",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "content": "Hello?" }))
    .send(app)
    .await;

    // The user's message is still persisted; only the reply failed
    assert_eq!(response.status(), 201);
    let body = response.json();
    assert!(body["assistant_message"].is_null());
    assert!(body["error"].as_str().unwrap().contains("model overloaded"));

    let stored = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, MessageRole::User);
}

#[tokio::test]
async fn interviewer_messages_do_not_trigger_a_reply() {
    let provider = ScriptedProvider::replying("should not be called");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/messages",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "content": "Why Rust?", "role": "interviewer" }))
    .send(app)
    .await;

    assert_eq!(response.status(), 201);
    let body = response.json();
    assert_eq!(body["message"]["role"], "interviewer");
    assert!(body["assistant_message"].is_null());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/messages",
        conversation.id
    ))
    .bearer(&token)
    .json(&json!({ "content": "   " }))
    .send(app)
    .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn respond_last_interviewer_requires_an_interviewer_turn() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let app = build_router(&resources);

    let response = AxumTestRequest::post(&format!(
        "/api/v1/conversations/{}/messages/respond_last_interviewer",
        conversation.id
    ))
    .bearer(&token)
    .send(app)
    .await;

    assert_eq!(response.status(), 422);
    assert_eq!(
        response.json()["error"]["message"],
        "No hay mensajes del interviewer para responder."
    );
}

#[tokio::test]
async fn respond_last_interviewer_always_creates_a_fresh_suggestion() {
    let provider = ScriptedProvider::replying("Mention the merge engine work.");
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    let interviewer = resources
        .database
        .create_message(
            &conversation.id,
            None,
            MessageRole::Interviewer,
            "Interviewer: What did you build recently?",
            MessageStatus::Captured,
        )
        .await
        .unwrap();
    let app = build_router(&resources);

    let uri = format!(
        "/api/v1/conversations/{}/messages/respond_last_interviewer",
        conversation.id
    );
    let first = AxumTestRequest::post(&uri).bearer(&token).send(app.clone()).await;
    assert_eq!(first.status(), 200);
    let body = first.json();
    assert_eq!(body["skipped"], false);
    assert_eq!(body["interviewer_message"]["id"], interviewer.id);
    assert_eq!(body["assistant_message"]["status"], "suggestion");

    // Asking again bypasses any dedup and produces another row
    let second = AxumTestRequest::post(&uri).bearer(&token).send(app).await;
    assert_eq!(second.status(), 200);
    assert_eq!(provider.calls(), 2);

    let suggestions = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.status == MessageStatus::Suggestion)
        .count();
    assert_eq!(suggestions, 2);
}

#[tokio::test]
async fn message_listing_is_chronological() {
    let resources = common::create_test_resources(ScriptedProvider::replying("ok")).await;
    let (user, token) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;
    for content in ["first", "second", "third"] {
        resources
            .database
            .create_message(
                &conversation.id,
                None,
                MessageRole::Interviewer,
                content,
                MessageStatus::Captured,
            )
            .await
            .unwrap();
    }

    let app = build_router(&resources);
    let response = AxumTestRequest::get(&format!(
        "/api/v1/conversations/{}/messages",
        conversation.id
    ))
    .bearer(&token)
    .send(app)
    .await;

    assert_eq!(response.status(), 200);
    let messages = response.json()["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["content"], "first");
    assert_eq!(messages[2]["content"], "third");
}
