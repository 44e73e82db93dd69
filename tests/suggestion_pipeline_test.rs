// ABOUTME: Pipeline-level tests for lock contention and summary maintenance
// ABOUTME: Drives CaptionPipeline and SummaryService directly against a memory database

mod common;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use helpers::scripted_llm::{ScriptedProvider, ScriptedTurn};

use apuntador::auth::AuthManager;
use apuntador::captions::normalize_caption;
use apuntador::config::environment::{AiConfig, CaptionConfig};
use apuntador::errors::{AppError, AppResult};
use apuntador::locks::{suggestion_lock_key, LockStore};
use apuntador::models::{MessageRole, MessageStatus, ResponseMode};
use apuntador::server::ServerResources;

#[tokio::test]
async fn concurrent_streams_generate_exactly_one_suggestion() {
    let provider = ScriptedProvider::slow_replying("answer", Duration::from_millis(150));
    let resources = common::create_test_resources(provider.clone()).await;
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    // Distinct questions so the merge engine commits both captions
    let first = normalize_caption("What does your current team build?", None, None).unwrap();
    let second = normalize_caption("Why are you leaving?", None, None).unwrap();

    let stream_a = resources
        .pipeline
        .stream(conversation.clone(), first, ResponseMode::Auto);
    let stream_b = resources
        .pipeline
        .stream(conversation.clone(), second, ResponseMode::Auto);

    let (events_a, events_b) =
        tokio::join!(stream_a.collect::<Vec<_>>(), stream_b.collect::<Vec<_>>());

    // Both gates passed, but the generation lock admits only one call
    assert_eq!(provider.calls(), 1);

    let starts = events_a
        .iter()
        .chain(events_b.iter())
        .filter(|event| event.name() == "assistant_start")
        .count();
    assert_eq!(starts, 1);

    let suggestions = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.status == MessageStatus::Suggestion)
        .count();
    assert_eq!(suggestions, 1);
}

#[tokio::test]
async fn dropped_stream_still_releases_the_lock_and_persists() {
    let provider = ScriptedProvider::slow_replying(
        "Close with a question of your own.",
        Duration::from_millis(150),
    );
    let resources = common::create_test_resources(provider).await;
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    let caption = normalize_caption("Do you have any questions for us?", None, None).unwrap();
    let mut events = Box::pin(resources.pipeline.stream(
        conversation.clone(),
        caption,
        ResponseMode::Auto,
    ));
    while let Some(event) = events.next().await {
        if event.name() == "assistant_start" {
            break;
        }
    }
    // Client goes away mid-generation
    drop(events);

    // Generation keeps running on its own task; the lock frees long
    // before its TTL
    let key = suggestion_lock_key(&conversation.id);
    let mut released = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if resources
            .locks
            .try_acquire(&key, Duration::from_secs(1))
            .await
            .unwrap()
        {
            resources.locks.release(&key).await.unwrap();
            released = true;
            break;
        }
    }
    assert!(released, "lock was not released after the stream was dropped");

    let suggestions = resources
        .database
        .list_messages(&conversation.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.status == MessageStatus::Suggestion)
        .count();
    assert_eq!(suggestions, 1);
}

struct UnreachableLockStore;

#[async_trait]
impl LockStore for UnreachableLockStore {
    async fn try_acquire(&self, _key: &str, _ttl: Duration) -> AppResult<bool> {
        Err(AppError::internal("lock store offline"))
    }

    async fn release(&self, _key: &str) -> AppResult<()> {
        Err(AppError::internal("lock store offline"))
    }
}

#[tokio::test]
async fn unreachable_lock_store_fails_closed() {
    let provider = ScriptedProvider::replying("should not be called");
    let database = common::create_test_database().await;
    let auth = AuthManager::new(b"test-jwt-secret-for-integration-tests", 24);
    let resources = Arc::new(ServerResources::new(
        database,
        auth,
        Arc::new(UnreachableLockStore),
        provider.clone(),
        common::test_config(),
    ));
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    let caption = normalize_caption("Why should we hire you?", None, None).unwrap();
    let events: Vec<_> = resources
        .pipeline
        .stream(conversation, caption, ResponseMode::Auto)
        .collect()
        .await;
    let names: Vec<&str> = events.iter().map(apuntador::captions::CaptionEvent::name).collect();

    // The caption keeps its commit; generation is skipped rather than
    // run unguarded
    assert!(names.contains(&"caption"));
    assert!(names.contains(&"error"));
    assert!(!names.contains(&"assistant_start"));
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn zero_throttle_lets_consecutive_questions_through() {
    let provider = ScriptedProvider::with_script(vec![
        ScriptedTurn::Reply("first answer".to_owned()),
        ScriptedTurn::Reply("second answer".to_owned()),
    ]);
    let mut config = common::test_config();
    config.captions = CaptionConfig {
        throttle_interval_secs: 0,
        ..CaptionConfig::default()
    };
    let resources = common::create_test_resources_with_config(provider.clone(), config).await;
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    let first = normalize_caption("What is a borrow checker?", None, None).unwrap();
    resources
        .pipeline
        .process(&conversation, &first, ResponseMode::Auto)
        .await
        .unwrap();

    // Strictly-older comparison needs a nonzero gap even at zero throttle
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = normalize_caption("And what is a lifetime?", None, None).unwrap();
    let outcome = resources
        .pipeline
        .process(&conversation, &second, ResponseMode::Auto)
        .await
        .unwrap();

    match outcome {
        apuntador::captions::CaptionOutcome::Committed { assistant, .. } => {
            assert_eq!(assistant.unwrap().content, "second answer");
        }
        apuntador::captions::CaptionOutcome::Skipped => panic!("caption should commit"),
    }
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn summary_regeneration_waits_for_the_trigger_count() {
    let provider = ScriptedProvider::with_script(vec![
        ScriptedTurn::Reply("Resumen inicial.".to_owned()),
        ScriptedTurn::Reply("Resumen actualizado.".to_owned()),
    ]);
    let mut config = common::test_config();
    config.ai = AiConfig {
        api_key: Some("test-key".to_owned()),
        summary_trigger_count: 3,
        ..AiConfig::default()
    };
    let resources = common::create_test_resources_with_config(provider.clone(), config).await;
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    let add_message = |content: String| {
        let resources = resources.clone();
        let conversation_id = conversation.id.clone();
        async move {
            resources
                .database
                .create_message(
                    &conversation_id,
                    None,
                    MessageRole::Interviewer,
                    &content,
                    MessageStatus::Captured,
                )
                .await
                .unwrap();
        }
    };

    add_message("Interviewer: question one".to_owned()).await;

    // A missing summary is built on the first pass regardless of the trigger
    resources.summaries.refresh(&conversation).await.unwrap();
    assert_eq!(provider.calls(), 1);

    let load = || async {
        resources
            .database
            .get_conversation(&conversation.id, &user.id.to_string())
            .await
            .unwrap()
            .unwrap()
    };
    let summarized = load().await;
    assert_eq!(summarized.ai_summary.as_deref(), Some("Resumen inicial."));
    assert!(summarized.ai_summary_message_id.is_some());
    assert!(summarized.ai_summary_updated_at.is_some());

    // Two new turns, trigger is three: the existing summary stands
    tokio::time::sleep(Duration::from_millis(10)).await;
    add_message("Interviewer: question two".to_owned()).await;
    add_message("Interviewer: question three".to_owned()).await;
    resources.summaries.refresh(&summarized).await.unwrap();
    assert_eq!(provider.calls(), 1);

    add_message("Interviewer: question four".to_owned()).await;
    resources.summaries.refresh(&summarized).await.unwrap();
    assert_eq!(provider.calls(), 2);

    let refreshed = load().await;
    assert_eq!(
        refreshed.ai_summary.as_deref(),
        Some("Resumen actualizado.")
    );
}

#[tokio::test]
async fn summary_is_skipped_without_an_api_key() {
    let provider = ScriptedProvider::replying("should not be called");
    let mut config = common::test_config();
    config.ai = AiConfig {
        api_key: None,
        summary_trigger_count: 1,
        ..AiConfig::default()
    };
    let resources = common::create_test_resources_with_config(provider.clone(), config).await;
    let (user, _) = common::seed_user(&resources).await;
    let conversation = common::seed_conversation(&resources, &user).await;

    resources
        .database
        .create_message(
            &conversation.id,
            None,
            MessageRole::Interviewer,
            "Interviewer: hello",
            MessageStatus::Captured,
        )
        .await
        .unwrap();

    resources.summaries.refresh(&conversation).await.unwrap();
    assert_eq!(provider.calls(), 0);
}
