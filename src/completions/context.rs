// ABOUTME: Provider context assembly from conversation settings and message history
// ABOUTME: Resolves model/key precedence and windows history around the running summary

//! # Completion Context
//!
//! Builds the message list sent to the AI provider. The context starts with
//! the conversation's system prompt (or the configured default), optionally
//! carries the running summary as a second system entry, then replays a
//! bounded window of recent turns with roles remapped to the provider's
//! user/assistant vocabulary.
//!
//! Window sizing depends on the summary: with one present, only
//! `recent_window_size` turns are needed because older context lives in the
//! summary. Without one, the window stretches to three times that, capped at
//! `max_window_without_summary`.

use crate::config::AiConfig;
use crate::constants::prompts;
use crate::llm::ChatMessage;
use crate::models::{Conversation, Message, MessageRole};

/// The conversation's running summary, if it has meaningful content
#[must_use]
pub fn active_summary(conversation: &Conversation) -> Option<&str> {
    conversation
        .ai_summary
        .as_deref()
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
}

/// The conversation's API key override, if set
#[must_use]
pub fn conversation_api_key(conversation: &Conversation) -> Option<&str> {
    conversation
        .ai_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Model for completion calls: conversation override, else configured default
#[must_use]
pub fn resolve_model<'a>(conversation: &'a Conversation, config: &'a AiConfig) -> &'a str {
    conversation
        .ai_model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(&config.default_model)
}

/// How many recent messages to replay into the context
#[must_use]
pub fn context_window_size(has_summary: bool, config: &AiConfig) -> usize {
    if has_summary {
        config.recent_window_size
    } else {
        (config.recent_window_size * 3).min(config.max_window_without_summary)
    }
}

/// Assemble the provider message list for a suggestion call
///
/// `history` must be in chronological order. Blank messages are dropped;
/// interviewer and candidate turns are folded into labeled user messages so
/// the model sees who said what.
#[must_use]
pub fn build_context(
    conversation: &Conversation,
    history: &[Message],
    config: &AiConfig,
) -> Vec<ChatMessage> {
    let mut context = Vec::with_capacity(history.len() + 2);

    let system_prompt = conversation
        .ai_system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(&config.default_system_prompt);
    context.push(ChatMessage::system(system_prompt));

    if let Some(summary) = active_summary(conversation) {
        context.push(ChatMessage::system(format!(
            "{}{summary}",
            prompts::SUMMARY_CONTEXT_PREFIX
        )));
    }

    for message in history {
        let content = message.content.trim();
        if content.is_empty() {
            continue;
        }
        context.push(match message.role {
            MessageRole::Assistant => ChatMessage::assistant(content),
            MessageRole::System => ChatMessage::system(content),
            MessageRole::Interviewer => ChatMessage::user(format!("Interviewer: {content}")),
            MessageRole::User => ChatMessage::user(format!("Candidate: {content}")),
        });
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole as ProviderRole;
    use crate::models::{new_id, MessageStatus};
    use chrono::Utc;

    fn conversation() -> Conversation {
        let now = Utc::now();
        Conversation {
            id: new_id(),
            user_id: "user-1".into(),
            title: None,
            ai_system_prompt: None,
            ai_model: None,
            ai_api_key: None,
            ai_summary: None,
            ai_summary_message_id: None,
            ai_summary_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(role: MessageRole, content: &str) -> Message {
        let now = Utc::now();
        Message {
            id: new_id(),
            conversation_id: "conv-1".into(),
            user_id: None,
            role,
            content: content.into(),
            status: MessageStatus::Captured,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_system_prompt_applies_when_conversation_has_none() {
        let config = AiConfig::default();
        let context = build_context(&conversation(), &[], &config);

        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, ProviderRole::System);
        assert_eq!(context[0].content, config.default_system_prompt);
    }

    #[test]
    fn conversation_prompt_overrides_default() {
        let config = AiConfig::default();
        let mut conv = conversation();
        conv.ai_system_prompt = Some("  Coach for SRE interviews.  ".into());

        let context = build_context(&conv, &[], &config);
        assert_eq!(context[0].content, "Coach for SRE interviews.");
    }

    #[test]
    fn summary_becomes_second_system_entry() {
        let config = AiConfig::default();
        let mut conv = conversation();
        conv.ai_summary = Some("- Discussed schema design".into());

        let context = build_context(&conv, &[message(MessageRole::Interviewer, "And scaling?")], &config);

        assert_eq!(context.len(), 3);
        assert_eq!(context[1].role, ProviderRole::System);
        assert_eq!(
            context[1].content,
            "Conversation summary so far:\n- Discussed schema design"
        );
    }

    #[test]
    fn roles_are_remapped_with_speaker_labels() {
        let config = AiConfig::default();
        let history = vec![
            message(MessageRole::Interviewer, "Tell me about caching."),
            message(MessageRole::User, "I would start with an LRU."),
            message(MessageRole::Assistant, "Mention eviction policies."),
            message(MessageRole::System, "Stay concise."),
        ];

        let context = build_context(&conversation(), &history, &config);

        assert_eq!(context[1].role, ProviderRole::User);
        assert_eq!(context[1].content, "Interviewer: Tell me about caching.");
        assert_eq!(context[2].role, ProviderRole::User);
        assert_eq!(context[2].content, "Candidate: I would start with an LRU.");
        assert_eq!(context[3].role, ProviderRole::Assistant);
        assert_eq!(context[3].content, "Mention eviction policies.");
        assert_eq!(context[4].role, ProviderRole::System);
        assert_eq!(context[4].content, "Stay concise.");
    }

    #[test]
    fn blank_history_entries_are_dropped() {
        let config = AiConfig::default();
        let history = vec![
            message(MessageRole::Interviewer, "   "),
            message(MessageRole::User, "  trimmed  "),
        ];

        let context = build_context(&conversation(), &history, &config);

        assert_eq!(context.len(), 2);
        assert_eq!(context[1].content, "Candidate: trimmed");
    }

    #[test]
    fn window_shrinks_once_a_summary_exists() {
        let config = AiConfig::default();
        assert_eq!(context_window_size(true, &config), 18);
        assert_eq!(context_window_size(false, &config), 54);
    }

    #[test]
    fn window_without_summary_respects_the_cap() {
        let config = AiConfig {
            recent_window_size: 30,
            max_window_without_summary: 60,
            ..AiConfig::default()
        };
        assert_eq!(context_window_size(false, &config), 60);
    }

    #[test]
    fn model_resolution_prefers_conversation_override() {
        let config = AiConfig::default();
        let mut conv = conversation();
        assert_eq!(resolve_model(&conv, &config), config.default_model);

        conv.ai_model = Some("gpt-4o-mini".into());
        assert_eq!(resolve_model(&conv, &config), "gpt-4o-mini");

        conv.ai_model = Some("   ".into());
        assert_eq!(resolve_model(&conv, &config), config.default_model);
    }

    #[test]
    fn blank_conversation_key_is_ignored() {
        let mut conv = conversation();
        assert_eq!(conversation_api_key(&conv), None);

        conv.ai_api_key = Some("  ".into());
        assert_eq!(conversation_api_key(&conv), None);

        conv.ai_api_key = Some("sk-test".into());
        assert_eq!(conversation_api_key(&conv), Some("sk-test"));
    }
}
