use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CommentaryConfig;
use crate::models::{Emotion, Gender, PersonalityInsights};

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
const GROQ_DEFAULT_BASE: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
struct ChatProvider {
    name: &'static str,
    base_url: String,
    api_key: String,
    model: String,
}

/// Ordered list of chat-completion providers, built from whichever API
/// keys are configured. All of them speak the OpenAI wire format, so one
/// client parameterized by base URL covers every tier.
pub struct RemoteCommentary {
    client: reqwest::Client,
    providers: Vec<ChatProvider>,
}

impl RemoteCommentary {
    pub fn from_config(config: &CommentaryConfig) -> Option<Self> {
        let mut providers = Vec::new();

        if let Some(key) = &config.openai_api_key {
            providers.push(ChatProvider {
                name: "openai",
                base_url: config
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string()),
                api_key: key.clone(),
                model: "gpt-4o-mini".to_string(),
            });
        }

        if let Some(key) = &config.groq_api_key {
            providers.push(ChatProvider {
                name: "groq",
                base_url: config
                    .groq_base_url
                    .clone()
                    .unwrap_or_else(|| GROQ_DEFAULT_BASE.to_string()),
                api_key: key.clone(),
                model: "llama-3.1-8b-instant".to_string(),
            });
        }

        if providers.is_empty() {
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .ok()?;

        Some(Self { client, providers })
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name).collect()
    }

    /// Tries each provider in order; the first parseable reply wins.
    /// Every failure mode (non-200, timeout, unusable text) just moves
    /// on to the next tier.
    pub async fn generate(&self, prompt: &str) -> Option<PersonalityInsights> {
        for provider in &self.providers {
            match self.request(provider, prompt).await {
                Ok(text) => {
                    if let Some(insights) = parse_insights(&text) {
                        debug!("{}: remote commentary accepted", provider.name);
                        return Some(insights);
                    }
                    warn!("{}: reply did not parse into insight categories", provider.name);
                }
                Err(e) => {
                    warn!("{}: commentary request failed: {}", provider.name, e);
                }
            }
        }
        None
    }

    async fn request(&self, provider: &ChatProvider, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: provider.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: 400,
            temperature: 0.9,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                provider.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&provider.api_key)
            .json(&request)
            .send()
            .await
            .context("request failed")?;

        if !response.status().is_success() {
            bail!("unexpected status {}", response.status());
        }

        let body: ChatResponse = response.json().await.context("invalid response body")?;
        let text = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            bail!("empty completion");
        }
        Ok(text)
    }
}

pub fn build_prompt(age: u32, gender: Gender, beauty_score: f64, emotion: Option<Emotion>) -> String {
    format!(
        "You write playful horoscope-style blurbs for a face analysis app. \
         The person is roughly {} years old, gender reads as {}, their mood \
         reads as {}, and their novelty score is {:.1} out of 10. Reply with \
         four short sections titled Achievements, Personality Traits, Future \
         Predictions and Fun Facts, each a list of 3-4 one-line items. Keep \
         it kind and upbeat.",
        age,
        gender.as_str(),
        emotion.map(|e| e.as_str()).unwrap_or("hard to tell"),
        beauty_score,
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Category {
    Achievements,
    Traits,
    Predictions,
    Facts,
}

/// Keyword-sniffs a free-text reply into the four insight categories.
/// Category-naming lines switch the current bucket; other non-empty
/// lines land in the current bucket with their list markers stripped.
pub fn parse_insights(text: &str) -> Option<PersonalityInsights> {
    let mut insights = PersonalityInsights {
        achievements: Vec::new(),
        personality_traits: Vec::new(),
        future_predictions: Vec::new(),
        fun_facts: Vec::new(),
    };
    let mut current: Option<Category> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(category) = sniff_category(&trimmed.to_lowercase()) {
            current = Some(category);
            continue;
        }

        let item = strip_list_marker(trimmed);
        if item.is_empty() {
            continue;
        }

        match current {
            Some(Category::Achievements) => insights.achievements.push(item.to_string()),
            Some(Category::Traits) => insights.personality_traits.push(item.to_string()),
            Some(Category::Predictions) => insights.future_predictions.push(item.to_string()),
            Some(Category::Facts) => insights.fun_facts.push(item.to_string()),
            None => {}
        }
    }

    if insights.is_empty() {
        None
    } else {
        Some(insights)
    }
}

fn sniff_category(lower: &str) -> Option<Category> {
    // Only header-ish lines switch buckets, so list items that happen to
    // mention "future" don't get misfiled.
    let header_like = lower.ends_with(':')
        || (lower.len() < 40 && !lower.starts_with('-') && !lower.starts_with('*'));
    if !header_like {
        return None;
    }

    if lower.contains("achievement") {
        Some(Category::Achievements)
    } else if lower.contains("trait") || lower.contains("personality") {
        Some(Category::Traits)
    } else if lower.contains("prediction") || lower.contains("future") {
        Some(Category::Predictions)
    } else if lower.contains("fact") {
        Some(Category::Facts)
    } else {
        None
    }
}

fn strip_list_marker(line: &str) -> &str {
    let stripped = line.trim_start_matches(['-', '*', '•', ' ', '\t']);
    // Numbered markers: "1." or "12)"
    let without_digits = stripped.trim_start_matches(|c: char| c.is_ascii_digit());
    let stripped = if without_digits.len() < stripped.len() {
        without_digits.trim_start_matches(['.', ')', ' '])
    } else {
        stripped
    };
    stripped.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommentaryConfig;

    fn config_with(
        openai: Option<(&str, String)>,
        groq: Option<(&str, String)>,
    ) -> CommentaryConfig {
        CommentaryConfig {
            openai_api_key: openai.as_ref().map(|(k, _)| k.to_string()),
            openai_base_url: openai.map(|(_, url)| url),
            groq_api_key: groq.as_ref().map(|(k, _)| k.to_string()),
            groq_base_url: groq.map(|(_, url)| url),
            request_timeout_secs: 5,
        }
    }

    fn chat_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    const SAMPLE_REPLY: &str = "Achievements:\n- Future star\n- Quiz champion\n\nPersonality Traits:\n* Curious\n* Kind\n\nFuture Predictions:\n1. Will travel far\n\nFun Facts:\n- Great laugh\n";

    #[test]
    fn parses_sectioned_reply() {
        let insights = parse_insights(SAMPLE_REPLY).expect("should parse");
        assert_eq!(insights.achievements, vec!["Future star", "Quiz champion"]);
        assert_eq!(insights.personality_traits, vec!["Curious", "Kind"]);
        assert_eq!(insights.future_predictions, vec!["Will travel far"]);
        assert_eq!(insights.fun_facts, vec!["Great laugh"]);
    }

    #[test]
    fn garbage_reply_is_rejected() {
        assert!(parse_insights("I'm sorry, I can't help with that.").is_none());
        assert!(parse_insights("").is_none());
    }

    #[test]
    fn items_before_any_header_are_dropped() {
        let insights = parse_insights("- stray item\nFun Facts:\n- kept item\n").unwrap();
        assert_eq!(insights.fun_facts, vec!["kept item"]);
        assert!(insights.achievements.is_empty());
    }

    #[test]
    fn no_keys_means_no_remote() {
        assert!(RemoteCommentary::from_config(&config_with(None, None)).is_none());
    }

    #[tokio::test]
    async fn falls_through_failing_provider() {
        let mut bad = mockito::Server::new_async().await;
        let _bad_mock = bad
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let mut good = mockito::Server::new_async().await;
        let _good_mock = good
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body(SAMPLE_REPLY))
            .create_async()
            .await;

        let remote = RemoteCommentary::from_config(&config_with(
            Some(("key-a", bad.url())),
            Some(("key-b", good.url())),
        ))
        .unwrap();

        let insights = remote.generate("prompt").await.expect("second tier succeeds");
        assert_eq!(insights.achievements.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_reply_counts_as_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_body("no sections here"))
            .create_async()
            .await;

        let remote =
            RemoteCommentary::from_config(&config_with(Some(("key", server.url())), None))
                .unwrap();
        assert!(remote.generate("prompt").await.is_none());
    }
}
