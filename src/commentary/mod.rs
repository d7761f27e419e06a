pub mod providers;
pub mod templates;

use rand::Rng;
use tracing::info;

use crate::config::CommentaryConfig;
use crate::models::{Emotion, Gender, PersonalityInsights};
use providers::RemoteCommentary;

/// Produces the narrative half of a response: personality insights plus
/// the one-line fun comment. Remote providers are optional sugar; the
/// local templates always work.
pub struct CommentaryGenerator {
    remote: Option<RemoteCommentary>,
}

impl CommentaryGenerator {
    pub fn new(config: &CommentaryConfig) -> Self {
        let remote = RemoteCommentary::from_config(config);
        match &remote {
            Some(r) => info!("Remote commentary enabled: {:?}", r.provider_names()),
            None => info!("Remote commentary disabled, using local templates"),
        }
        Self { remote }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn generate(
        &self,
        age: u32,
        gender: Gender,
        beauty_score: f64,
        emotion: Option<Emotion>,
    ) -> (PersonalityInsights, String) {
        let insights = match &self.remote {
            Some(remote) => {
                let prompt = providers::build_prompt(age, gender, beauty_score, emotion);
                match remote.generate(&prompt).await {
                    Some(insights) => insights,
                    None => templates::local_insights(age, gender, beauty_score, emotion),
                }
            }
            None => templates::local_insights(age, gender, beauty_score, emotion),
        };

        // The comment interpolates one of this request's achievements;
        // remote replies may come back without any, so the local bank
        // backstops it.
        let achievement = if insights.achievements.is_empty() {
            templates::pick(templates::achievements_for(beauty_score)).to_string()
        } else {
            let idx = rand::rng().random_range(0..insights.achievements.len());
            insights.achievements[idx].clone()
        };

        let comment = templates::fun_comment(beauty_score, &achievement);
        (insights, comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> CommentaryConfig {
        CommentaryConfig {
            openai_api_key: None,
            openai_base_url: None,
            groq_api_key: None,
            groq_base_url: None,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn local_generation_always_succeeds() {
        let generator = CommentaryGenerator::new(&offline_config());
        assert!(!generator.remote_enabled());

        let (insights, comment) = generator
            .generate(24, Gender::Female, 8.4, Some(Emotion::Happy))
            .await;
        assert!(!insights.is_empty());
        assert!(!comment.is_empty());
    }

    #[tokio::test]
    async fn comment_quotes_one_achievement() {
        let generator = CommentaryGenerator::new(&offline_config());
        let (insights, comment) = generator.generate(30, Gender::Male, 9.5, None).await;

        let quoted = insights
            .achievements
            .iter()
            .any(|a| comment.contains(a.as_str()));
        assert!(quoted);
    }
}
