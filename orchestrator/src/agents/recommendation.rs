// Recommendation Agent: Intent-driven suggestions personalized by user history

use async_trait::async_trait;
use tracing::info;

use super::{Agent, AgentContext, RECOMMENDATION_AGENT};
use crate::error::AgentError;
use crate::models::{
    AgentMessage, AgentResponse, Intent, MessagePayload, Recommendations, ResponsePayload,
    SearchResults, UserContext,
};

// Topic named in a recommendation -> history keywords that make it relevant.
const RELEVANCE: &[(&str, &[&str])] = &[
    ("style", &["style", "outfit", "look", "fashion"]),
    ("price", &["price", "cost", "cheap", "expensive", "deal"]),
    ("size", &["size", "fit", "large", "small", "medium"]),
    ("occasion", &["wedding", "party", "work", "casual", "formal"]),
];

#[derive(Debug, Default)]
pub struct RecommendationAgent;

impl RecommendationAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for RecommendationAgent {
    fn id(&self) -> &str {
        RECOMMENDATION_AGENT
    }

    async fn process(
        &self,
        _ctx: &AgentContext,
        message: AgentMessage,
    ) -> Result<AgentResponse, AgentError> {
        let input = match message.payload {
            MessagePayload::PersonalizedRecommendations(input) => input,
            other => {
                return Err(AgentError::validation(
                    RECOMMENDATION_AGENT,
                    format!("expected personalized_recommendations, got {}", other.kind()),
                ))
            }
        };
        let user = message.context.as_ref();

        let recommendations = personalize(base_recommendations(input.search_results.intent), user);
        let actions = next_actions(&input.search_results, user);
        let personalization_score = personalization_score(user);

        info!(
            intent = %input.search_results.intent,
            has_inventory = input.inventory_info.is_some(),
            score = personalization_score,
            "Recommendation: generated suggestions"
        );

        Ok(AgentResponse::success(
            message.id,
            RECOMMENDATION_AGENT,
            ResponsePayload::PersonalizedRecommendations(Recommendations {
                recommendations,
                actions: actions.clone(),
                personalization_score,
            }),
        )
        .with_next_actions(actions))
    }
}

fn base_recommendations(intent: Intent) -> Vec<String> {
    let recs: &[&str] = match intent {
        Intent::ProductSearch => &["View similar items", "Add to cart", "Compare prices"],
        Intent::StyleAdvice => &["Get style guide", "See outfit suggestions", "Book style consultation"],
        Intent::OccasionShopping => &["Complete the look", "See accessories", "Size guidance"],
        Intent::PriceInquiry => &["Price alerts", "Compare alternatives", "See deals"],
        Intent::SizeHelp => &["Size chart", "Virtual fitting", "Exchange policy"],
        _ => &["Browse categories", "Get recommendations", "Contact support"],
    };
    recs.iter().map(|r| r.to_string()).collect()
}

/// Drops topical recommendations the user's history shows no interest in.
fn personalize(base: Vec<String>, user: Option<&UserContext>) -> Vec<String> {
    let Some(user) = user.filter(|u| !u.history.is_empty()) else {
        return base;
    };

    let recent = user
        .history
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let personalized: Vec<String> = base
        .iter()
        .filter(|rec| is_relevant(rec, &recent))
        .cloned()
        .collect();

    if personalized.is_empty() {
        base
    } else {
        personalized
    }
}

fn is_relevant(recommendation: &str, recent_queries: &str) -> bool {
    let recommendation = recommendation.to_lowercase();
    let mut topical = false;
    for (topic, keywords) in RELEVANCE {
        if recommendation.contains(topic) {
            topical = true;
            if keywords.iter().any(|k| recent_queries.contains(k)) {
                return true;
            }
        }
    }
    !topical
}

fn next_actions(results: &SearchResults, user: Option<&UserContext>) -> Vec<String> {
    let mut actions = Vec::new();
    if !results.products.is_empty() {
        actions.extend(["Add to cart", "Save to wishlist"]);
    }
    if user.is_some_and(|u| u.history.len() > 2) {
        actions.extend(["View browsing history", "Get personalized suggestions"]);
    }
    actions.extend(["Continue shopping", "Get styling advice"]);
    actions.into_iter().map(String::from).collect()
}

fn personalization_score(user: Option<&UserContext>) -> f64 {
    let Some(user) = user else {
        return 0.0;
    };

    let mut score = 0.0;
    if !user.history.is_empty() {
        score += 0.3;
    }
    if !user.preferences.is_empty() {
        score += 0.4;
    }
    if !user.cart_items.is_empty() {
        score += 0.3;
    }
    score
}
