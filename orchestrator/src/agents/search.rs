// Search Agent: Classifies the query and matches it against the product catalog

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{Agent, AgentContext, SEARCH_AGENT};
use crate::error::AgentError;
use crate::llm::TextGenerator;
use crate::models::{
    AgentMessage, AgentResponse, Catalog, Intent, MessagePayload, Product, ResponsePayload,
    SearchResults,
};

const MAX_MATCHES: usize = 4;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("shoes", &["boots", "trainers", "footwear"]),
    ("top", &["shirt", "tank", "clothing"]),
    ("bag", &["tote", "handbag", "accessory"]),
    ("dress", &["gown", "outfit", "clothing"]),
];

pub struct SearchAgent {
    catalog_path: PathBuf,
    generator: Arc<dyn TextGenerator>,
    catalog: RwLock<Arc<Vec<Product>>>,
}

impl SearchAgent {
    pub fn new(catalog_path: impl Into<PathBuf>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            generator,
            catalog: RwLock::new(Arc::new(Vec::new())),
        }
    }

    async fn analyze_intent(&self, ctx: &AgentContext, query: &str) -> Result<Intent, AgentError> {
        let prompt = format!(
            "Analyze this query and return one classification:\n\
             Query: \"{}\"\n\n\
             Classifications: product_search, style_advice, price_inquiry, size_help, \
             occasion_shopping, comparison, general_help\n\n\
             Return only the classification.",
            query
        );

        let reply = ctx.run(self.generator.generate(&prompt)).await??;
        Ok(Intent::from_reply(&reply))
    }
}

#[async_trait]
impl Agent for SearchAgent {
    fn id(&self) -> &str {
        SEARCH_AGENT
    }

    async fn initialize(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        let data = tokio::fs::read_to_string(&self.catalog_path)
            .await
            .map_err(|e| {
                AgentError::initialization(
                    SEARCH_AGENT,
                    format!("reading {}: {}", self.catalog_path.display(), e),
                )
            })?;

        let catalog: Catalog = serde_json::from_str(&data)
            .map_err(|e| AgentError::initialization(SEARCH_AGENT, e))?;

        info!(
            products = catalog.products.len(),
            path = %self.catalog_path.display(),
            "Search: catalog loaded"
        );
        *self.catalog.write().await = Arc::new(catalog.products);
        Ok(())
    }

    async fn process(
        &self,
        ctx: &AgentContext,
        message: AgentMessage,
    ) -> Result<AgentResponse, AgentError> {
        let query = match message.payload {
            MessagePayload::ProductSearch(search) => search.query,
            other => {
                return Err(AgentError::validation(
                    SEARCH_AGENT,
                    format!("expected product_search, got {}", other.kind()),
                ))
            }
        };

        let intent = match self.analyze_intent(ctx, &query).await {
            Ok(intent) => intent,
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Search: intent analysis failed, using general_search");
                Intent::GeneralSearch
            }
        };

        let catalog = self.catalog.read().await.clone();
        let products = search_catalog(&catalog, &query);
        info!(query = %query, intent = %intent, matches = products.len(), "Search: done");

        Ok(AgentResponse::success(
            message.id,
            SEARCH_AGENT,
            ResponsePayload::SearchResults(SearchResults {
                products,
                intent,
                query,
            }),
        )
        .with_next_actions(["check_inventory", "get_recommendations"]))
    }
}

/// Keyword scoring over the catalog; keeps up to four matches in catalog order.
pub fn search_catalog(catalog: &[Product], query: &str) -> Vec<Product> {
    let query_lower = query.to_lowercase();

    catalog
        .iter()
        .filter(|product| score(product, &query_lower) > 0)
        .take(MAX_MATCHES)
        .cloned()
        .collect()
}

fn score(product: &Product, query_lower: &str) -> u32 {
    let name = product.name.to_lowercase();
    let description = product.description.to_lowercase();
    let mut score = 0;

    if name.contains(query_lower) {
        score += 5;
    }
    if description.contains(query_lower) {
        score += 3;
    }

    score += product
        .categories
        .iter()
        .filter(|category| query_lower.contains(category.to_lowercase().as_str()))
        .count() as u32
        * 2;

    for (term, synonyms) in SYNONYMS {
        if query_lower.contains(term) {
            score += synonyms.iter().filter(|syn| name.contains(*syn)).count() as u32 * 2;
        }
    }

    score
}
