// Inventory Agent: Simulated stock levels and demand for searched products

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::{Agent, AgentContext, INVENTORY_AGENT};
use crate::error::AgentError;
use crate::models::{
    AgentMessage, AgentResponse, Demand, InventoryReport, MessagePayload, Product,
    ResponsePayload, StockInfo,
};

const LOW_STOCK_THRESHOLD: u32 = 10;
const SEASONAL_KEYWORDS: &[&str] = &["summer", "winter", "spring", "fall", "holiday"];
const DEMAND_LEVELS: [Demand; 3] = [Demand::Low, Demand::Medium, Demand::High];

pub struct InventoryAgent {
    rng: Mutex<StdRng>,
}

impl InventoryAgent {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic stock simulation.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn check_inventory_status(&self, products: &[Product]) -> Result<BTreeMap<String, StockInfo>, AgentError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| AgentError::Internal("inventory rng poisoned".to_string()))?;

        Ok(products
            .iter()
            .map(|product| {
                let stock_level = rng.gen_range(1..=50);
                let demand = DEMAND_LEVELS[rng.gen_range(0..DEMAND_LEVELS.len())];
                let info = StockInfo {
                    stock_level,
                    demand,
                    trending: stock_level < LOW_STOCK_THRESHOLD,
                    seasonal: is_seasonal(product),
                };
                (product.id.clone(), info)
            })
            .collect())
    }
}

impl Default for InventoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for InventoryAgent {
    fn id(&self) -> &str {
        INVENTORY_AGENT
    }

    async fn process(
        &self,
        _ctx: &AgentContext,
        message: AgentMessage,
    ) -> Result<AgentResponse, AgentError> {
        let results = match message.payload {
            MessagePayload::CheckInventory(results) => results,
            other => {
                return Err(AgentError::validation(
                    INVENTORY_AGENT,
                    format!("expected check_inventory, got {}", other.kind()),
                ))
            }
        };

        info!(products = results.products.len(), "Inventory: checking stock");
        let status = self.check_inventory_status(&results.products)?;
        let recommendations = stock_recommendations(&results.products, &status);

        Ok(AgentResponse::success(
            message.id,
            INVENTORY_AGENT,
            ResponsePayload::InventoryStatus(InventoryReport {
                status,
                recommendations,
                checked_at: Utc::now(),
            }),
        )
        .with_next_actions(["generate_recommendations", "update_user_context"]))
    }
}

fn is_seasonal(product: &Product) -> bool {
    let name = product.name.to_lowercase();
    let description = product.description.to_lowercase();
    SEASONAL_KEYWORDS.iter().any(|keyword| {
        product.categories.iter().any(|c| c.eq_ignore_ascii_case(keyword))
            || name.contains(keyword)
            || description.contains(keyword)
    })
}

fn stock_recommendations(products: &[Product], status: &BTreeMap<String, StockInfo>) -> Vec<String> {
    let mut recommendations = Vec::new();
    for product in products {
        let Some(info) = status.get(&product.id) else {
            continue;
        };
        if info.stock_level < LOW_STOCK_THRESHOLD {
            recommendations.push(format!("Low stock alert for {}", product.id));
        }
        if info.trending {
            recommendations.push(format!("Trending item: {}", product.id));
        }
    }
    recommendations
}
