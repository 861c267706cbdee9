use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Catalog models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub picture: String,
    #[serde(rename = "priceUsd")]
    pub price_usd: PriceUsd,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceUsd {
    pub currency_code: String,
    #[serde(default)]
    pub units: i64,
    #[serde(default)]
    pub nanos: i32,
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub products: Vec<Product>,
}

/// Per-user state carried across workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub preferences: HashMap<String, String>,
    #[serde(default)]
    pub history: VecDeque<String>,
    #[serde(default)]
    pub cart_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferences: HashMap::new(),
            history: VecDeque::new(),
            cart_items: Vec::new(),
            location: None,
        }
    }

    /// Appends a query, dropping the oldest entries beyond `limit`.
    pub fn record_query(&mut self, query: &str, limit: usize) {
        self.history.push_back(query.to_string());
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }
}

/// Query classification produced by the search agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductSearch,
    StyleAdvice,
    PriceInquiry,
    SizeHelp,
    OccasionShopping,
    Comparison,
    GeneralHelp,
    #[default]
    GeneralSearch,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::ProductSearch,
        Intent::StyleAdvice,
        Intent::PriceInquiry,
        Intent::SizeHelp,
        Intent::OccasionShopping,
        Intent::Comparison,
        Intent::GeneralHelp,
        Intent::GeneralSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ProductSearch => "product_search",
            Intent::StyleAdvice => "style_advice",
            Intent::PriceInquiry => "price_inquiry",
            Intent::SizeHelp => "size_help",
            Intent::OccasionShopping => "occasion_shopping",
            Intent::Comparison => "comparison",
            Intent::GeneralHelp => "general_help",
            Intent::GeneralSearch => "general_search",
        }
    }

    /// Lenient parse of a model reply: trims whitespace, quotes and case.
    pub fn from_reply(reply: &str) -> Self {
        let cleaned = reply
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .to_lowercase();
        cleaned.parse().unwrap_or_default()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

// Agent communication payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub products: Vec<Product>,
    pub intent: Intent,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Demand {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub stock_level: u32,
    pub demand: Demand,
    pub trending: bool,
    pub seasonal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub status: BTreeMap<String, StockInfo>,
    pub recommendations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub search_results: SearchResults,
    #[serde(default)]
    pub inventory_info: Option<InventoryReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: Vec<String>,
    pub actions: Vec<String>,
    pub personalization_score: f64,
}

/// Request payloads, tagged by message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    ProductSearch(SearchQuery),
    CheckInventory(SearchResults),
    PersonalizedRecommendations(RecommendationInput),
}

impl MessagePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::ProductSearch(_) => "product_search",
            MessagePayload::CheckInventory(_) => "check_inventory",
            MessagePayload::PersonalizedRecommendations(_) => "personalized_recommendations",
        }
    }
}

/// Response payloads, tagged by response type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ResponsePayload {
    SearchResults(SearchResults),
    InventoryStatus(InventoryReport),
    PersonalizedRecommendations(Recommendations),
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    #[serde(flatten)]
    pub payload: MessagePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<UserContext>,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        id: impl Into<String>,
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        payload: MessagePayload,
    ) -> Self {
        Self {
            id: id.into(),
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            payload,
            context: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: UserContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// An agent's answer to one message.
///
/// `success` and `error` are only reachable through the constructors so a
/// successful response never carries an error. Deserialization enforces the
/// same rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AgentResponseWire")]
pub struct AgentResponse {
    pub id: String,
    pub from_agent: String,
    #[serde(flatten)]
    pub payload: ResponsePayload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AgentResponse {
    pub fn success(
        id: impl Into<String>,
        from_agent: impl Into<String>,
        payload: ResponsePayload,
    ) -> Self {
        Self {
            id: id.into(),
            from_agent: from_agent.into(),
            payload,
            next_actions: Vec::new(),
            success: true,
            error: None,
        }
    }

    pub fn failure(
        id: impl Into<String>,
        from_agent: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from_agent: from_agent.into(),
            payload: ResponsePayload::Empty,
            next_actions: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Stand-in for an enrichment stage that did not produce anything.
    pub fn degraded(id: impl Into<String>, from_agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_agent: from_agent.into(),
            payload: ResponsePayload::Empty,
            next_actions: Vec::new(),
            success: false,
            error: None,
        }
    }

    pub fn with_next_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Deserialize)]
struct AgentResponseWire {
    id: String,
    from_agent: String,
    #[serde(flatten)]
    payload: ResponsePayload,
    #[serde(default)]
    next_actions: Vec<String>,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<AgentResponseWire> for AgentResponse {
    type Error = String;

    fn try_from(wire: AgentResponseWire) -> Result<Self, Self::Error> {
        if wire.success && wire.error.is_some() {
            return Err(format!(
                "response {} from {} is marked successful but carries an error",
                wire.id, wire.from_agent
            ));
        }
        Ok(Self {
            id: wire.id,
            from_agent: wire.from_agent,
            payload: wire.payload,
            next_actions: wire.next_actions,
            success: wire.success,
            error: wire.error,
        })
    }
}

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub const ANONYMOUS_USER: &str = "anonymous_user";

impl ChatRequest {
    pub fn user_id(&self) -> &str {
        match self.user_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => ANONYMOUS_USER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelesteResponse {
    pub message: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub actions: Vec<String>,
    pub workflow_id: String,
    pub agent_path: Vec<String>,
    pub personalized: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agents: Vec<String>,
    pub agent_count: usize,
}
