//! Common test utilities for ingestion integration tests
//!
//! - [`MemoryBridge`]: an in-memory `packs`/`cards` store behind the
//!   [`QueryBridge`] interface, scriptable to fail whole calls or single
//!   statements
//! - [`MemorySource`]: a fixed catalog behind [`CatalogSource`], scriptable
//!   to fail discovery, pack pages or assets
//! - builders for packs and cards

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use optcg_common::types::{Card, CardCategory, CardColor, CardRarity, Pack};
use optcg_ingest::bridge::{QueryBridge, RawOutput, SqlValue, Statement, StatementResult};
use optcg_ingest::source::CatalogSource;
use optcg_ingest::{IngestError, Result};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

pub fn pack(id: &str) -> Pack {
    Pack::from_raw_title(id, format!("BOOSTER PACK -PACK {}- [OP-{}]", id, id))
}

pub fn card(id: &str, pack_id: &str) -> Card {
    card_named(id, pack_id, &format!("Card {}", id))
}

pub fn card_named(id: &str, pack_id: &str, name: &str) -> Card {
    Card {
        id: id.to_string(),
        pack_id: pack_id.to_string(),
        name: name.to_string(),
        rarity: CardRarity::Common,
        category: CardCategory::Character,
        img_url: format!("https://example.test/images/cardlist/card/{}.png?1", id),
        colors: vec![CardColor::Red],
        cost: Some(2),
        attributes: vec![],
        power: Some(3000),
        counter: Some(1000),
        types: vec!["Straw Hat Crew".to_string()],
        effect: String::new(),
        trigger: None,
    }
}

/// `count` cards with ids `<prefix>-001`, `<prefix>-002`, ...
pub fn cards(prefix: &str, pack_id: &str, count: usize) -> Vec<Card> {
    (1..=count)
        .map(|n| card(&format!("{}-{:03}", prefix, n), pack_id))
        .collect()
}

// ============================================================================
// In-memory bridge
// ============================================================================

#[derive(Debug, Default)]
struct BridgeState {
    /// table -> id -> bound values of the last upsert
    tables: HashMap<String, BTreeMap<String, Vec<SqlValue>>>,
    /// Sizes of every `execute_many` call, in order
    calls: Vec<usize>,
    /// 1-based call numbers that fail as a whole
    failing_calls: HashSet<usize>,
    fail_everything: bool,
    /// id -> remaining statement failures
    failing_keys: HashMap<String, usize>,
    /// Every id submitted for upsert, in order
    upserted: Vec<String>,
    hide_ids: bool,
    fail_queries: bool,
}

/// In-memory stand-in for the D1 bridge
#[derive(Debug, Clone, Default)]
pub struct MemoryBridge {
    state: Arc<Mutex<BridgeState>>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap()
    }

    /// Fail the `n`th batch call (1-based) as if the bridge process crashed
    pub fn fail_call(&self, n: usize) {
        self.lock().failing_calls.insert(n);
    }

    /// Fail every call
    pub fn fail_everything(&self) {
        self.lock().fail_everything = true;
    }

    /// Fail the statement for `id` the next `times` times it is submitted
    pub fn fail_key(&self, id: &str, times: usize) {
        self.lock().failing_keys.insert(id.to_string(), times);
    }

    /// Make id lookups return no rows while counts stay accurate
    pub fn hide_ids(&self) {
        self.lock().hide_ids = true;
    }

    pub fn fail_queries(&self) {
        self.lock().fail_queries = true;
    }

    /// Insert a card row directly
    pub fn seed_card(&self, card: &Card) {
        let row = card_row(card);
        self.lock()
            .tables
            .entry("cards".to_string())
            .or_default()
            .insert(card.id.clone(), row);
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.lock().calls.clone()
    }

    pub fn upserted_ids(&self) -> Vec<String> {
        self.lock().upserted.clone()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, BTreeMap::len)
    }

    pub fn ids(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Bound value `column` (0-based) of the stored row for `id`
    pub fn column(&self, table: &str, id: &str, column: usize) -> Option<SqlValue> {
        self.lock()
            .tables
            .get(table)?
            .get(id)?
            .get(column)
            .cloned()
    }
}

fn card_row(card: &Card) -> Vec<SqlValue> {
    vec![
        SqlValue::from(&card.id),
        SqlValue::from(&card.pack_id),
        SqlValue::from(&card.name),
    ]
}

fn table_of(sql: &str) -> Option<&'static str> {
    if sql.contains("INTO packs") || sql.contains("FROM packs") {
        Some("packs")
    } else if sql.contains("INTO cards") || sql.contains("FROM cards") {
        Some("cards")
    } else {
        None
    }
}

#[async_trait]
impl QueryBridge for MemoryBridge {
    async fn execute(&self, _sql: &str) -> Result<RawOutput> {
        Ok(RawOutput::Opaque(String::new()))
    }

    async fn execute_many(&self, statements: &[Statement]) -> Result<Vec<StatementResult>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.lock();
        state.calls.push(statements.len());
        let call = state.calls.len();

        if state.fail_everything || state.failing_calls.contains(&call) {
            return Err(IngestError::BridgeExecution(format!(
                "wrangler command failed (exit code 1): simulated crash on call {}",
                call
            )));
        }

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let table = table_of(statement.sql()).unwrap_or("unknown");
            let id = statement
                .params()
                .first()
                .and_then(SqlValue::as_text)
                .unwrap_or_default()
                .to_string();
            state.upserted.push(id.clone());

            if let Some(remaining) = state.failing_keys.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    results.push(StatementResult::failed(format!(
                        "D1_ERROR: constraint failed for {}",
                        id
                    )));
                    continue;
                }
            }

            state
                .tables
                .entry(table.to_string())
                .or_default()
                .insert(id, statement.params().to_vec());
            results.push(StatementResult::opaque_success());
        }

        Ok(results)
    }

    async fn query(&self, statement: &Statement) -> Result<StatementResult> {
        let state = self.lock();

        if state.fail_everything || state.fail_queries {
            return Err(IngestError::BridgeExecution(
                "wrangler command failed (exit code 1): simulated query failure".to_string(),
            ));
        }

        let sql = statement.sql();
        let table = table_of(sql).unwrap_or("unknown");
        let rows = state.tables.get(table).cloned().unwrap_or_default();

        let results = if sql.contains("COUNT(*)") {
            vec![json!({ "count": rows.len() })]
        } else if state.hide_ids {
            Vec::new()
        } else {
            let pack_filter = statement.params().first().and_then(SqlValue::as_text);
            rows.iter()
                .filter(|(_, values)| {
                    pack_filter.map_or(true, |pack_id| {
                        values.get(1).and_then(SqlValue::as_text) == Some(pack_id)
                    })
                })
                .map(|(id, _)| json!({ "id": id }))
                .collect()
        };

        let output = RawOutput::Json(json!([{ "success": true, "results": results }]));
        Ok(output.first_result())
    }
}

// ============================================================================
// In-memory catalog source
// ============================================================================

#[derive(Debug, Default)]
struct SourceState {
    packs: Vec<Pack>,
    cards: HashMap<String, Vec<Card>>,
    fail_discovery: bool,
    failing_packs: HashSet<String>,
    failing_assets: HashSet<String>,
    fetched: Vec<String>,
}

/// Fixed catalog served from memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap()
    }

    pub fn with_pack(self, pack: Pack, cards: Vec<Card>) -> Self {
        {
            let mut state = self.lock();
            state.cards.insert(pack.id.clone(), cards);
            state.packs.push(pack);
        }
        self
    }

    pub fn fail_discovery(&self) {
        self.lock().fail_discovery = true;
    }

    pub fn fail_pack(&self, pack_id: &str) {
        self.lock().failing_packs.insert(pack_id.to_string());
    }

    pub fn fail_asset(&self, card_id: &str) {
        self.lock().failing_assets.insert(card_id.to_string());
    }

    /// Pack ids whose cards were requested, in order
    pub fn fetched_packs(&self) -> Vec<String> {
        self.lock().fetched.clone()
    }
}

#[async_trait]
impl CatalogSource for MemorySource {
    async fn discover_packs(&self) -> Result<Vec<Pack>> {
        let state = self.lock();
        if state.fail_discovery {
            return Err(IngestError::fetch(
                "https://example.test/cardlist",
                "HTTP 503 Service Unavailable",
            ));
        }
        Ok(state.packs.clone())
    }

    async fn fetch_cards(&self, pack_id: &str) -> Result<Vec<Card>> {
        let mut state = self.lock();
        state.fetched.push(pack_id.to_string());

        if state.failing_packs.contains(pack_id) {
            return Err(IngestError::fetch(
                format!("https://example.test/cardlist?series={}", pack_id),
                "HTTP 500 Internal Server Error",
            ));
        }
        Ok(state.cards.get(pack_id).cloned().unwrap_or_default())
    }

    async fn fetch_asset(&self, card: &Card) -> Result<Vec<u8>> {
        if self.lock().failing_assets.contains(&card.id) {
            return Err(IngestError::fetch(&card.img_url, "HTTP 404 Not Found"));
        }
        Ok(format!("image:{}", card.id).into_bytes())
    }
}
