// Statement builders for the `packs` and `cards` tables

use optcg_common::types::{Card, Pack};

use crate::bridge::Statement;
use crate::error::Result;

const UPSERT_PACK: &str = "INSERT OR REPLACE INTO packs (id, raw_title, title_parts, updated_at) \
     VALUES (?, ?, ?, CURRENT_TIMESTAMP)";

const UPSERT_CARD: &str = "INSERT OR REPLACE INTO cards (id, pack_id, name, rarity, category, \
     img_url, colors, cost, attributes, power, counter, types, effect, trigger, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)";

/// A record that is persisted as one insert-or-replace row keyed by id
pub trait Upsertable: Clone + Send + Sync {
    /// Table name, used in logs
    const TABLE: &'static str;

    fn key(&self) -> &str;

    fn upsert_statement(&self) -> Result<Statement>;
}

impl Upsertable for Pack {
    const TABLE: &'static str = "packs";

    fn key(&self) -> &str {
        &self.id
    }

    fn upsert_statement(&self) -> Result<Statement> {
        Ok(Statement::new(UPSERT_PACK)
            .bind(&self.id)
            .bind(&self.raw_title)
            .bind(serde_json::to_string(&self.title_parts)?))
    }
}

impl Upsertable for Card {
    const TABLE: &'static str = "cards";

    fn key(&self) -> &str {
        &self.id
    }

    fn upsert_statement(&self) -> Result<Statement> {
        Ok(Statement::new(UPSERT_CARD)
            .bind(&self.id)
            .bind(&self.pack_id)
            .bind(&self.name)
            .bind(self.rarity.as_str())
            .bind(self.category.as_str())
            .bind(&self.img_url)
            .bind(serde_json::to_string(&self.colors)?)
            .bind(self.cost)
            .bind(serde_json::to_string(&self.attributes)?)
            .bind(self.power)
            .bind(self.counter)
            .bind(serde_json::to_string(&self.types)?)
            .bind(&self.effect)
            .bind(self.trigger.as_deref()))
    }
}

pub fn select_card_ids(pack_id: Option<&str>) -> Statement {
    match pack_id {
        Some(pack_id) => Statement::new("SELECT id FROM cards WHERE pack_id = ?").bind(pack_id),
        None => Statement::new("SELECT id FROM cards"),
    }
}

pub fn select_pack_ids() -> Statement {
    Statement::new("SELECT id FROM packs")
}

pub fn count_rows(table: &str) -> Statement {
    Statement::new(format!("SELECT COUNT(*) AS count FROM {}", table))
}
