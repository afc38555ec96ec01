//! Cards and their enumerated fields

use crate::error::{OptcgError, Result};
use serde::{Deserialize, Serialize};

/// Card rarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardRarity {
    Common,
    Uncommon,
    Rare,
    SuperRare,
    SecretRare,
    Leader,
    Special,
    TreasureRare,
    Promo,
}

impl CardRarity {
    /// Map the abbreviation printed on the card list (`"SR"`, `"SP CARD"`, ...)
    pub fn from_site_label(label: &str) -> Result<Self> {
        match label.trim() {
            "C" => Ok(CardRarity::Common),
            "UC" => Ok(CardRarity::Uncommon),
            "R" => Ok(CardRarity::Rare),
            "SR" => Ok(CardRarity::SuperRare),
            "SEC" => Ok(CardRarity::SecretRare),
            "L" => Ok(CardRarity::Leader),
            "SP CARD" => Ok(CardRarity::Special),
            "TR" => Ok(CardRarity::TreasureRare),
            "P" => Ok(CardRarity::Promo),
            other => Err(OptcgError::unknown("rarity", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardRarity::Common => "common",
            CardRarity::Uncommon => "uncommon",
            CardRarity::Rare => "rare",
            CardRarity::SuperRare => "super_rare",
            CardRarity::SecretRare => "secret_rare",
            CardRarity::Leader => "leader",
            CardRarity::Special => "special",
            CardRarity::TreasureRare => "treasure_rare",
            CardRarity::Promo => "promo",
        }
    }
}

/// Card category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    Leader,
    Character,
    Event,
    Stage,
    Don,
}

impl CardCategory {
    pub fn from_site_label(label: &str) -> Result<Self> {
        match label.trim() {
            "LEADER" => Ok(CardCategory::Leader),
            "CHARACTER" => Ok(CardCategory::Character),
            "EVENT" => Ok(CardCategory::Event),
            "STAGE" => Ok(CardCategory::Stage),
            "DON" => Ok(CardCategory::Don),
            other => Err(OptcgError::unknown("category", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardCategory::Leader => "leader",
            CardCategory::Character => "character",
            CardCategory::Event => "event",
            CardCategory::Stage => "stage",
            CardCategory::Don => "don",
        }
    }
}

/// Card color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardColor {
    Red,
    Green,
    Blue,
    Purple,
    Black,
    Yellow,
}

impl CardColor {
    pub fn from_site_label(label: &str) -> Result<Self> {
        match label.trim() {
            "Red" => Ok(CardColor::Red),
            "Green" => Ok(CardColor::Green),
            "Blue" => Ok(CardColor::Blue),
            "Purple" => Ok(CardColor::Purple),
            "Black" => Ok(CardColor::Black),
            "Yellow" => Ok(CardColor::Yellow),
            other => Err(OptcgError::unknown("color", other)),
        }
    }
}

/// Card battle attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardAttribute {
    Slash,
    Strike,
    Ranged,
    Special,
    Wisdom,
}

impl CardAttribute {
    pub fn from_site_label(label: &str) -> Result<Self> {
        match label.trim() {
            "Slash" => Ok(CardAttribute::Slash),
            "Strike" => Ok(CardAttribute::Strike),
            "Ranged" => Ok(CardAttribute::Ranged),
            "Special" => Ok(CardAttribute::Special),
            "Wisdom" => Ok(CardAttribute::Wisdom),
            other => Err(OptcgError::unknown("attribute", other)),
        }
    }
}

/// One card as extracted from a pack's card list page.
///
/// The id is unique per source but not across packs: reprints carry the
/// same id in several packs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub pack_id: String,
    pub name: String,
    pub rarity: CardRarity,
    pub category: CardCategory,
    pub img_url: String,
    pub colors: Vec<CardColor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<i64>,

    pub attributes: Vec<CardAttribute>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<i64>,

    pub types: Vec<String>,
    pub effect: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}
