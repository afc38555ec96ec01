//! Field extraction from the card list HTML
//!
//! Value containers on the card list carry a label element before the value
//! (`<div class="cost"><h3>Cost</h3>4</div>`). Only the container's own text
//! nodes are read, so labels never leak into values.

use std::sync::LazyLock;

use optcg_common::types::{
    flatten_title, Card, CardAttribute, CardCategory, CardColor, CardRarity, Pack,
};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::warn;

use crate::error::{CardParseError, IngestError};

struct Selectors {
    series_option: Selector,
    result_anchor: Selector,
    card_dl: Selector,
    name: Selector,
    rarity: Selector,
    category: Selector,
    image: Selector,
    color: Selector,
    cost: Selector,
    attribute: Selector,
    power: Selector,
    counter: Selector,
    feature: Selector,
    text: Selector,
    trigger: Selector,
}

#[allow(clippy::expect_used)]
static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| {
    let parse = |s: &str| Selector::parse(s).expect("valid selector");
    Selectors {
        series_option: parse("div.seriesCol>select#series>option"),
        result_anchor: parse("div.resultCol>a"),
        card_dl: parse("dl"),
        name: parse("dt>div.cardName"),
        rarity: parse("dt>div.infoCol>span:nth-child(2)"),
        category: parse("dt>div.infoCol>span:nth-child(3)"),
        image: parse("dd>div.frontCol>img"),
        color: parse("dd>div.backCol div.color"),
        cost: parse("dd>div.backCol>div.col2>div.cost"),
        attribute: parse("dd>div.backCol>div.col2>div.attribute>img"),
        power: parse("dd>div.backCol>div.col2>div.power"),
        counter: parse("dd>div.backCol>div.col2>div.counter"),
        feature: parse("dd>div.backCol>div.feature"),
        text: parse("dd>div.backCol>div.text"),
        trigger: parse("dd>div.backCol>div.trigger"),
    }
});

/// Read every pack offered by the series selector on the index page
pub fn extract_packs(html: &str) -> Vec<Pack> {
    let document = Html::parse_document(html);

    document
        .select(&SELECTORS.series_option)
        .filter_map(|option| {
            let id = option.value().attr("value")?.trim();
            if id.is_empty() {
                return None;
            }
            let raw_title = flatten_title(&option.inner_html());
            Some(Pack::from_raw_title(id, raw_title.trim()))
        })
        .collect()
}

/// Extract every card on a pack page, skipping cards that fail to parse
pub fn extract_cards(html: &str, pack_id: &str, base_url: &str) -> Vec<Card> {
    let document = Html::parse_document(html);
    let mut cards = Vec::new();

    for anchor in document.select(&SELECTORS.result_anchor) {
        let Some(target) = anchor.value().attr("data-src") else {
            continue;
        };
        let card_id = target.strip_prefix('#').unwrap_or(target);

        match extract_card(&document, card_id, pack_id, base_url) {
            Ok(card) => cards.push(card),
            Err(e) => {
                let field = e.field.unwrap_or("-");
                let error = IngestError::from(e);
                warn!(
                    card_id = %card_id,
                    pack_id = %pack_id,
                    field,
                    error = %error,
                    "Failed to extract card, skipping"
                );
            },
        }
    }

    cards
}

/// Extract the card whose details live in `dl#<card_id>`
pub fn extract_card(
    document: &Html,
    card_id: &str,
    pack_id: &str,
    base_url: &str,
) -> Result<Card, CardParseError> {
    let dl = document
        .select(&SELECTORS.card_dl)
        .find(|dl| dl.value().id() == Some(card_id))
        .ok_or_else(|| CardParseError::new(format!("Card element not found for ID: {}", card_id)))?;

    let name = dl
        .select(&SELECTORS.name)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .ok_or_else(|| CardParseError::field("name", "Card name not found"))?;

    let rarity = required_text(dl, &SELECTORS.rarity, "rarity")
        .and_then(|raw| {
            CardRarity::from_site_label(&raw).map_err(|e| CardParseError::field("rarity", e.to_string()))
        })?;

    let category = required_text(dl, &SELECTORS.category, "category").and_then(|raw| {
        CardCategory::from_site_label(&raw)
            .map_err(|e| CardParseError::field("category", e.to_string()))
    })?;

    Ok(Card {
        id: card_id.to_string(),
        pack_id: pack_id.to_string(),
        name,
        rarity,
        category,
        img_url: image_url(dl, base_url)?,
        colors: colors(dl),
        cost: optional_number(dl, &SELECTORS.cost, "cost")?,
        attributes: attributes(dl),
        power: optional_number(dl, &SELECTORS.power, "power")?,
        counter: optional_number(dl, &SELECTORS.counter, "counter")?,
        types: own_text_of(dl, &SELECTORS.feature)
            .map(|raw| split_slash(&raw))
            .unwrap_or_default(),
        effect: own_text_of(dl, &SELECTORS.text).unwrap_or_default(),
        trigger: own_text_of(dl, &SELECTORS.trigger).filter(|t| !t.is_empty()),
    })
}

/// Text of an element excluding its child elements; `<br>` becomes a newline
fn own_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {},
        }
    }
    text.trim().to_string()
}

fn own_text_of(dl: ElementRef<'_>, selector: &Selector) -> Option<String> {
    dl.select(selector).next().map(own_text)
}

fn required_text(
    dl: ElementRef<'_>,
    selector: &Selector,
    field: &'static str,
) -> Result<String, CardParseError> {
    dl.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .ok_or_else(|| CardParseError::field(field, format!("Card {} not found", field)))
}

fn image_url(dl: ElementRef<'_>, base_url: &str) -> Result<String, CardParseError> {
    let img = dl
        .select(&SELECTORS.image)
        .next()
        .ok_or_else(|| CardParseError::field("img_url", "Card image not found"))?;

    let src = img
        .value()
        .attr("data-src")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CardParseError::field("img_url", "No data-src attr found"))?;

    Ok(match src.strip_prefix("../") {
        Some(relative) => format!("{}/{}", base_url.trim_end_matches('/'), relative),
        None => src.to_string(),
    })
}

fn split_slash(raw: &str) -> Vec<String> {
    raw.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn colors(dl: ElementRef<'_>) -> Vec<CardColor> {
    let Some(raw) = own_text_of(dl, &SELECTORS.color) else {
        return Vec::new();
    };

    split_slash(&raw)
        .iter()
        .filter_map(|label| match CardColor::from_site_label(label) {
            Ok(color) => Some(color),
            Err(_) => {
                warn!(color = %label, "Unknown color");
                None
            },
        })
        .collect()
}

fn attributes(dl: ElementRef<'_>) -> Vec<CardAttribute> {
    let Some(alt) = dl
        .select(&SELECTORS.attribute)
        .next()
        .and_then(|img| img.value().attr("alt"))
    else {
        return Vec::new();
    };

    split_slash(alt)
        .iter()
        .filter_map(|label| match CardAttribute::from_site_label(label) {
            Ok(attribute) => Some(attribute),
            Err(_) => {
                warn!(attribute = %label, "Unknown attribute");
                None
            },
        })
        .collect()
}

/// Absent or `-` is no value; anything else must be an integer
fn optional_number(
    dl: ElementRef<'_>,
    selector: &Selector,
    field: &'static str,
) -> Result<Option<i64>, CardParseError> {
    let Some(raw) = own_text_of(dl, selector) else {
        return Ok(None);
    };

    if raw == "-" {
        return Ok(None);
    }

    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| CardParseError::field(field, format!("Failed to parse {}: {}", field, raw)))
}
