//! Common types used across OPTCG tools

mod card;
mod pack;

pub use card::{Card, CardAttribute, CardCategory, CardColor, CardRarity};
pub use pack::{flatten_title, process_title_parts, Pack, TitleParts};
