// Local JSON and image snapshot

use std::io;
use std::path::{Path, PathBuf};

use optcg_common::types::{Card, Pack};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{IngestError, Result};

const MAX_FILENAME_CHARS: usize = 100;
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip characters invalid in file names, collapse whitespace, cap the length
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_FILENAME_CHARS).collect()
}

/// `cards_<id> - <title>.json`, falling back to the raw title
pub fn pack_file_name(pack: &Pack) -> String {
    let title = if pack.title_parts.title.is_empty() {
        &pack.raw_title
    } else {
        &pack.title_parts.title
    };
    format!("cards_{}.json", sanitize_filename(&format!("{} - {}", pack.id, title)))
}

/// Last path segment of the image URL, without its query string
pub fn image_file_name(img_url: &str) -> Result<String> {
    let (_, last) = img_url.rsplit_once('/').ok_or_else(|| {
        IngestError::Snapshot(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid image URL: {}", img_url),
        ))
    })?;
    let name = last.split('?').next().unwrap_or(last);
    if name.is_empty() {
        return Err(IngestError::Snapshot(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Image URL has no file name: {}", img_url),
        )));
    }
    Ok(name.to_string())
}

/// Writes `json/` and `images/` under a root directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn json_dir(&self) -> PathBuf {
        self.root.join("json")
    }

    pub fn images_dir(&self, pack_id: &str) -> PathBuf {
        self.root.join("images").join(sanitize_filename(pack_id))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let dir = self.json_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(file_name);
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub async fn write_packs(&self, packs: &[Pack]) -> Result<PathBuf> {
        let path = self.write_json("packs.json", packs).await?;
        info!(packs = packs.len(), path = %path.display(), "Wrote packs");
        Ok(path)
    }

    /// Full card list of one pack, including cards skipped for upload
    pub async fn write_cards(&self, pack: &Pack, cards: &[Card]) -> Result<PathBuf> {
        let file_name = pack_file_name(pack);
        let path = self.write_json(&file_name, cards).await?;
        info!(pack_id = %pack.id, cards = cards.len(), file = %file_name, "Wrote pack cards");
        Ok(path)
    }

    /// Every card of the run in processing order, duplicates included
    pub async fn write_combined(&self, cards: &[Card]) -> Result<PathBuf> {
        let path = self.write_json("all-cards.json", cards).await?;
        info!(cards = cards.len(), path = %path.display(), "Wrote combined cards");
        Ok(path)
    }

    pub async fn write_image(&self, card: &Card, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.images_dir(&card.pack_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(image_file_name(&card.img_url)?);
        tokio::fs::write(&path, bytes).await?;
        debug!(card_id = %card.id, path = %path.display(), "Wrote image");
        Ok(path)
    }
}
