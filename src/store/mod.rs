use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::AssetsConfig;
use crate::models::{AssetRecord, CelebrityInfo, Gender};

/// In-memory set of reference images plus the normalized metadata table.
///
/// A snapshot is immutable once built; `AssetStore::reload` builds a fresh
/// one and swaps it in a single `Arc` replacement, so concurrent readers
/// see either the old set or the new set, never a partial one.
#[derive(Debug, Default)]
pub struct AssetSnapshot {
    pub records: Vec<AssetRecord>,
    pub metadata: Vec<CelebrityInfo>,
}

impl AssetSnapshot {
    /// Exact case-insensitive match on the canonical name field.
    pub fn lookup(&self, name: &str) -> Option<&CelebrityInfo> {
        self.metadata
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
    }

    pub fn find_record(&self, display_name: &str) -> Option<&AssetRecord> {
        self.records
            .iter()
            .find(|r| r.display_name.eq_ignore_ascii_case(display_name))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub images: usize,
    pub metadata_records: usize,
}

pub struct AssetStore {
    config: AssetsConfig,
    snapshot: RwLock<Arc<AssetSnapshot>>,
}

impl AssetStore {
    /// Scans the configured directory and metadata table. Read failures
    /// are logged and leave the affected part empty; construction itself
    /// never fails.
    pub fn load(config: AssetsConfig) -> Self {
        let snapshot = Arc::new(build_snapshot(&config));
        info!(
            "Asset store loaded: {} images, {} metadata records",
            snapshot.records.len(),
            snapshot.metadata.len()
        );
        Self {
            config,
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Rebuilds the snapshot from disk and swaps it in atomically.
    pub fn reload(&self) -> StoreStats {
        let fresh = Arc::new(build_snapshot(&self.config));
        let stats = StoreStats {
            images: fresh.records.len(),
            metadata_records: fresh.metadata.len(),
        };
        *self.snapshot.write().expect("asset store lock poisoned") = fresh;
        info!(
            "Asset store reloaded: {} images, {} metadata records",
            stats.images, stats.metadata_records
        );
        stats
    }

    pub fn snapshot(&self) -> Arc<AssetSnapshot> {
        self.snapshot.read().expect("asset store lock poisoned").clone()
    }

    pub fn stats(&self) -> StoreStats {
        let snapshot = self.snapshot();
        StoreStats {
            images: snapshot.records.len(),
            metadata_records: snapshot.metadata.len(),
        }
    }
}

fn build_snapshot(config: &AssetsConfig) -> AssetSnapshot {
    let metadata = match &config.metadata_csv {
        Some(path) => load_metadata(path),
        None => Vec::new(),
    };

    let records = scan_images(&config.image_dir, &metadata);

    AssetSnapshot { records, metadata }
}

fn scan_images(dir: &Path, metadata: &[CelebrityInfo]) -> Vec<AssetRecord> {
    if !dir.is_dir() {
        warn!("Celebrity image directory not found: {}", dir.display());
        return Vec::new();
    }

    let mut records = Vec::new();
    let mut seen_hashes = HashSet::new();

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() || !is_image_file(entry.path()) {
            continue;
        }

        let display_name = match entry.path().file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let file_hash = match hash_file(entry.path()) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Failed to hash {}: {}", entry.path().display(), e);
                continue;
            }
        };

        // The downloader scripts that feed this directory produce exact
        // duplicates under different names; keep the first copy only.
        if !seen_hashes.insert(file_hash.clone()) {
            debug!("Skipping duplicate image: {}", entry.path().display());
            continue;
        }

        let info = metadata
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(&display_name))
            .cloned();

        records.push(AssetRecord {
            display_name,
            image_path: entry.path().to_path_buf(),
            file_hash,
            info,
        });
    }

    records.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    records
}

fn is_image_file(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}

fn hash_file(path: &Path) -> anyhow::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn load_metadata(path: &Path) -> Vec<CelebrityInfo> {
    if !path.is_file() {
        warn!("Metadata table not found: {}", path.display());
        return Vec::new();
    }

    match read_metadata(path) {
        Ok(rows) => {
            info!("Loaded {} metadata records from {}", rows.len(), path.display());
            rows
        }
        Err(e) => {
            warn!("Failed to read metadata table {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn read_metadata(path: &Path) -> anyhow::Result<Vec<CelebrityInfo>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(info) = normalize_row(&headers, &record) {
            rows.push(info);
        }
    }
    Ok(rows)
}

/// Collapses the column-name drift across source tables ("Stage Name" vs
/// "name", "Country of Origin" vs "birthplace", ...) into one canonical
/// schema. Normalization happens here, once, so lookups never have to
/// guess at key names.
fn normalize_row(headers: &[String], record: &csv::StringRecord) -> Option<CelebrityInfo> {
    let mut name = None;
    let mut group = None;
    let mut gender = None;
    let mut age = None;
    let mut birthplace = None;
    let mut beauty_score = None;
    let mut extra = BTreeMap::new();

    for (header, value) in headers.iter().zip(record.iter()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match canonical_key(header).as_str() {
            "name" | "stagename" => {
                if name.is_none() {
                    name = Some(value.to_string());
                }
            }
            "group" | "band" => group = Some(value.to_string()),
            "gender" | "sex" => gender = Some(Gender::from_label(value)),
            "age" => age = value.parse().ok(),
            "birthplace" | "country" | "countryoforigin" => {
                birthplace = Some(value.to_string())
            }
            "beautyscore" => beauty_score = value.parse().ok(),
            _ => {
                extra.insert(header.trim().to_string(), value.to_string());
            }
        }
    }

    name.map(|name| CelebrityInfo {
        name,
        group,
        gender,
        age,
        birthplace,
        beauty_score,
        extra,
    })
}

fn canonical_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
