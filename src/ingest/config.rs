// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "MEETUP_SOURCES_PATH";

/// Groups polled when no sources file is configured.
pub const DEFAULT_SOURCES: [&str; 3] = [
    "Boulder-Gophers",
    "Denver-Go-Language-User-Group",
    "Denver-Go-Programming-Language-Meetup",
];

pub fn default_sources() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// On-disk encodings accepted for the source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourcesFormat {
    /// `sources = ["Group-A", ...]`
    Toml,
    /// `["Group-A", ...]`
    Json,
}

impl SourcesFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load the source list from an explicit path.
///
/// `.toml` and `.json` files are parsed strictly in that format; any other
/// extension is tried as JSON first, then as TOML.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading meetup sources from {}", path.display()))?;
    parse_sources(&content, SourcesFormat::from_path(path))
        .with_context(|| format!("parsing meetup sources in {}", path.display()))
}

/// Load the source list using env var + fallbacks:
/// 1) $MEETUP_SOURCES_PATH
/// 2) config/meetup_sources.toml
/// 3) config/meetup_sources.json
/// 4) the compiled-in [`DEFAULT_SOURCES`]
pub fn load_sources_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!(
                "{ENV_PATH} points to non-existent path {}",
                pb.display()
            ));
        }
        return load_sources_from(&pb);
    }
    ["config/meetup_sources.toml", "config/meetup_sources.json"]
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map_or_else(|| Ok(default_sources()), load_sources_from)
}

fn parse_sources(s: &str, format: Option<SourcesFormat>) -> Result<Vec<String>> {
    match format {
        Some(SourcesFormat::Toml) => parse_toml(s),
        Some(SourcesFormat::Json) => parse_json(s),
        None => parse_json(s)
            .or_else(|_| parse_toml(s))
            .map_err(|_| anyhow!("unsupported meetup sources format")),
    }
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<String>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

// Trim, drop empties and duplicates; keep first-seen order. That is only the
// fetch order: snapshots key groups by name, so the page lists them sorted.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
