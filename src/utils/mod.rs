//! Common utilities
//!
//! Cache locations and credentials for the external model services.

use crate::error::RagError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the Google Generative Language API key
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Base URL of the Google Generative Language REST API
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Request header carrying the API key
pub const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

/// Get the default cache directory
pub fn get_cache_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
    let cache_dir = Path::new(&home).join(".cache/recipe-rag");
    fs::create_dir_all(&cache_dir)
        .context(format!("Failed to create cache directory: {:?}", cache_dir))?;
    Ok(cache_dir)
}

/// Get the default location of the persisted dense index
pub fn default_index_dir() -> Result<PathBuf> {
    Ok(get_cache_dir()?.join("index"))
}

/// Read the Gemini API key from the environment
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(GOOGLE_API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(RagError::MissingApiKey(GOOGLE_API_KEY_ENV).into()),
    }
}

/// Describe a transport failure without the request URL
pub fn transport_error(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

/// Whether a directory exists and holds at least one entry
pub fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
