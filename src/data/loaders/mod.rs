//! Recipe dataset loaders
//!
//! Supports JSON Lines, JSON arrays and CSV. The multi-format loader tries the
//! loader matching the file extension first and falls back to the others, so a
//! mislabelled file still loads.

use crate::data::{Corpus, RawRecipe, TextOrList};
use crate::error::RagError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Trait for loading raw recipe records from a file
pub trait RecipeLoader {
    /// Load every record from the given path
    fn load(&self, path: &Path) -> Result<Vec<RawRecipe>>;

    /// Check if this loader handles the given file extension
    fn can_load(&self, path: &Path) -> bool;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// JSON Lines loader, one record per line
pub struct JsonlLoader;

impl RecipeLoader for JsonlLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawRecipe>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSONL file: {:?}", path))?;

        let mut records = Vec::new();
        let mut skipped = 0;
        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecipe>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!("Skipping line {} of {:?}: {}", line_num + 1, path, e);
                }
            }
        }

        if records.is_empty() && skipped > 0 {
            anyhow::bail!("No parseable JSONL records in {:?}", path);
        }
        if skipped > 0 {
            tracing::warn!("Skipped {} malformed lines in {:?}", skipped, path);
        }

        Ok(records)
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["jsonl", "ndjson"])
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

/// Accepted shapes of a JSON dataset file
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    Records(Vec<RawRecipe>),
    Split { train: Vec<RawRecipe> },
}

/// JSON loader for an array of records or a `{"train": [...]}` split
pub struct JsonLoader;

impl RecipeLoader for JsonLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawRecipe>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON file: {:?}", path))?;

        let payload: JsonPayload = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON recipes: {:?}", path))?;

        Ok(match payload {
            JsonPayload::Records(records) => records,
            JsonPayload::Split { train } => train,
        })
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["json"])
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[derive(Deserialize)]
struct CsvRow {
    name: Option<String>,
    ingredients: Option<String>,
    steps: Option<String>,
    description: Option<String>,
    link: Option<String>,
}

impl From<CsvRow> for RawRecipe {
    fn from(row: CsvRow) -> Self {
        RawRecipe {
            name: row.name,
            ingredients: row.ingredients.map(TextOrList::Text),
            steps: row.steps.map(TextOrList::Text),
            description: row.description,
            link: row.link,
        }
    }
}

/// CSV loader; the header row names the columns
pub struct CsvLoader;

impl RecipeLoader for CsvLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawRecipe>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

        let headers = reader.headers()?.clone();
        if !headers.iter().any(|h| h == "name" || h == "ingredients") {
            anyhow::bail!("CSV must have a 'name' or 'ingredients' column: {:?}", path);
        }

        let mut records = Vec::new();
        for (row_num, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.with_context(|| format!("Failed to read CSV row {}", row_num + 1))?;
            records.push(row.into());
        }

        Ok(records)
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["csv"])
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

/// Multi-format loader that falls back across formats and files
pub struct MultiFormatLoader {
    loaders: Vec<Box<dyn RecipeLoader>>,
}

impl MultiFormatLoader {
    /// Create a new multi-format loader with all supported loaders
    pub fn new() -> Self {
        let loaders: Vec<Box<dyn RecipeLoader>> = vec![
            Box::new(JsonlLoader),
            Box::new(JsonLoader),
            Box::new(CsvLoader),
        ];

        Self { loaders }
    }

    /// Load a file, trying the extension's loader first and then the rest
    pub fn load_file(&self, path: &Path) -> Result<Vec<RawRecipe>> {
        let mut ordered: Vec<&dyn RecipeLoader> = Vec::with_capacity(self.loaders.len());
        ordered.extend(self.loaders.iter().filter(|l| l.can_load(path)).map(|l| &**l));
        ordered.extend(self.loaders.iter().filter(|l| !l.can_load(path)).map(|l| &**l));

        let mut failures = Vec::new();
        for loader in ordered {
            match loader.load(path) {
                Ok(records) => {
                    tracing::info!(
                        "Loaded {} recipes from {:?} ({})",
                        records.len(),
                        path,
                        loader.name()
                    );
                    return Ok(records);
                }
                Err(e) => {
                    tracing::debug!("{} loader failed for {:?}: {:#}", loader.name(), path, e);
                    failures.push(format!("{}: {:#}", loader.name(), e));
                }
            }
        }

        Err(RagError::DataSource(format!(
            "{:?} could not be loaded ({})",
            path,
            failures.join("; ")
        ))
        .into())
    }

    /// Load from a file, or from the first loadable dataset file in a directory
    pub fn load(&self, path: &Path) -> Result<Vec<RawRecipe>> {
        if path.is_file() {
            return self.load_file(path);
        }
        if !path.is_dir() {
            return Err(RagError::DataSource(format!("{:?} does not exist", path)).into());
        }

        let candidates = self.candidate_files(path)?;
        if candidates.is_empty() {
            return Err(RagError::DataSource(format!(
                "no .jsonl/.json/.csv files found in {:?}",
                path
            ))
            .into());
        }

        for candidate in &candidates {
            match self.load_file(candidate) {
                Ok(records) => return Ok(records),
                Err(e) => tracing::warn!("Failed to load {:?}: {:#}", candidate, e),
            }
        }

        Err(RagError::DataSource(format!(
            "none of {} dataset files in {:?} could be loaded",
            candidates.len(),
            path
        ))
        .into())
    }

    /// Dataset files in a directory, ordered by format preference then name
    fn candidate_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {:?}", dir))?
        {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(priority) = self.loaders.iter().position(|l| l.can_load(&path)) {
                files.push((priority, path));
            }
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }
}

impl Default for MultiFormatLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and normalize a corpus, keeping at most `sample_size` records
pub fn load_corpus(path: &Path, sample_size: Option<usize>) -> Result<Corpus> {
    let records = MultiFormatLoader::new().load(path)?;
    let corpus = Corpus::from_records(records, sample_size);
    tracing::info!("Corpus ready: {} recipes", corpus.len());
    Ok(corpus)
}
