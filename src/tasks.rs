use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// One candidate recipe page from the link list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub category_name: String,
    pub url: String,
    /// 1-based position among accepted lines.
    pub sequence_id: u64,
}

/// Read the `category|url` link list produced by link discovery.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    if !path.is_file() {
        bail!(
            "'{}' not found. Run link discovery first to produce it.",
            path.display()
        );
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read link list {}", path.display()))?;
    let tasks = parse_tasks(&text);
    info!("Loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

/// Blank lines and lines without a `|` are skipped and do not consume an id.
pub fn parse_tasks(text: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some((category, url)) = line.split_once('|') else {
            debug!("Skipping malformed line {}: {:?}", lineno + 1, line);
            continue;
        };
        tasks.push(Task {
            category_name: category.trim().to_string(),
            url: url.trim().to_string(),
            sequence_id: tasks.len() as u64 + 1,
        });
    }
    tasks
}
