//! Data loading for JSON-lines training examples.
//!
//! One example per line:
//!
//! ```text
//! {"label-id": 3, "path": [{"word": "in", "pos": "IN", "dep": "prep", "dir": 0, "offset": 2}]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, bail};
use relex_core::Example;

/// Acceptance rules applied while reading a dataset.
#[derive(Debug, Clone)]
pub struct ExampleFilter {
    pub num_classes: usize,
    pub max_path_len: usize,
    /// Examples whose path contains this dependency label are dropped.
    pub root_label: String,
}

/// What happened while reading a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub loaded: usize,
    pub skipped_root: usize,
}

/// Load a dataset from a JSON-lines file.
pub fn load_examples<P: AsRef<Path>>(
    path: P,
    filter: &ExampleFilter,
) -> anyhow::Result<Vec<Example>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Cannot open training data '{}'", path.display()))?;
    let (examples, stats) = parse_examples(BufReader::new(file), filter)
        .with_context(|| format!("Invalid training data '{}'", path.display()))?;

    if stats.skipped_root > 0 {
        tracing::warn!(
            skipped = stats.skipped_root,
            "Dropped examples whose path contains the '{}' dependency",
            filter.root_label
        );
    }
    tracing::info!(examples = stats.loaded, path = %path.display(), "Loaded training data");
    Ok(examples)
}

/// Parse examples from any reader.
pub fn parse_examples<R: BufRead>(
    reader: R,
    filter: &ExampleFilter,
) -> anyhow::Result<(Vec<Example>, DatasetStats)> {
    let mut examples = Vec::new();
    let mut stats = DatasetStats::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let lineno = i + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let example: Example = serde_json::from_str(line)
            .with_context(|| format!("line {lineno}: malformed example"))?;

        if example.label_id as usize >= filter.num_classes {
            bail!(
                "line {lineno}: label-id {} is not below num_classes {}",
                example.label_id,
                filter.num_classes
            );
        }
        if example.path.is_empty() {
            bail!("line {lineno}: empty dependency path");
        }
        if example.path.len() > filter.max_path_len {
            bail!(
                "line {lineno}: path of length {} exceeds max_path_len {}",
                example.path.len(),
                filter.max_path_len
            );
        }
        if example.has_dependency(&filter.root_label) {
            stats.skipped_root += 1;
            continue;
        }

        examples.push(example);
    }

    stats.loaded = examples.len();
    if examples.is_empty() {
        bail!("no usable training examples");
    }
    Ok((examples, stats))
}
