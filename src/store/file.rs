//! TSV-backed allele store.
//!
//! Tables live in a single data directory; each may be plain (`.tsv`) or
//! gzip-compressed (`.tsv.gz`):
//!
//! | File | Columns |
//! |------|---------|
//! | `tce_groups.tsv`   | allele, group |
//! | `allele_codes.tsv` | code, `/`-joined members |
//! | `g_groups.tsv`     | two-field token, `/`-joined members |
//! | `frequencies.tsv`  | allele, population code, frequency |
//!
//! Blank lines and `#` comments are skipped; an optional header row is
//! detected by its first column name. Files are re-read on every query, so
//! edits to the directory become visible on the next cache refresh.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::store::{
    family_alleles_from_rows, AlleleStore, CodeExpansion, FrequencyRow, GroupRow, PopulationKey,
    StoreError,
};
use crate::utils::limits::MAX_TABLE_ROWS;

const GROUPS_TABLE: &str = "tce_groups.tsv";
const CODES_TABLE: &str = "allele_codes.tsv";
const G_GROUPS_TABLE: &str = "g_groups.tsv";
const FREQUENCIES_TABLE: &str = "frequencies.tsv";

/// Allele store reading TSV tables from a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read a table file, transparently handling a `.gz` sibling
    fn read_table(&self, name: &str) -> Result<String, StoreError> {
        let plain = self.dir.join(name);
        if plain.exists() {
            return Ok(std::fs::read_to_string(&plain)?);
        }
        let gz = self.dir.join(format!("{name}.gz"));
        let file = std::fs::File::open(&gz)?;
        let mut content = String::new();
        GzDecoder::new(file).read_to_string(&mut content)?;
        Ok(content)
    }
}

/// Iterate data rows of a TSV table: skips blanks and comments, detects an
/// optional header by its first column, enforces the row limit, and hands
/// each row's fields plus its 1-based line number to `row_fn`.
fn for_each_row<F>(name: &str, content: &str, mut row_fn: F) -> Result<(), StoreError>
where
    F: FnMut(usize, &[&str]) -> Result<(), StoreError>,
{
    let mut rows = 0usize;
    let mut first_data_line = true;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();

        if first_data_line {
            first_data_line = false;
            let first = fields.first().map(|s| s.to_lowercase()).unwrap_or_default();
            if matches!(first.as_str(), "allele" | "code" | "token" | "group") {
                continue;
            }
        }

        if rows >= MAX_TABLE_ROWS {
            return Err(StoreError::TooManyRows(name.to_string()));
        }
        rows += 1;

        // Line numbers in errors are 1-based for user friendliness
        row_fn(i + 1, &fields)?;
    }
    Ok(())
}

fn parse_error(file: &str, line: usize, message: impl Into<String>) -> StoreError {
    StoreError::Parse {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

fn split_members(joined: &str) -> Vec<String> {
    joined
        .split('/')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

impl FileStore {
    fn load_group_rows(&self) -> Result<Vec<GroupRow>, StoreError> {
        let content = self.read_table(GROUPS_TABLE)?;
        let mut rows = Vec::new();
        for_each_row(GROUPS_TABLE, &content, |line, fields| {
            if fields.len() < 2 {
                return Err(parse_error(
                    GROUPS_TABLE,
                    line,
                    "expected 2 columns: allele, group",
                ));
            }
            let group: u8 = fields[1].parse().map_err(|_| {
                parse_error(GROUPS_TABLE, line, format!("invalid group '{}'", fields[1]))
            })?;
            if group > 3 {
                return Err(parse_error(
                    GROUPS_TABLE,
                    line,
                    format!("group {group} out of range 0..=3"),
                ));
            }
            rows.push(GroupRow {
                allele: fields[0].to_string(),
                group,
            });
            Ok(())
        })?;
        debug!(table = GROUPS_TABLE, rows = rows.len(), loaded_at = %chrono::Utc::now().to_rfc3339(), "loaded table");
        Ok(rows)
    }
}

impl AlleleStore for FileStore {
    fn group_rows(&self) -> Result<Vec<GroupRow>, StoreError> {
        self.load_group_rows()
    }

    fn allele_code(&self, code: &str) -> Result<Option<CodeExpansion>, StoreError> {
        let content = self.read_table(CODES_TABLE)?;
        let mut found = None;
        for_each_row(CODES_TABLE, &content, |line, fields| {
            if fields.len() < 2 {
                return Err(parse_error(
                    CODES_TABLE,
                    line,
                    "expected 2 columns: code, members",
                ));
            }
            if fields[0] == code {
                found = Some(CodeExpansion {
                    members: split_members(fields[1]),
                });
            }
            Ok(())
        })?;
        Ok(found)
    }

    fn family_alleles(&self, locus: &str, family: &str) -> Result<Vec<String>, StoreError> {
        let rows = self.load_group_rows()?;
        Ok(family_alleles_from_rows(&rows, locus, family))
    }

    fn g_group(&self, token: &str) -> Result<Option<Vec<String>>, StoreError> {
        let content = self.read_table(G_GROUPS_TABLE)?;
        let mut found = None;
        for_each_row(G_GROUPS_TABLE, &content, |line, fields| {
            if fields.len() < 2 {
                return Err(parse_error(
                    G_GROUPS_TABLE,
                    line,
                    "expected 2 columns: token, members",
                ));
            }
            if fields[0] == token {
                found = Some(split_members(fields[1]));
            }
            Ok(())
        })?;
        Ok(found)
    }

    fn frequency_rows(&self, population: &PopulationKey) -> Result<Vec<FrequencyRow>, StoreError> {
        let content = self.read_table(FREQUENCIES_TABLE)?;
        let code = population.code();
        let mut rows = Vec::new();
        for_each_row(FREQUENCIES_TABLE, &content, |line, fields| {
            if fields.len() < 3 {
                return Err(parse_error(
                    FREQUENCIES_TABLE,
                    line,
                    "expected 3 columns: allele, population, frequency",
                ));
            }
            if !fields[1].eq_ignore_ascii_case(code) {
                return Ok(());
            }
            let frequency: f64 = fields[2].parse().map_err(|_| {
                parse_error(
                    FREQUENCIES_TABLE,
                    line,
                    format!("invalid frequency '{}'", fields[2]),
                )
            })?;
            if !(0.0..=1.0).contains(&frequency) {
                return Err(parse_error(
                    FREQUENCIES_TABLE,
                    line,
                    format!("frequency {frequency} outside [0, 1]"),
                ));
            }
            rows.push(FrequencyRow {
                allele: fields[0].to_string(),
                frequency,
            });
            Ok(())
        })?;
        Ok(rows)
    }
}
