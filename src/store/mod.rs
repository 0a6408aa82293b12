//! The allele store: a read-only lookup provider for the external tables
//! the pipeline and resolvers are built on (TCE groups, allele codes,
//! G-groups, population frequencies).
//!
//! The store is queried, never mutated, by this crate; persistence belongs
//! to whatever populates the backing tables. Two implementations are
//! provided: [`FileStore`] reads TSV (optionally gzip-compressed) tables
//! from a data directory on every query, and [`MemoryStore`] holds tables
//! in memory for tests and demos. Callers are expected to wrap store
//! queries in a [`crate::cache::RefreshingCache`]; the store itself does no
//! caching.

pub mod file;
pub mod memory;

use thiserror::Error;

use crate::core::population::{BroadRace, DetailRace};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read table: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file} line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("table {0} has too many rows")]
    TooManyRows(String),
}

/// One row of the allele-to-immunogenicity-group table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    /// Full canonical allele, e.g. `HLA-DPB1*01:01:01`
    pub allele: String,
    /// 0 = null allele, 1..3 = increasing epitope risk
    pub group: u8,
}

/// Expansion of one allele code.
///
/// Members are colon-field strings without a locus prefix. A *generic*
/// expansion lists only trailing fields (no `:`), to be re-prefixed with
/// the family of the token being expanded; a non-generic expansion lists
/// complete field strings that replace the family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExpansion {
    pub members: Vec<String>,
}

impl CodeExpansion {
    pub fn is_generic(&self) -> bool {
        self.members.iter().all(|m| !m.contains(':'))
    }
}

/// Cache key for a population frequency table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopulationKey {
    Detail(DetailRace),
    Broad(BroadRace),
}

impl PopulationKey {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Detail(d) => d.code(),
            Self::Broad(b) => b.code(),
        }
    }
}

impl std::fmt::Display for PopulationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One row of a population frequency table
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRow {
    /// ARS-level (two-field) allele
    pub allele: String,
    pub frequency: f64,
}

/// Read-only access to the external allele tables.
///
/// Every method may be slow (file reads, database queries) and is expected
/// to be wrapped in a refreshing cache by its consumer.
pub trait AlleleStore: Send + Sync {
    /// The full allele-to-group table
    fn group_rows(&self) -> Result<Vec<GroupRow>, StoreError>;

    /// Expansion for an allele code, or `None` if the code is unrecognized
    fn allele_code(&self, code: &str) -> Result<Option<CodeExpansion>, StoreError>;

    /// All known alleles of a family at a locus, as colon-field strings
    /// without the locus prefix (the `XX` code query). Derived from the
    /// allele universe of the group table.
    fn family_alleles(&self, locus: &str, family: &str) -> Result<Vec<String>, StoreError>;

    /// Member alleles of the G-group named by a two-field token, as
    /// colon-field strings without the locus prefix; `None` when the token
    /// names no group
    fn g_group(&self, token: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Frequency rows for one population table; an empty result means the
    /// population has no frequency data
    fn frequency_rows(&self, population: &PopulationKey) -> Result<Vec<FrequencyRow>, StoreError>;
}

/// Shared helper: derive a family's alleles from the group-table universe
pub(crate) fn family_alleles_from_rows(
    rows: &[GroupRow],
    locus: &str,
    family: &str,
) -> Vec<String> {
    let prefix = format!("{locus}*");
    let mut members: Vec<String> = rows
        .iter()
        .filter_map(|row| row.allele.strip_prefix(&prefix))
        .filter(|fields| fields.split(':').next() == Some(family))
        .map(str::to_string)
        .collect();
    members.sort();
    members.dedup();
    members
}
