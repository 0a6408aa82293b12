//! Population allele-frequency resolution.
//!
//! Frequencies are served per population from a refreshing cache (one
//! entry per detail or broad table). Lookup ARS-reduces the allele, probes
//! the detail table, then the broad table the detail race rolls up into.
//!
//! A populated table that lacks the allele yields exactly 0.0: the allele
//! cannot occur in that population and its pairs are dropped, never
//! silently substituted. The configured baseline applies only when the
//! population has no frequency data at all (including unknown race).
//! Resolution never errors; store failures are logged and treated as
//! missing data.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::cache::{BoxError, CacheSettings, CacheStats, RefreshingCache};
use crate::core::allele::ars_reduce;
use crate::core::population::Population;
use crate::store::{AlleleStore, FrequencyRow, PopulationKey};

/// Fallback frequency for populations with no data at all
pub const DEFAULT_BASELINE_FREQUENCY: f64 = 1e-5;

/// One population's frequency table, keyed by ARS-reduced allele
#[derive(Debug, Default)]
pub struct FrequencyTable {
    by_allele: HashMap<String, f64>,
}

impl FrequencyTable {
    fn build(rows: Vec<FrequencyRow>) -> Self {
        let mut by_allele = HashMap::with_capacity(rows.len());
        for row in rows {
            by_allele.insert(ars_reduce(&row.allele), row.frequency);
        }
        Self { by_allele }
    }

    fn lookup(&self, reduced: &str) -> Option<f64> {
        self.by_allele.get(reduced).copied()
    }

    fn is_empty(&self) -> bool {
        self.by_allele.is_empty()
    }
}

/// Serves `(allele, population) -> frequency` with detail→broad fallback
pub struct FrequencyResolver {
    tables: RefreshingCache<PopulationKey, FrequencyTable>,
    baseline: f64,
}

impl FrequencyResolver {
    pub fn new(store: Arc<dyn AlleleStore>, settings: &CacheSettings, baseline: f64) -> Self {
        let tables = settings.builder("frequencies").build(Box::new(
            move |key: &PopulationKey| -> Result<FrequencyTable, BoxError> {
                store
                    .frequency_rows(key)
                    .map(FrequencyTable::build)
                    .map_err(|e| Box::new(e) as BoxError)
            },
        ));
        Self { tables, baseline }
    }

    fn table(&self, key: PopulationKey) -> Option<Arc<FrequencyTable>> {
        match self.tables.get(&key) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!(population = %key, error = %e, "frequency table load failed");
                None
            }
        }
    }

    fn tables_for(
        &self,
        population: &Population,
    ) -> (Option<Arc<FrequencyTable>>, Option<Arc<FrequencyTable>>) {
        match population {
            Population::Unknown => (None, None),
            Population::Detail(d) => (
                self.table(PopulationKey::Detail(*d)),
                self.table(PopulationKey::Broad(d.broad())),
            ),
            Population::Broad(b) => (None, self.table(PopulationKey::Broad(*b))),
        }
    }

    /// Frequency of `allele` in `population`; never errors
    pub fn resolve(&self, allele: &str, population: &Population) -> f64 {
        let (detail, broad) = self.tables_for(population);
        let has_data = detail.as_deref().is_some_and(|t| !t.is_empty())
            || broad.as_deref().is_some_and(|t| !t.is_empty());
        if !has_data {
            return self.baseline;
        }

        let reduced = ars_reduce(allele);
        detail
            .and_then(|t| t.lookup(&reduced))
            .or_else(|| broad.and_then(|t| t.lookup(&reduced)))
            .unwrap_or(0.0)
    }

    /// True when the population has any frequency rows at detail or broad
    /// level; drives the engine's grade-only fallback
    pub fn population_has_data(&self, population: &Population) -> bool {
        let (detail, broad) = self.tables_for(population);
        detail.as_deref().is_some_and(|t| !t.is_empty())
            || broad.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn stats(&self) -> CacheStats {
        self.tables.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::population::{BroadRace, DetailRace};
    use crate::store::MemoryStore;

    fn resolver(store: MemoryStore) -> FrequencyResolver {
        FrequencyResolver::new(
            Arc::new(store),
            &CacheSettings::default(),
            DEFAULT_BASELINE_FREQUENCY,
        )
    }

    fn populated_store() -> MemoryStore {
        MemoryStore::new()
            .with_frequency(
                PopulationKey::Detail(DetailRace::Eurcau),
                "HLA-DPB1*01:01",
                0.06,
            )
            .with_frequency(PopulationKey::Broad(BroadRace::Cau), "HLA-DPB1*01:01", 0.05)
            .with_frequency(PopulationKey::Broad(BroadRace::Cau), "HLA-DPB1*02:01", 0.20)
    }

    #[test]
    fn test_detail_level_match() {
        let r = resolver(populated_store());
        let freq = r.resolve("HLA-DPB1*01:01", &Population::Detail(DetailRace::Eurcau));
        assert!((freq - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_detail_falls_back_to_broad() {
        let r = resolver(populated_store());
        // No detail row for 02:01, but the broad table has one
        let freq = r.resolve("HLA-DPB1*02:01", &Population::Detail(DetailRace::Eurcau));
        assert!((freq - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_absent_allele_in_populated_table_is_zero() {
        let r = resolver(populated_store());
        let freq = r.resolve("HLA-DPB1*99:01", &Population::Broad(BroadRace::Cau));
        assert_eq!(freq, 0.0);
    }

    #[test]
    fn test_unknown_population_gets_baseline() {
        let r = resolver(populated_store());
        let freq = r.resolve("HLA-DPB1*01:01", &Population::Unknown);
        assert_eq!(freq, DEFAULT_BASELINE_FREQUENCY);
        assert!(!r.population_has_data(&Population::Unknown));
    }

    #[test]
    fn test_population_without_rows_gets_baseline() {
        let r = resolver(populated_store());
        let pop = Population::Broad(BroadRace::Nam);
        assert!(!r.population_has_data(&pop));
        assert_eq!(r.resolve("HLA-DPB1*01:01", &pop), DEFAULT_BASELINE_FREQUENCY);
    }

    #[test]
    fn test_lookup_is_ars_reduced() {
        let r = resolver(populated_store());
        // Three-field query hits the two-field frequency row
        let freq = r.resolve("HLA-DPB1*01:01:01", &Population::Broad(BroadRace::Cau));
        assert!((freq - 0.05).abs() < 1e-12);
    }
}
