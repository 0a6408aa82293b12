//! Allele-to-immunogenicity-group resolution.
//!
//! The raw allele→group table is held in a refreshing cache under a single
//! key; a refresh listener rebuilds the two inverse ordered multimaps in
//! one pass and atomically swaps them, so readers always see a consistent
//! pair of directions.
//!
//! Resolution for an allele not found verbatim strips the last
//! colon-separated field and re-probes until a match is found or no fields
//! remain: finer-grained alleles inherit the group of their nearest known
//! ancestor prefix. Exhaustion yields `None` ("unknown"), which is a valid
//! outcome, distinct from group 0 (null allele).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cache::{BoxError, CacheError, CacheSettings, CacheStats, RefreshingCache};
use crate::core::allele::{is_null_token, strip_last_field};
use crate::store::{AlleleStore, GroupRow};

/// Cache key for the single group table entry
const GROUP_TABLE_KEY: &str = "tce-groups";

/// The bidirectional allele↔group mapping, built in one pass
#[derive(Debug, Default)]
pub struct GroupTable {
    allele_to_group: BTreeMap<String, u8>,
    group_to_alleles: BTreeMap<u8, Vec<String>>,
}

impl GroupTable {
    pub fn build(rows: &[GroupRow]) -> Self {
        let mut allele_to_group = BTreeMap::new();
        let mut group_to_alleles: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        for row in rows {
            allele_to_group.insert(row.allele.clone(), row.group);
            group_to_alleles
                .entry(row.group)
                .or_default()
                .push(row.allele.clone());
        }
        for alleles in group_to_alleles.values_mut() {
            alleles.sort();
            alleles.dedup();
        }
        Self {
            allele_to_group,
            group_to_alleles,
        }
    }

    pub fn group_of(&self, allele: &str) -> Option<u8> {
        self.allele_to_group.get(allele).copied()
    }

    pub fn alleles_in(&self, group: u8) -> &[String] {
        self.group_to_alleles
            .get(&group)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.allele_to_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allele_to_group.is_empty()
    }
}

/// Resolves a concrete allele to its immunogenicity group
pub struct GroupResolver {
    rows: RefreshingCache<String, Vec<GroupRow>>,
    table: Arc<RwLock<Arc<GroupTable>>>,
}

impl GroupResolver {
    /// Build the resolver, loading the group table cold.
    ///
    /// # Errors
    ///
    /// Propagates the store error if the initial table load fails.
    pub fn new(store: Arc<dyn AlleleStore>, settings: &CacheSettings) -> Result<Self, CacheError> {
        let rows = settings.builder("tce-group-rows").build(Box::new(
            move |_key: &String| -> Result<Vec<GroupRow>, BoxError> {
                store.group_rows().map_err(|e| Box::new(e) as BoxError)
            },
        ));

        let initial = rows.get(&GROUP_TABLE_KEY.to_string())?;
        let table = Arc::new(RwLock::new(Arc::new(GroupTable::build(&initial))));

        let table_for_listener = Arc::clone(&table);
        rows.add_listener(Box::new(move |_key, _old, new| {
            let rebuilt = GroupTable::build(new);
            info!(alleles = rebuilt.len(), "rebuilt group table after refresh");
            *table_for_listener.write() = Arc::new(rebuilt);
        }));

        Ok(Self { rows, table })
    }

    /// Resolve an allele's group: `Some(0)` for null alleles, `None` when
    /// the allele and all of its field-prefixes are unknown.
    pub fn resolve(&self, allele: &str) -> Option<u8> {
        // Touch the cache so refresh-ahead and access expiry see the read
        if let Err(e) = self.rows.get(&GROUP_TABLE_KEY.to_string()) {
            warn!(error = %e, "group table reload failed; using last built table");
        }

        if is_null_token(allele) {
            return Some(0);
        }

        let table = Arc::clone(&self.table.read());
        let mut probe = allele.to_string();
        loop {
            if let Some(group) = table.group_of(&probe) {
                return Some(group);
            }
            match strip_last_field(&probe) {
                Some(shorter) => probe = shorter,
                None => return None,
            }
        }
    }

    /// All known alleles of one group (the inverse direction)
    pub fn alleles_in_group(&self, group: u8) -> Vec<String> {
        self.table.read().alleles_in(group).to_vec()
    }

    pub fn stats(&self) -> CacheStats {
        self.rows.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::{Duration, Instant};

    fn resolver_with(store: Arc<MemoryStore>) -> GroupResolver {
        GroupResolver::new(store, &CacheSettings::default()).unwrap()
    }

    fn test_store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_group("HLA-DPB1*01:01", 3)
                .with_group("HLA-DPB1*02:01", 3)
                .with_group("HLA-DPB1*03:01", 2)
                .with_group("HLA-DPB1*09:01", 1),
        )
    }

    #[test]
    fn test_verbatim_resolution() {
        let resolver = resolver_with(test_store());
        assert_eq!(resolver.resolve("HLA-DPB1*01:01"), Some(3));
        assert_eq!(resolver.resolve("HLA-DPB1*09:01"), Some(1));
    }

    #[test]
    fn test_progressive_truncation_fallback() {
        let resolver = resolver_with(test_store());
        // Four-field allele inherits the group of its two-field ancestor
        assert_eq!(resolver.resolve("HLA-DPB1*03:01:01:02"), Some(2));
    }

    #[test]
    fn test_unknown_is_none_not_zero() {
        let resolver = resolver_with(test_store());
        assert_eq!(resolver.resolve("HLA-DPB1*99:99"), None);
    }

    #[test]
    fn test_null_allele_is_group_zero() {
        let resolver = resolver_with(test_store());
        // Independent of the table: this allele has no row
        assert_eq!(resolver.resolve("HLA-DPB1*64:01N"), Some(0));
    }

    #[test]
    fn test_inverse_direction() {
        let resolver = resolver_with(test_store());
        assert_eq!(
            resolver.alleles_in_group(3),
            vec!["HLA-DPB1*01:01".to_string(), "HLA-DPB1*02:01".to_string()]
        );
        assert!(resolver.alleles_in_group(0).is_empty());
    }

    #[test]
    fn test_listener_rebuilds_table_after_refresh() {
        let store = test_store();
        let settings = CacheSettings {
            refresh_secs: Some(0), // every read schedules a refresh
            ..Default::default()
        };
        let resolver =
            GroupResolver::new(Arc::clone(&store) as Arc<dyn AlleleStore>, &settings).unwrap();

        assert_eq!(resolver.resolve("HLA-DPB1*01:01"), Some(3));
        store.set_group("HLA-DPB1*01:01", 2);

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if resolver.resolve("HLA-DPB1*01:01") == Some(2) {
                break;
            }
            assert!(Instant::now() < deadline, "rebuilt table never swapped in");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
