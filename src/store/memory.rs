//! In-memory allele store for tests and demos.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::store::{
    family_alleles_from_rows, AlleleStore, CodeExpansion, FrequencyRow, GroupRow, PopulationKey,
    StoreError,
};

#[derive(Debug, Default)]
struct Tables {
    groups: Vec<GroupRow>,
    codes: HashMap<String, CodeExpansion>,
    g_groups: HashMap<String, Vec<String>>,
    frequencies: HashMap<PopulationKey, Vec<FrequencyRow>>,
}

/// Allele store holding its tables in memory. Tables are behind a lock so
/// tests can swap rows and observe cache refresh behavior.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, allele: &str, group: u8) -> Self {
        self.set_group(allele, group);
        self
    }

    pub fn with_code(self, code: &str, members: &[&str]) -> Self {
        self.tables.write().codes.insert(
            code.to_string(),
            CodeExpansion {
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_g_group(self, token: &str, members: &[&str]) -> Self {
        self.tables.write().g_groups.insert(
            token.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn with_frequency(self, population: PopulationKey, allele: &str, frequency: f64) -> Self {
        self.set_frequency(population, allele, frequency);
        self
    }

    /// Insert or replace one group row (visible to callers after their
    /// next cache refresh)
    pub fn set_group(&self, allele: &str, group: u8) {
        let mut tables = self.tables.write();
        if let Some(row) = tables.groups.iter_mut().find(|r| r.allele == allele) {
            row.group = group;
        } else {
            tables.groups.push(GroupRow {
                allele: allele.to_string(),
                group,
            });
        }
    }

    pub fn set_frequency(&self, population: PopulationKey, allele: &str, frequency: f64) {
        self.tables
            .write()
            .frequencies
            .entry(population)
            .or_default()
            .push(FrequencyRow {
                allele: allele.to_string(),
                frequency,
            });
    }
}

impl AlleleStore for MemoryStore {
    fn group_rows(&self) -> Result<Vec<GroupRow>, StoreError> {
        Ok(self.tables.read().groups.clone())
    }

    fn allele_code(&self, code: &str) -> Result<Option<CodeExpansion>, StoreError> {
        Ok(self.tables.read().codes.get(code).cloned())
    }

    fn family_alleles(&self, locus: &str, family: &str) -> Result<Vec<String>, StoreError> {
        Ok(family_alleles_from_rows(
            &self.tables.read().groups,
            locus,
            family,
        ))
    }

    fn g_group(&self, token: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.tables.read().g_groups.get(token).cloned())
    }

    fn frequency_rows(&self, population: &PopulationKey) -> Result<Vec<FrequencyRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .frequencies
            .get(population)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::population::BroadRace;

    #[test]
    fn test_builder_and_queries() {
        let store = MemoryStore::new()
            .with_group("HLA-DPB1*01:01", 3)
            .with_group("HLA-DPB1*02:01", 3)
            .with_code("AFC", &["01:01", "02:01"])
            .with_g_group("HLA-DPB1*04:01", &["04:01:01"])
            .with_frequency(PopulationKey::Broad(BroadRace::Cau), "HLA-DPB1*01:01", 0.05);

        assert_eq!(store.group_rows().unwrap().len(), 2);
        assert!(store.allele_code("AFC").unwrap().is_some());
        assert!(store.g_group("HLA-DPB1*04:01").unwrap().is_some());
        assert_eq!(
            store
                .frequency_rows(&PopulationKey::Broad(BroadRace::Cau))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.family_alleles("HLA-DPB1", "01").unwrap(), vec!["01:01"]);
    }

    #[test]
    fn test_set_group_replaces() {
        let store = MemoryStore::new().with_group("HLA-DPB1*01:01", 3);
        store.set_group("HLA-DPB1*01:01", 2);
        let rows = store.group_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group, 2);
    }
}
