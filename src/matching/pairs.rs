//! Allele-pair expansion from a genotype ambiguity tree.

use std::collections::BTreeSet;

use crate::core::allele::Allele;
use crate::core::genotype::GenotypeList;
use crate::matching::MatchError;
use crate::resolver::GroupResolver;
use crate::utils::limits::check_pair_limit;

/// Unordered pair of alleles (the two copies at one locus) with their
/// resolved immunogenicity groups.
///
/// Construction orders the members canonically by allele string, so
/// equality and hashing are independent of iteration order; equality
/// considers only the allele content (groups are derived from it).
#[derive(Debug, Clone)]
pub struct AllelePair {
    first: Allele,
    second: Allele,
    first_group: Option<u8>,
    second_group: Option<u8>,
}

impl AllelePair {
    pub fn new(a: (Allele, Option<u8>), b: (Allele, Option<u8>)) -> Self {
        let ((first, first_group), (second, second_group)) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            first_group,
            second_group,
        }
    }

    pub fn first(&self) -> &Allele {
        &self.first
    }

    pub fn second(&self) -> &Allele {
        &self.second
    }

    pub fn is_homozygous(&self) -> bool {
        self.first == self.second
    }

    /// The lower of the two member groups; `None` when either member is
    /// unresolved (permitting a downstream UNKNOWN outcome)
    pub fn low_group(&self) -> Option<u8> {
        match (self.first_group, self.second_group) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        }
    }

    /// Order-independent content equality against another pair
    pub fn same_content(&self, other: &AllelePair) -> bool {
        self.first == other.first && self.second == other.second
    }

    /// Human-readable group annotation, e.g. `3,2` or `3,?`
    pub fn group_label(&self) -> String {
        let fmt = |g: Option<u8>| g.map_or_else(|| "?".to_string(), |g| g.to_string());
        format!("{},{}", fmt(self.first_group), fmt(self.second_group))
    }
}

impl PartialEq for AllelePair {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

impl Eq for AllelePair {}

impl std::hash::Hash for AllelePair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.first.hash(state);
        self.second.hash(state);
    }
}

impl std::fmt::Display for AllelePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

/// Expand a genotype list into the set of distinct allele pairs realizable
/// at `locus`.
///
/// For each genotype, one allele is drawn from each haplotype's candidate
/// alleles; a single-haplotype genotype (homozygous shorthand) pairs its
/// haplotype with itself. Genotypes carrying no alleles at the locus are
/// skipped; if every genotype is skipped the expansion fails.
///
/// # Errors
///
/// `NoAllelesAtLocus` when nothing at the target locus survives,
/// `Limit` when the expansion exceeds the pair budget.
pub fn expand_pairs(
    list: &GenotypeList,
    locus: &str,
    side: &'static str,
    groups: &GroupResolver,
) -> Result<Vec<AllelePair>, MatchError> {
    let mut seen: BTreeSet<(Allele, Allele)> = BTreeSet::new();

    for genotype in &list.genotypes {
        let candidates: Vec<Vec<&Allele>> = genotype
            .haplotypes
            .iter()
            .map(|h| h.alleles_at(locus))
            .collect();

        // The parser guarantees 1 or 2 haplotypes
        let (left, right) = match candidates.as_slice() {
            [single] => (single, single),
            [left, right] => (left, right),
            _ => continue,
        };
        if left.is_empty() || right.is_empty() {
            continue;
        }

        for a in left {
            for b in right {
                check_pair_limit(seen.len())?;
                let (x, y) = if a <= b { (a, b) } else { (b, a) };
                seen.insert(((*x).clone(), (*y).clone()));
            }
        }
    }

    if seen.is_empty() {
        return Err(MatchError::NoAllelesAtLocus {
            side,
            locus: locus.to_string(),
        });
    }

    Ok(seen
        .into_iter()
        .map(|(a, b)| {
            let group_a = groups.resolve(a.as_str());
            let group_b = groups.resolve(b.as_str());
            AllelePair::new((a, group_a), (b, group_b))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    const LOCUS: &str = "HLA-DPB1";

    fn groups() -> GroupResolver {
        let store = Arc::new(
            MemoryStore::new()
                .with_group("HLA-DPB1*01:01", 3)
                .with_group("HLA-DPB1*02:01", 3)
                .with_group("HLA-DPB1*03:01", 2),
        );
        GroupResolver::new(store, &CacheSettings::default()).unwrap()
    }

    fn pair(a: &str, b: &str) -> AllelePair {
        AllelePair::new(
            (Allele::parse(a).unwrap(), None),
            (Allele::parse(b).unwrap(), None),
        )
    }

    #[test]
    fn test_pair_equality_is_order_independent() {
        let ab = pair("HLA-DPB1*01:01", "HLA-DPB1*02:01");
        let ba = pair("HLA-DPB1*02:01", "HLA-DPB1*01:01");
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), ba.to_string());
    }

    #[test]
    fn test_low_group() {
        let p = AllelePair::new(
            (Allele::parse("HLA-DPB1*01:01").unwrap(), Some(3)),
            (Allele::parse("HLA-DPB1*03:01").unwrap(), Some(2)),
        );
        assert_eq!(p.low_group(), Some(2));

        let unresolved = AllelePair::new(
            (Allele::parse("HLA-DPB1*01:01").unwrap(), Some(3)),
            (Allele::parse("HLA-DPB1*99:99").unwrap(), None),
        );
        assert_eq!(unresolved.low_group(), None);
    }

    #[test]
    fn test_expand_simple_genotype() {
        let resolver = groups();
        let list = GenotypeList::parse("HLA-DPB1*01:01+HLA-DPB1*02:01", LOCUS).unwrap();
        let pairs = expand_pairs(&list, LOCUS, "recipient", &resolver).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].low_group(), Some(3));
    }

    #[test]
    fn test_expand_homozygous_shorthand_matches_explicit() {
        let resolver = groups();
        let shorthand = GenotypeList::parse("HLA-DPB1*01:01", LOCUS).unwrap();
        let explicit = GenotypeList::parse("HLA-DPB1*01:01+HLA-DPB1*01:01", LOCUS).unwrap();
        let a = expand_pairs(&shorthand, LOCUS, "recipient", &resolver).unwrap();
        let b = expand_pairs(&explicit, LOCUS, "recipient", &resolver).unwrap();
        assert_eq!(a, b);
        assert!(a[0].is_homozygous());
    }

    #[test]
    fn test_expand_deduplicates_across_genotypes() {
        let resolver = groups();
        let gl = "HLA-DPB1*01:01+HLA-DPB1*02:01|HLA-DPB1*02:01+HLA-DPB1*01:01";
        let list = GenotypeList::parse(gl, LOCUS).unwrap();
        let pairs = expand_pairs(&list, LOCUS, "recipient", &resolver).unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_expand_allele_alternatives_cross_product() {
        let resolver = groups();
        let gl = "HLA-DPB1*01:01/HLA-DPB1*03:01+HLA-DPB1*02:01";
        let list = GenotypeList::parse(gl, LOCUS).unwrap();
        let pairs = expand_pairs(&list, LOCUS, "recipient", &resolver).unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_expand_fails_when_locus_absent_everywhere() {
        let resolver = groups();
        let list = GenotypeList::parse("HLA-DPB1*01:01+HLA-DPB1*02:01", LOCUS).unwrap();
        let err = expand_pairs(&list, "HLA-DPA1", "donor", &resolver).unwrap_err();
        assert!(matches!(err, MatchError::NoAllelesAtLocus { side: "donor", .. }));
    }
}
