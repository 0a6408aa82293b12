use thiserror::Error;

use crate::core::allele::{Allele, InvalidAllele};

/// Errors raised while reading a canonical GL string into its ambiguity tree
#[derive(Debug, Error)]
pub enum GlParseError {
    #[error("empty GL string")]
    Empty,

    #[error("malformed GL string: {0}")]
    Malformed(String),

    #[error("genotype '{genotype}' has {count} haplotypes; expected 1 or 2")]
    InvalidHaplotypeCount { genotype: String, count: usize },

    #[error("locus {locus} not present in GL string")]
    LocusNotPresent { locus: String },

    #[error(transparent)]
    InvalidAllele(#[from] InvalidAllele),
}

/// Ordered set of alternative concrete alleles (`/`-separated)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleList {
    pub alleles: Vec<Allele>,
}

/// One copy at the locus; carries one or more alternative allele lists
/// (`~`-separated phasings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Haplotype {
    pub allele_lists: Vec<AlleleList>,
}

impl Haplotype {
    /// All candidate alleles this haplotype may carry at the given locus
    pub fn alleles_at<'a>(&'a self, locus: &str) -> Vec<&'a Allele> {
        self.allele_lists
            .iter()
            .flat_map(|list| list.alleles.iter())
            .filter(|a| a.locus() == locus)
            .collect()
    }
}

/// One candidate genotype: exactly 1 or 2 haplotypes. A single haplotype is
/// homozygous shorthand and pairs with itself during expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genotype {
    pub haplotypes: Vec<Haplotype>,
}

/// The full ambiguity tree for one locus: alternative genotypes, any of
/// which may be the truth (`|`-separated). Parsed fresh per request from a
/// normalized GL string, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeList {
    pub genotypes: Vec<Genotype>,
}

impl GenotypeList {
    /// Parse a pipeline-normalized GL string, selecting the `^`-joined
    /// section that mentions the target locus.
    ///
    /// # Errors
    ///
    /// `Empty` on blank input, `LocusNotPresent` if no section carries the
    /// locus, `InvalidHaplotypeCount` for genotypes with more than two
    /// haplotypes, `Malformed` for empty tokens between delimiters.
    pub fn parse(gl: &str, locus: &str) -> Result<Self, GlParseError> {
        let gl = gl.trim();
        if gl.is_empty() {
            return Err(GlParseError::Empty);
        }

        let locus_tag = format!("{locus}*");
        let section = gl
            .split('^')
            .find(|s| s.contains(&locus_tag))
            .ok_or_else(|| GlParseError::LocusNotPresent {
                locus: locus.to_string(),
            })?;

        let mut genotypes = Vec::new();
        for genotype_str in section.split('|') {
            genotypes.push(parse_genotype(genotype_str)?);
        }
        Ok(Self { genotypes })
    }
}

fn parse_genotype(s: &str) -> Result<Genotype, GlParseError> {
    if s.is_empty() {
        return Err(GlParseError::Malformed(
            "empty genotype between '|' delimiters".to_string(),
        ));
    }

    let haplotype_strs: Vec<&str> = s.split('+').collect();
    if haplotype_strs.len() > 2 {
        return Err(GlParseError::InvalidHaplotypeCount {
            genotype: s.to_string(),
            count: haplotype_strs.len(),
        });
    }

    let mut haplotypes = Vec::new();
    for hap_str in haplotype_strs {
        if hap_str.is_empty() {
            return Err(GlParseError::Malformed(
                "empty haplotype between '+' delimiters".to_string(),
            ));
        }
        haplotypes.push(parse_haplotype(hap_str)?);
    }
    Ok(Genotype { haplotypes })
}

fn parse_haplotype(s: &str) -> Result<Haplotype, GlParseError> {
    let mut allele_lists = Vec::new();
    for list_str in s.split('~') {
        if list_str.is_empty() {
            return Err(GlParseError::Malformed(
                "empty allele list between '~' delimiters".to_string(),
            ));
        }
        let mut alleles = Vec::new();
        for token in list_str.split('/') {
            if token.is_empty() {
                return Err(GlParseError::Malformed(
                    "empty allele between '/' delimiters".to_string(),
                ));
            }
            alleles.push(Allele::parse(token)?);
        }
        allele_lists.push(AlleleList { alleles });
    }
    Ok(Haplotype { allele_lists })
}
