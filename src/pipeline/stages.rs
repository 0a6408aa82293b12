//! The concrete pipeline stages: locus normalization, allele-code
//! expansion, G-group expansion, and ARS field truncation.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::cache::{BoxError, CacheError, CacheSettings, RefreshingCache};
use crate::core::allele::{ars_reduce, NAMESPACE_PREFIX};
use crate::pipeline::{GlStringPipeline, PipelineError, Stage};
use crate::store::AlleleStore;

/// Reserved code expanding to all known alleles of the token's family
pub const XX_CODE: &str = "XX";

/// Settings for locus normalization
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Locus prepended to tokens that carry none (e.g. `HLA-DPB1`).
    /// `None` makes locus-less tokens an error.
    pub default_locus: Option<String>,

    /// Organization namespace expected on every locus prefix
    pub namespace: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_locus: Some("HLA-DPB1".to_string()),
            namespace: NAMESPACE_PREFIX.to_string(),
        }
    }
}

/// Stage 1: ensure every token carries a namespaced `locus*` prefix
pub struct LocusStage {
    default_locus: Option<String>,
    namespace: String,
}

impl LocusStage {
    pub fn new(config: &PipelineConfig) -> Self {
        let namespace = config.namespace.clone();
        let default_locus = config.default_locus.as_ref().map(|locus| {
            if locus.starts_with(&namespace) {
                locus.clone()
            } else {
                format!("{namespace}{locus}")
            }
        });
        Self {
            default_locus,
            namespace,
        }
    }
}

impl Stage for LocusStage {
    fn name(&self) -> &'static str {
        "locus"
    }

    fn rewrite(&self, token: &str) -> Result<String, PipelineError> {
        match token.split_once('*') {
            Some(("", _)) => Err(PipelineError::Malformed(format!(
                "token '{token}' has an empty locus"
            ))),
            Some((prefix, _)) if prefix.starts_with(&self.namespace) => Ok(token.to_string()),
            Some(_) => Ok(format!("{}{token}", self.namespace)),
            None => match &self.default_locus {
                Some(locus) => Ok(format!("{locus}*{token}")),
                None => Err(PipelineError::MissingLocus {
                    token: token.to_string(),
                }),
            },
        }
    }
}

/// True if the portion after `*` reads `family:CODE` with an alphabetic code
fn is_code_token(token: &str) -> bool {
    let Some((_, fields)) = token.split_once('*') else {
        return false;
    };
    let parts: Vec<&str> = fields.split(':').collect();
    let [family, code] = parts.as_slice() else {
        return false;
    };
    !family.is_empty()
        && family.chars().all(|c| c.is_ascii_digit())
        && !code.is_empty()
        && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Expand one code token against the store; the expensive path wrapped by
/// the stage's cache
fn expand_code_token(store: &dyn AlleleStore, token: &str) -> Result<String, PipelineError> {
    // Shape was checked by is_code_token before the cache was consulted
    let (prefix, fields) = token.split_once('*').ok_or_else(|| {
        PipelineError::Malformed(format!("token '{token}' is not an allele code"))
    })?;
    let (family, code) = fields.split_once(':').ok_or_else(|| {
        PipelineError::Malformed(format!("token '{token}' is not an allele code"))
    })?;

    let members: Vec<String> = if code == XX_CODE {
        store.family_alleles(prefix, family)?
    } else {
        let expansion =
            store
                .allele_code(code)?
                .ok_or_else(|| PipelineError::UnrecognizedCode {
                    token: token.to_string(),
                })?;
        if expansion.is_generic() {
            // Generic members are family-relative trailing fields
            expansion
                .members
                .iter()
                .map(|m| format!("{family}:{m}"))
                .collect()
        } else {
            expansion.members
        }
    };

    if members.is_empty() {
        return Err(PipelineError::UnrecognizedCode {
            token: token.to_string(),
        });
    }

    let expanded: Vec<String> = members.iter().map(|m| format!("{prefix}*{m}")).collect();
    Ok(expanded.join("/"))
}

/// Stage 2: expand allele codes (`HLA-DPB1*01:AFC`) to concrete alleles
pub struct CodeExpansionStage {
    cache: RefreshingCache<String, String>,
}

impl CodeExpansionStage {
    pub fn new(store: Arc<dyn AlleleStore>, settings: &CacheSettings) -> Self {
        let cache = settings.builder("allele-codes").build(Box::new(
            move |token: &String| -> Result<String, BoxError> {
                expand_code_token(store.as_ref(), token).map_err(|e| Box::new(e) as BoxError)
            },
        ));
        Self { cache }
    }
}

impl Stage for CodeExpansionStage {
    fn name(&self) -> &'static str {
        "allele-code"
    }

    fn rewrite(&self, token: &str) -> Result<String, PipelineError> {
        if !is_code_token(token) {
            return Ok(token.to_string());
        }
        match self.cache.get(&token.to_string()) {
            Ok(expanded) => Ok((*expanded).clone()),
            Err(err) => Err(unwrap_stage_error(token, err)),
        }
    }
}

/// True for a concrete-looking two-field allele token (group candidates)
fn is_two_field_token(token: &str) -> bool {
    let Some((_, fields)) = token.split_once('*') else {
        return false;
    };
    let parts: Vec<&str> = fields.split(':').collect();
    parts.len() == 2
        && parts
            .iter()
            .all(|f| !f.is_empty() && f.chars().any(|c| c.is_ascii_digit()))
}

/// Stage 3: expand two-field tokens naming a G-group; a token naming no
/// group passes through unchanged (not every two-field allele is a group)
pub struct GGroupStage {
    cache: RefreshingCache<String, String>,
}

impl GGroupStage {
    pub fn new(store: Arc<dyn AlleleStore>, settings: &CacheSettings) -> Self {
        let cache = settings.builder("g-groups").build(Box::new(
            move |token: &String| -> Result<String, BoxError> {
                expand_g_group(store.as_ref(), token).map_err(|e| Box::new(e) as BoxError)
            },
        ));
        Self { cache }
    }
}

fn expand_g_group(store: &dyn AlleleStore, token: &str) -> Result<String, PipelineError> {
    let Some(members) = store.g_group(token)? else {
        return Ok(token.to_string());
    };
    let prefix = token.split_once('*').map(|(p, _)| p).unwrap_or_default();
    debug!(token, members = members.len(), "expanding G-group");
    let expanded: Vec<String> = members.iter().map(|m| format!("{prefix}*{m}")).collect();
    Ok(expanded.join("/"))
}

impl Stage for GGroupStage {
    fn name(&self) -> &'static str {
        "g-group"
    }

    fn rewrite(&self, token: &str) -> Result<String, PipelineError> {
        if !is_two_field_token(token) {
            return Ok(token.to_string());
        }
        match self.cache.get(&token.to_string()) {
            Ok(expanded) => Ok((*expanded).clone()),
            Err(err) => Err(unwrap_stage_error(token, err)),
        }
    }
}

/// Stage 4: ARS truncation to at most two fields (frequency lookups only)
pub struct ArsStage;

impl Stage for ArsStage {
    fn name(&self) -> &'static str {
        "ars"
    }

    fn rewrite(&self, token: &str) -> Result<String, PipelineError> {
        Ok(ars_reduce(token))
    }
}

/// Recover the delegate's own pipeline error from a cache cold-load
/// failure, so unresolvable references keep their distinct kind
fn unwrap_stage_error(token: &str, err: CacheError) -> PipelineError {
    match err.delegate_error().downcast_ref::<PipelineError>() {
        Some(PipelineError::UnrecognizedCode { .. }) => PipelineError::UnrecognizedCode {
            token: token.to_string(),
        },
        Some(PipelineError::Malformed(msg)) => PipelineError::Malformed(msg.clone()),
        _ => PipelineError::Cache(err),
    }
}

/// The canonical composition used before matching: locus normalization,
/// code expansion, G-group expansion
pub fn canonical_pipeline(
    store: Arc<dyn AlleleStore>,
    config: &PipelineConfig,
    caches: &CacheSettings,
) -> GlStringPipeline {
    GlStringPipeline::new(vec![
        Arc::new(LocusStage::new(config)),
        Arc::new(CodeExpansionStage::new(Arc::clone(&store), caches)),
        Arc::new(GGroupStage::new(store, caches)),
    ])
}

/// A pipeline that only applies ARS truncation
pub fn ars_pipeline() -> GlStringPipeline {
    GlStringPipeline::new(vec![Arc::new(ArsStage)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_store() -> Arc<dyn AlleleStore> {
        Arc::new(
            MemoryStore::new()
                .with_group("HLA-DPB1*01:01:01", 3)
                .with_group("HLA-DPB1*01:02", 3)
                .with_group("HLA-DPB1*02:01", 3)
                .with_code("AFC", &["01:01", "02:01", "02:02", "03:01"])
                .with_code("BDVG", &["01", "02"])
                .with_g_group("HLA-DPB1*04:01", &["04:01:01", "04:01:02"]),
        )
    }

    fn canonical() -> GlStringPipeline {
        canonical_pipeline(
            test_store(),
            &PipelineConfig::default(),
            &CacheSettings::default(),
        )
    }

    #[test]
    fn test_locus_stage_defaults() {
        let stage = LocusStage::new(&PipelineConfig::default());
        assert_eq!(stage.rewrite("01:01").unwrap(), "HLA-DPB1*01:01");
        assert_eq!(stage.rewrite("DPB1*01:01").unwrap(), "HLA-DPB1*01:01");
        assert_eq!(stage.rewrite("HLA-DPB1*01:01").unwrap(), "HLA-DPB1*01:01");
    }

    #[test]
    fn test_locus_stage_without_default() {
        let stage = LocusStage::new(&PipelineConfig {
            default_locus: None,
            ..Default::default()
        });
        assert!(matches!(
            stage.rewrite("01:01"),
            Err(PipelineError::MissingLocus { .. })
        ));
        assert_eq!(stage.rewrite("DPB1*01:01").unwrap(), "HLA-DPB1*01:01");
    }

    #[test]
    fn test_code_token_detection() {
        assert!(is_code_token("HLA-DPB1*01:AFC"));
        assert!(is_code_token("HLA-DPB1*01:XX"));
        assert!(!is_code_token("HLA-DPB1*01:01"));
        assert!(!is_code_token("HLA-DPB1*01:01N"));
        assert!(!is_code_token("HLA-DPB1*01:01:01"));
        assert!(!is_code_token("01:AFC"));
    }

    #[test]
    fn test_code_expansion_specific() {
        let stage = CodeExpansionStage::new(test_store(), &CacheSettings::default());
        assert_eq!(
            stage.rewrite("HLA-DPB1*01:AFC").unwrap(),
            "HLA-DPB1*01:01/HLA-DPB1*02:01/HLA-DPB1*02:02/HLA-DPB1*03:01"
        );
    }

    #[test]
    fn test_code_expansion_generic_reattaches_family() {
        let stage = CodeExpansionStage::new(test_store(), &CacheSettings::default());
        assert_eq!(
            stage.rewrite("HLA-DPB1*05:BDVG").unwrap(),
            "HLA-DPB1*05:01/HLA-DPB1*05:02"
        );
    }

    #[test]
    fn test_xx_expands_to_family() {
        let stage = CodeExpansionStage::new(test_store(), &CacheSettings::default());
        assert_eq!(
            stage.rewrite("HLA-DPB1*01:XX").unwrap(),
            "HLA-DPB1*01:01:01/HLA-DPB1*01:02"
        );
    }

    #[test]
    fn test_unrecognized_code_is_distinct_error() {
        let stage = CodeExpansionStage::new(test_store(), &CacheSettings::default());
        assert!(matches!(
            stage.rewrite("HLA-DPB1*01:ZZZZ"),
            Err(PipelineError::UnrecognizedCode { .. })
        ));
    }

    #[test]
    fn test_g_group_expansion_and_leniency() {
        let stage = GGroupStage::new(test_store(), &CacheSettings::default());
        assert_eq!(
            stage.rewrite("HLA-DPB1*04:01").unwrap(),
            "HLA-DPB1*04:01:01/HLA-DPB1*04:01:02"
        );
        // Two-field allele naming no group passes through silently
        assert_eq!(stage.rewrite("HLA-DPB1*01:01").unwrap(), "HLA-DPB1*01:01");
        // Three-field tokens are not group candidates
        assert_eq!(
            stage.rewrite("HLA-DPB1*04:01:01").unwrap(),
            "HLA-DPB1*04:01:01"
        );
    }

    #[test]
    fn test_ars_stage() {
        let stage = ArsStage;
        assert_eq!(
            stage.rewrite("HLA-DPB1*01:01:01").unwrap(),
            "HLA-DPB1*01:01"
        );
        assert_eq!(
            stage.rewrite("HLA-DPB1*04:01:01:24N").unwrap(),
            "HLA-DPB1*04:01N"
        );
    }

    #[test]
    fn test_canonical_pipeline_end_to_end() {
        let pipeline = canonical();
        let out = pipeline.normalize("01:AFC+04:01").unwrap();
        assert_eq!(
            out,
            "HLA-DPB1*01:01/HLA-DPB1*02:01/HLA-DPB1*02:02/HLA-DPB1*03:01\
             +HLA-DPB1*04:01:01/HLA-DPB1*04:01:02"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let pipeline = canonical();
        let once = pipeline.normalize("01:AFC+04:01").unwrap();
        let twice = pipeline.normalize(&once).unwrap();
        assert_eq!(once, twice);
    }
}
