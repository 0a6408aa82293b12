//! The GL string normalization pipeline.
//!
//! A GL string is rewritten token by token: a token is any maximal
//! substring between the grammar delimiters `/ ~ + | ^` (or the string
//! ends). Each [`Stage`] receives one token at a time, left to right, and
//! returns a replacement substring. A replacement may itself contain
//! delimiters (a code expanding to several alleles joined by `/`); it is
//! not re-split for the same stage but is visible to subsequent stages.
//!
//! The canonical composition is locus normalization, then allele-code
//! expansion, then G-group expansion. ARS field truncation is a separate
//! stage applied only where requested (frequency lookup), never on the
//! canonical output used for matching.
//!
//! Stages backed by external tables are individually wrapped in a
//! [`crate::cache::RefreshingCache`] keyed by the raw token; the pipeline
//! itself performs no caching.

pub mod stages;

use std::sync::Arc;

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;
use crate::utils::limits::{check_gl_length, check_token_limit, LimitError};

pub use stages::{ars_pipeline, canonical_pipeline, PipelineConfig};

/// Delimiters of the GL string grammar
pub const DELIMITERS: [char; 5] = ['/', '~', '+', '|', '^'];

pub fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input does not match the token/delimiter grammar
    #[error("malformed GL string: {0}")]
    Malformed(String),

    /// Input limits exceeded (treated as malformed input by callers)
    #[error(transparent)]
    Limit(#[from] LimitError),

    /// Token lacks a locus and no default locus is configured
    #[error("token '{token}' has no locus and no default locus is configured")]
    MissingLocus { token: String },

    /// An allele code has no entry in the backing table
    #[error("unrecognized allele code in token '{token}'")]
    UnrecognizedCode { token: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PipelineError {
    /// True for errors a boundary layer should report as bad input rather
    /// than an unresolvable reference or an internal failure
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Limit(_) | Self::MissingLocus { .. })
    }
}

/// One rewriting stage of the pipeline
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite a single token; return it unchanged when not applicable
    fn rewrite(&self, token: &str) -> Result<String, PipelineError>;
}

/// Apply `rewrite` to every token of `input`, preserving delimiters.
///
/// # Errors
///
/// `Malformed` on empty tokens (adjacent delimiters, or a delimiter at
/// either end of the string); token-limit errors; any error from `rewrite`.
pub fn rewrite_tokens<F>(input: &str, mut rewrite: F) -> Result<String, PipelineError>
where
    F: FnMut(&str) -> Result<String, PipelineError>,
{
    if input.is_empty() {
        return Err(PipelineError::Malformed("empty GL string".to_string()));
    }

    let mut out = String::with_capacity(input.len());
    let mut token = String::new();
    let mut tokens_seen = 0usize;

    let mut flush = |token: &mut String, out: &mut String, seen: &mut usize| {
        if token.is_empty() {
            return Err(PipelineError::Malformed(
                "empty token between delimiters".to_string(),
            ));
        }
        check_token_limit(*seen)?;
        *seen += 1;
        out.push_str(&rewrite(token)?);
        token.clear();
        Ok(())
    };

    for c in input.chars() {
        if is_delimiter(c) {
            flush(&mut token, &mut out, &mut tokens_seen)?;
            out.push(c);
        } else {
            token.push(c);
        }
    }
    flush(&mut token, &mut out, &mut tokens_seen)?;

    Ok(out)
}

/// An ordered composition of stages over the GL token grammar
pub struct GlStringPipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl GlStringPipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Rewrite a free-form GL string into canonical form.
    ///
    /// Idempotent: output contains no further codes, group tokens, or
    /// non-canonical prefixes for any stage to rewrite.
    ///
    /// # Errors
    ///
    /// See [`PipelineError`]; normalization errors abort the whole request.
    pub fn normalize(&self, raw: &str) -> Result<String, PipelineError> {
        check_gl_length(raw)?;
        let mut current = raw.trim().to_string();
        for stage in &self.stages {
            current = rewrite_tokens(&current, |token| stage.rewrite(token))?;
        }
        Ok(current)
    }
}
