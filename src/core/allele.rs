use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Organization namespace expected on every canonical locus (e.g. `HLA-DPB1`)
pub const NAMESPACE_PREFIX: &str = "HLA-";

/// Trailing marker on the last field of a null (non-expressed) allele
pub const NULL_MARKER: char = 'N';

/// Number of fields kept by ARS (antigen recognition site) truncation
pub const ARS_FIELD_COUNT: usize = 2;

/// Error raised when a token cannot be read as a canonical allele
#[derive(Debug, Clone, Error)]
#[error("invalid allele token '{0}'")]
pub struct InvalidAllele(pub String);

/// A canonical allele identifier: `<locus>*<colon-separated fields>`,
/// e.g. `HLA-DPB1*01:01:01`.
///
/// Immutable once constructed; equality is string identity. Pipeline
/// normalization is responsible for producing the canonical form before
/// an `Allele` is built, so construction only validates shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allele(String);

impl Allele {
    /// Parse a canonical allele token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAllele` if the token lacks a `locus*` prefix or has
    /// an empty locus or empty fields.
    pub fn parse(token: &str) -> Result<Self, InvalidAllele> {
        let Some((locus, fields)) = token.split_once('*') else {
            return Err(InvalidAllele(token.to_string()));
        };
        if locus.is_empty() || fields.is_empty() {
            return Err(InvalidAllele(token.to_string()));
        }
        if fields.split(':').any(str::is_empty) {
            return Err(InvalidAllele(token.to_string()));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locus portion, including the organization namespace (e.g. `HLA-DPB1`)
    pub fn locus(&self) -> &str {
        // Construction guarantees the '*' is present
        self.0.split_once('*').map(|(l, _)| l).unwrap_or(&self.0)
    }

    /// The colon-separated fields after the `*`
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0
            .split_once('*')
            .map(|(_, f)| f)
            .unwrap_or("")
            .split(':')
    }

    /// First numeric field, naming the allele family (e.g. `01` in
    /// `HLA-DPB1*01:01`)
    pub fn family(&self) -> &str {
        self.fields().next().unwrap_or("")
    }

    /// True if the last field carries the null (non-expressed) marker
    pub fn is_null(&self) -> bool {
        is_null_token(&self.0)
    }

    /// ARS reduction: at most two fields, preserving a trailing null marker
    pub fn ars_reduced(&self) -> Allele {
        Allele(ars_reduce(&self.0))
    }
}

impl std::fmt::Display for Allele {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True if an allele token's last field ends with the null marker
pub fn is_null_token(token: &str) -> bool {
    token
        .rsplit(':')
        .next()
        .is_some_and(|last| last.ends_with(NULL_MARKER))
}

/// Truncate an allele token to at most [`ARS_FIELD_COUNT`] fields.
///
/// A null marker on a truncated trailing field is carried onto the kept
/// portion: `HLA-DPB1*04:01:01:24N` becomes `HLA-DPB1*04:01N`. Tokens
/// without a `*` are returned unchanged.
pub fn ars_reduce(token: &str) -> String {
    let Some((locus, rest)) = token.split_once('*') else {
        return token.to_string();
    };
    let fields: Vec<&str> = rest.split(':').collect();
    if fields.len() <= ARS_FIELD_COUNT {
        return token.to_string();
    }
    let was_null = is_null_token(token);
    let mut reduced = fields[..ARS_FIELD_COUNT].join(":");
    if was_null && !reduced.ends_with(NULL_MARKER) {
        reduced.push(NULL_MARKER);
    }
    format!("{locus}*{reduced}")
}

/// Strip the last colon-separated field from an allele token.
///
/// Returns `None` once only a single field remains; the locus prefix is
/// never stripped. Used for progressive-truncation group resolution.
pub fn strip_last_field(token: &str) -> Option<String> {
    let (prefix, rest) = token.split_once('*')?;
    let idx = rest.rfind(':')?;
    Some(format!("{prefix}*{}", &rest[..idx]))
}
