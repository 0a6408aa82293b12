//! Centralized input limits (abuse protection).
//!
//! GL strings and store tables come from outside the process; these bounds
//! keep a hostile or corrupted input from driving unbounded expansion.

use thiserror::Error;

/// Maximum accepted length of a raw GL string
pub const MAX_GL_LENGTH: usize = 10_000;

/// Maximum number of allele tokens in one GL string
pub const MAX_GL_TOKENS: usize = 1_000;

/// Maximum distinct allele pairs expanded from one genotype list
pub const MAX_PAIRS_PER_SIDE: usize = 10_000;

/// Maximum number of rows accepted from a single store table
pub const MAX_TABLE_ROWS: usize = 500_000;

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("GL string too long: {0} characters exceeds maximum of {MAX_GL_LENGTH}")]
    GlTooLong(usize),

    #[error("GL string has too many tokens: {0} exceeds maximum of {MAX_GL_TOKENS}")]
    TooManyTokens(usize),

    #[error("genotype expansion too large: exceeds {MAX_PAIRS_PER_SIDE} allele pairs")]
    TooManyPairs,
}

/// Validate the raw length of a GL string before any processing.
///
/// # Errors
///
/// Returns `LimitError::GlTooLong` when the input exceeds [`MAX_GL_LENGTH`].
pub fn check_gl_length(gl: &str) -> Result<(), LimitError> {
    if gl.len() > MAX_GL_LENGTH {
        return Err(LimitError::GlTooLong(gl.len()));
    }
    Ok(())
}

/// Check a running token count against [`MAX_GL_TOKENS`].
///
/// Call with the count BEFORE processing the next token.
///
/// # Errors
///
/// Returns `LimitError::TooManyTokens` when the limit would be exceeded.
pub fn check_token_limit(count: usize) -> Result<(), LimitError> {
    if count >= MAX_GL_TOKENS {
        return Err(LimitError::TooManyTokens(count));
    }
    Ok(())
}

/// Check a running pair count against [`MAX_PAIRS_PER_SIDE`].
///
/// # Errors
///
/// Returns `LimitError::TooManyPairs` when the limit would be exceeded.
pub fn check_pair_limit(count: usize) -> Result<(), LimitError> {
    if count >= MAX_PAIRS_PER_SIDE {
        return Err(LimitError::TooManyPairs);
    }
    Ok(())
}
