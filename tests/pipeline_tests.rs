//! Normalization pipeline behavior against a file-backed table directory.

use std::path::Path;
use std::sync::Arc;

use tce_match::cache::CacheSettings;
use tce_match::pipeline::{canonical_pipeline, GlStringPipeline, PipelineConfig, PipelineError};
use tce_match::store::FileStore;

fn write_tables(dir: &Path) {
    std::fs::write(
        dir.join("tce_groups.tsv"),
        "HLA-DPB1*01:01:01\t3\nHLA-DPB1*01:02\t3\nHLA-DPB1*02:01\t3\nHLA-DPB1*03:01\t2\n",
    )
    .unwrap();
    std::fs::write(dir.join("allele_codes.tsv"), "AFC\t01:01/02:01/02:02/03:01\nBDVG\t01/02\n")
        .unwrap();
    std::fs::write(
        dir.join("g_groups.tsv"),
        "HLA-DPB1*04:01\t04:01:01/04:01:02\n",
    )
    .unwrap();
    std::fs::write(dir.join("frequencies.tsv"), "").unwrap();
}

fn pipeline(dir: &Path) -> GlStringPipeline {
    let store = Arc::new(FileStore::new(dir));
    canonical_pipeline(store, &PipelineConfig::default(), &CacheSettings::default())
}

#[test]
fn bare_fields_get_the_default_locus() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let out = pipeline(dir.path()).normalize("01:01+02:01").unwrap();
    assert_eq!(out, "HLA-DPB1*01:01+HLA-DPB1*02:01");
}

#[test]
fn codes_and_g_groups_expand_in_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let out = pipeline(dir.path()).normalize("01:AFC+04:01").unwrap();
    assert_eq!(
        out,
        "HLA-DPB1*01:01/HLA-DPB1*02:01/HLA-DPB1*02:02/HLA-DPB1*03:01\
         +HLA-DPB1*04:01:01/HLA-DPB1*04:01:02"
    );
}

#[test]
fn normalization_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let p = pipeline(dir.path());
    let once = p.normalize("01:AFC+04:01").unwrap();
    let twice = p.normalize(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn generic_code_reattaches_the_family() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let out = pipeline(dir.path()).normalize("09:BDVG").unwrap();
    assert_eq!(out, "HLA-DPB1*09:01/HLA-DPB1*09:02");
}

#[test]
fn xx_code_expands_to_the_whole_family() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let out = pipeline(dir.path()).normalize("01:XX").unwrap();
    assert_eq!(out, "HLA-DPB1*01:01:01/HLA-DPB1*01:02");
}

#[test]
fn unknown_code_is_an_unresolvable_reference_not_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let err = pipeline(dir.path()).normalize("01:ZZZZ").unwrap_err();
    assert!(matches!(err, PipelineError::UnrecognizedCode { .. }));
    assert!(!err.is_malformed_input());
}

#[test]
fn adjacent_delimiters_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let err = pipeline(dir.path()).normalize("01:01//02:01").unwrap_err();
    assert!(err.is_malformed_input());
}

#[test]
fn oversized_input_is_rejected_before_any_expansion() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    let huge = "01:01/".repeat(2_000) + "01:01";
    let err = pipeline(dir.path()).normalize(&huge).unwrap_err();
    assert!(matches!(err, PipelineError::Limit(_)));
    assert!(err.is_malformed_input());
}
