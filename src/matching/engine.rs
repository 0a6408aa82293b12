//! The match engine: normalization, pair expansion, frequency weighting,
//! grading, and the five-outcome probability distribution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheError, CacheSettings};
use crate::core::genotype::GenotypeList;
use crate::core::population::Population;
use crate::core::types::{MatchGrade, MatchProbabilities, MatchResult};
use crate::matching::pairs::{expand_pairs, AllelePair};
use crate::matching::trace::TraceCollector;
use crate::matching::MatchError;
use crate::pipeline::stages::{canonical_pipeline, PipelineConfig};
use crate::pipeline::GlStringPipeline;
use crate::resolver::{FrequencyResolver, GroupResolver, DEFAULT_BASELINE_FREQUENCY};
use crate::store::AlleleStore;

/// Outcome grades in reporting priority order
const PRIORITY: [MatchGrade; 5] = [
    MatchGrade::Match,
    MatchGrade::Permissive,
    MatchGrade::HvgNonPermissive,
    MatchGrade::GvhNonPermissive,
    MatchGrade::Unknown,
];

/// Engine-wide settings; the defaults describe the production deployment
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target locus both genotypes are evaluated at
    pub locus: String,

    /// Decimal places probabilities are rounded to
    pub precision: u32,

    /// Frequency assumed when a population has no data at all
    pub baseline_frequency: f64,

    pub pipeline: PipelineConfig,
    pub cache: CacheSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locus: "HLA-DPB1".to_string(),
            precision: 4,
            baseline_frequency: DEFAULT_BASELINE_FREQUENCY,
            pipeline: PipelineConfig::default(),
            cache: CacheSettings::default(),
        }
    }
}

/// One match computation request
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub recipient_gl: String,
    pub recipient_population: Population,
    pub donor_gl: String,
    pub donor_population: Population,
    /// Collect a human-readable evaluation log alongside the result
    pub trace: bool,
}

/// The result together with its (optional) evaluation trace
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    #[serde(flatten)]
    pub result: MatchResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

/// Computes recipient/donor match grades and probabilities.
///
/// Holds the normalization pipeline and both resolvers; a single engine is
/// shared across calls and is safe to use from multiple threads.
pub struct MatchEngine {
    pipeline: GlStringPipeline,
    groups: GroupResolver,
    frequencies: FrequencyResolver,
    config: EngineConfig,
}

impl MatchEngine {
    /// Build an engine over the given store.
    ///
    /// # Errors
    ///
    /// Fails if the initial group-table load fails.
    pub fn new(store: Arc<dyn AlleleStore>, config: EngineConfig) -> Result<Self, CacheError> {
        let pipeline = canonical_pipeline(Arc::clone(&store), &config.pipeline, &config.cache);
        let groups = GroupResolver::new(Arc::clone(&store), &config.cache)?;
        let frequencies =
            FrequencyResolver::new(store, &config.cache, config.baseline_frequency);
        Ok(Self {
            pipeline,
            groups,
            frequencies,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &GlStringPipeline {
        &self.pipeline
    }

    pub fn groups(&self) -> &GroupResolver {
        &self.groups
    }

    pub fn frequencies(&self) -> &FrequencyResolver {
        &self.frequencies
    }

    /// Compute the match result for one recipient/donor query.
    ///
    /// Probabilities are produced when both populations carry frequency
    /// data and at least one pair per side survives zero-weight dropping;
    /// otherwise the result is grade-only.
    ///
    /// # Errors
    ///
    /// Propagates normalization, parse, and expansion failures; never
    /// fails on missing group or frequency data.
    pub fn compute(&self, query: &MatchQuery) -> Result<MatchReport, MatchError> {
        let mut trace = if query.trace {
            TraceCollector::enabled()
        } else {
            TraceCollector::disabled()
        };

        let recipient = self.expand_side(&query.recipient_gl, "recipient", &mut trace)?;
        let donor = self.expand_side(&query.donor_gl, "donor", &mut trace)?;

        let both_have_data = self.frequencies.population_has_data(&query.recipient_population)
            && self.frequencies.population_has_data(&query.donor_population);

        let result = if both_have_data {
            let weighted_recipient =
                self.weigh(&recipient, &query.recipient_population, "recipient", &mut trace);
            let weighted_donor = self.weigh(&donor, &query.donor_population, "donor", &mut trace);

            if weighted_recipient.is_empty() || weighted_donor.is_empty() {
                trace.note(|| {
                    "every pair on one side had zero weight; reporting grade only".to_string()
                });
                self.grade_only(&recipient, &donor, &mut trace)
            } else {
                self.weighted(&weighted_recipient, &weighted_donor, &mut trace)
            }
        } else {
            trace.note(|| "no frequency data for a population; reporting grade only".to_string());
            self.grade_only(&recipient, &donor, &mut trace)
        };

        debug!(grade = %result.grade, "match computed");
        Ok(MatchReport {
            result,
            trace: query.trace.then(|| trace.into_lines()),
        })
    }

    fn expand_side(
        &self,
        gl: &str,
        side: &'static str,
        trace: &mut TraceCollector,
    ) -> Result<Vec<AllelePair>, MatchError> {
        let normalized = self.pipeline.normalize(gl)?;
        trace.note(|| format!("{side} normalized: {normalized}"));
        let list = GenotypeList::parse(&normalized, &self.config.locus)?;
        let pairs = expand_pairs(&list, &self.config.locus, side, &self.groups)?;
        trace.note(|| format!("{side} expands to {} pair(s)", pairs.len()));
        Ok(pairs)
    }

    fn weigh(
        &self,
        pairs: &[AllelePair],
        population: &Population,
        side: &'static str,
        trace: &mut TraceCollector,
    ) -> Vec<(AllelePair, f64)> {
        pairs
            .iter()
            .filter_map(|pair| {
                let weight = self.frequencies.resolve(pair.first().as_str(), population)
                    * self.frequencies.resolve(pair.second().as_str(), population);
                if weight > 0.0 {
                    Some((pair.clone(), weight))
                } else {
                    trace.note(|| format!("dropped {side} pair {pair}: zero frequency weight"));
                    None
                }
            })
            .collect()
    }

    fn weighted(
        &self,
        recipient: &[(AllelePair, f64)],
        donor: &[(AllelePair, f64)],
        trace: &mut TraceCollector,
    ) -> MatchResult {
        let mut totals = [0.0_f64; 5];
        for (r, rw) in recipient {
            for (d, dw) in donor {
                let grade = classify(r, d);
                let weight = rw * dw;
                totals[grade_index(grade)] += weight;
                trace.note(|| {
                    format!(
                        "{r} [{}] vs {d} [{}] -> {grade} (weight {weight:.3e})",
                        r.group_label(),
                        d.group_label()
                    )
                });
            }
        }

        let probabilities = round_distribution(&totals, self.config.precision);
        let grade = PRIORITY
            .into_iter()
            .find(|g| totals[grade_index(*g)] > 0.0)
            .unwrap_or(MatchGrade::Unknown);
        MatchResult {
            grade,
            probabilities: Some(probabilities),
        }
    }

    fn grade_only(
        &self,
        recipient: &[AllelePair],
        donor: &[AllelePair],
        trace: &mut TraceCollector,
    ) -> MatchResult {
        let mut present = [false; 5];
        for r in recipient {
            for d in donor {
                let grade = classify(r, d);
                present[grade_index(grade)] = true;
                trace.note(|| {
                    format!(
                        "{r} [{}] vs {d} [{}] -> {grade}",
                        r.group_label(),
                        d.group_label()
                    )
                });
            }
        }
        MatchResult::grade_only(composite_grade(&present))
    }
}

/// Grade one recipient/donor pair combination
fn classify(recipient: &AllelePair, donor: &AllelePair) -> MatchGrade {
    if recipient.same_content(donor) {
        return MatchGrade::Match;
    }
    match (recipient.low_group(), donor.low_group()) {
        (Some(r), Some(d)) => match r.cmp(&d) {
            std::cmp::Ordering::Equal => MatchGrade::Permissive,
            std::cmp::Ordering::Less => MatchGrade::GvhNonPermissive,
            std::cmp::Ordering::Greater => MatchGrade::HvgNonPermissive,
        },
        _ => MatchGrade::Unknown,
    }
}

fn grade_index(grade: MatchGrade) -> usize {
    match grade {
        MatchGrade::Match => 0,
        MatchGrade::Permissive => 1,
        MatchGrade::HvgNonPermissive => 2,
        MatchGrade::GvhNonPermissive => 3,
        _ => 4,
    }
}

/// Collapse the set of observed grades into a single reported one when no
/// probabilities are computable
fn composite_grade(present: &[bool; 5]) -> MatchGrade {
    let observed: Vec<MatchGrade> = PRIORITY
        .into_iter()
        .filter(|g| present[grade_index(*g)])
        .collect();
    match observed.as_slice() {
        [] => MatchGrade::Unknown,
        [only] => *only,
        _ if present[grade_index(MatchGrade::Match)] => MatchGrade::Potential,
        _ if present[grade_index(MatchGrade::HvgNonPermissive)]
            && present[grade_index(MatchGrade::GvhNonPermissive)] =>
        {
            MatchGrade::NonPermissiveUndefined
        }
        [highest, ..] => *highest,
    }
}

/// Normalize the accumulated weights and round to `precision` decimal
/// places in integer units, charging the rounding residual to the
/// largest-weight bucket. A bucket whose raw weight is exactly zero stays
/// exactly 0.0.
fn round_distribution(totals: &[f64; 5], precision: u32) -> MatchProbabilities {
    let sum: f64 = totals.iter().sum();
    let units = 10_i64.pow(precision);
    let mut buckets = [0_i64; 5];
    for (bucket, &weight) in buckets.iter_mut().zip(totals) {
        *bucket = ((weight / sum) * units as f64).round() as i64;
    }

    let residual = units - buckets.iter().sum::<i64>();
    if residual != 0 {
        let largest = totals
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i);
        if let Some(i) = largest {
            buckets[i] += residual;
        }
    }

    let scale = units as f64;
    MatchProbabilities {
        match_: buckets[0] as f64 / scale,
        permissive: buckets[1] as f64 / scale,
        hvg_non_permissive: buckets[2] as f64 / scale,
        gvh_non_permissive: buckets[3] as f64 / scale,
        unknown: buckets[4] as f64 / scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::population::BroadRace;
    use crate::store::{MemoryStore, PopulationKey};

    const CAU: PopulationKey = PopulationKey::Broad(BroadRace::Cau);

    fn test_store() -> MemoryStore {
        MemoryStore::new()
            .with_group("HLA-DPB1*01:01", 3)
            .with_group("HLA-DPB1*02:01", 3)
            .with_group("HLA-DPB1*03:01", 2)
            .with_group("HLA-DPB1*04:01", 3)
            .with_group("HLA-DPB1*09:01", 1)
            .with_frequency(CAU, "HLA-DPB1*01:01", 0.10)
            .with_frequency(CAU, "HLA-DPB1*02:01", 0.20)
            .with_frequency(CAU, "HLA-DPB1*03:01", 0.10)
            .with_frequency(CAU, "HLA-DPB1*04:01", 0.40)
    }

    fn engine() -> MatchEngine {
        MatchEngine::new(Arc::new(test_store()), EngineConfig::default()).unwrap()
    }

    fn query(recipient: &str, donor: &str, population: Population) -> MatchQuery {
        MatchQuery {
            recipient_gl: recipient.to_string(),
            recipient_population: population.clone(),
            donor_gl: donor.to_string(),
            donor_population: population,
            trace: false,
        }
    }

    fn cau() -> Population {
        Population::Broad(BroadRace::Cau)
    }

    #[test]
    fn test_identical_genotypes_match_with_probability_one() {
        let report = engine()
            .compute(&query("01:01+02:01", "01:01+02:01", cau()))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::Match);
        let p = report.result.probabilities.unwrap();
        assert_eq!(p.match_, 1.0);
        assert_eq!(p.permissive, 0.0);
        assert_eq!(p.hvg_non_permissive, 0.0);
        assert_eq!(p.gvh_non_permissive, 0.0);
        assert_eq!(p.unknown, 0.0);
    }

    #[test]
    fn test_grade_only_without_population_data() {
        // Recipient low group 3 vs donor low group 2: host-vs-graft risk
        let report = engine()
            .compute(&query("01:01+02:01", "02:01+03:01", Population::Unknown))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::HvgNonPermissive);
        assert!(report.result.probabilities.is_none());
    }

    #[test]
    fn test_ambiguous_recipient_splits_distribution() {
        // Pair {01:01,02:01} matches the donor; pair {02:01,03:01} has the
        // lower group and grades GVH. Equal weights split 50/50.
        let report = engine()
            .compute(&query("01:01/03:01+02:01", "01:01+02:01", cau()))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::Match);
        let p = report.result.probabilities.unwrap();
        assert!((p.match_ - 0.5).abs() < 1e-9);
        assert!((p.gvh_non_permissive - 0.5).abs() < 1e-9);
        assert_eq!(p.permissive, 0.0);
    }

    #[test]
    fn test_swap_exchanges_gvh_and_hvg() {
        let forward = engine()
            .compute(&query("01:01/03:01+02:01", "01:01+04:01", cau()))
            .unwrap();
        let swapped = engine()
            .compute(&query("01:01+04:01", "01:01/03:01+02:01", cau()))
            .unwrap();
        let f = forward.result.probabilities.unwrap();
        let s = swapped.result.probabilities.unwrap();
        assert_eq!(f.match_, s.match_);
        assert_eq!(f.permissive, s.permissive);
        assert_eq!(f.unknown, s.unknown);
        assert_eq!(f.gvh_non_permissive, s.hvg_non_permissive);
        assert_eq!(f.hvg_non_permissive, s.gvh_non_permissive);
    }

    #[test]
    fn test_probabilities_conserve_at_precision() {
        let report = engine()
            .compute(&query("01:01/02:01/03:01+04:01", "01:01+04:01", cau()))
            .unwrap();
        let p = report.result.probabilities.unwrap();
        assert!((p.sum() - 1.0).abs() < 1e-9);
        // Every bucket is a multiple of 10^-precision
        for value in [
            p.match_,
            p.permissive,
            p.hvg_non_permissive,
            p.gvh_non_permissive,
            p.unknown,
        ] {
            let scaled = value * 1e4;
            assert!((scaled - scaled.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_homozygous_shorthand_equivalence() {
        let shorthand = engine()
            .compute(&query("04:01", "01:01+02:01", cau()))
            .unwrap();
        let explicit = engine()
            .compute(&query("04:01+04:01", "01:01+02:01", cau()))
            .unwrap();
        assert_eq!(shorthand.result, explicit.result);
    }

    #[test]
    fn test_zero_weight_pairs_are_dropped() {
        // 09:01 has no frequency row in a populated table, so its pair
        // contributes nothing; only the matching pair remains.
        let report = engine()
            .compute(&query("01:01/09:01+02:01", "01:01+02:01", cau()))
            .unwrap();
        let p = report.result.probabilities.unwrap();
        assert_eq!(p.match_, 1.0);
    }

    #[test]
    fn test_all_pairs_dropped_falls_back_to_grade_only() {
        let report = engine()
            .compute(&query("09:01+09:01", "01:01+02:01", cau()))
            .unwrap();
        assert!(report.result.probabilities.is_none());
        // Recipient low 1 vs donor low 3
        assert_eq!(report.result.grade, MatchGrade::GvhNonPermissive);
    }

    #[test]
    fn test_grade_only_match_among_others_is_potential() {
        let report = engine()
            .compute(&query(
                "01:01+02:01|03:01+03:01",
                "01:01+02:01",
                Population::Unknown,
            ))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::Potential);
    }

    #[test]
    fn test_grade_only_both_directions_is_undefined_nonpermissive() {
        // One genotype grades HVG, the other GVH, none match
        let report = engine()
            .compute(&query(
                "01:01+01:01|09:01+09:01",
                "03:01+03:01",
                Population::Unknown,
            ))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::NonPermissiveUndefined);
    }

    #[test]
    fn test_unresolved_group_grades_unknown() {
        let report = engine()
            .compute(&query("77:01+77:01", "01:01+02:01", Population::Unknown))
            .unwrap();
        assert_eq!(report.result.grade, MatchGrade::Unknown);
    }

    #[test]
    fn test_trace_collection_is_opt_in() {
        let engine = engine();
        let mut q = query("01:01+02:01", "01:01+02:01", cau());
        let silent = engine.compute(&q).unwrap();
        assert!(silent.trace.is_none());

        q.trace = true;
        let traced = engine.compute(&q).unwrap();
        let lines = traced.trace.unwrap();
        assert!(!lines.is_empty());
        assert!(lines.iter().any(|l| l.contains("MATCH")));
    }

    #[test]
    fn test_residual_rounding_conserves_thirds() {
        let totals = [1.0, 1.0, 1.0, 0.0, 0.0];
        let p = round_distribution(&totals, 4);
        assert!((p.sum() - 1.0).abs() < 1e-12);
        assert_eq!(p.gvh_non_permissive, 0.0);
        assert_eq!(p.unknown, 0.0);
    }

    #[test]
    fn test_classify_directionality() {
        let pair = |a: &str, g| {
            AllelePair::new(
                (crate::core::allele::Allele::parse(a).unwrap(), g),
                (crate::core::allele::Allele::parse(a).unwrap(), g),
            )
        };
        let low = pair("HLA-DPB1*03:01", Some(2));
        let high = pair("HLA-DPB1*01:01", Some(3));
        assert_eq!(classify(&high, &low), MatchGrade::HvgNonPermissive);
        assert_eq!(classify(&low, &high), MatchGrade::GvhNonPermissive);
        assert_eq!(classify(&low, &low), MatchGrade::Match);
    }
}
