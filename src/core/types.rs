use serde::{Deserialize, Serialize};

/// Clinical match outcome for a donor/recipient allele-pair combination.
///
/// The first five variants are the outcomes the probability distribution is
/// accumulated over. `Potential` and `NonPermissiveUndefined` are
/// reported-only composites, used when no probabilities are computable and
/// the unweighted combinations disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchGrade {
    #[serde(rename = "MATCH")]
    Match,
    #[serde(rename = "PERMISSIVE")]
    Permissive,
    #[serde(rename = "HVG_NONPERMISSIVE")]
    HvgNonPermissive,
    #[serde(rename = "GVH_NONPERMISSIVE")]
    GvhNonPermissive,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "POTENTIAL")]
    Potential,
    #[serde(rename = "NONPERMISSIVE_UNDEFINED")]
    NonPermissiveUndefined,
}

impl std::fmt::Display for MatchGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Match => "MATCH",
            Self::Permissive => "PERMISSIVE",
            Self::HvgNonPermissive => "HVG_NONPERMISSIVE",
            Self::GvhNonPermissive => "GVH_NONPERMISSIVE",
            Self::Unknown => "UNKNOWN",
            Self::Potential => "POTENTIAL",
            Self::NonPermissiveUndefined => "NONPERMISSIVE_UNDEFINED",
        };
        write!(f, "{s}")
    }
}

/// The five probability outcomes, normalized to sum to 1.0 at the
/// configured precision. A grade whose accumulated weight was exactly zero
/// reports exactly 0.0, never a small remainder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchProbabilities {
    #[serde(rename = "match")]
    pub match_: f64,
    pub permissive: f64,
    pub hvg_non_permissive: f64,
    pub gvh_non_permissive: f64,
    pub unknown: f64,
}

impl MatchProbabilities {
    pub fn sum(&self) -> f64 {
        self.match_
            + self.permissive
            + self.hvg_non_permissive
            + self.gvh_non_permissive
            + self.unknown
    }
}

/// Outcome of a match computation: one reported grade, plus the probability
/// distribution when both populations had frequency data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub grade: MatchGrade,

    /// Absent on the grade-only path (no usable frequency data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<MatchProbabilities>,
}

impl MatchResult {
    pub fn grade_only(grade: MatchGrade) -> Self {
        Self {
            grade,
            probabilities: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_serde_names() {
        let json = serde_json::to_string(&MatchGrade::HvgNonPermissive).unwrap();
        assert_eq!(json, "\"HVG_NONPERMISSIVE\"");
        let back: MatchGrade = serde_json::from_str("\"NONPERMISSIVE_UNDEFINED\"").unwrap();
        assert_eq!(back, MatchGrade::NonPermissiveUndefined);
    }

    #[test]
    fn test_probabilities_sum() {
        let p = MatchProbabilities {
            match_: 0.5,
            permissive: 0.25,
            hvg_non_permissive: 0.25,
            gvh_non_permissive: 0.0,
            unknown: 0.0,
        };
        assert!((p.sum() - 1.0).abs() < 1e-12);
    }
}
