use serde::{Deserialize, Serialize};

/// Broad population category used for frequency fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadRace {
    /// African American / Black
    Afa,
    /// Asian / Pacific Islander
    Api,
    /// Caucasian
    Cau,
    /// Hispanic
    His,
    /// Native American
    Nam,
}

impl BroadRace {
    pub fn code(self) -> &'static str {
        match self {
            Self::Afa => "AFA",
            Self::Api => "API",
            Self::Cau => "CAU",
            Self::His => "HIS",
            Self::Nam => "NAM",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "AFA" => Some(Self::Afa),
            "API" => Some(Self::Api),
            "CAU" => Some(Self::Cau),
            "HIS" => Some(Self::His),
            "NAM" => Some(Self::Nam),
            _ => None,
        }
    }
}

impl std::fmt::Display for BroadRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Detailed population category. Every detail race belongs to exactly one
/// [`BroadRace`]; frequency lookup falls back detail to broad when no
/// detail-level row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailRace {
    /// African American
    Aafa,
    /// African
    Afb,
    /// Caribbean Black
    Carb,
    /// Asian Indian
    Aindi,
    /// Filipino
    Filii,
    /// Japanese
    Japi,
    /// Korean
    Kori,
    /// North Chinese
    Nchi,
    /// Vietnamese
    Viet,
    /// European Caucasian
    Eurcau,
    /// Middle Eastern / North African
    Menafc,
    /// Caribbean Hispanic
    Carhis,
    /// Mexican / Southwest Hispanic
    Mswhis,
    /// South / Central American Hispanic
    Scahis,
    /// American Indian
    Amind,
    /// Caribbean Indian
    Caribi,
}

impl DetailRace {
    pub fn code(self) -> &'static str {
        match self {
            Self::Aafa => "AAFA",
            Self::Afb => "AFB",
            Self::Carb => "CARB",
            Self::Aindi => "AINDI",
            Self::Filii => "FILII",
            Self::Japi => "JAPI",
            Self::Kori => "KORI",
            Self::Nchi => "NCHI",
            Self::Viet => "VIET",
            Self::Eurcau => "EURCAU",
            Self::Menafc => "MENAFC",
            Self::Carhis => "CARHIS",
            Self::Mswhis => "MSWHIS",
            Self::Scahis => "SCAHIS",
            Self::Amind => "AMIND",
            Self::Caribi => "CARIBI",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "AAFA" => Some(Self::Aafa),
            "AFB" => Some(Self::Afb),
            "CARB" => Some(Self::Carb),
            "AINDI" => Some(Self::Aindi),
            "FILII" => Some(Self::Filii),
            "JAPI" => Some(Self::Japi),
            "KORI" => Some(Self::Kori),
            "NCHI" => Some(Self::Nchi),
            "VIET" => Some(Self::Viet),
            "EURCAU" => Some(Self::Eurcau),
            "MENAFC" => Some(Self::Menafc),
            "CARHIS" => Some(Self::Carhis),
            "MSWHIS" => Some(Self::Mswhis),
            "SCAHIS" => Some(Self::Scahis),
            "AMIND" => Some(Self::Amind),
            "CARIBI" => Some(Self::Caribi),
            _ => None,
        }
    }

    /// The broad category this detail race rolls up into
    pub fn broad(self) -> BroadRace {
        match self {
            Self::Aafa | Self::Afb | Self::Carb => BroadRace::Afa,
            Self::Aindi | Self::Filii | Self::Japi | Self::Kori | Self::Nchi | Self::Viet => {
                BroadRace::Api
            }
            Self::Eurcau | Self::Menafc => BroadRace::Cau,
            Self::Carhis | Self::Mswhis | Self::Scahis => BroadRace::His,
            Self::Amind | Self::Caribi => BroadRace::Nam,
        }
    }
}

impl std::fmt::Display for DetailRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Population context supplied with a genotype. `Unknown` is valid input;
/// it routes every frequency lookup to the configured baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    Detail(DetailRace),
    Broad(BroadRace),
    #[default]
    Unknown,
}

impl Population {
    /// Parse a race code, trying detail codes first, then broad.
    /// Empty or unrecognized input is `None`; callers decide whether that
    /// is `Unknown` or an error.
    pub fn parse(code: &str) -> Option<Self> {
        if code.trim().is_empty() {
            return None;
        }
        DetailRace::parse(code)
            .map(Self::Detail)
            .or_else(|| BroadRace::parse(code).map(Self::Broad))
    }
}

impl std::fmt::Display for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detail(d) => write!(f, "{d}"),
            Self::Broad(b) => write!(f, "{b}"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_to_broad() {
        assert_eq!(DetailRace::Aafa.broad(), BroadRace::Afa);
        assert_eq!(DetailRace::Japi.broad(), BroadRace::Api);
        assert_eq!(DetailRace::Eurcau.broad(), BroadRace::Cau);
        assert_eq!(DetailRace::Mswhis.broad(), BroadRace::His);
        assert_eq!(DetailRace::Amind.broad(), BroadRace::Nam);
    }

    #[test]
    fn test_parse_round_trip() {
        for race in [DetailRace::Aafa, DetailRace::Viet, DetailRace::Caribi] {
            assert_eq!(DetailRace::parse(race.code()), Some(race));
        }
        assert_eq!(Population::parse("EURCAU"), Some(Population::Detail(DetailRace::Eurcau)));
        assert_eq!(Population::parse("cau"), Some(Population::Broad(BroadRace::Cau)));
        assert_eq!(Population::parse("MARTIAN"), None);
        assert_eq!(Population::parse(""), None);
    }
}
