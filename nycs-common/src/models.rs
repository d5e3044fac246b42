//! School directory and SAT score records
//!
//! Both datasets are keyed by `dbn` (district-borough-number). Records are
//! plain immutable values decoded straight from the open-data JSON arrays;
//! fields the API returns beyond the ones below are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the school directory dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct School {
    /// District-borough-number, unique per school
    pub dbn: String,
    /// Display name
    pub school_name: String,
    /// Raw one-letter borough code (`M`, `K`, `Q`, `X`, `R`)
    pub boro: String,
}

impl School {
    pub fn new(
        dbn: impl Into<String>,
        school_name: impl Into<String>,
        boro: impl Into<String>,
    ) -> Self {
        Self {
            dbn: dbn.into(),
            school_name: school_name.into(),
            boro: boro.into(),
        }
    }

    /// Borough decoded from the raw code
    pub fn borough(&self) -> Borough {
        Borough::from_code(&self.boro)
    }

    /// Expanded borough name, or the raw code when unrecognized
    pub fn borough_name(&self) -> String {
        self.borough().full_name().to_string()
    }
}

/// One entry of the SAT results dataset
///
/// Averages stay strings: the dataset reports suppressed results as `"s"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ScoreRecord {
    pub dbn: String,
    #[serde(rename = "sat_critical_reading_avg_score")]
    pub critical_reading_avg: String,
    #[serde(rename = "sat_math_avg_score")]
    pub math_avg: String,
    #[serde(rename = "sat_writing_avg_score")]
    pub writing_avg: String,
}

impl ScoreRecord {
    pub fn new(
        dbn: impl Into<String>,
        critical_reading_avg: impl Into<String>,
        math_avg: impl Into<String>,
        writing_avg: impl Into<String>,
    ) -> Self {
        Self {
            dbn: dbn.into(),
            critical_reading_avg: critical_reading_avg.into(),
            math_avg: math_avg.into(),
            writing_avg: writing_avg.into(),
        }
    }
}

/// NYC borough, decoded from the dataset's one-letter code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Borough {
    Manhattan,
    Brooklyn,
    Queens,
    Bronx,
    StatenIsland,
    /// Unrecognized code, passed through unchanged
    Other(String),
}

impl Borough {
    pub fn from_code(code: &str) -> Self {
        match code {
            "M" => Borough::Manhattan,
            "K" => Borough::Brooklyn,
            "Q" => Borough::Queens,
            "X" => Borough::Bronx,
            "R" => Borough::StatenIsland,
            other => Borough::Other(other.to_string()),
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            Borough::Manhattan => "Manhattan",
            Borough::Brooklyn => "Brooklyn",
            Borough::Queens => "Queens",
            Borough::Bronx => "Bronx",
            Borough::StatenIsland => "Staten Island",
            Borough::Other(code) => code,
        }
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}
