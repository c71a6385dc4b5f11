use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassName {
    ClassA,
    ClassB,
}

impl ClassName {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassName::ClassA => "Class A",
            ClassName::ClassB => "Class B",
        }
    }

    pub fn parse(value: &str) -> Option<ClassName> {
        match value.trim() {
            "Class A" => Some(ClassName::ClassA),
            "Class B" => Some(ClassName::ClassB),
            _ => None,
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subject {
    Math,
    Chinese,
    English,
}

impl Subject {
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Chinese => "Chinese",
            Subject::English => "English",
        }
    }

    pub fn parse(value: &str) -> Option<Subject> {
        match value.trim() {
            "Math" => Some(Subject::Math),
            "Chinese" => Some(Subject::Chinese),
            "English" => Some(Subject::English),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeRecord {
    pub id: Uuid,
    pub student_name: String,
    pub class_name: ClassName,
    pub subject: Subject,
    pub score: f64,
    pub exam_date: NaiveDate,
}

/// Selection criteria over the grade table. A `None` field places no
/// restriction on that dimension. Equality across all three fields is what
/// callers use to recognize a delivered result as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub name_contains: Option<String>,
    pub class_name: Option<ClassName>,
    pub subject: Option<Subject>,
}

impl FilterSpec {
    /// Per-subject averages are suppressed when the filter already pins a
    /// single subject: a one-row table of the thing you filtered by is noise.
    pub fn subject_is_pinned(&self) -> bool {
        self.subject.is_some()
    }

    pub fn class_label(&self) -> &str {
        self.class_name.map(ClassName::as_str).unwrap_or("All")
    }

    pub fn subject_label(&self) -> &str {
        self.subject.map(Subject::as_str).unwrap_or("All")
    }
}

/// Mutually exclusive score bands partitioning [0,100], lower bound
/// inclusive. Ordered fail-first so grouped output lists bands ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreBand {
    Fail,
    Pass,
    Medium,
    Good,
    Excellent,
}

impl ScoreBand {
    pub fn all() -> [ScoreBand; 5] {
        [
            ScoreBand::Fail,
            ScoreBand::Pass,
            ScoreBand::Medium,
            ScoreBand::Good,
            ScoreBand::Excellent,
        ]
    }

    /// Total over any f64 input: out-of-range scores clamp into the outer
    /// bands instead of being rejected (the store owns range validation).
    pub fn from_score(score: f64) -> ScoreBand {
        if score >= 90.0 {
            ScoreBand::Excellent
        } else if score >= 80.0 {
            ScoreBand::Good
        } else if score >= 70.0 {
            ScoreBand::Medium
        } else if score >= 60.0 {
            ScoreBand::Pass
        } else {
            ScoreBand::Fail
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Fail => "Fail (0-59)",
            ScoreBand::Pass => "Pass (60-69)",
            ScoreBand::Medium => "Medium (70-79)",
            ScoreBand::Good => "Good (80-89)",
            ScoreBand::Excellent => "Excellent (90-100)",
        }
    }
}

/// Aggregation result for one filter and record set. Built once by the
/// aggregator and never mutated afterwards; consumers take ownership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeStatistics {
    pub total_count: usize,
    pub average: f64,
    pub max_score: f64,
    /// Defaults to 100.0 for an empty set (sentinel, not NaN) so report
    /// formatting never has to special-case it.
    pub min_score: f64,
    pub pass_count: usize,
    pub fail_count: usize,
    pub excellent_count: usize,
    pub good_count: usize,
    pub medium_count: usize,
    pub pass_rate: f64,
    pub excellent_rate: f64,
    pub subject_averages: BTreeMap<Subject, f64>,
    /// Every band is present, zero counts included; consumers filter > 0.
    pub score_distribution: BTreeMap<ScoreBand, usize>,
}

impl Default for GradeStatistics {
    fn default() -> Self {
        let mut score_distribution = BTreeMap::new();
        for band in ScoreBand::all() {
            score_distribution.insert(band, 0);
        }
        GradeStatistics {
            total_count: 0,
            average: 0.0,
            max_score: 0.0,
            min_score: 100.0,
            pass_count: 0,
            fail_count: 0,
            excellent_count: 0,
            good_count: 0,
            medium_count: 0,
            pass_rate: 0.0,
            excellent_rate: 0.0,
            subject_averages: BTreeMap::new(),
            score_distribution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day_offset: i64,
    pub score: f64,
}

/// One named line for a trend chart; points are ordered by exam date and
/// x is the day offset from the earliest matching exam date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub name: String,
    pub points: Vec<TrendPoint>,
}

/// One slice of the distribution pie: a non-empty band, its count, and its
/// share of the total in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSlice {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}
