use crate::analysis::{Dimension, Metric, Outcome};

/// Which statistical test produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    MannWhitney,
    Spearman,
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::MannWhitney => write!(f, "Mann-Whitney U"),
            TestKind::Spearman => write!(f, "Spearman rho"),
        }
    }
}

/// Value of one comparison, or why it could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub enum Statistic {
    Computed { value: f64, p_value: f64 },
    Unavailable { reason: String },
}

/// Descriptive statistics for one side of a group comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub n: usize,
    pub median: Option<f64>,
    pub mean: Option<f64>,
}

/// Result of a single comparison between a metric and an outcome.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    /// Research question label (RQ01..RQ08)
    pub id: String,
    pub dimension: Dimension,
    pub metric: Metric,
    pub outcome: Outcome,
    pub test: TestKind,
    pub statistic: Statistic,
    /// (merged, closed) summaries for group tests
    pub groups: Option<(GroupSummary, GroupSummary)>,
}

impl ComparisonResult {
    pub fn p_value(&self) -> Option<f64> {
        match self.statistic {
            Statistic::Computed { p_value, .. } => Some(p_value),
            Statistic::Unavailable { .. } => None,
        }
    }

    /// True when the p-value is strictly below `alpha`.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value().is_some_and(|p| p < alpha)
    }
}

/// Complete report over the cleaned table.
#[derive(Debug)]
pub struct Report {
    /// Rows analysed
    pub total: usize,
    pub merged: usize,
    pub closed: usize,
    /// Significance threshold used for flagging
    pub significance: f64,
    pub results: Vec<ComparisonResult>,
}

impl Report {
    pub fn significant_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_significant(self.significance))
            .count()
    }
}
