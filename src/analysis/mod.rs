use tracing::{debug, info_span, warn};

use crate::config::AnalysisConfig;
use crate::derive::DerivedMetricsRow;
use crate::report::types::{ComparisonResult, GroupSummary, Statistic, TestKind};
use crate::stats::{self, Correlation, GroupTest, StatsError};

/// The two outcome dimensions of the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// A: final review feedback (merged vs closed).
    Status,
    /// B: number of inline review comments.
    ReviewVolume,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Status => write!(f, "Dimension A: merge status"),
            Dimension::ReviewVolume => write!(f, "Dimension B: review comments"),
        }
    }
}

/// Pull-request characteristics under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Size,
    ReviewTime,
    BodyLength,
    Interactions,
    /// Components of `Size` and `Interactions`, compared on request.
    ChangedFiles,
    TotalLines,
    Participants,
    Comments,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Size,
        Metric::ReviewTime,
        Metric::BodyLength,
        Metric::Interactions,
    ];

    /// Column name in the cleaned table.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Size => "size",
            Metric::ReviewTime => "review_time_h",
            Metric::BodyLength => "body_length",
            Metric::Interactions => "interactions",
            Metric::ChangedFiles => "changed_files",
            Metric::TotalLines => "total_lines",
            Metric::Participants => "participants_count",
            Metric::Comments => "comments",
        }
    }

    /// The parts a combined metric is built from; empty for plain metrics.
    pub fn components(&self) -> &'static [Metric] {
        match self {
            Metric::Size => &[Metric::ChangedFiles, Metric::TotalLines],
            Metric::Interactions => &[Metric::Participants, Metric::Comments],
            _ => &[],
        }
    }

    /// None when the row lacks the column (tables collected without
    /// participant enrichment).
    pub fn value(&self, row: &DerivedMetricsRow) -> Option<f64> {
        match self {
            Metric::Size => Some(row.size as f64),
            Metric::ReviewTime => Some(row.review_time_h),
            Metric::BodyLength => Some(row.body_length as f64),
            Metric::Interactions => Some(row.interactions as f64),
            Metric::ChangedFiles => Some(row.changed_files as f64),
            Metric::TotalLines => Some((row.additions + row.deletions) as f64),
            Metric::Participants => row.participants_count.map(|count| count as f64),
            Metric::Comments => Some(row.comments as f64),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Status,
    ReviewComments,
}

impl Outcome {
    pub fn column(&self) -> &'static str {
        match self {
            Outcome::Status => "status_numeric",
            Outcome::ReviewComments => "review_comments",
        }
    }

    pub fn value(&self, row: &DerivedMetricsRow) -> f64 {
        match self {
            Outcome::Status => f64::from(row.status_numeric),
            Outcome::ReviewComments => row.review_comments as f64,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Spearman's rank correlation between two equal-length samples.
pub fn correlate(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    stats::spearman(x, y)
}

/// Mann–Whitney U comparison of two independent groups.
pub fn compare_groups(a: &[f64], b: &[f64]) -> Result<GroupTest, StatsError> {
    stats::mann_whitney_u(a, b)
}

fn summarize(values: &[f64]) -> GroupSummary {
    GroupSummary {
        n: values.len(),
        median: stats::median(values),
        mean: stats::mean(values),
    }
}


fn statistic<T>(
    id: &str,
    result: Result<T, StatsError>,
    extract: impl FnOnce(T) -> (f64, f64),
) -> Statistic {
    match result {
        Ok(value) => {
            let (value, p_value) = extract(value);
            debug!(id, value, p_value, "comparison computed");
            Statistic::Computed { value, p_value }
        }
        Err(StatsError::DegenerateInput { reason }) => {
            warn!(id, %reason, "comparison not computable");
            Statistic::Unavailable { reason }
        }
    }
}

fn correlation_result(
    id: &str,
    dimension: Dimension,
    metric: Metric,
    outcome: Outcome,
    rows: &[DerivedMetricsRow],
) -> ComparisonResult {
    let (x, y): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| metric.value(row).map(|value| (value, outcome.value(row))))
        .unzip();
    ComparisonResult {
        id: id.to_string(),
        dimension,
        metric,
        outcome,
        test: TestKind::Spearman,
        statistic: statistic(id, correlate(&x, &y), |c| (c.rho, c.p_value)),
        groups: None,
    }
}

fn group_result(id: &str, metric: Metric, rows: &[DerivedMetricsRow]) -> ComparisonResult {
    let (merged, closed): (Vec<&DerivedMetricsRow>, Vec<&DerivedMetricsRow>) =
        rows.iter().partition(|row| row.is_merged());
    let merged: Vec<f64> = merged.into_iter().filter_map(|row| metric.value(row)).collect();
    let closed: Vec<f64> = closed.into_iter().filter_map(|row| metric.value(row)).collect();

    ComparisonResult {
        id: id.to_string(),
        dimension: Dimension::Status,
        metric,
        outcome: Outcome::Status,
        test: TestKind::MannWhitney,
        statistic: statistic(id, compare_groups(&merged, &closed), |t| (t.u, t.p_value)),
        groups: Some((summarize(&merged), summarize(&closed))),
    }
}

/// Run the eight fixed research questions over the cleaned table.
///
/// RQ01-RQ04 compare merged against closed pull requests for each metric
/// (plus a correlation with 0/1 status when enabled); RQ05-RQ08 correlate
/// each metric with the number of review comments. With
/// `component_breakdown`, size and interactions are also tested part by
/// part under the same RQ label. A comparison that cannot be computed is
/// reported as unavailable.
pub fn run_all(rows: &[DerivedMetricsRow], config: &AnalysisConfig) -> Vec<ComparisonResult> {
    let mut results = Vec::new();

    for (index, metric) in Metric::ALL.into_iter().enumerate() {
        let id = format!("RQ{:02}", index + 1);
        let _span = info_span!("compare", id = %id, metric = %metric, outcome = "status").entered();
        results.push(group_result(&id, metric, rows));
        if config.status_correlation {
            results.push(correlation_result(
                &id,
                Dimension::Status,
                metric,
                Outcome::Status,
                rows,
            ));
        }
        if config.component_breakdown {
            for &part in metric.components() {
                results.push(group_result(&id, part, rows));
            }
        }
    }

    for (index, metric) in Metric::ALL.into_iter().enumerate() {
        let id = format!("RQ{:02}", index + 5);
        let _span =
            info_span!("compare", id = %id, metric = %metric, outcome = "review_comments").entered();
        let parts = if config.component_breakdown { metric.components() } else { &[] };
        for &metric in std::iter::once(&metric).chain(parts) {
            results.push(correlation_result(
                &id,
                Dimension::ReviewVolume,
                metric,
                Outcome::ReviewComments,
                rows,
            ));
        }
    }

    results
}
