pub mod types;

pub use types::{DerivedMetrics, DerivedMetricsRow, InteractionFormula};

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::collect::types::{PrState, PullRequestRecord};
use crate::config::DeriveConfig;

/// Why a raw row did not make it into the cleaned table.
#[derive(Debug, Clone, PartialEq)]
pub enum Exclusion {
    /// No close or merge timestamp, so there is no review latency.
    StillOpen,
    BelowMinimumLatency { hours: f64 },
    StateNotAllowed(PrState),
    NoReviews,
    MissingField(&'static str),
}

impl Exclusion {
    fn kind(&self) -> &'static str {
        match self {
            Exclusion::StillOpen => "still_open",
            Exclusion::BelowMinimumLatency { .. } => "below_min_latency",
            Exclusion::StateNotAllowed(_) => "state_not_allowed",
            Exclusion::NoReviews => "no_reviews",
            Exclusion::MissingField(_) => "missing_field",
        }
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::StillOpen => write!(f, "pull request has no close or merge time"),
            Exclusion::BelowMinimumLatency { hours } => {
                write!(f, "review time {hours:.2}h is below the minimum")
            }
            Exclusion::StateNotAllowed(state) => write!(f, "state '{state}' is not allowed"),
            Exclusion::NoReviews => write!(f, "pull request has no reviews"),
            Exclusion::MissingField(field) => write!(f, "required field '{field}' is empty"),
        }
    }
}

/// True when the pull request was merged. The merge timestamp decides;
/// the flag only matters for rows that lack one.
pub fn is_merged(record: &PullRequestRecord) -> bool {
    record.merged_at.is_some() || record.merged
}

/// Hours from creation to merge (if merged) or close.
pub fn review_time_hours(record: &PullRequestRecord) -> Option<f64> {
    let end = record.merged_at.or(record.closed_at)?;
    Some((end - record.created_at).num_milliseconds() as f64 / 3_600_000.0)
}

/// Compute the derived columns of one record without applying filters.
pub fn compute_metrics(
    record: &PullRequestRecord,
    formula: InteractionFormula,
) -> Result<DerivedMetrics, Exclusion> {
    let review_time_h = review_time_hours(record).ok_or(Exclusion::StillOpen)?;
    let size = record.changed_files + record.additions + record.deletions;
    let interactions = match formula {
        InteractionFormula::CommentsBased => record.comments + record.review_comments,
        InteractionFormula::ParticipantBased => {
            let participants = record
                .participants_count
                .ok_or(Exclusion::MissingField("participants_count"))?;
            record.comments + participants
        }
    };

    Ok(DerivedMetrics {
        review_time_h,
        size,
        interactions,
        status_numeric: u8::from(is_merged(record)),
    })
}

fn check_filters(
    record: &PullRequestRecord,
    metrics: &DerivedMetrics,
    config: &DeriveConfig,
) -> Result<(), Exclusion> {
    if !config.allowed_states.contains(&record.state) {
        return Err(Exclusion::StateNotAllowed(record.state));
    }
    if config.require_reviews && record.review_count == Some(0) {
        return Err(Exclusion::NoReviews);
    }
    if !metrics.review_time_h.is_finite() {
        return Err(Exclusion::MissingField("review_time_h"));
    }
    if metrics.review_time_h < config.min_review_hours {
        return Err(Exclusion::BelowMinimumLatency {
            hours: metrics.review_time_h,
        });
    }
    Ok(())
}

/// Derive one cleaned row, or the reason the record is excluded.
pub fn derive_row(
    record: PullRequestRecord,
    config: &DeriveConfig,
) -> Result<DerivedMetricsRow, Exclusion> {
    let metrics = compute_metrics(&record, config.interaction_formula)?;
    check_filters(&record, &metrics, config)?;
    Ok(DerivedMetricsRow::new(record, metrics))
}

/// Turn raw records into the cleaned table. Raw columns pass through
/// untouched; rows failing any filter are dropped, never imputed.
#[instrument(skip_all, fields(formula = %config.interaction_formula))]
pub fn derive(
    records: impl IntoIterator<Item = PullRequestRecord>,
    config: &DeriveConfig,
) -> Vec<DerivedMetricsRow> {
    let mut kept = Vec::new();
    let mut excluded: BTreeMap<&'static str, usize> = BTreeMap::new();

    for record in records {
        let (repo, number) = (record.repo_full_name.clone(), record.number);
        match derive_row(record, config) {
            Ok(row) => kept.push(row),
            Err(reason) => {
                debug!(repo = %repo, pr = number, %reason, "excluding row");
                *excluded.entry(reason.kind()).or_default() += 1;
            }
        }
    }

    info!(kept = kept.len(), ?excluded, "derivation complete");
    kept
}
