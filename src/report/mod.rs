pub mod types;

pub use types::{ComparisonResult, GroupSummary, Report, Statistic};

use crate::analysis::Dimension;
use crate::derive::DerivedMetricsRow;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Combine comparison results with the table's group sizes.
pub fn build(results: Vec<ComparisonResult>, rows: &[DerivedMetricsRow], significance: f64) -> Report {
    let merged = rows.iter().filter(|row| row.is_merged()).count();
    Report {
        total: rows.len(),
        merged,
        closed: rows.len() - merged,
        significance,
        results,
    }
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(rows = report.total, comparisons = report.results.len()))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

fn dimensions() -> [Dimension; 2] {
    [Dimension::Status, Dimension::ReviewVolume]
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn format_groups(merged: &GroupSummary, closed: &GroupSummary) -> String {
    format!(
        "merged: n={} median={} mean={} | closed: n={} median={} mean={}",
        merged.n,
        format_optional(merged.median),
        format_optional(merged.mean),
        closed.n,
        format_optional(closed.median),
        format_optional(closed.mean),
    )
}

fn headline(result: &ComparisonResult) -> String {
    format!(
        "{} {} vs {} ({})",
        result.id, result.metric, result.outcome, result.test
    )
}

/// Format and print the report to the terminal with colors.
///
/// Pull requests analysed: 120 (merged 80, closed 40)
///
/// ═══ Dimension A: merge status ═══
///   RQ01 size vs status_numeric (Mann-Whitney U): 512.000, p = 0.0123 SIGNIFICANT
///        merged: n=80 median=... | closed: n=40 median=...
fn print_terminal_report(report: &Report) {
    println!();
    println!(
        "Pull requests analysed: {} (merged {}, closed {})",
        report.total, report.merged, report.closed
    );
    println!("Significance: p < {}", report.significance);
    println!();

    for dimension in dimensions() {
        println!("═══ {} ═══", dimension);
        for result in report.results.iter().filter(|r| r.dimension == dimension) {
            match &result.statistic {
                Statistic::Computed { value, p_value } => {
                    let verdict = if result.is_significant(report.significance) {
                        "SIGNIFICANT".green().bold()
                    } else {
                        "not significant".dimmed()
                    };
                    println!(
                        "  {}: {:.3}, p = {:.4} {}",
                        headline(result),
                        value,
                        p_value,
                        verdict
                    );
                }
                Statistic::Unavailable { reason } => {
                    println!("  {}: {} ({})", headline(result), "unavailable".yellow(), reason);
                }
            }
            if let Some((merged, closed)) = &result.groups {
                println!("       {}", format_groups(merged, closed));
            }
        }
        println!();
    }

    println!(
        "═══ {} of {} comparisons significant ═══",
        report.significant_count(),
        report.results.len()
    );
    println!();
}

/// Write the report as a markdown file, one table per dimension.
fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str("# Pull request review study\n\n");
    md.push_str(&format!(
        "**Pull requests:** {} | **Merged:** {} | **Closed:** {} | **Significance:** p < {}\n\n",
        report.total, report.merged, report.closed, report.significance
    ));

    for dimension in dimensions() {
        md.push_str(&format!("## {}\n\n", dimension));
        md.push_str("| RQ | Metric | Outcome | Test | Statistic | p-value | Significant |\n");
        md.push_str("|----|--------|---------|------|-----------|---------|-------------|\n");
        for result in report.results.iter().filter(|r| r.dimension == dimension) {
            let (statistic, p_value, significant) = match &result.statistic {
                Statistic::Computed { value, p_value } => (
                    format!("{value:.3}"),
                    format!("{p_value:.4}"),
                    if result.is_significant(report.significance) { "yes" } else { "no" }.to_string(),
                ),
                Statistic::Unavailable { reason } => {
                    ("unavailable".to_string(), "-".to_string(), reason.clone())
                }
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                result.id, result.metric, result.outcome, result.test, statistic, p_value, significant
            ));
        }
        md.push('\n');

        let summaries: Vec<&ComparisonResult> = report
            .results
            .iter()
            .filter(|r| r.dimension == dimension && r.groups.is_some())
            .collect();
        for result in summaries {
            if let Some((merged, closed)) = &result.groups {
                md.push_str(&format!(
                    "- **{} {}:** {}\n",
                    result.id,
                    result.metric,
                    format_groups(merged, closed)
                ));
            }
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "## {} of {} comparisons significant\n",
        report.significant_count(),
        report.results.len()
    ));

    std::fs::write(path, md)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::types::TestKind;
    use super::*;
    use crate::analysis::{Metric, Outcome};

    fn sample_results() -> Vec<ComparisonResult> {
        vec![
            ComparisonResult {
                id: "RQ01".to_string(),
                dimension: Dimension::Status,
                metric: Metric::Size,
                outcome: Outcome::Status,
                test: TestKind::MannWhitney,
                statistic: Statistic::Computed {
                    value: 12.0,
                    p_value: 0.01,
                },
                groups: Some((
                    GroupSummary {
                        n: 3,
                        median: Some(10.0),
                        mean: Some(11.0),
                    },
                    GroupSummary {
                        n: 2,
                        median: Some(90.0),
                        mean: Some(90.0),
                    },
                )),
            },
            ComparisonResult {
                id: "RQ06".to_string(),
                dimension: Dimension::ReviewVolume,
                metric: Metric::ReviewTime,
                outcome: Outcome::ReviewComments,
                test: TestKind::Spearman,
                statistic: Statistic::Unavailable {
                    reason: "one sample is constant".to_string(),
                },
                groups: None,
            },
        ]
    }

    #[test]
    fn test_build_report_counts_groups() {
        let report = build(sample_results(), &[], 0.05);
        assert_eq!(report.total, 0);
        assert_eq!(report.merged, 0);
        assert_eq!(report.significant_count(), 1);
    }

    #[test]
    fn test_write_markdown_report() {
        let report = build(sample_results(), &[], 0.05);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_markdown_report(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## Dimension A: merge status"));
        assert!(content.contains("| RQ01 | size | status_numeric | Mann-Whitney U | 12.000 | 0.0100 | yes |"));
        assert!(content.contains("| RQ06 | review_time_h | review_comments | Spearman rho | unavailable | - | one sample is constant |"));
        assert!(content.contains("merged: n=3 median=10.00 mean=11.00"));
        assert!(content.contains("## 1 of 2 comparisons significant"));
    }

    #[test]
    fn test_terminal_report_does_not_panic() {
        let report = build(sample_results(), &[], 0.05);
        print_terminal_report(&report);
    }

    #[test]
    fn test_output_to_file() {
        let report = build(vec![], &[], 0.05);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        output(&report, Some(&path)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(None), "n/a");
        assert_eq!(format_optional(Some(2.0)), "2.00");
    }
}
