pub mod distribution;

use thiserror::Error;

use distribution::{normal_sf, student_t_two_sided};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("Not computable: {reason}")]
    DegenerateInput { reason: String },
}

fn degenerate(reason: impl Into<String>) -> StatsError {
    StatsError::DegenerateInput {
        reason: reason.into(),
    }
}

/// Spearman rank correlation and its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub rho: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Mann–Whitney U for the first sample and its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTest {
    pub u: f64,
    pub p_value: f64,
}

fn ensure_finite(values: &[f64], label: &str) -> Result<(), StatsError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(degenerate(format!("{label} contains a non-finite value")))
    }
}

/// 1-based ranks; tied values share the average of the ranks they span.
pub fn rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let average = (start + 1 + end) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = average;
        }
        start = end;
    }
    ranks
}

/// Sizes of each group of tied values.
fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let end = sorted[start..]
            .iter()
            .position(|v| *v != sorted[start])
            .map_or(sorted.len(), |offset| start + offset);
        groups.push(end - start);
        start = end;
    }
    groups
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman's rho with ties ranked by average, and the two-sided p-value
/// from the t approximation with n - 2 degrees of freedom.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    if x.len() != y.len() {
        return Err(degenerate(format!(
            "samples differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(degenerate(format!("need at least 2 observations, got {n}")));
    }
    ensure_finite(x, "x")?;
    ensure_finite(y, "y")?;

    let rho = pearson(&rank(x), &rank(y)).ok_or_else(|| degenerate("one sample is constant"))?;

    let p_value = if n == 2 {
        1.0
    } else if rho.abs() >= 1.0 {
        0.0
    } else {
        let df = (n - 2) as f64;
        let t = rho * (df / ((1.0 - rho) * (1.0 + rho))).sqrt();
        student_t_two_sided(t, df)
    };

    Ok(Correlation { rho, p_value, n })
}

/// Two-sided Mann–Whitney U test using the tie-corrected normal
/// approximation with continuity correction. `u` is reported for `a`.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<GroupTest, StatsError> {
    if a.is_empty() || b.is_empty() {
        return Err(degenerate(format!(
            "both groups need observations (sizes {} and {})",
            a.len(),
            b.len()
        )));
    }
    ensure_finite(a, "first group")?;
    ensure_finite(b, "second group")?;

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let n = n1 + n2;
    let pooled: Vec<f64> = a.iter().chain(b).copied().collect();
    let ranks = rank(&pooled);
    let rank_sum_a: f64 = ranks[..a.len()].iter().sum();
    let u = rank_sum_a - n1 * (n1 + 1.0) / 2.0;

    let tie_term: f64 = tie_groups(&pooled)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    let mean = n1 * n2 / 2.0;

    let p_value = if variance <= 0.0 {
        1.0
    } else {
        let z = ((u - mean).abs() - 0.5) / variance.sqrt();
        (2.0 * normal_sf(z)).min(1.0)
    };

    Ok(GroupTest { u, p_value })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
