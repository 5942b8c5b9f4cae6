//! Aggregation of the ranked-holder and source-wallet lists into the derived
//! indicators kept on a record.

use crate::constants::{OLIGOPOLY_WINDOW, RANKED_WINDOW};
use crate::record::{SourceWallets, TopHolders};

/// One `<rank>. <address> - <pct>% - <amount> <unit>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHolder {
    pub rank: u32,
    pub address: String,
    pub percentage: f64,
    pub amount: f64,
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(sum(values) / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = sum(values) / n as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Coefficient of variation of `values`. `None` when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m > 0.0 {
        Some(sample_stdev(values) / m)
    } else {
        None
    }
}

fn head(values: &[f64], n: usize) -> &[f64] {
    &values[..values.len().min(n)]
}

/// Derive the top-holder aggregates from the header share and the ranked lines.
///
/// Dispersion scores need a full window of ten holders; shares and totals use
/// however many lines exist.
pub fn aggregate_holders(reported_total: Option<f64>, holders: &[RankedHolder]) -> TopHolders {
    let mut out = TopHolders {
        reported_total,
        ..Default::default()
    };
    if holders.is_empty() {
        return out;
    }

    let pcts: Vec<f64> = holders.iter().map(|h| h.percentage).collect();
    let amounts: Vec<f64> = holders.iter().map(|h| h.amount).collect();

    let top1 = pcts[0];
    let top10 = sum(head(&pcts, RANKED_WINDOW));
    out.top1_percentage = Some(top1);
    out.top5_total = Some(sum(head(&pcts, OLIGOPOLY_WINDOW)));
    out.top10_total = Some(top10);

    let denominator = reported_total.unwrap_or(top10);
    if denominator > 0.0 {
        out.concentration_ratio = Some(top1 / denominator * 100.0);
    }

    out.amount_top1 = Some(amounts[0]);
    out.amount_top5_total = Some(sum(head(&amounts, OLIGOPOLY_WINDOW)));
    out.amount_total = Some(sum(head(&amounts, RANKED_WINDOW)));

    if holders.len() >= RANKED_WINDOW {
        let window = &pcts[..RANKED_WINDOW];
        out.distribution_score = Some((100.0 - sample_stdev(window) * 10.0).max(0.0));

        let window = &amounts[..RANKED_WINDOW];
        out.amount_distribution_score = Some(match coefficient_of_variation(window) {
            Some(cv) => (100.0 - cv * 100.0).max(0.0),
            None => 100.0,
        });
        let total = sum(window);
        if total > 0.0 {
            out.amount_concentration_ratio = Some(amounts[0] / total * 100.0);
        }
    }

    out
}

/// Derive the source-wallet aggregates from the header share and hop counts.
pub fn aggregate_sources(percentage: Option<f64>, hops: &[u32]) -> SourceWallets {
    let mut out = SourceWallets {
        percentage,
        ..Default::default()
    };
    if !hops.is_empty() {
        let as_f64: Vec<f64> = hops.iter().map(|&h| f64::from(h)).collect();
        out.count = Some(hops.len() as u64);
        out.avg_hops = mean(&as_f64);
    }
    out
}
