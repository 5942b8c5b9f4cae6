//! Section-by-section similarity between two records.
//!
//! Every score is on a 0–100 scale. Descriptive sections average their field
//! scores; `top_holders` and `source_wallets` use fixed-weight sums over
//! derived aggregates.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::{
    W_AMOUNT_CONCENTRATION, W_AMOUNT_DISTRIBUTION, W_AMOUNT_TOTAL, W_HOLDERS_DISTRIBUTION,
    W_HOLDERS_TOP1, W_HOLDERS_TOP5, W_HOLDERS_TOTAL, W_SOURCE_COUNT, W_SOURCE_HOPS,
    W_SOURCE_PERCENTAGE,
};
use crate::record::{FieldValue, Section, SourceWallets, TokenRecord, TopHolders};

/// Overall score plus the score of every section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Similarity {
    pub overall: f64,
    pub by_section: BTreeMap<Section, f64>,
}

/// Similarity of two optional indicator values.
///
/// Both absent is full agreement; one absent is none. Strings compare
/// case-insensitively. Numbers use the ratio of magnitudes, with zero only
/// matching zero.
pub fn field_similarity(a: Option<&FieldValue>, b: Option<&FieldValue>) -> f64 {
    match (a, b) {
        (None, None) => 100.0,
        (None, Some(_)) | (Some(_), None) => 0.0,
        (Some(FieldValue::Text(x)), Some(FieldValue::Text(y))) => {
            if x.to_lowercase() == y.to_lowercase() {
                100.0
            } else {
                0.0
            }
        }
        (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => number_similarity(*x, *y),
        _ => 0.0,
    }
}

fn number_similarity(a: f64, b: f64) -> f64 {
    let (a, b) = (a.abs(), b.abs());
    match (a == 0.0, b == 0.0) {
        (true, true) => 100.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => a.min(b) / a.max(b) * 100.0,
    }
}

fn optional_similarity(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(number_similarity(a?, b?))
}

/// Score one section of two records.
pub fn section_similarity(a: &TokenRecord, b: &TokenRecord, section: Section) -> f64 {
    match section {
        Section::MarketOverview | Section::WalletInsights | Section::RiskMetrics => {
            mean_field_similarity(a, b, section)
        }
        Section::TopHolders => holders_similarity(&a.top_holders, &b.top_holders),
        Section::SourceWallets => sources_similarity(&a.source_wallets, &b.source_wallets),
    }
}

/// Mean over fields present on at least one side. 0 when none qualify.
fn mean_field_similarity(a: &TokenRecord, b: &TokenRecord, section: Section) -> f64 {
    let scores: Vec<f64> = a
        .fields(section)
        .into_iter()
        .zip(b.fields(section))
        .filter(|((_, x), (_, y))| x.is_some() || y.is_some())
        .map(|((_, x), (_, y))| field_similarity(x.as_ref(), y.as_ref()))
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn holders_similarity(a: &TopHolders, b: &TopHolders) -> f64 {
    weighted_sum_of_present_terms(&[
        (W_HOLDERS_TOTAL, optional_similarity(a.effective_total(), b.effective_total())),
        (W_HOLDERS_TOP1, optional_similarity(a.top1_percentage, b.top1_percentage)),
        (W_HOLDERS_TOP5, optional_similarity(a.top5_total, b.top5_total)),
        (
            W_HOLDERS_DISTRIBUTION,
            optional_similarity(a.distribution_score, b.distribution_score),
        ),
        (W_AMOUNT_TOTAL, optional_similarity(a.amount_total, b.amount_total)),
        (
            W_AMOUNT_CONCENTRATION,
            optional_similarity(a.amount_concentration_ratio, b.amount_concentration_ratio),
        ),
        (
            W_AMOUNT_DISTRIBUTION,
            optional_similarity(a.amount_distribution_score, b.amount_distribution_score),
        ),
    ])
}

fn sources_similarity(a: &SourceWallets, b: &SourceWallets) -> f64 {
    weighted_sum_of_present_terms(&[
        (W_SOURCE_PERCENTAGE, optional_similarity(a.percentage, b.percentage)),
        (
            W_SOURCE_COUNT,
            optional_similarity(a.count.map(|c| c as f64), b.count.map(|c| c as f64)),
        ),
        (W_SOURCE_HOPS, optional_similarity(a.avg_hops, b.avg_hops)),
    ])
}

/// Sum of `score * weight / 100` over terms present on both sides.
///
/// Missing terms contribute nothing and the remaining weights are not scaled
/// up, so sparse sections top out below 100.
pub fn weighted_sum_of_present_terms(terms: &[(f64, Option<f64>)]) -> f64 {
    terms
        .iter()
        .filter_map(|&(weight, score)| score.map(|s| s * weight / 100.0))
        .sum()
}

/// Mean of the section scores that are strictly positive. A section scoring
/// exactly 0 leaves the denominator too.
pub fn mean_of_scoring_sections(scores: &BTreeMap<Section, f64>) -> f64 {
    let scoring: Vec<f64> = scores.values().copied().filter(|&s| s > 0.0).collect();
    if scoring.is_empty() {
        0.0
    } else {
        scoring.iter().sum::<f64>() / scoring.len() as f64
    }
}

/// Score every section and combine them into an overall score.
pub fn overall_similarity(a: &TokenRecord, b: &TokenRecord) -> Similarity {
    let by_section: BTreeMap<Section, f64> = Section::ALL
        .iter()
        .map(|&s| (s, section_similarity(a, b, s)))
        .collect();
    Similarity {
        overall: mean_of_scoring_sections(&by_section),
        by_section,
    }
}
