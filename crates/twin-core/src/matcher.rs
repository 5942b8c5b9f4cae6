//! Best-match selection over a corpus.
//!
//! A plain linear scan: every call scores the target against every record.
//! Cost grows with corpus size times field count; there is no index.

use std::collections::BTreeMap;

use crate::record::{Section, TokenRecord};
use crate::similarity::overall_similarity;

/// Winner of a corpus scan. `record` is `None` when the corpus is empty or
/// nothing scored above 0.
#[derive(Debug, Clone, Default)]
pub struct BestMatch<'a> {
    pub record: Option<&'a TokenRecord>,
    pub score: f64,
    pub by_section: BTreeMap<Section, f64>,
}

/// Scan `corpus` for the record most similar to `target`. Ties keep the
/// first record encountered.
pub fn find_best<'a, I>(target: &TokenRecord, corpus: I) -> BestMatch<'a>
where
    I: IntoIterator<Item = &'a TokenRecord>,
{
    let mut best = BestMatch::default();
    for candidate in corpus {
        let similarity = overall_similarity(target, candidate);
        if similarity.overall > best.score {
            best = BestMatch {
                record: Some(candidate),
                score: similarity.overall,
                by_section: similarity.by_section,
            };
        }
    }
    best
}
