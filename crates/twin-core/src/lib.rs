//! Token twin finder core.
//!
//! Turns tree-formatted token reports into typed records, scores records
//! against each other section by section, and decides whether the best
//! historical match is worth surfacing.
//!
//! Zero I/O: persistence is reached only through the [`Repository`] trait.

pub mod aggregate;
pub mod classify;
pub mod constants;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod policy;
pub mod record;
pub mod repository;
pub mod similarity;
pub mod time;

pub use constants::{DEFAULT_THRESHOLD, THRESHOLD_SETTING_KEY, UNKNOWN_TOKEN_NAME};
pub use error::PolicyError;
pub use extract::{extract, looks_like_report};
pub use matcher::{BestMatch, find_best};
pub use policy::{
    ArchiveOutcome, DisplayPolicy, DisplayState, Emission, PolicyConfig, SuppressReason, Verdict,
};
pub use record::{
    Field, FieldValue, MarketOverview, RiskMetrics, Section, SourceWallets, TokenRecord,
    TopHolders, WalletInsights,
};
pub use repository::{DisplayedEntry, MemoryRepository, RecordId, Repository, StoredRecord};
pub use similarity::{
    Similarity, field_similarity, mean_of_scoring_sections, overall_similarity,
    section_similarity, weighted_sum_of_present_terms,
};
