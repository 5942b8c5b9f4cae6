//! Display decision policy.
//!
//! Each contract address moves through two states: [`DisplayState::New`] until
//! a match at or above the threshold is surfaced, then
//! [`DisplayState::Displayed`] for good. Only a bulk reset of the de-dup set
//! returns contracts to `New`.

use serde::Serialize;
use tracing::{debug, info};

use crate::constants::{DEFAULT_THRESHOLD, THRESHOLD_SETTING_KEY};
use crate::error::PolicyError;
use crate::matcher::find_best;
use crate::record::TokenRecord;
use crate::repository::{RecordId, Repository, StoredRecord};
use crate::similarity::Similarity;

/// Construction-time policy settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyConfig {
    /// Threshold used until one is persisted.
    pub default_threshold: f64,
    /// Settings key holding the persisted threshold.
    pub threshold_key: String,
    /// Forwarded to emissions so formatters know whether to describe links.
    pub describe_links: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            threshold_key: THRESHOLD_SETTING_KEY.to_string(),
            describe_links: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    New,
    Displayed,
}

impl DisplayState {
    /// True if a match scoring `score` moves this state to `Displayed`.
    pub fn admits(self, score: f64, threshold: f64) -> bool {
        self == DisplayState::New && score >= threshold
    }
}

/// Why nothing was surfaced. None of these are errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SuppressReason {
    EmptyCorpus,
    NoIdentity,
    AlreadyDisplayed,
    BelowThreshold { score: f64, threshold: f64 },
    NoMatch,
}

/// Payload of an emit verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emission {
    pub target_name: String,
    pub contract_address: String,
    pub matched: TokenRecord,
    pub similarity: Similarity,
    pub threshold: f64,
    pub describe_links: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Emit(Box<Emission>),
    Suppress(SuppressReason),
}

impl Verdict {
    pub fn is_emit(&self) -> bool {
        matches!(self, Verdict::Emit(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Stored { id: RecordId },
    Duplicate { existing: Box<StoredRecord> },
}

pub struct DisplayPolicy<R> {
    repository: R,
    config: PolicyConfig,
}

type PolicyResult<T, R> = Result<T, PolicyError<<R as Repository>::Error>>;

impl<R: Repository> DisplayPolicy<R> {
    pub fn new(repository: R, config: PolicyConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The persisted threshold, or the configured default if none is stored.
    pub fn threshold(&self) -> PolicyResult<f64, R> {
        let raw = self
            .repository
            .get_setting(
                &self.config.threshold_key,
                &self.config.default_threshold.to_string(),
            )
            .map_err(PolicyError::Repository)?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(PolicyError::InvalidThreshold(raw)),
        }
    }

    /// Persist a new threshold and return the one it replaces. A corrupt
    /// stored value is reported as the configured default.
    pub fn set_threshold(&self, value: f64) -> PolicyResult<f64, R> {
        if !(0.0..=100.0).contains(&value) {
            return Err(PolicyError::ThresholdOutOfRange(value));
        }
        let previous = match self.threshold() {
            Ok(v) => v,
            Err(PolicyError::InvalidThreshold(_)) => self.config.default_threshold,
            Err(e) => return Err(e),
        };
        self.repository
            .set_setting(&self.config.threshold_key, &value.to_string())
            .map_err(PolicyError::Repository)?;
        info!(previous, threshold = value, "threshold updated");
        Ok(previous)
    }

    pub fn state_of(&self, contract_address: &str) -> PolicyResult<DisplayState, R> {
        let displayed = self
            .repository
            .is_displayed(contract_address)
            .map_err(PolicyError::Repository)?;
        Ok(if displayed {
            DisplayState::Displayed
        } else {
            DisplayState::New
        })
    }

    /// Score `target` against the corpus and decide whether to surface the
    /// best match. An emit verdict records the contract in the de-dup set;
    /// that is the only write, and it happens last.
    pub fn evaluate(&self, target: &TokenRecord) -> PolicyResult<Verdict, R> {
        let corpus = self.repository.list_all().map_err(PolicyError::Repository)?;
        if corpus.is_empty() {
            return Ok(suppress(target, SuppressReason::EmptyCorpus));
        }

        let best = find_best(target, &corpus);

        let Some(contract) = target.contract_address.as_deref() else {
            return Ok(suppress(target, SuppressReason::NoIdentity));
        };

        let state = self.state_of(contract)?;
        if state == DisplayState::Displayed {
            return Ok(suppress(target, SuppressReason::AlreadyDisplayed));
        }

        let threshold = self.threshold()?;
        if !state.admits(best.score, threshold) {
            return Ok(suppress(
                target,
                SuppressReason::BelowThreshold {
                    score: best.score,
                    threshold,
                },
            ));
        }

        let Some(matched) = best.record else {
            return Ok(suppress(target, SuppressReason::NoMatch));
        };

        // Another writer on the same store may have surfaced this contract
        // since `state_of` looked.
        let created = self
            .repository
            .mark_displayed(contract, &target.name, best.score)
            .map_err(PolicyError::Repository)?;
        if !created {
            return Ok(suppress(target, SuppressReason::AlreadyDisplayed));
        }

        info!(
            token = %target.name,
            contract,
            matched = %matched.name,
            score = best.score,
            threshold,
            "surfacing match"
        );

        Ok(Verdict::Emit(Box::new(Emission {
            target_name: target.name.clone(),
            contract_address: contract.to_string(),
            matched: matched.clone(),
            similarity: Similarity {
                overall: best.score,
                by_section: best.by_section,
            },
            threshold,
            describe_links: self.config.describe_links,
        })))
    }

    /// Add `record` to the corpus unless its contract is already archived.
    pub fn archive(&self, record: &TokenRecord) -> PolicyResult<ArchiveOutcome, R> {
        if let Some(contract) = record.contract_address.as_deref()
            && let Some(existing) = self
                .repository
                .find_by_contract(contract)
                .map_err(PolicyError::Repository)?
        {
            debug!(token = %record.name, contract, existing = %existing.id, "duplicate contract");
            return Ok(ArchiveOutcome::Duplicate {
                existing: Box::new(existing),
            });
        }

        let id = self.repository.insert(record).map_err(PolicyError::Repository)?;
        info!(token = %record.name, contract = ?record.contract_address, %id, "archived");
        Ok(ArchiveOutcome::Stored { id })
    }

    /// Return every displayed contract to `New`.
    pub fn reset_displayed(&self) -> PolicyResult<usize, R> {
        let cleared = self
            .repository
            .clear_displayed()
            .map_err(PolicyError::Repository)?;
        info!(cleared, "de-dup set cleared");
        Ok(cleared)
    }
}

fn suppress(target: &TokenRecord, reason: SuppressReason) -> Verdict {
    debug!(token = %target.name, contract = ?target.contract_address, ?reason, "suppressed");
    Verdict::Suppress(reason)
}
