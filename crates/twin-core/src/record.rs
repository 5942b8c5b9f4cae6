//! Typed token record.
//!
//! Indicators are grouped into the five report sections. Every indicator is
//! optional: `None` means the report did not carry it, which is distinct from
//! a reported zero.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five indicator groups of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    MarketOverview,
    WalletInsights,
    RiskMetrics,
    TopHolders,
    SourceWallets,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::MarketOverview,
        Section::WalletInsights,
        Section::RiskMetrics,
        Section::TopHolders,
        Section::SourceWallets,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::MarketOverview => "market_overview",
            Section::WalletInsights => "wallet_insights",
            Section::RiskMetrics => "risk_metrics",
            Section::TopHolders => "top_holders",
            Section::SourceWallets => "source_wallets",
        }
    }

    /// Heading as it appears in reports.
    pub fn title(self) -> &'static str {
        match self {
            Section::MarketOverview => "Market Overview",
            Section::WalletInsights => "Wallet Insights",
            Section::RiskMetrics => "Risk Metrics",
            Section::TopHolders => "Top 10 Holders",
            Section::SourceWallets => "Source Wallets",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single comparable indicator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// A labelled indicator slot of a section.
pub type Field = (&'static str, Option<FieldValue>);

fn num<T: Into<FieldValue>>(v: Option<T>) -> Option<FieldValue> {
    v.map(Into::into)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketOverview {
    pub market_cap: Option<f64>,
    pub price_change: Option<f64>,
    pub traders: Option<u64>,
    pub buy_volume: Option<f64>,
    pub sell_volume: Option<f64>,
    pub buy_count: Option<u64>,
    pub sell_count: Option<u64>,
    pub buyers: Option<u64>,
    pub sellers: Option<u64>,
}

impl MarketOverview {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            ("market_cap", num(self.market_cap)),
            ("price_change", num(self.price_change)),
            ("traders", num(self.traders)),
            ("buy_volume", num(self.buy_volume)),
            ("sell_volume", num(self.sell_volume)),
            ("buy_count", num(self.buy_count)),
            ("sell_count", num(self.sell_count)),
            ("buyers", num(self.buyers)),
            ("sellers", num(self.sellers)),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletInsights {
    pub holders_total: Option<u64>,
    pub smart_wallets: Option<u64>,
    pub fresh_wallets: Option<u64>,
    pub renowned_wallets: Option<u64>,
    pub creator_wallets: Option<u64>,
    pub sniper_wallets: Option<u64>,
    pub rat_traders: Option<u64>,
    pub whale_wallets: Option<u64>,
    pub top_wallets: Option<u64>,
    pub following_wallets: Option<u64>,
    pub bluechip_holders: Option<u64>,
    pub bundler_wallets: Option<u64>,
}

impl WalletInsights {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            ("holders_total", num(self.holders_total)),
            ("smart_wallets", num(self.smart_wallets)),
            ("fresh_wallets", num(self.fresh_wallets)),
            ("renowned_wallets", num(self.renowned_wallets)),
            ("creator_wallets", num(self.creator_wallets)),
            ("sniper_wallets", num(self.sniper_wallets)),
            ("rat_traders", num(self.rat_traders)),
            ("whale_wallets", num(self.whale_wallets)),
            ("top_wallets", num(self.top_wallets)),
            ("following_wallets", num(self.following_wallets)),
            ("bluechip_holders", num(self.bluechip_holders)),
            ("bundler_wallets", num(self.bundler_wallets)),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskMetrics {
    pub bluechip_holders_pct: Option<f64>,
    pub rat_trader_supply_pct: Option<f64>,
    pub bundler_supply_pct: Option<f64>,
    pub entrapment_supply_pct: Option<f64>,
    pub degen_calls: Option<u64>,
    pub technical_signals: Option<u64>,
}

impl RiskMetrics {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            ("bluechip_holders_pct", num(self.bluechip_holders_pct)),
            ("rat_trader_supply_pct", num(self.rat_trader_supply_pct)),
            ("bundler_supply_pct", num(self.bundler_supply_pct)),
            ("entrapment_supply_pct", num(self.entrapment_supply_pct)),
            ("degen_calls", num(self.degen_calls)),
            ("technical_signals", num(self.technical_signals)),
        ]
    }
}

/// Aggregates over the ranked holder list. The list itself is not retained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopHolders {
    /// Share stated in the section header (`Top 10 Holders: X%`).
    pub reported_total: Option<f64>,
    pub top1_percentage: Option<f64>,
    pub top5_total: Option<f64>,
    pub top10_total: Option<f64>,
    pub concentration_ratio: Option<f64>,
    pub distribution_score: Option<f64>,
    pub amount_top1: Option<f64>,
    pub amount_top5_total: Option<f64>,
    pub amount_total: Option<f64>,
    pub amount_distribution_score: Option<f64>,
    pub amount_concentration_ratio: Option<f64>,
}

impl TopHolders {
    /// Total top-10 share: the header figure when reported, else the sum of
    /// the ranked lines.
    pub fn effective_total(&self) -> Option<f64> {
        self.reported_total.or(self.top10_total)
    }

    pub fn fields(&self) -> Vec<Field> {
        vec![
            ("reported_total", num(self.reported_total)),
            ("top1_percentage", num(self.top1_percentage)),
            ("top5_total", num(self.top5_total)),
            ("top10_total", num(self.top10_total)),
            ("concentration_ratio", num(self.concentration_ratio)),
            ("distribution_score", num(self.distribution_score)),
            ("amount_top1", num(self.amount_top1)),
            ("amount_top5_total", num(self.amount_top5_total)),
            ("amount_total", num(self.amount_total)),
            ("amount_distribution_score", num(self.amount_distribution_score)),
            ("amount_concentration_ratio", num(self.amount_concentration_ratio)),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWallets {
    pub percentage: Option<f64>,
    pub count: Option<u64>,
    pub avg_hops: Option<f64>,
}

impl SourceWallets {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            ("percentage", num(self.percentage)),
            ("count", num(self.count)),
            ("avg_hops", num(self.avg_hops)),
        ]
    }
}

/// One ingested report.
///
/// Records are never mutated after extraction; a corrected report produces a
/// new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    pub contract_address: Option<String>,
    pub raw_text: String,
    #[serde(default)]
    pub market_overview: MarketOverview,
    #[serde(default)]
    pub wallet_insights: WalletInsights,
    #[serde(default)]
    pub risk_metrics: RiskMetrics,
    #[serde(default)]
    pub top_holders: TopHolders,
    #[serde(default)]
    pub source_wallets: SourceWallets,
}

impl TokenRecord {
    /// A record with the given identity and no indicators.
    pub fn new(name: &str, contract_address: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            contract_address: contract_address.map(str::to_string),
            raw_text: String::new(),
            market_overview: MarketOverview::default(),
            wallet_insights: WalletInsights::default(),
            risk_metrics: RiskMetrics::default(),
            top_holders: TopHolders::default(),
            source_wallets: SourceWallets::default(),
        }
    }

    pub fn fields(&self, section: Section) -> Vec<Field> {
        match section {
            Section::MarketOverview => self.market_overview.fields(),
            Section::WalletInsights => self.wallet_insights.fields(),
            Section::RiskMetrics => self.risk_metrics.fields(),
            Section::TopHolders => self.top_holders.fields(),
            Section::SourceWallets => self.source_wallets.fields(),
        }
    }

    /// Number of indicators present across all sections.
    pub fn present_count(&self) -> usize {
        Section::ALL
            .iter()
            .flat_map(|&s| self.fields(s))
            .filter(|(_, v)| v.is_some())
            .count()
    }
}
