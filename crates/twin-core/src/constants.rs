/// Threshold used when no threshold setting has been persisted yet.
pub const DEFAULT_THRESHOLD: f64 = 70.0;

/// Settings key under which the display threshold is persisted.
pub const THRESHOLD_SETTING_KEY: &str = "min_similarity_threshold";

/// Name given to a record when no name line can be derived from the report.
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown token";

/// Glyphs that introduce a report section header.
pub const SECTION_MARKERS: [&str; 6] = ["📊", "📈", "🔍", "👨‍💻", "🏭", "🌐"];

/// Phrases whose presence marks a text as a token report.
pub const REPORT_INDICATORS: [&str; 7] = [
    "📊 Market Overview",
    "Market Cap:",
    "📊 Wallet Insights",
    "📈 Risk Metrics",
    "📊 Top 10 Holders",
    "👥 Wallet Statistics",
    "📊 Top 20 Holders",
];

/// Contract address length bounds (inclusive).
pub const ADDRESS_MIN_LEN: usize = 32;
pub const ADDRESS_MAX_LEN: usize = 50;

/// Number of ranked holders that feed the dispersion statistics.
pub const RANKED_WINDOW: usize = 10;

/// Number of ranked holders summed into the oligopoly share.
pub const OLIGOPOLY_WINDOW: usize = 5;

// Top-holder term weights, percent of 100.
pub const W_HOLDERS_TOTAL: f64 = 15.0;
pub const W_HOLDERS_TOP1: f64 = 20.0;
pub const W_HOLDERS_TOP5: f64 = 15.0;
pub const W_HOLDERS_DISTRIBUTION: f64 = 15.0;
pub const W_AMOUNT_TOTAL: f64 = 10.0;
pub const W_AMOUNT_CONCENTRATION: f64 = 15.0;
pub const W_AMOUNT_DISTRIBUTION: f64 = 10.0;

// Source-wallet term weights, percent of 100.
pub const W_SOURCE_PERCENTAGE: f64 = 50.0;
pub const W_SOURCE_COUNT: f64 = 25.0;
pub const W_SOURCE_HOPS: f64 = 25.0;
