//! Record extraction from semi-structured report text.
//!
//! Extraction is total: any section, field or line that cannot be understood
//! is simply left absent on the resulting [`TokenRecord`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::aggregate::{RankedHolder, aggregate_holders, aggregate_sources};
use crate::classify::{Line, classify_all, has_section_marker, normalize_label};
use crate::constants::{ADDRESS_MAX_LEN, ADDRESS_MIN_LEN, REPORT_INDICATORS, UNKNOWN_TOKEN_NAME};
use crate::record::{MarketOverview, RiskMetrics, TokenRecord, WalletInsights};

static NAME_WITH_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(([^)]+)\)\s*(?:├.*)?$").unwrap());
// Any run of text without section markers followed by `(SYMBOL)`.
static LOOSE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\x{1F4CA}\x{1F4C8}\x{1F50D}\x{1F468}\x{200D}\x{1F4BB}\x{1F3ED}\x{1F310}]+?)\s*\(([^)]+)\)")
        .unwrap()
});
static DECORATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{1F7E3}\x{1F440}\x{1F7E2}\x{1F534}\x{1F7E1}\x{1F40B}\x{2666}\x{FE0F}]").unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[A-Za-z0-9]{{{ADDRESS_MIN_LEN},{ADDRESS_MAX_LEN}}}$")).unwrap()
});
static PREFIXED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:CA|Contract):\s*([A-Za-z0-9]{{{ADDRESS_MIN_LEN},{ADDRESS_MAX_LEN}}})\b"
    ))
    .unwrap()
});
static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\s*([\d.,]+)([KMB]?)").unwrap());
static SIGNED_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-+]?[\d.,]+)%").unwrap());
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([\d.,]+)%").unwrap());
static COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([\d,]+)").unwrap());
static HOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.\s+(\S+)\s*-\s*([\d.,]+)%\s*-\s*([\d.,]+)\s*[A-Za-z]+").unwrap()
});
static HOPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\x{1F539}].*?\s*-\s*(\d+)\s+hops?\b").unwrap());

/// True if the text carries any of the phrases that identify a token report.
pub fn looks_like_report(text: &str) -> bool {
    REPORT_INDICATORS.iter().any(|i| text.contains(i))
}

/// Extract a [`TokenRecord`] from raw report text. Never fails.
pub fn extract(raw_text: &str) -> TokenRecord {
    let lines = classify_all(raw_text);
    let labeled = LabeledValues::collect(&lines);

    let mut holders = Vec::new();
    let mut hops = Vec::new();
    let mut holders_header = None;
    let mut sources_header = None;

    for line in &lines {
        match line {
            Line::Header(h) => {
                if holders_header.is_none() {
                    holders_header = h.value_after("Top 10 Holders").and_then(parse_percent);
                }
                if sources_header.is_none() {
                    sources_header = h.value_after("Source Wallets").and_then(parse_percent);
                }
            }
            Line::Item(item) => {
                if let Some(holder) = parse_holder(item.text) {
                    holders.push(holder);
                } else if let Some(n) = parse_hops(item.text) {
                    hops.push(n);
                }
            }
            Line::Blank | Line::Text(_) => {}
        }
    }

    let record = TokenRecord {
        name: derive_name(raw_text).unwrap_or_else(|| UNKNOWN_TOKEN_NAME.to_string()),
        contract_address: derive_contract_address(raw_text, &lines),
        raw_text: raw_text.to_string(),
        market_overview: MarketOverview {
            market_cap: labeled.currency("Market Cap"),
            price_change: labeled.signed_percent("Price%"),
            traders: labeled.count("Traders"),
            buy_volume: labeled.currency("Buy Volume"),
            sell_volume: labeled.currency("Sell Volume"),
            buy_count: labeled.count("Buy Count"),
            sell_count: labeled.count("Sell Count"),
            buyers: labeled.count("Buyers"),
            sellers: labeled.count("Sellers"),
        },
        wallet_insights: WalletInsights {
            holders_total: labeled.count("Holders Totais"),
            smart_wallets: labeled.count("Smart Wallets"),
            fresh_wallets: labeled.count("Fresh Wallets"),
            renowned_wallets: labeled.count("Renowned Wallets"),
            creator_wallets: labeled.count("Creator Wallets"),
            sniper_wallets: labeled.count("Sniper Wallets"),
            rat_traders: labeled.count("Rat Traders"),
            whale_wallets: labeled.count("Whale Wallets"),
            top_wallets: labeled.count("Top Wallets"),
            following_wallets: labeled.count("Following Wallets"),
            bluechip_holders: labeled.count("Bluechip Holders"),
            bundler_wallets: labeled.count("Bundler Wallets"),
        },
        risk_metrics: RiskMetrics {
            bluechip_holders_pct: labeled.percent("% Bluechip Holders"),
            rat_trader_supply_pct: labeled.percent("% Rat Trader Supply"),
            bundler_supply_pct: labeled.percent("% Bundler Supply"),
            entrapment_supply_pct: labeled.percent("% Entrapment Supply"),
            degen_calls: labeled.count("Degen Calls"),
            technical_signals: labeled.count("Sinais Técnicos"),
        },
        top_holders: aggregate_holders(holders_header, &holders),
        source_wallets: aggregate_sources(sources_header, &hops),
    };

    tracing::trace!(
        name = %record.name,
        contract = ?record.contract_address,
        present = record.present_count(),
        holders = holders.len(),
        sources = hops.len(),
        "extracted report"
    );
    record
}

/// Values of labelled list items, keyed by normalized label, in report order.
struct LabeledValues<'a> {
    by_label: HashMap<String, Vec<&'a str>>,
}

impl<'a> LabeledValues<'a> {
    fn collect(lines: &[Line<'a>]) -> Self {
        let mut by_label: HashMap<String, Vec<&'a str>> = HashMap::new();
        for line in lines {
            if let Line::Item(item) = line
                && let Some((label, value)) = item.label_value()
            {
                by_label.entry(normalize_label(label)).or_default().push(value);
            }
        }
        Self { by_label }
    }

    /// First value under `label` that `parse` accepts.
    fn first<T>(&self, label: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        self.by_label
            .get(&normalize_label(label))?
            .iter()
            .find_map(|&v| parse(v))
    }

    fn currency(&self, label: &str) -> Option<f64> {
        self.first(label, parse_currency)
    }

    fn signed_percent(&self, label: &str) -> Option<f64> {
        self.first(label, parse_signed_percent)
    }

    fn percent(&self, label: &str) -> Option<f64> {
        self.first(label, parse_percent)
    }

    fn count(&self, label: &str) -> Option<u64> {
        self.first(label, parse_count)
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Parse a decimal where `,` is either a thousands separator or the decimal
/// mark. With a `.` present, or more than one `,`, commas group thousands
/// (`1,234.50`, `1,234,567`); a lone comma is the decimal mark (`4,35`).
fn parse_decimal(s: &str) -> Option<f64> {
    let normalized = if s.contains('.') || s.matches(',').count() > 1 {
        s.replace(',', "")
    } else {
        s.replace(',', ".")
    };
    normalized.parse::<f64>().ok().and_then(finite)
}

/// `$ 3.88K` → 3880.0. Commas are thousands separators here.
pub fn parse_currency(value: &str) -> Option<f64> {
    let caps = CURRENCY.captures(value)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let scale = match &caps[2] {
        "K" => 1e3,
        "M" => 1e6,
        "B" => 1e9,
        _ => 1.0,
    };
    finite(number * scale)
}

pub fn parse_signed_percent(value: &str) -> Option<f64> {
    parse_decimal(&SIGNED_PERCENT.captures(value)?[1])
}

pub fn parse_percent(value: &str) -> Option<f64> {
    parse_decimal(&PERCENT.captures(value)?[1])
}

pub fn parse_count(value: &str) -> Option<u64> {
    COUNT.captures(value)?[1].replace(',', "").parse().ok()
}

fn parse_holder(text: &str) -> Option<RankedHolder> {
    let caps = HOLDER.captures(text)?;
    Some(RankedHolder {
        rank: caps[1].parse().ok()?,
        address: caps[2].to_string(),
        percentage: parse_decimal(&caps[3])?,
        amount: parse_decimal(&caps[4])?,
    })
}

fn parse_hops(text: &str) -> Option<u32> {
    HOPS.captures(text)?[1].parse().ok()
}

/// Strip decoration glyphs and collapse whitespace. `None` if nothing is left.
fn clean_name(raw: &str) -> Option<String> {
    let stripped = DECORATION.replace_all(raw, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
    (!collapsed.is_empty()).then_some(collapsed)
}

/// The name line is the first non-blank line without a section marker. A
/// `Name (SYMBOL)` line yields `Name`; anything else is cut at the first
/// branch glyph.
fn derive_name(raw_text: &str) -> Option<String> {
    let name_line = raw_text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !has_section_marker(l));

    if let Some(line) = name_line {
        let candidate = match NAME_WITH_SYMBOL.captures(line) {
            Some(caps) => caps[1].trim().to_string(),
            None => line.split('├').next().unwrap_or_default().trim().to_string(),
        };
        if let Some(name) = clean_name(&candidate) {
            return Some(name);
        }
    }

    LOOSE_NAME
        .captures(raw_text.trim())
        .and_then(|caps| clean_name(&caps[1]))
}

/// Contract address by priority: a list item holding only an address, a bare
/// address line, then a `CA:`/`Contract:` prefix. Purely numeric candidates
/// (timestamps, ids) are skipped.
fn derive_contract_address(raw_text: &str, lines: &[Line<'_>]) -> Option<String> {
    let items = lines.iter().filter_map(|l| match l {
        Line::Item(item) if ADDRESS.is_match(item.text) => Some(item.text),
        _ => None,
    });
    let bare = lines.iter().filter_map(|l| match l {
        Line::Text(text) if ADDRESS.is_match(text) => Some(*text),
        _ => None,
    });
    let prefixed = PREFIXED_ADDRESS
        .captures_iter(raw_text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    items
        .chain(bare)
        .chain(prefixed)
        .find(|candidate| !candidate.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE: &str = "everything is grok (EIG)
├ oRRMQqkrk8YQp6ehJBSQUg4PUZuud8oUUEgk6t7pump
└ Age: 10/07/2025 - 15h17min

👨‍💻 Creator:
└ EA4Yn7XxehkdGmBToMsefBNQJEH93YDJG9FqTz48cThG

📊 Market Overview (24h):
├ Market Cap:     $    3.88K
├ Buy Volume:     $  710.97K
├ Sell Volume:    $  710.07K
├ Price%:            -21.97%
├ Traders:              2417
├ Buy Count:            5427
├ Sell Count:           5507
├ Buyers:               2395
└ Sellers:              2369

📊 Top 20 Holders:  7.89%
├  1. 12ZHKk...L5Ds -  4.35% -   0.45 SOL
├  2. AwVdWh...MP7L -  1.19% -  10.93 SOL
├  3. 8DnFuh...FatA -  0.78% -   0.02 SOL
├  4. HjtK2p...Dheu -  0.47% -   4.36 SOL
├  5. 3tWA3Q...cJT5 -  0.19% -   0.01 SOL

🔍 Source Wallets:  5.18%
├ 5tzFki...uAi9 -  2 hops
├ 5VCwKt...NmcD -  2 hops
└ ASTyfS...iaJZ -  2 hops";

    #[test]
    fn test_market_cap_with_suffix_and_padding() {
        let r = extract("├ Market Cap:     $    3.88K");
        assert_abs_diff_eq!(r.market_overview.market_cap.unwrap(), 3880.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_identity() {
        let r = extract(SAMPLE);
        assert_eq!(r.name, "everything is grok");
        assert_eq!(
            r.contract_address.as_deref(),
            Some("oRRMQqkrk8YQp6ehJBSQUg4PUZuud8oUUEgk6t7pump")
        );
        assert_eq!(r.raw_text, SAMPLE);
    }

    #[test]
    fn test_sample_market_overview() {
        let m = extract(SAMPLE).market_overview;
        assert_abs_diff_eq!(m.buy_volume.unwrap(), 710_970.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.sell_volume.unwrap(), 710_070.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.price_change.unwrap(), -21.97);
        assert_eq!(m.traders, Some(2417));
        assert_eq!(m.buy_count, Some(5427));
        assert_eq!(m.sell_count, Some(5507));
        assert_eq!(m.buyers, Some(2395));
        assert_eq!(m.sellers, Some(2369));
    }

    #[test]
    fn test_sample_holders_and_sources() {
        let r = extract(SAMPLE);
        // "Top 20" header is not the top-10 share.
        assert_eq!(r.top_holders.reported_total, None);
        assert_abs_diff_eq!(r.top_holders.top1_percentage.unwrap(), 4.35);
        assert_abs_diff_eq!(r.top_holders.top5_total.unwrap(), 6.98, epsilon = 1e-9);
        assert_eq!(r.top_holders.distribution_score, None);
        assert_abs_diff_eq!(r.top_holders.amount_top1.unwrap(), 0.45);

        assert_eq!(r.source_wallets.percentage, Some(5.18));
        assert_eq!(r.source_wallets.count, Some(3));
        assert_abs_diff_eq!(r.source_wallets.avg_hops.unwrap(), 2.0);
    }

    #[test]
    fn test_ten_ranked_holders() {
        let pcts = [4.35, 1.19, 0.78, 0.47, 0.19, 0.15, 0.12, 0.10, 0.08, 0.05];
        let mut text = String::from("📊 Top 10 Holders\n");
        for (i, p) in pcts.iter().enumerate() {
            text.push_str(&format!("├ {}. Abc{i}...Xyz - {p:.2}% - 1.00 SOL\n", i + 1));
        }
        let h = extract(&text).top_holders;
        assert_abs_diff_eq!(h.top1_percentage.unwrap(), 4.35);
        assert_abs_diff_eq!(h.top5_total.unwrap(), 6.98, epsilon = 1e-9);
        assert_abs_diff_eq!(h.top10_total.unwrap(), 7.29, epsilon = 1e-9);
        assert_abs_diff_eq!(h.concentration_ratio.unwrap(), 59.67, epsilon = 0.01);
        assert!(h.distribution_score.is_some());
        assert_eq!(h.amount_distribution_score, Some(100.0));
    }

    #[test]
    fn test_holder_amount_with_thousands_separator() {
        let text = "📊 Top 10 Holders:  10.00%
├ 1. Abc...Xy1 - 6.00% - 1,234.50 SOL
├ 2. Abc...Xy2 - 3.00% -   12.00 SOL
└ 3. Abc...Xy3 - 1,00% -    1,5 SOL";
        let h = extract(text).top_holders;
        assert_eq!(h.top1_percentage, Some(6.0));
        assert_abs_diff_eq!(h.top5_total.unwrap(), 10.0, epsilon = 1e-9);
        assert_eq!(h.amount_top1, Some(1234.5));
        assert_abs_diff_eq!(h.amount_total.unwrap(), 1248.0, epsilon = 1e-9);
    }

    #[test]
    fn test_decimal_separators() {
        assert_eq!(parse_decimal("4,35"), Some(4.35));
        assert_eq!(parse_decimal("1,234.50"), Some(1234.5));
        assert_eq!(parse_decimal("1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_decimal("0.45"), Some(0.45));
        assert_eq!(parse_decimal("1.2.3"), None);
    }

    #[test]
    fn test_reported_top10_header() {
        let text = "📊 Top 10 Holders:  8.70%\n├ 1. Abc...Xyz - 4.35% - 1 SOL";
        let h = extract(text).top_holders;
        assert_eq!(h.reported_total, Some(8.70));
        assert_abs_diff_eq!(h.concentration_ratio.unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wallet_insights_and_risk_metrics() {
        let text = "📊 Wallet Insights:
├ Holders Totais: 1,234
├ Smart Wallets: 3
├ Bluechip Holders: 7
└ Bundler Wallets: 0

📈 Risk Metrics:
├ % Bluechip Holders: 1,5%
├ %Rat Trader Supply: 12.40%
├ Degen Calls: 2
└ Sinais Técnicos: 4";
        let r = extract(text);
        assert_eq!(r.wallet_insights.holders_total, Some(1234));
        assert_eq!(r.wallet_insights.smart_wallets, Some(3));
        assert_eq!(r.wallet_insights.bluechip_holders, Some(7));
        assert_eq!(r.wallet_insights.bundler_wallets, Some(0));
        assert_eq!(r.wallet_insights.fresh_wallets, None);
        assert_eq!(r.risk_metrics.bluechip_holders_pct, Some(1.5));
        assert_eq!(r.risk_metrics.rat_trader_supply_pct, Some(12.4));
        assert_eq!(r.risk_metrics.degen_calls, Some(2));
        assert_eq!(r.risk_metrics.technical_signals, Some(4));
        assert_eq!(r.risk_metrics.bundler_supply_pct, None);
    }

    #[test]
    fn test_malformed_value_left_absent() {
        let r = extract("├ Market Cap: $ 1.2.3K\n├ Traders: many\n├ Price%: --5%");
        assert_eq!(r.market_overview.market_cap, None);
        assert_eq!(r.market_overview.traders, None);
        assert_eq!(r.market_overview.price_change, None);
    }

    #[test]
    fn test_later_valid_value_is_used() {
        let r = extract("├ Market Cap: unknown\n├ Market Cap: $2M");
        assert_eq!(r.market_overview.market_cap, Some(2_000_000.0));
    }

    #[test]
    fn test_currency_thousands_separator_and_billions() {
        assert_eq!(parse_currency("$1,250"), Some(1250.0));
        assert_eq!(parse_currency("$ 1.5B"), Some(1.5e9));
        assert_eq!(parse_currency("1.5B"), None);
    }

    #[test]
    fn test_name_without_symbol() {
        let r = extract("Moon Cat 🟢\n📊 Market Overview:\n├ Traders: 5");
        assert_eq!(r.name, "Moon Cat");
    }

    #[test]
    fn test_name_cut_at_branch_glyph() {
        let r = extract("Doge   Wif ├ extra");
        assert_eq!(r.name, "Doge Wif");
    }

    #[test]
    fn test_name_with_symbol_followed_by_item() {
        let r = extract("🟣 Pepe  Two (PEPE2) ├ abc");
        assert_eq!(r.name, "Pepe Two");
    }

    #[test]
    fn test_unknown_name_when_nothing_qualifies() {
        let r = extract("├ Market Cap:     $    3.88K");
        assert_eq!(r.name, UNKNOWN_TOKEN_NAME);
        let empty = extract("");
        assert_eq!(empty.name, UNKNOWN_TOKEN_NAME);
        assert_eq!(empty.present_count(), 0);
    }

    #[test]
    fn test_numeric_address_skipped() {
        let text = "Token (TKN)\n├ 12345678901234567890123456789012345\nCA: 7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
        let r = extract(text);
        assert_eq!(
            r.contract_address.as_deref(),
            Some("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU")
        );
    }

    #[test]
    fn test_bare_address_line() {
        let text = "Token (TKN)\nGq1bQ6Xz9mR2uVt8kLp3NwYc5HjD4sEaF7oZiBxK2pump\n📊 Market Overview:";
        let r = extract(text);
        assert_eq!(
            r.contract_address.as_deref(),
            Some("Gq1bQ6Xz9mR2uVt8kLp3NwYc5HjD4sEaF7oZiBxK2pump")
        );
    }

    #[test]
    fn test_no_address() {
        assert_eq!(extract("Token (TKN)\n├ Traders: 4").contract_address, None);
    }

    #[test]
    fn test_source_hops_with_label() {
        let r = extract("🔍 Source Wallets: 14,73%\n├ Debridge - 10 hops\n└ 🔹Binance - 1 hop");
        assert_eq!(r.source_wallets.percentage, Some(14.73));
        assert_eq!(r.source_wallets.count, Some(2));
        assert_abs_diff_eq!(r.source_wallets.avg_hops.unwrap(), 5.5);
    }

    #[test]
    fn test_looks_like_report() {
        assert!(looks_like_report(SAMPLE));
        assert!(looks_like_report("├ Market Cap: $1"));
        assert!(!looks_like_report("gm everyone"));
    }
}
