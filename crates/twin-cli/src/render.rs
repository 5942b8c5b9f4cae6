//! Plain-text rendering of verdicts.

use twin_core::{Emission, Section, SuppressReason, TokenRecord};

/// Sections scoring at or below this get no side-by-side table.
const SIDE_BY_SIDE_MIN: f64 = 30.0;

const RULE: &str = "──────────────────────────────────────";

pub fn format_currency(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v >= 1_000_000.0 => format!("${:.2}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("${:.2}K", v / 1_000.0),
        Some(v) => format!("${v:.2}"),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v >= 0.0 => format!("+{v:.2}%"),
        Some(v) => format!("{v:.2}%"),
    }
}

/// Integer with `,` thousands separators.
pub fn format_count(value: Option<u64>) -> String {
    let Some(v) = value else {
        return "N/A".to_string();
    };
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_decimal(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

type Row = (&'static str, String, String);

fn rows(section: Section, current: &TokenRecord, archived: &TokenRecord) -> Vec<Row> {
    macro_rules! row {
        ($label:expr, $fmt:ident, $($path:ident).+) => {
            ($label, $fmt(current.$($path).+), $fmt(archived.$($path).+))
        };
    }
    match section {
        Section::MarketOverview => vec![
            row!("Market Cap", format_currency, market_overview.market_cap),
            row!("Buy Volume", format_currency, market_overview.buy_volume),
            row!("Sell Volume", format_currency, market_overview.sell_volume),
            row!("Price%", format_percent, market_overview.price_change),
            row!("Traders", format_count, market_overview.traders),
            row!("Buy Count", format_count, market_overview.buy_count),
            row!("Sell Count", format_count, market_overview.sell_count),
            row!("Buyers", format_count, market_overview.buyers),
            row!("Sellers", format_count, market_overview.sellers),
        ],
        Section::WalletInsights => vec![
            row!("Holders Total", format_count, wallet_insights.holders_total),
            row!("Smart Wallets", format_count, wallet_insights.smart_wallets),
            row!("Fresh Wallets", format_count, wallet_insights.fresh_wallets),
            row!("Renowned Wallets", format_count, wallet_insights.renowned_wallets),
            row!("Creator Wallets", format_count, wallet_insights.creator_wallets),
            row!("Sniper Wallets", format_count, wallet_insights.sniper_wallets),
            row!("Rat Traders", format_count, wallet_insights.rat_traders),
            row!("Whale Wallets", format_count, wallet_insights.whale_wallets),
            row!("Top Wallets", format_count, wallet_insights.top_wallets),
            row!("Following Wallets", format_count, wallet_insights.following_wallets),
            row!("Bluechip Holders", format_count, wallet_insights.bluechip_holders),
            row!("Bundler Wallets", format_count, wallet_insights.bundler_wallets),
        ],
        Section::RiskMetrics => vec![
            row!("Bluechip Holders", format_percent, risk_metrics.bluechip_holders_pct),
            row!("Rat Trader Supply", format_percent, risk_metrics.rat_trader_supply_pct),
            row!("Bundler Supply", format_percent, risk_metrics.bundler_supply_pct),
            row!("Entrapment Supply", format_percent, risk_metrics.entrapment_supply_pct),
            row!("Degen Calls", format_count, risk_metrics.degen_calls),
        ],
        Section::TopHolders => vec![
            (
                "Top 10 Total",
                format_percent(current.top_holders.effective_total()),
                format_percent(archived.top_holders.effective_total()),
            ),
            row!("Top 1 Holder", format_percent, top_holders.top1_percentage),
            row!("Top 5 Holders", format_percent, top_holders.top5_total),
        ],
        Section::SourceWallets => vec![
            row!("Percentage", format_percent, source_wallets.percentage),
            row!("Count", format_count, source_wallets.count),
            row!("Avg Hops", format_decimal, source_wallets.avg_hops),
        ],
    }
}

/// Tree-drawn `label: value` lines with the last one closed off.
fn tree<I>(lines: I) -> Vec<String>
where
    I: ExactSizeIterator<Item = String>,
{
    let last = lines.len().saturating_sub(1);
    lines
        .enumerate()
        .map(|(i, line)| {
            let branch = if i == last { '└' } else { '├' };
            format!("{branch} {line}")
        })
        .collect()
}

fn side_by_side(current: &TokenRecord, emission: &Emission) -> Vec<String> {
    let mut out = Vec::new();
    for (&section, &score) in &emission.similarity.by_section {
        if score <= SIDE_BY_SIDE_MIN {
            continue;
        }
        out.push(format!("{}:", section.title()));
        let lines = rows(section, current, &emission.matched)
            .into_iter()
            .map(|(label, a, b)| format!("{:<19}{a:>9} | {b:>9}", format!("{label}:")));
        out.extend(tree(lines));
        out.push(format!("=> similarity {score:.0}%"));
        out.push(String::new());
    }

    if out.is_empty() {
        let best = emission
            .similarity
            .by_section
            .values()
            .copied()
            .fold(0.0, f64::max);
        out.push("Summary:".to_string());
        out.push(format!("├ Best section:  {best:.1}%"));
        out.push(format!("└ No section above {SIDE_BY_SIDE_MIN:.0}%"));
        out.push(String::new());
    }
    out
}

/// Full report for an emit verdict.
pub fn render_emission(current: &TokenRecord, emission: &Emission) -> String {
    let unavailable = "not available";
    let mut lines = vec![
        "SIMILARITY ANALYSIS".to_string(),
        RULE.to_string(),
        format!("Analysed token:      {}", emission.target_name),
        format!("CA:                  {}", emission.contract_address),
        format!("Most similar token:  {}", emission.matched.name),
        format!(
            "CA:                  {}",
            emission.matched.contract_address.as_deref().unwrap_or(unavailable)
        ),
        format!("Overall similarity:  {:.1}%", emission.similarity.overall),
        String::new(),
        "Similarity by section:".to_string(),
    ];

    let width = Section::ALL.iter().map(|s| s.title().len()).max().unwrap_or(0) + 1;
    let scores = Section::ALL.iter().map(|s| {
        let score = emission.similarity.by_section.get(s).copied().unwrap_or(0.0);
        format!("{:<width$}  {score:>6.1}%", format!("{}:", s.title()))
    });
    lines.extend(tree(scores));
    lines.push(String::new());
    lines.push("Left: current    Right: archived".to_string());
    lines.push(RULE.to_string());
    lines.extend(side_by_side(current, emission));

    lines.join("\n").trim_end().to_string()
}

/// One-line explanation of a suppress verdict.
pub fn render_suppression(current: &TokenRecord, reason: &SuppressReason) -> String {
    let why = match reason {
        SuppressReason::EmptyCorpus => "no archived reports to compare against".to_string(),
        SuppressReason::NoIdentity => "report has no contract address".to_string(),
        SuppressReason::AlreadyDisplayed => "contract was already surfaced".to_string(),
        SuppressReason::BelowThreshold { score, threshold } => {
            format!("best match {score:.1}% is below threshold {threshold:.1}%")
        }
        SuppressReason::NoMatch => "no archived report scored above 0%".to_string(),
    };
    format!("{}: suppressed ({why})", current.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::similarity::overall_similarity;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(None), "N/A");
        assert_eq!(format_currency(Some(3880.0)), "$3.88K");
        assert_eq!(format_currency(Some(2_500_000.0)), "$2.50M");
        assert_eq!(format_currency(Some(12.5)), "$12.50");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(4.35)), "+4.35%");
        assert_eq!(format_percent(Some(0.0)), "+0.00%");
        assert_eq!(format_percent(Some(-21.97)), "-21.97%");
        assert_eq!(format_percent(None), "N/A");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(Some(0)), "0");
        assert_eq!(format_count(Some(999)), "999");
        assert_eq!(format_count(Some(2417)), "2,417");
        assert_eq!(format_count(Some(1_234_567)), "1,234,567");
        assert_eq!(format_count(None), "N/A");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(Some(2.0)), "2.00");
        assert_eq!(format_decimal(None), "N/A");
    }

    fn emission(current: &TokenRecord, matched: &TokenRecord) -> Emission {
        Emission {
            target_name: current.name.clone(),
            contract_address: current.contract_address.clone().unwrap_or_default(),
            matched: matched.clone(),
            similarity: overall_similarity(current, matched),
            threshold: 70.0,
            describe_links: false,
        }
    }

    #[test]
    fn test_render_emission_with_side_by_side() {
        let mut current = TokenRecord::new("new token", Some("CA_NEW"));
        current.market_overview.market_cap = Some(3880.0);
        current.market_overview.traders = Some(2417);
        let mut matched = current.clone();
        matched.name = "old token".to_string();
        matched.contract_address = None;

        let text = render_emission(&current, &emission(&current, &matched));
        assert!(text.starts_with("SIMILARITY ANALYSIS"));
        assert!(text.contains("Analysed token:      new token"));
        assert!(text.contains("Most similar token:  old token"));
        assert!(text.contains("CA:                  not available"));
        assert!(text.contains("Overall similarity:  100.0%"));
        assert!(text.contains("└ Source Wallets:"));
        assert!(text.contains("Market Overview:\n├ Market Cap:"));
        assert!(text.contains("$3.88K |    $3.88K"));
        assert!(text.contains("2,417"));
        assert!(!text.contains("Wallet Insights:\n├ Holders Total"));
    }

    #[test]
    fn test_render_emission_summary_when_no_section_qualifies() {
        let mut current = TokenRecord::new("a", Some("CA"));
        current.market_overview.market_cap = Some(100.0);
        current.market_overview.traders = Some(10);
        let mut matched = TokenRecord::new("b", None);
        matched.market_overview.market_cap = Some(50.0);

        // market: (50 + 0) / 2 = 25
        let text = render_emission(&current, &emission(&current, &matched));
        assert!(text.contains("Summary:"));
        assert!(text.contains("├ Best section:  25.0%"));
        assert!(text.contains("└ No section above 30%"));
    }

    #[test]
    fn test_render_suppression() {
        let r = TokenRecord::new("tok", None);
        assert_eq!(
            render_suppression(&r, &SuppressReason::NoIdentity),
            "tok: suppressed (report has no contract address)"
        );
        let below = SuppressReason::BelowThreshold {
            score: 55.0,
            threshold: 70.0,
        };
        assert!(render_suppression(&r, &below).contains("55.0% is below threshold 70.0%"));
    }
}
