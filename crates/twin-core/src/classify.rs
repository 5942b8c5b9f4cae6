//! Line classifier for tree-formatted reports.
//!
//! Each line of a report is one of: blank, a section header introduced by a
//! marker glyph (`📊 Market Overview (24h):`), a list item introduced by a
//! branch glyph (`├ Traders: 2417`), or free text (the name line, a bare
//! address). The extractor resolves fields from classified lines instead of
//! searching the raw text.

use crate::constants::SECTION_MARKERS;

const BRANCH: char = '├';
const LAST_BRANCH: char = '└';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Header(Header<'a>),
    Item(Item<'a>),
    Text(&'a str),
}

/// A section heading: marker glyph plus the rest of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub marker: &'a str,
    pub body: &'a str,
}

impl<'a> Header<'a> {
    /// Heading text up to the first colon.
    pub fn title(&self) -> &'a str {
        match self.body.split_once(':') {
            Some((title, _)) => title.trim(),
            None => self.body.trim(),
        }
    }

    /// Text following `<label>:` anywhere in the heading. Tolerates link
    /// markup between the marker and the label.
    pub fn value_after(&self, label: &str) -> Option<&'a str> {
        let needle = format!("{label}:");
        let start = self.body.find(&needle)? + needle.len();
        Some(self.body[start..].trim())
    }
}

/// A list item: everything after the branch glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    pub last: bool,
    pub text: &'a str,
}

impl<'a> Item<'a> {
    /// Split `Label: value` at the first colon. `None` for unlabelled items
    /// or items whose label would be empty.
    pub fn label_value(&self) -> Option<(&'a str, &'a str)> {
        let (label, value) = self.text.split_once(':')?;
        let label = label.trim();
        if label.is_empty() {
            None
        } else {
            Some((label, value.trim()))
        }
    }
}

pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }

    if let Some(&marker) = SECTION_MARKERS.iter().find(|m| trimmed.starts_with(**m)) {
        return Line::Header(Header {
            marker,
            body: trimmed[marker.len()..].trim(),
        });
    }

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(c @ (BRANCH | LAST_BRANCH)) => Line::Item(Item {
            last: c == LAST_BRANCH,
            text: chars.as_str().trim(),
        }),
        _ => Line::Text(trimmed),
    }
}

/// Classify every line of a report, preserving order.
pub fn classify_all(text: &str) -> Vec<Line<'_>> {
    text.lines().map(classify).collect()
}

/// True if the line carries a section marker anywhere.
pub fn has_section_marker(line: &str) -> bool {
    SECTION_MARKERS.iter().any(|m| line.contains(m))
}

/// Canonical form for label comparison: lowercase, whitespace removed.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank() {
        assert_eq!(classify("   \t"), Line::Blank);
    }

    #[test]
    fn test_header_with_value() {
        let Line::Header(h) = classify("📊 Top 10 Holders:  7.89%") else {
            panic!("expected header");
        };
        assert_eq!(h.marker, "📊");
        assert_eq!(h.title(), "Top 10 Holders");
        assert_eq!(h.value_after("Top 10 Holders"), Some("7.89%"));
    }

    #[test]
    fn test_header_with_link_markup() {
        let Line::Header(h) = classify("🔍 [link] Source Wallets: 14.73%") else {
            panic!("expected header");
        };
        assert_eq!(h.value_after("Source Wallets"), Some("14.73%"));
    }

    #[test]
    fn test_multi_codepoint_marker() {
        let Line::Header(h) = classify("👨‍💻 Creator:") else {
            panic!("expected header");
        };
        assert_eq!(h.title(), "Creator");
        assert_eq!(h.value_after("Creator"), Some(""));
    }

    #[test]
    fn test_item_label_value() {
        let Line::Item(item) = classify("├ Market Cap:     $    3.88K") else {
            panic!("expected item");
        };
        assert!(!item.last);
        assert_eq!(item.label_value(), Some(("Market Cap", "$    3.88K")));
    }

    #[test]
    fn test_last_item_without_label() {
        let Line::Item(item) = classify("└ ASTyfS...iaJZ -  2 hops") else {
            panic!("expected item");
        };
        assert!(item.last);
        assert_eq!(item.text, "ASTyfS...iaJZ -  2 hops");
        assert_eq!(item.label_value(), None);
    }

    #[test]
    fn test_text_line() {
        assert_eq!(
            classify("everything is grok (EIG)"),
            Line::Text("everything is grok (EIG)")
        );
    }

    #[test]
    fn test_marker_detection() {
        assert!(has_section_marker("foo 📈 bar"));
        assert!(!has_section_marker("plain name"));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("% Bluechip  Holders"), "%bluechipholders");
        assert_eq!(normalize_label("Price%"), "price%");
    }
}
