//! Parsers for the model's list of alternative queries

use regex::Regex;
use std::sync::OnceLock;

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•]|Query\s*\d*\s*:)\s*").expect("valid list marker regex")
    })
}

/// Strip numbering, bullets and surrounding quotes from one item
fn clean_item(item: &str) -> String {
    let item = list_marker().replace(item.trim(), "");
    item.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

/// Splits a comma separated list
pub struct CommaSeparatedListParser;

impl CommaSeparatedListParser {
    pub fn parse(text: &str) -> Vec<String> {
        dedup(text.split(',').map(clean_item))
    }
}

/// Parses the query list the model returned
///
/// One query per line when the model answered with several lines, otherwise
/// a comma separated list. Lead-in lines ending in a colon are dropped.
pub struct QueryListParser;

impl QueryListParser {
    pub fn parse(text: &str) -> Vec<String> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.ends_with(':'))
            .collect();

        match lines.as_slice() {
            [] => Vec::new(),
            [single] => CommaSeparatedListParser::parse(single),
            many => dedup(many.iter().map(|l| clean_item(l))),
        }
    }
}
