use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::models::Fund;

/// Pick a fund by CIK or name. A CIK matches exactly (leading zeros ignored);
/// otherwise the best fuzzy name match wins.
pub fn select_fund<'a>(funds: &'a [Fund], query: &str) -> Option<&'a Fund> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if query.chars().all(|c| c.is_ascii_digit()) {
        let wanted = query.trim_start_matches('0');
        return funds.iter().find(|f| f.cik.trim_start_matches('0') == wanted);
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    funds
        .iter()
        .filter_map(|fund| matcher.fuzzy_match(&fund.name, query).map(|score| (score, fund)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, fund)| fund)
}

/// Dollar amount with a T/B/M suffix, e.g. `$69.90B`
pub fn format_money(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (value / 1e12, "T")
    } else if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else {
        (value, "")
    };
    format!("${:.2}{}", scaled, suffix)
}
