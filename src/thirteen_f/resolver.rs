use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::SymbolSearch;
use crate::maintenance::is_bad_symbol;

/// Legal-form tokens that confuse symbol search when left on an issuer name
const NAME_SUFFIXES: &[&str] = &[
    "INC", "INCORPORATED", "CORP", "CORPORATION", "LTD", "LIMITED", "PLC", "CO", "COMPANY",
    "NEW", "DEL", "/DE/", "/DE", "LP", "L P", "LLC", "SA", "NV", "AG", "HLDGS", "CL A", "CL B",
    "COM",
];

/// Maps issuer names from information tables to listed tickers.
///
/// Lookups are cached for the lifetime of the resolver, misses included, so a
/// name that appears in many filings is searched once per run.
pub struct TickerResolver {
    search: Arc<dyn SymbolSearch>,
    cache: HashMap<String, Option<String>>,
}

impl TickerResolver {
    pub fn new(search: Arc<dyn SymbolSearch>) -> Self {
        Self {
            search,
            cache: HashMap::new(),
        }
    }

    /// Resolve an issuer to a ticker. `None` when nothing usable was found.
    pub async fn resolve(&mut self, name: &str, cusip: &str) -> Option<String> {
        let key = name.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let cleaned = clean_issuer_name(&key);
        let mut symbol = self.lookup(&cleaned).await;
        if symbol.is_none() && cleaned != key {
            debug!("Retrying search for {} with the full issuer name", cleaned);
            symbol = self.lookup(&key).await;
        }

        match &symbol {
            Some(s) => info!("🔎 {} ({}) -> {}", name, cusip, s),
            None => warn!("⚠️ No ticker found for {} ({})", name, cusip),
        }

        self.cache.insert(key, symbol.clone());
        symbol
    }

    pub fn cached_lookups(&self) -> usize {
        self.cache.len()
    }

    async fn lookup(&self, query: &str) -> Option<String> {
        match self.search.search_symbol(query).await {
            Ok(Some(symbol)) if is_bad_symbol(&symbol) => {
                debug!("Rejecting non-equity match {} for {}", symbol, query);
                None
            }
            Ok(Some(symbol)) => Some(symbol.to_uppercase()),
            Ok(None) => None,
            Err(e) => {
                warn!("❌ Symbol search failed for {}: {}", query, e);
                None
            }
        }
    }
}

/// Strip trailing legal-form tokens from an issuer name, keeping at least one
/// word. `APPLE INC` becomes `APPLE`, `BANK AMER CORP` becomes `BANK AMER`.
pub fn clean_issuer_name(name: &str) -> String {
    let normalized = name
        .to_uppercase()
        .replace(['.', ','], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut current = normalized.as_str();
    loop {
        let stripped = NAME_SUFFIXES.iter().find_map(|suffix| {
            current
                .strip_suffix(suffix)
                .and_then(|rest| rest.strip_suffix(' '))
                .map(str::trim_end)
        });
        match stripped {
            Some(rest) if !rest.is_empty() => current = rest,
            _ => break,
        }
    }

    current.to_string()
}
