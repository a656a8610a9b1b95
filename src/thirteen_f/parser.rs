use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{info, warn};

use crate::api::FilingSource;
use crate::models::InfoTableEntry;

/// Filings submitted from January 2023 on report values in whole dollars;
/// earlier ones in thousands. The first period affected is Q4 2022.
pub fn value_multiplier_for(report_period: NaiveDate) -> f64 {
    match NaiveDate::from_ymd_opt(2022, 12, 31) {
        Some(cutover) if report_period < cutover => 1000.0,
        _ => 1.0,
    }
}

/// Download and parse an information table. Any failure yields an empty list.
pub async fn fetch_info_table(source: &dyn FilingSource, url: &str, value_multiplier: f64) -> Vec<InfoTableEntry> {
    info!("📥 Fetching XML from: {}", url);

    let body = match source.fetch_text(url).await {
        Ok(Some(body)) => body,
        Ok(None) => {
            warn!("❌ Information table not found: {}", url);
            return Vec::new();
        }
        Err(e) => {
            warn!("❌ Error fetching XML {}: {}", url, e);
            return Vec::new();
        }
    };

    let entries = parse_info_table(&body, value_multiplier);
    info!("✅ Parsed {} holdings from XML", entries.len());
    entries
}

#[derive(Default)]
struct PartialEntry {
    name: String,
    cusip: String,
    value: String,
    shares: String,
}

impl PartialEntry {
    fn finish(self, value_multiplier: f64) -> Option<InfoTableEntry> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(InfoTableEntry {
            name: name.to_string(),
            cusip: self.cusip.trim().to_string(),
            value: parse_number(&self.value) * value_multiplier,
            shares: parse_number(&self.shares),
        })
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

fn is_info_table_tag(tag: &str) -> bool {
    tag.contains("infoTable") || tag.contains("InfoTable")
}

/// Parse a 13F information table.
///
/// Entries are the direct children of the root whose local name contains
/// `infoTable`; namespace prefixes are ignored. Entries without an issuer name
/// are dropped and unparseable numbers become zero. A document that is not
/// well-formed XML yields an empty list.
pub fn parse_info_table(xml: &str, value_multiplier: f64) -> Vec<InfoTableEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut current: Option<PartialEntry> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                path.push(tag);
                if path.len() == 2 && is_info_table_tag(&path[1]) {
                    current = Some(PartialEntry::default());
                }
            }
            Ok(Event::End(_)) => {
                if path.len() == 2 {
                    if let Some(entry) = current.take().and_then(|p| p.finish(value_multiplier)) {
                        entries.push(entry);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(e) => {
                        warn!("❌ Error parsing XML: {}", e);
                        return Vec::new();
                    }
                };
                append_field(&path, current.as_mut(), &text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                append_field(&path, current.as_mut(), &text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("❌ Error parsing XML at byte {}: {}", reader.buffer_position(), e);
                return Vec::new();
            }
        }
    }

    if !path.is_empty() {
        warn!("❌ Error parsing XML: unclosed element <{}>", path[path.len() - 1]);
        return Vec::new();
    }

    entries
}

fn append_field(path: &[String], entry: Option<&mut PartialEntry>, text: &str) {
    let Some(entry) = entry else {
        return;
    };

    let target = match path {
        [_, _, field] => match field.as_str() {
            "nameOfIssuer" => &mut entry.name,
            "cusip" => &mut entry.cusip,
            "value" => &mut entry.value,
            _ => return,
        },
        [_, _, parent, field] if parent == "shrsOrPrnAmt" && field == "sshPrnamt" => &mut entry.shares,
        _ => return,
    };
    target.push_str(text);
}
