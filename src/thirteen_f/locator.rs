use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use super::FORM_13F_HR;
use crate::api::sec_edgar_client::cik_path_segment;
use crate::api::{FilingSource, Submissions};
use crate::models::FilingDocument;

/// Which 13F-HR filings to pick from the submissions list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Most recent filing only
    Latest,
    /// Every filing in the recent list, newest first
    Historical,
}

/// Resolves a filer's 13F-HR filings to information-table document URLs
pub struct FilingLocator {
    source: Arc<dyn FilingSource>,
    archive_url: String,
}

impl FilingLocator {
    pub fn new(source: Arc<dyn FilingSource>, archive_url: impl Into<String>) -> Self {
        let archive_url: String = archive_url.into();
        Self {
            source,
            archive_url: archive_url.trim_end_matches('/').to_string(),
        }
    }

    /// List information-table documents for the filer. Never fails: an
    /// unreachable registry yields an empty list.
    pub async fn list_filings(&self, cik: &str, mode: CollectionMode) -> Vec<FilingDocument> {
        let submissions = match self.source.get_submissions(cik).await {
            Ok(submissions) => submissions,
            Err(e) => {
                warn!("❌ Could not load submissions for CIK {}: {}", cik, e);
                return Vec::new();
            }
        };

        let candidates = thirteen_f_filings(&submissions);
        if candidates.is_empty() {
            warn!("⚠️ No {} found for CIK {}", FORM_13F_HR, cik);
            return Vec::new();
        }

        let take = match mode {
            CollectionMode::Latest => 1,
            CollectionMode::Historical => candidates.len(),
        };

        let mut documents = Vec::new();
        for filing in candidates.into_iter().take(take) {
            debug!("Analyzing filing {} ({})", filing.accession_number, filing.report_period);
            let url = self
                .locate_info_table(cik, &filing.accession_number, &filing.primary_document)
                .await;
            documents.push(FilingDocument {
                accession_number: filing.accession_number,
                report_period: filing.report_period,
                url,
            });
        }

        info!("📅 Found {} {} filings for CIK {}", documents.len(), FORM_13F_HR, cik);
        documents
    }

    /// Find the information-table URL via the filing index, falling back to
    /// conventional names when the index is missing or unhelpful.
    pub async fn locate_info_table(&self, cik: &str, accession_number: &str, primary_document: &str) -> String {
        let filing_dir = format!(
            "{}/Archives/edgar/data/{}/{}",
            self.archive_url,
            cik_path_segment(cik),
            accession_number.replace('-', "")
        );
        let index_url = format!("{}/{}-index.html", filing_dir, accession_number);

        match self.source.fetch_text(&index_url).await {
            Ok(Some(html)) => {
                let links = extract_xml_links(&html);
                debug!("XMLs found in index: {:?}", links);
                if let Some(link) = select_info_table_link(&links) {
                    return resolve_link(&filing_dir, link);
                }
            }
            Ok(None) => warn!("❌ Index not found: {}", index_url),
            Err(e) => warn!("⚠️ Index error for {}: {}", index_url, e),
        }

        fallback_document_url(&filing_dir, primary_document)
    }
}

/// Candidate 13F-HR filing pulled out of the parallel submissions arrays
#[derive(Debug, Clone, PartialEq)]
pub struct FilingCandidate {
    pub accession_number: String,
    pub primary_document: String,
    pub report_period: NaiveDate,
}

/// All 13F-HR filings in submission order. The report date falls back to the
/// filing date; entries with neither are dropped.
pub fn thirteen_f_filings(submissions: &Submissions) -> Vec<FilingCandidate> {
    let recent = &submissions.filings.recent;
    let field = |values: &Vec<String>, i: usize| values.get(i).map(|s| s.trim().to_string()).unwrap_or_default();

    recent
        .form
        .iter()
        .enumerate()
        .filter(|(_, form)| form.as_str() == FORM_13F_HR)
        .filter_map(|(i, _)| {
            let accession_number = field(&recent.accession_number, i);
            if accession_number.is_empty() {
                return None;
            }
            let report_period = parse_date(&field(&recent.report_date, i))
                .or_else(|| parse_date(&field(&recent.filing_date, i)));
            let Some(report_period) = report_period else {
                warn!("⚠️ Filing {} has no usable report or filing date", accession_number);
                return None;
            };
            Some(FilingCandidate {
                accession_number,
                primary_document: field(&recent.primary_document, i),
                report_period,
            })
        })
        .collect()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn xml_href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']([^"']+\.xml)["']"#).expect("static regex is valid")
    })
}

/// All `href` targets ending in `.xml`, in document order
pub fn extract_xml_links(html: &str) -> Vec<String> {
    xml_href_pattern()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Prefer a link naming the table (`table`/`info`) that is not a styled view;
/// otherwise any link that is not the primary form or a stylesheet render.
pub fn select_info_table_link(links: &[String]) -> Option<&str> {
    let preferred = links.iter().find(|link| {
        let lower = link.to_lowercase();
        !lower.contains("xsl") && !lower.contains("html") && (lower.contains("table") || lower.contains("info"))
    });
    if let Some(link) = preferred {
        return Some(link.as_str());
    }

    links
        .iter()
        .find(|link| {
            let lower = link.to_lowercase();
            !lower.contains("primary_doc") && !lower.contains("xsl")
        })
        .map(|link| link.as_str())
}

/// Resolve an index link: absolute paths against the archive host, relative
/// names against the filing directory.
pub fn resolve_link(filing_dir: &str, link: &str) -> String {
    Url::parse(&format!("{}/", filing_dir))
        .and_then(|base| base.join(link))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("{}/{}", filing_dir, link.trim_start_matches('/')))
}

/// Primary document when it looks like the table, else `infotable.xml`
pub fn fallback_document_url(filing_dir: &str, primary_document: &str) -> String {
    let lower = primary_document.to_lowercase();
    if lower.ends_with(".xml") && lower.contains("table") {
        format!("{}/{}", filing_dir, primary_document)
    } else {
        format!("{}/infotable.xml", filing_dir)
    }
}
