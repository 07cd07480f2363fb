//! Novel metadata produced by the external page scraper.
//!
//! The scraper itself lives outside this crate; the store only needs the
//! record shape it emits and the envelope it returns as a tool result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page URLs the scraper accepts contain this fragment.
pub const SUPPORTED_URL_FRAGMENT: &str = "fanqienovel.com/page/";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Unsupported novel URL (expected a {SUPPORTED_URL_FRAGMENT} link): {0}")]
    UnsupportedUrl(String),

    #[error("Scraper error: {error} {}", .message.as_deref().unwrap_or(""))]
    Upstream {
        error: String,
        message: Option<String>,
    },

    #[error("Malformed novel record: {0}")]
    Malformed(String),

    #[error("Invalid scraper output: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn is_supported_url(url: &str) -> bool {
    url.contains(SUPPORTED_URL_FRAGMENT)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastUpdate {
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TocEntry {
    #[serde(default)]
    pub index: usize,
    pub title: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub url: String,
}

/// Structured metadata for one novel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NovelRecord {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub word_count: String,
    #[serde(default)]
    pub last_update: LastUpdate,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub toc: Vec<TocEntry>,
    #[serde(default)]
    pub original_url: String,
}

impl NovelRecord {
    /// Title and summary are the fields every usable page yields.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.title.trim().is_empty() || self.summary.trim().is_empty() {
            return Err(ScrapeError::Malformed(
                "title or summary missing; the page layout may have changed".into(),
            ));
        }
        Ok(())
    }

    /// Pretty JSON, kept verbatim as a NOVEL node's content.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// What the scraper returns: a record or an error record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScrapeResult {
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Record(NovelRecord),
}

impl ScrapeResult {
    pub fn into_record(self) -> Result<NovelRecord, ScrapeError> {
        match self {
            Self::Failed { error, message } => Err(ScrapeError::Upstream { error, message }),
            Self::Record(record) => {
                record.validate()?;
                Ok(record)
            }
        }
    }
}

#[derive(Deserialize)]
struct ToolEnvelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Extract a record from scraper output: either a bare `ScrapeResult` or the
/// tool-call envelope `{"status": "success"|"error", "data": ...}`.
pub fn parse_scraper_output(json: &str) -> Result<NovelRecord, ScrapeError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("status").is_some() && value.get("title").is_none() {
        let envelope: ToolEnvelope = serde_json::from_value(value)?;
        if envelope.status != "success" {
            let message = envelope
                .data
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from);
            return Err(ScrapeError::Upstream {
                error: envelope.status,
                message,
            });
        }
        let result: ScrapeResult = serde_json::from_value(envelope.data)?;
        return result.into_record();
    }
    let result: ScrapeResult = serde_json::from_value(value)?;
    result.into_record()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "title": "剑来",
            "author": "烽火戏诸侯",
            "status": ["连载中", "玄幻"],
            "word_count": "120万字",
            "last_update": {"chapter": "第一千章", "time": "2024-05-01"},
            "summary": "大千世界，无奇不有。",
            "tags": ["仙侠"],
            "toc": [{"index": 1, "title": "第一章", "locked": false, "url": "https://fanqienovel.com/reader/1"}],
            "original_url": "https://fanqienovel.com/page/123"
        })
    }

    #[test]
    fn test_supported_url() {
        assert!(is_supported_url("https://fanqienovel.com/page/7143038691944959011"));
        assert!(!is_supported_url("https://example.com/page/1"));
    }

    #[test]
    fn test_parse_bare_record() {
        let record = parse_scraper_output(&sample().to_string()).unwrap();
        assert_eq!(record.title, "剑来");
        assert_eq!(record.toc.len(), 1);
        assert!(record.render().contains("烽火戏诸侯"));
    }

    #[test]
    fn test_parse_error_record() {
        let out = json!({"error": "invalid link", "message": "not a detail page"}).to_string();
        match parse_scraper_output(&out) {
            Err(ScrapeError::Upstream { error, message }) => {
                assert_eq!(error, "invalid link");
                assert_eq!(message.as_deref(), Some("not a detail page"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tool_envelope() {
        let ok = json!({"status": "success", "data": sample()}).to_string();
        assert_eq!(parse_scraper_output(&ok).unwrap().author, "烽火戏诸侯");

        let failed = json!({"status": "error", "data": {"message": "解析失败"}}).to_string();
        assert!(matches!(
            parse_scraper_output(&failed),
            Err(ScrapeError::Upstream { .. })
        ));
    }

    #[test]
    fn test_record_missing_summary_is_malformed() {
        let out = json!({"title": "无简介"}).to_string();
        assert!(matches!(
            parse_scraper_output(&out),
            Err(ScrapeError::Malformed(_))
        ));
    }
}
