//! Result normalization
//!
//! Maps each agent's native records into the canonical [`Document`] shape.
//! Missing optional fields become explicit sentinels so downstream code never
//! branches on absence. Scores are converted to the unit scale and clamped;
//! anything outside [0, 1] is logged as a defect rather than rejected.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use audit_core::{AgentName, Document, UNKNOWN, UNKNOWN_TITLE};

use crate::{AgentResult, RawDocument, ScoreScale};

/// Maximum characters kept in a content excerpt
pub const MAX_EXCERPT_CHARS: usize = 500;

/// Metadata keys every document carries
pub const REQUIRED_METADATA: &[&str] = &["company", "date", "category"];

/// A recoverable data-quality problem found while normalizing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationDefect {
    #[error("{agent}/{document_id}: score {score} outside [0, 1], clamped")]
    ScoreOutOfRange {
        agent: AgentName,
        document_id: String,
        score: f64,
    },

    #[error("{agent}/{document_id}: score is not a number, set to 0")]
    ScoreNotANumber { agent: AgentName, document_id: String },

    #[error("{agent}/{document_id}: missing {field}, defaulted")]
    MissingField {
        agent: AgentName,
        document_id: String,
        field: &'static str,
    },
}

/// Defects found while normalizing one agent result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub defects: Vec<NormalizationDefect>,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

static MATERIAL_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Material Code:\s*([A-Z0-9]+)").unwrap());

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Clamp to [0, 1], mapping NaN to 0
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Normalize one agent result; failures yield no documents
pub fn normalize(agent: AgentName, result: &AgentResult) -> Vec<Document> {
    normalize_with_report(agent, result).0
}

/// Normalize one agent result and report the defects that were repaired
pub fn normalize_with_report(
    agent: AgentName,
    result: &AgentResult,
) -> (Vec<Document>, NormalizationReport) {
    let mut report = NormalizationReport::default();

    let (documents, scale) = match result {
        AgentResult::Success { documents, scale, .. } => (documents, *scale),
        AgentResult::Failure { .. } => return (Vec::new(), report),
    };

    let normalized: Vec<Document> = documents
        .iter()
        .map(|raw| normalize_document(agent, scale, raw, &mut report))
        .collect();

    for defect in &report.defects {
        warn!("Normalization defect: {}", defect);
    }
    debug!(
        "Normalized {} documents from {} ({} defects)",
        normalized.len(),
        agent,
        report.defects.len()
    );

    (normalized, report)
}

fn normalize_document(
    agent: AgentName,
    scale: ScoreScale,
    raw: &RawDocument,
    report: &mut NormalizationReport,
) -> Document {
    let (page_title, page_text) = match &raw.html {
        Some(html) => extract_content(html),
        None => (None, String::new()),
    };

    let body = raw
        .content
        .as_deref()
        .map(normalize_whitespace)
        .filter(|c| !c.is_empty())
        .unwrap_or(page_text);

    let path = non_empty(raw.file_path.as_deref());
    let file_name = non_empty(raw.file_name.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| extract_file_name(path));
    let file_extension = non_empty(raw.file_extension.as_deref())
        .map(normalize_extension)
        .unwrap_or_else(|| extract_file_extension(path.unwrap_or(&file_name)));

    let title = non_empty(raw.title.as_deref())
        .map(str::to_string)
        .or(page_title);

    let document_id = match non_empty(raw.id.as_deref()) {
        Some(id) => id.to_string(),
        None => {
            let id = fallback_document_id(path.unwrap_or(""), title.as_deref().unwrap_or(""), &body);
            report.defects.push(NormalizationDefect::MissingField {
                agent,
                document_id: id.clone(),
                field: "document_id",
            });
            id
        }
    };

    let title = title.unwrap_or_else(|| {
        report.defects.push(NormalizationDefect::MissingField {
            agent,
            document_id: document_id.clone(),
            field: "title",
        });
        UNKNOWN_TITLE.to_string()
    });

    let relevance_score = match raw.score {
        None => {
            report.defects.push(NormalizationDefect::MissingField {
                agent,
                document_id: document_id.clone(),
                field: "score",
            });
            0.0
        }
        Some(s) if s.is_nan() => {
            report.defects.push(NormalizationDefect::ScoreNotANumber {
                agent,
                document_id: document_id.clone(),
            });
            0.0
        }
        Some(s) => {
            let unit = scale.to_unit(s);
            if !(0.0..=1.0).contains(&unit) {
                report.defects.push(NormalizationDefect::ScoreOutOfRange {
                    agent,
                    document_id: document_id.clone(),
                    score: s,
                });
            }
            clamp_unit(unit)
        }
    };

    let mut metadata = flatten_metadata(&raw.metadata);
    for key in REQUIRED_METADATA {
        metadata
            .entry(key.to_string())
            .or_insert_with(|| UNKNOWN.to_string());
    }
    if let Some(path) = path {
        metadata.insert("file_path".to_string(), path.to_string());
    }
    if agent == AgentName::QualitySystems {
        if let Some(code) = extract_material_code(&body) {
            metadata.insert("material_code".to_string(), code);
        }
    }

    Document {
        document_id,
        title,
        agent,
        file_name,
        file_extension,
        relevance_score,
        content: excerpt(&body, MAX_EXCERPT_CHARS),
        metadata,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// File name component of a path, or the sentinel
pub fn extract_file_name(path: Option<&str>) -> String {
    path.and_then(|p| Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Lower-cased extension with leading dot, or the sentinel
pub fn extract_file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim_start_matches('.').to_lowercase();
    format!(".{}", ext)
}

/// Deterministic identifier for records that arrive without one
pub fn fallback_document_id(path: &str, title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("DOC_{}", hex)
}

fn flatten_metadata(map: &serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            if text.is_empty() {
                None
            } else {
                Some((key.clone(), text))
            }
        })
        .collect()
}

/// Extract a `Material Code: XXXX` reference from quality-system text
pub fn extract_material_code(text: &str) -> Option<String> {
    MATERIAL_CODE_REGEX
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Truncate on a char boundary, appending an ellipsis when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Page title and visible body text with whitespace collapsed. The walk
/// skips script and style subtrees and stops once the text runs past the
/// excerpt length, so long pages are never flattened in full.
fn extract_content(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut text = PageText::default();
    if let Some(body) = document.select(&BODY_SELECTOR).next() {
        text.collect(body, MAX_EXCERPT_CHARS);
    }

    (title, text.content)
}

/// Visible text gathered from a page, one space between words
#[derive(Default)]
struct PageText {
    content: String,
    chars: usize,
}

impl PageText {
    fn full(&self, limit: usize) -> bool {
        self.chars > limit
    }

    fn collect(&mut self, element: ElementRef<'_>, limit: usize) {
        for child in element.children() {
            if self.full(limit) {
                return;
            }
            if let Some(child_element) = ElementRef::wrap(child) {
                if !matches!(child_element.value().name(), "script" | "style" | "noscript") {
                    self.collect(child_element, limit);
                }
            } else if let Node::Text(text) = child.value() {
                for word in text.split_whitespace() {
                    if self.full(limit) {
                        return;
                    }
                    if !self.content.is_empty() {
                        self.content.push(' ');
                        self.chars += 1;
                    }
                    self.content.push_str(word);
                    self.chars += word.chars().count();
                }
            }
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
