//! Final report assembly.
//!
//! [`assemble`] turns the raw `report` payload delivered by either channel
//! into a validated, read-only [`Report`]. Only the consolidation block, the
//! SWOT arrays and the recommendation list are mandatory; every other
//! sub-section degrades to [`Section::Unavailable`] so that partial reports
//! still render. Unknown tracks and consolidation keys are carried through
//! untouched.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::JobId;

/// Upper bound for every 0-10 score in the report.
pub const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// An optional report sub-section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section<T> {
    Available(T),
    /// The payload omitted the section or it could not be read.
    Unavailable,
}

impl<T> Section<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Section::Available(value) => Some(value),
            Section::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }
}

/// The assembled report of a successful job. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Raw per-track analysis keyed by track name.
    pub tracks: BTreeMap<String, Section<Value>>,
    pub consolidation: Consolidation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consolidation {
    pub executive_summary: Section<String>,
    pub audience_analysis: Section<AudienceAnalysis>,
    pub competitive_landscape: Section<CompetitiveLandscape>,
    pub local_market: Section<LocalMarket>,
    pub swot: Swot,
    /// Recommendations in payload order.
    pub recommendations: Vec<Recommendation>,
    pub overall_score: Section<f64>,
    pub risk_level: Section<RiskLevel>,
    pub investment_readiness: Section<String>,
    /// Consolidation keys this client does not model.
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudienceAnalysis {
    #[serde(default)]
    pub key_segments: Vec<String>,
    #[serde(default)]
    pub priority_segment: Option<String>,
    #[serde(default)]
    pub market_fit_score: Option<f64>,
    #[serde(default)]
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompetitiveLandscape {
    #[serde(default)]
    pub main_competitors: Vec<String>,
    #[serde(default)]
    pub competition_intensity: Option<f64>,
    #[serde(default)]
    pub market_gaps: Vec<String>,
    #[serde(default)]
    pub best_practices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalMarket {
    #[serde(default)]
    pub key_trends: Vec<String>,
    #[serde(default)]
    pub local_competitors: Vec<String>,
    #[serde(default)]
    pub market_attractiveness: Option<f64>,
    #[serde(default)]
    pub regional_specifics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Display order: most urgent first.
    pub const ORDERED: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Product,
    Marketing,
    BusinessModel,
    Risks,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One recommendation.
///
/// Legacy reports deliver bare strings; those carry no priority, category
/// or rationale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub text: String,
    pub rationale: Option<String>,
}

impl Consolidation {
    /// Recommendations grouped by priority, high first, empty groups omitted.
    pub fn recommendations_by_priority(&self) -> Vec<(Priority, Vec<&Recommendation>)> {
        Priority::ORDERED
            .iter()
            .filter_map(|&priority| {
                let group: Vec<&Recommendation> = self
                    .recommendations
                    .iter()
                    .filter(|r| r.priority == Some(priority))
                    .collect();
                (!group.is_empty()).then_some((priority, group))
            })
            .collect()
    }

    /// Recommendations without a priority (legacy schema).
    pub fn unprioritized_recommendations(&self) -> Vec<&Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.priority.is_none())
            .collect()
    }

    /// Investment readiness with underscores shown as spaces.
    pub fn investment_readiness_label(&self) -> Option<String> {
        self.investment_readiness
            .as_option()
            .map(|label| label.replace('_', " "))
    }
}

impl Report {
    /// Names of optional sections that will render as "data unavailable".
    pub fn unavailable_sections(&self) -> Vec<String> {
        let c = &self.consolidation;
        let mut missing: Vec<String> = [
            ("executive_summary", c.executive_summary.is_available()),
            ("audience_analysis", c.audience_analysis.is_available()),
            ("competitive_landscape", c.competitive_landscape.is_available()),
            ("local_market", c.local_market.is_available()),
            ("overall_score", c.overall_score.is_available()),
            ("risk_level", c.risk_level.is_available()),
            ("investment_readiness", c.investment_readiness.is_available()),
        ]
        .into_iter()
        .filter(|(_, available)| !available)
        .map(|(name, _)| name.to_string())
        .collect();

        missing.extend(
            self.tracks
                .iter()
                .filter(|(_, section)| !section.is_available())
                .map(|(name, _)| format!("tracks.{name}")),
        );
        missing
    }
}

// ---------------------------------------------------------------------------
// Download links
// ---------------------------------------------------------------------------

/// Rendered document formats offered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Path (relative to the API base) of a rendered report document.
pub fn download_path(job_id: &JobId, kind: DocumentKind) -> String {
    format!("/report/{job_id}/download/{}", kind.as_str())
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Known consolidation keys; everything else lands in `extra`.
const KNOWN_CONSOLIDATION_KEYS: &[&str] = &[
    "executive_summary",
    "audience_analysis",
    "competitive_landscape",
    "local_market",
    "swot",
    "strategic_recommendations",
    "recommendations",
    "overall_score",
    "risk_level",
    "investment_readiness",
];

/// Validate a raw report payload and build the read-only view.
pub fn assemble(raw: &Value) -> Result<Report, CoreError> {
    let root = raw
        .as_object()
        .ok_or_else(|| CoreError::MalformedReport("report is not an object".into()))?;

    let consolidation = root
        .get("consolidation")
        .and_then(Value::as_object)
        .ok_or_else(|| CoreError::MalformedReport("missing consolidation block".into()))?;

    let tracks = root
        .get("tracks")
        .and_then(Value::as_object)
        .map(|tracks| {
            tracks
                .iter()
                .map(|(name, value)| {
                    let section = if value.is_null() {
                        Section::Unavailable
                    } else {
                        Section::Available(value.clone())
                    };
                    (name.clone(), section)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Report {
        tracks,
        consolidation: assemble_consolidation(consolidation)?,
    })
}

fn assemble_consolidation(c: &Map<String, Value>) -> Result<Consolidation, CoreError> {
    let swot = c
        .get("swot")
        .ok_or_else(|| CoreError::MalformedReport("missing swot".into()))
        .and_then(|v| {
            Swot::deserialize(v)
                .map_err(|e| CoreError::MalformedReport(format!("invalid swot: {e}")))
        })?;

    let recommendations = c
        .get("strategic_recommendations")
        .or_else(|| c.get("recommendations"))
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::MalformedReport("missing recommendation list".into()))?
        .iter()
        .filter_map(parse_recommendation)
        .collect();

    let extra = c
        .iter()
        .filter(|(key, _)| !KNOWN_CONSOLIDATION_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Consolidation {
        executive_summary: section(c, "executive_summary"),
        audience_analysis: section(c, "audience_analysis"),
        competitive_landscape: section(c, "competitive_landscape"),
        local_market: section(c, "local_market"),
        swot,
        recommendations,
        overall_score: score(c, "overall_score"),
        risk_level: section(c, "risk_level"),
        investment_readiness: section(c, "investment_readiness"),
        extra,
    })
}

/// Read an optional sub-section; absent, null or ill-typed means unavailable.
fn section<T: DeserializeOwned>(c: &Map<String, Value>, key: &str) -> Section<T> {
    match c.get(key) {
        None | Some(Value::Null) => Section::Unavailable,
        Some(value) => T::deserialize(value)
            .map(Section::Available)
            .unwrap_or(Section::Unavailable),
    }
}

fn score(c: &Map<String, Value>, key: &str) -> Section<f64> {
    match section::<f64>(c, key) {
        Section::Available(v) if (0.0..=MAX_SCORE).contains(&v) => Section::Available(v),
        _ => Section::Unavailable,
    }
}

/// Structured objects and legacy strings; anything else is dropped.
fn parse_recommendation(item: &Value) -> Option<Recommendation> {
    match item {
        Value::String(text) if !text.trim().is_empty() => Some(Recommendation {
            priority: None,
            category: None,
            text: text.clone(),
            rationale: None,
        }),
        Value::Object(obj) => {
            let text = obj.get("recommendation").and_then(Value::as_str)?;
            Some(Recommendation {
                priority: obj
                    .get("priority")
                    .and_then(|v| Priority::deserialize(v).ok()),
                category: obj
                    .get("category")
                    .and_then(|v| Category::deserialize(v).ok()),
                text: text.to_string(),
                rationale: obj
                    .get("rationale")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn full_payload() -> Value {
        json!({
            "tracks": {
                "audience": {"overall_fit": 8},
                "global_competitors": {"competition_level": 6},
                "local_market": null
            },
            "consolidation": {
                "executive_summary": "Promising niche.",
                "audience_analysis": {
                    "key_segments": ["students", "young professionals"],
                    "priority_segment": "students",
                    "market_fit_score": 8,
                    "key_insights": ["price sensitive"]
                },
                "competitive_landscape": {
                    "main_competitors": ["HelloFresh"],
                    "competition_intensity": 7
                },
                "swot": {
                    "strengths": ["s1"],
                    "weaknesses": ["w1"],
                    "opportunities": ["o1"],
                    "threats": ["t1"]
                },
                "strategic_recommendations": [
                    {"priority": "low", "category": "marketing", "recommendation": "Run ads", "rationale": "reach"},
                    {"priority": "high", "category": "product", "recommendation": "Ship MVP", "rationale": "learn"},
                    {"priority": "high", "category": "pricing", "recommendation": "Tiered plans"}
                ],
                "overall_score": 7.0,
                "risk_level": "medium",
                "investment_readiness": "idea_stage",
                "roadmap": ["q1"]
            }
        })
    }

    #[test]
    fn assembles_full_report() {
        let report = assemble(&full_payload()).unwrap();
        let c = &report.consolidation;

        assert_eq!(c.executive_summary, Section::Available("Promising niche.".into()));
        assert_eq!(c.overall_score, Section::Available(7.0));
        assert_eq!(c.risk_level, Section::Available(RiskLevel::Medium));
        assert_eq!(c.swot.threats, vec!["t1"]);
        assert_eq!(c.recommendations.len(), 3);
        assert_eq!(c.recommendations[2].category, Some(Category::Other));
        assert_eq!(c.investment_readiness_label().as_deref(), Some("idea stage"));
        assert_eq!(c.extra.get("roadmap"), Some(&json!(["q1"])));
        assert_eq!(
            c.audience_analysis.as_option().unwrap().priority_segment.as_deref(),
            Some("students")
        );
    }

    #[test]
    fn missing_optional_sections_are_marked_unavailable() {
        let report = assemble(&full_payload()).unwrap();
        assert_eq!(report.consolidation.local_market, Section::Unavailable);
        assert_eq!(report.tracks["local_market"], Section::Unavailable);
        assert_eq!(
            report.unavailable_sections(),
            vec!["local_market".to_string(), "tracks.local_market".to_string()]
        );
    }

    #[test]
    fn recommendations_group_high_first() {
        let report = assemble(&full_payload()).unwrap();
        let groups = report.consolidation.recommendations_by_priority();
        let order: Vec<Priority> = groups.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, vec![Priority::High, Priority::Low]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[0].text, "Ship MVP");
    }

    #[test]
    fn legacy_string_recommendations_are_accepted() {
        let payload = json!({
            "consolidation": {
                "executive_summary": "ok",
                "swot": {"strengths": [], "weaknesses": [], "opportunities": [], "threats": []},
                "recommendations": ["Talk to customers", "", 42],
                "overall_score": 6
            }
        });
        let report = assemble(&payload).unwrap();
        let c = &report.consolidation;
        assert_eq!(c.recommendations.len(), 1);
        assert_eq!(c.unprioritized_recommendations()[0].text, "Talk to customers");
        assert!(c.recommendations_by_priority().is_empty());
        assert!(report.tracks.is_empty());
    }

    #[test]
    fn out_of_range_score_is_unavailable() {
        let mut payload = full_payload();
        payload["consolidation"]["overall_score"] = json!(14);
        let report = assemble(&payload).unwrap();
        assert_eq!(report.consolidation.overall_score, Section::Unavailable);
    }

    #[test]
    fn ill_typed_optional_section_is_unavailable() {
        let mut payload = full_payload();
        payload["consolidation"]["audience_analysis"] = json!("n/a");
        payload["consolidation"]["risk_level"] = json!("extreme");
        let report = assemble(&payload).unwrap();
        assert_eq!(report.consolidation.audience_analysis, Section::Unavailable);
        assert_eq!(report.consolidation.risk_level, Section::Unavailable);
    }

    #[test]
    fn missing_consolidation_is_rejected() {
        let err = assemble(&json!({"tracks": {}})).unwrap_err();
        assert_matches!(err, CoreError::MalformedReport(msg) if msg.contains("consolidation"));
    }

    #[test]
    fn incomplete_swot_is_rejected() {
        let mut payload = full_payload();
        payload["consolidation"]["swot"] = json!({"strengths": ["s"]});
        assert_matches!(assemble(&payload), Err(CoreError::MalformedReport(_)));
    }

    #[test]
    fn missing_recommendations_are_rejected() {
        let mut payload = full_payload();
        payload["consolidation"]
            .as_object_mut()
            .unwrap()
            .remove("strategic_recommendations");
        assert_matches!(
            assemble(&payload),
            Err(CoreError::MalformedReport(msg)) if msg.contains("recommendation")
        );
    }

    #[test]
    fn non_object_report_is_rejected() {
        assert_matches!(assemble(&json!("done")), Err(CoreError::MalformedReport(_)));
    }

    #[test]
    fn download_path_uses_job_id() {
        let id = JobId::new("17");
        assert_eq!(download_path(&id, DocumentKind::Pdf), "/report/17/download/pdf");
        assert_eq!(download_path(&id, DocumentKind::Docx), "/report/17/download/docx");
    }
}
