//! Typed stage outputs
//!
//! Every stage's generation result is parsed into one of these shapes before
//! it is stored. Parsing drops unknown fields, so the stored body is the
//! canonical JSON of the typed value and re-running a stage replaces it
//! wholesale.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::pipeline::Stage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeadings {
    pub headings: Vec<ReportHeading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeading {
    pub title: String,
    pub sub_headings: Vec<SubHeading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubHeading {
    pub title: String,
    pub overview: String,
}

impl ReportHeadings {
    /// All (heading, sub-heading) index pairs in report order
    pub fn area_slots(&self) -> Vec<(usize, usize)> {
        self.headings
            .iter()
            .enumerate()
            .flat_map(|(h, heading)| (0..heading.sub_headings.len()).map(move |s| (h, s)))
            .collect()
    }

    pub fn sub_heading(&self, heading: usize, sub_heading: usize) -> Option<(&ReportHeading, &SubHeading)> {
        let parent = self.headings.get(heading)?;
        parent.sub_headings.get(sub_heading).map(|sub| (parent, sub))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Introduction {
    pub about_sector: String,
    pub about_consumption: String,
    pub past_growth: String,
    pub future_growth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffUpdates {
    pub country_specific_tariffs: Vec<CountryTariff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryTariff {
    pub country_name: String,
    pub tariff_details: String,
    /// Trade volume in USD before the change, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_trade_amount: Option<f64>,
    pub new_changes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryAreaEvaluation {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub tailwinds: Vec<String>,
    #[serde(default)]
    pub headwinds: Vec<String>,
    #[serde(default)]
    pub established_players: Vec<CompanyNote>,
    #[serde(default)]
    pub new_challengers: Vec<CompanyNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyNote {
    pub name: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalConclusion {
    pub title: String,
    pub conclusion: String,
    #[serde(default)]
    pub positive_impacts: Vec<String>,
    #[serde(default)]
    pub negative_impacts: Vec<String>,
    pub final_statements: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCover {
    pub title: String,
    pub cover_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaList {
    pub criteria: Vec<Criterion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub key: String,
    pub name: String,
    pub short_description: String,
}

impl CriteriaList {
    pub fn find(&self, key: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionEvaluation {
    /// Overwritten with the requested key before storage
    #[serde(default)]
    pub criterion_key: String,
    pub summary: String,
    pub performance_checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub important_metrics: Vec<ImportantMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub checklist_item: String,
    pub one_line_explanation: String,
    /// 1 = passes, 0 = fails
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportantMetric {
    pub metric_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    pub explanation: String,
}

impl CriterionEvaluation {
    pub fn passed(&self) -> usize {
        self.performance_checklist.iter().filter(|i| i.score == 1).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSummary {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Models report metric values as either `"12%"` or `12.0`
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Output of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionBody {
    Headings(ReportHeadings),
    Introduction(Introduction),
    TariffUpdates(TariffUpdates),
    IndustryArea(IndustryAreaEvaluation),
    ExecutiveSummary(ExecutiveSummary),
    FinalConclusion(FinalConclusion),
    ReportCover(ReportCover),
    Criteria(CriteriaList),
    CriterionEvaluation(CriterionEvaluation),
    FinalSummary(FinalSummary),
}

impl SectionBody {
    /// Parse and validate `value` as the output of `stage`
    ///
    /// The error string describes the first shape violation.
    pub fn parse(stage: Stage, value: Value) -> Result<Self, String> {
        fn typed<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, String> {
            serde_json::from_value(value).map_err(|e| e.to_string())
        }

        let body = match stage {
            Stage::Headings => SectionBody::Headings(typed(value)?),
            Stage::Introduction => SectionBody::Introduction(typed(value)?),
            Stage::TariffUpdates => SectionBody::TariffUpdates(typed(value)?),
            Stage::EvaluateIndustryAreas => SectionBody::IndustryArea(typed(value)?),
            Stage::ExecutiveSummary => SectionBody::ExecutiveSummary(typed(value)?),
            Stage::FinalConclusion => SectionBody::FinalConclusion(typed(value)?),
            Stage::ReportCover => SectionBody::ReportCover(typed(value)?),
            Stage::Criteria => SectionBody::Criteria(typed(value)?),
            Stage::EvaluateCriterion => SectionBody::CriterionEvaluation(typed(value)?),
            Stage::FinalSummary => SectionBody::FinalSummary(typed(value)?),
        };
        body.validate()?;
        Ok(body)
    }

    pub fn stage(&self) -> Stage {
        match self {
            SectionBody::Headings(_) => Stage::Headings,
            SectionBody::Introduction(_) => Stage::Introduction,
            SectionBody::TariffUpdates(_) => Stage::TariffUpdates,
            SectionBody::IndustryArea(_) => Stage::EvaluateIndustryAreas,
            SectionBody::ExecutiveSummary(_) => Stage::ExecutiveSummary,
            SectionBody::FinalConclusion(_) => Stage::FinalConclusion,
            SectionBody::ReportCover(_) => Stage::ReportCover,
            SectionBody::Criteria(_) => Stage::Criteria,
            SectionBody::CriterionEvaluation(_) => Stage::EvaluateCriterion,
            SectionBody::FinalSummary(_) => Stage::FinalSummary,
        }
    }

    /// Canonical JSON form
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            SectionBody::Headings(h) => {
                non_empty("headings", h.headings.len())?;
                for (i, heading) in h.headings.iter().enumerate() {
                    not_blank(&format!("headings[{}].title", i), &heading.title)?;
                    non_empty(&format!("headings[{}].subHeadings", i), heading.sub_headings.len())?;
                    for (j, sub) in heading.sub_headings.iter().enumerate() {
                        not_blank(&format!("headings[{}].subHeadings[{}].title", i, j), &sub.title)?;
                        not_blank(&format!("headings[{}].subHeadings[{}].overview", i, j), &sub.overview)?;
                    }
                }
                Ok(())
            }
            SectionBody::Introduction(i) => {
                not_blank("aboutSector", &i.about_sector)?;
                not_blank("aboutConsumption", &i.about_consumption)?;
                not_blank("pastGrowth", &i.past_growth)?;
                not_blank("futureGrowth", &i.future_growth)
            }
            SectionBody::TariffUpdates(t) => {
                non_empty("countrySpecificTariffs", t.country_specific_tariffs.len())?;
                for (i, country) in t.country_specific_tariffs.iter().enumerate() {
                    not_blank(&format!("countrySpecificTariffs[{}].countryName", i), &country.country_name)?;
                    not_blank(&format!("countrySpecificTariffs[{}].tariffDetails", i), &country.tariff_details)?;
                    not_blank(&format!("countrySpecificTariffs[{}].newChanges", i), &country.new_changes)?;
                }
                Ok(())
            }
            SectionBody::IndustryArea(a) => {
                not_blank("title", &a.title)?;
                not_blank("summary", &a.summary)?;
                for (field, notes) in [
                    ("establishedPlayers", &a.established_players),
                    ("newChallengers", &a.new_challengers),
                ] {
                    for (i, note) in notes.iter().enumerate() {
                        not_blank(&format!("{}[{}].name", field, i), &note.name)?;
                        not_blank(&format!("{}[{}].summary", field, i), &note.summary)?;
                    }
                }
                Ok(())
            }
            SectionBody::ExecutiveSummary(s) => {
                not_blank("title", &s.title)?;
                not_blank("summary", &s.summary)
            }
            SectionBody::FinalConclusion(c) => {
                not_blank("title", &c.title)?;
                not_blank("conclusion", &c.conclusion)?;
                not_blank("finalStatements", &c.final_statements)
            }
            SectionBody::ReportCover(c) => {
                not_blank("title", &c.title)?;
                not_blank("coverText", &c.cover_text)
            }
            SectionBody::Criteria(list) => {
                non_empty("criteria", list.criteria.len())?;
                let mut seen = std::collections::HashSet::new();
                for (i, criterion) in list.criteria.iter().enumerate() {
                    crate::pipeline::SectionSlot::criterion(&criterion.key)
                        .map_err(|_| format!("criteria[{}].key {:?} is not a valid key", i, criterion.key))?;
                    if !seen.insert(criterion.key.as_str()) {
                        return Err(format!("criteria[{}].key {:?} is duplicated", i, criterion.key));
                    }
                    not_blank(&format!("criteria[{}].name", i), &criterion.name)?;
                    not_blank(&format!("criteria[{}].shortDescription", i), &criterion.short_description)?;
                }
                Ok(())
            }
            SectionBody::CriterionEvaluation(e) => {
                not_blank("summary", &e.summary)?;
                for (i, item) in e.performance_checklist.iter().enumerate() {
                    not_blank(&format!("performanceChecklist[{}].checklistItem", i), &item.checklist_item)?;
                    not_blank(
                        &format!("performanceChecklist[{}].oneLineExplanation", i),
                        &item.one_line_explanation,
                    )?;
                    if item.score > 1 {
                        return Err(format!("performanceChecklist[{}].score must be 0 or 1", i));
                    }
                }
                for (i, metric) in e.important_metrics.iter().enumerate() {
                    not_blank(&format!("importantMetrics[{}].metricName", i), &metric.metric_name)?;
                    not_blank(&format!("importantMetrics[{}].explanation", i), &metric.explanation)?;
                }
                Ok(())
            }
            SectionBody::FinalSummary(s) => not_blank("summary", &s.summary),
        }
    }

    pub fn as_headings(&self) -> Option<&ReportHeadings> {
        match self {
            SectionBody::Headings(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_criteria(&self) -> Option<&CriteriaList> {
        match self {
            SectionBody::Criteria(c) => Some(c),
            _ => None,
        }
    }
}

fn not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be blank", field))
    } else {
        Ok(())
    }
}

fn non_empty(field: &str, len: usize) -> Result<(), String> {
    if len == 0 {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headings_parse_drops_unknown_fields() {
        let body = SectionBody::parse(
            Stage::Headings,
            json!({
                "headings": [{
                    "title": "Steel production",
                    "subHeadings": [{"title": "Mills", "overview": "Integrated mills", "extra": 1}]
                }],
                "commentary": "ignored"
            }),
        )
        .unwrap();

        let value = body.to_value().unwrap();
        assert!(value.get("commentary").is_none());
        assert!(value["headings"][0]["subHeadings"][0].get("extra").is_none());
        assert_eq!(body.as_headings().unwrap().area_slots(), vec![(0, 0)]);
    }

    #[test]
    fn test_empty_headings_rejected() {
        let err = SectionBody::parse(Stage::Headings, json!({"headings": []})).unwrap_err();
        assert!(err.contains("headings must not be empty"), "{}", err);

        let err = SectionBody::parse(
            Stage::Headings,
            json!({"headings": [{"title": "A", "subHeadings": []}]}),
        )
        .unwrap_err();
        assert!(err.contains("subHeadings"), "{}", err);
    }

    #[test]
    fn test_blank_required_strings_rejected() {
        let cases = [
            (
                Stage::Headings,
                json!({"headings": [{"title": "A", "subHeadings": [{"title": "B", "overview": "   "}]}]}),
                "headings[0].subHeadings[0].overview",
            ),
            (
                Stage::TariffUpdates,
                json!({"countrySpecificTariffs": [
                    {"countryName": "Canada", "tariffDetails": "", "newChanges": "25% on steel"}
                ]}),
                "countrySpecificTariffs[0].tariffDetails",
            ),
            (
                Stage::TariffUpdates,
                json!({"countrySpecificTariffs": [
                    {"countryName": "Canada", "tariffDetails": "25%", "newChanges": " "}
                ]}),
                "countrySpecificTariffs[0].newChanges",
            ),
            (
                Stage::EvaluateIndustryAreas,
                json!({
                    "title": "Mills",
                    "summary": "ok",
                    "establishedPlayers": [{"name": "Nucor", "summary": ""}]
                }),
                "establishedPlayers[0].summary",
            ),
            (
                Stage::EvaluateIndustryAreas,
                json!({
                    "title": "Mills",
                    "summary": "ok",
                    "newChallengers": [{"name": " ", "summary": "EAF startup"}]
                }),
                "newChallengers[0].name",
            ),
            (
                Stage::FinalConclusion,
                json!({"title": "T", "conclusion": "C", "finalStatements": ""}),
                "finalStatements",
            ),
            (
                Stage::Criteria,
                json!({"criteria": [{"key": "moat", "name": "Moat", "shortDescription": "\t"}]}),
                "criteria[0].shortDescription",
            ),
            (
                Stage::EvaluateCriterion,
                json!({
                    "summary": "ok",
                    "performanceChecklist": [{"checklistItem": "", "oneLineExplanation": "y", "score": 1}]
                }),
                "performanceChecklist[0].checklistItem",
            ),
            (
                Stage::EvaluateCriterion,
                json!({
                    "summary": "ok",
                    "performanceChecklist": [{"checklistItem": "x", "oneLineExplanation": "", "score": 1}]
                }),
                "performanceChecklist[0].oneLineExplanation",
            ),
            (
                Stage::EvaluateCriterion,
                json!({
                    "summary": "ok",
                    "performanceChecklist": [],
                    "importantMetrics": [{"metricName": " ", "value": "12%", "explanation": "e"}]
                }),
                "importantMetrics[0].metricName",
            ),
            (
                Stage::EvaluateCriterion,
                json!({
                    "summary": "ok",
                    "performanceChecklist": [],
                    "importantMetrics": [{"metricName": "ROE", "value": "12%", "explanation": ""}]
                }),
                "importantMetrics[0].explanation",
            ),
        ];

        for (stage, value, field) in cases {
            let err = SectionBody::parse(stage, value).unwrap_err();
            assert_eq!(err, format!("{} must not be blank", field));
        }
    }

    #[test]
    fn test_wrong_shape_reports_serde_error() {
        let err = SectionBody::parse(Stage::ReportCover, json!({"title": "Cover"})).unwrap_err();
        assert!(err.contains("coverText"), "{}", err);
    }

    #[test]
    fn test_duplicate_criterion_keys_rejected() {
        let err = SectionBody::parse(
            Stage::Criteria,
            json!({"criteria": [
                {"key": "margins", "name": "Margins", "shortDescription": "a"},
                {"key": "margins", "name": "Margins again", "shortDescription": "b"}
            ]}),
        )
        .unwrap_err();
        assert!(err.contains("duplicated"), "{}", err);
    }

    #[test]
    fn test_checklist_score_must_be_binary() {
        let err = SectionBody::parse(
            Stage::EvaluateCriterion,
            json!({
                "summary": "ok",
                "performanceChecklist": [{"checklistItem": "x", "oneLineExplanation": "y", "score": 3}]
            }),
        )
        .unwrap_err();
        assert!(err.contains("score"), "{}", err);
    }

    #[test]
    fn test_metric_value_accepts_numbers() {
        let body = SectionBody::parse(
            Stage::EvaluateCriterion,
            json!({
                "summary": "ok",
                "performanceChecklist": [],
                "importantMetrics": [{"metricName": "ROE", "value": 12.5, "explanation": "high"}]
            }),
        )
        .unwrap();
        match body {
            SectionBody::CriterionEvaluation(e) => assert_eq!(e.important_metrics[0].value, "12.5"),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_untagged_serialization_is_inner_shape() {
        let body = SectionBody::ReportCover(ReportCover {
            title: "Steel".to_string(),
            cover_text: "Cover".to_string(),
        });
        assert_eq!(
            body.to_value().unwrap(),
            json!({"title": "Steel", "coverText": "Cover"})
        );
        assert_eq!(body.stage(), Stage::ReportCover);
    }
}
