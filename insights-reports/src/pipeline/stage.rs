//! Report kinds, stages, slots and stage requests
//!
//! Stages run in a fixed order per report kind. Each stage declares the
//! upstream stages it reads; indexed stages (`evaluate-industry-areas`,
//! `evaluate-criterion`) own one section per slot.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::pipeline::PipelineError;

const MAX_REPORT_ID_LEN: usize = 64;

/// Report family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// Keyed by industry identifier
    #[serde(rename = "industry-tariff-reports")]
    IndustryTariff,
    /// Keyed by ticker
    #[serde(rename = "public-equity")]
    PublicEquity,
}

impl ReportKind {
    pub const ALL: [ReportKind; 2] = [ReportKind::IndustryTariff, ReportKind::PublicEquity];

    /// URL segment and storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::IndustryTariff => "industry-tariff-reports",
            ReportKind::PublicEquity => "public-equity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Stages in execution order
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            ReportKind::IndustryTariff => &[
                Stage::Headings,
                Stage::Introduction,
                Stage::TariffUpdates,
                Stage::EvaluateIndustryAreas,
                Stage::ExecutiveSummary,
                Stage::FinalConclusion,
                Stage::ReportCover,
            ],
            ReportKind::PublicEquity => &[
                Stage::Criteria,
                Stage::EvaluateCriterion,
                Stage::FinalSummary,
            ],
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one report: an industry or a ticker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReportRef {
    pub kind: ReportKind,
    #[serde(rename = "reportId")]
    pub id: String,
}

impl ReportRef {
    /// Validate the identifier; it doubles as a directory name in the file store
    pub fn new(kind: ReportKind, id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !is_valid_identifier(&id, MAX_REPORT_ID_LEN) || id.starts_with('.') {
            return Err(PipelineError::InvalidRequest(format!(
                "Invalid report identifier: {:?}",
                id
            )));
        }
        Ok(Self { kind, id })
    }
}

impl fmt::Display for ReportRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

fn is_valid_identifier(s: &str, max_len: usize) -> bool {
    !s.is_empty()
        && s.len() <= max_len
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// How a stage addresses its sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// One section per report
    Whole,
    /// One section per (heading, sub-heading)
    Area,
    /// One section per criterion key
    Criterion,
}

/// One named step of report generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Headings,
    Introduction,
    TariffUpdates,
    EvaluateIndustryAreas,
    ExecutiveSummary,
    FinalConclusion,
    ReportCover,
    Criteria,
    EvaluateCriterion,
    FinalSummary,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Headings => "headings",
            Stage::Introduction => "introduction",
            Stage::TariffUpdates => "tariff-updates",
            Stage::EvaluateIndustryAreas => "evaluate-industry-areas",
            Stage::ExecutiveSummary => "executive-summary",
            Stage::FinalConclusion => "final-conclusion",
            Stage::ReportCover => "report-cover",
            Stage::Criteria => "criteria",
            Stage::EvaluateCriterion => "evaluate-criterion",
            Stage::FinalSummary => "final-summary",
        }
    }

    pub fn kind(&self) -> ReportKind {
        match self {
            Stage::Criteria | Stage::EvaluateCriterion | Stage::FinalSummary => {
                ReportKind::PublicEquity
            }
            _ => ReportKind::IndustryTariff,
        }
    }

    /// Parse a stage of `kind` from its URL segment
    ///
    /// Accepts both `report-cover` and `generate-report-cover`.
    pub fn parse(kind: ReportKind, segment: &str) -> Option<Self> {
        let name = segment.strip_prefix("generate-").unwrap_or(segment);
        kind.stages().iter().copied().find(|s| s.as_str() == name)
    }

    /// Position within the kind's execution order
    pub fn position(&self) -> usize {
        self.kind()
            .stages()
            .iter()
            .position(|s| s == self)
            .unwrap_or(usize::MAX)
    }

    /// Next stage in the fixed order, if any
    pub fn next_in_order(&self) -> Option<Stage> {
        self.kind().stages().get(self.position() + 1).copied()
    }

    /// Upstream stages this stage reads, in check order
    pub fn dependencies(&self) -> &'static [Stage] {
        match self {
            Stage::Headings | Stage::Criteria => &[],
            Stage::Introduction | Stage::TariffUpdates => &[Stage::Headings],
            Stage::EvaluateIndustryAreas | Stage::ReportCover => {
                &[Stage::Headings, Stage::TariffUpdates]
            }
            Stage::ExecutiveSummary | Stage::FinalConclusion => &[
                Stage::Headings,
                Stage::TariffUpdates,
                Stage::EvaluateIndustryAreas,
            ],
            Stage::EvaluateCriterion => &[Stage::Criteria],
            Stage::FinalSummary => &[Stage::Criteria, Stage::EvaluateCriterion],
        }
    }

    /// Human label used in "<label> not found" messages
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Headings => "Headings",
            Stage::Introduction => "Introduction",
            Stage::TariffUpdates => "Tariff updates",
            Stage::EvaluateIndustryAreas => "Evaluated industry areas",
            Stage::ExecutiveSummary => "Executive summary",
            Stage::FinalConclusion => "Final conclusion",
            Stage::ReportCover => "Report cover",
            Stage::Criteria => "Criteria",
            Stage::EvaluateCriterion => "Criterion evaluations",
            Stage::FinalSummary => "Final summary",
        }
    }

    /// Prompt catalog key
    pub fn prompt_key(&self) -> &'static str {
        match self {
            Stage::Headings => "industry-tariff.headings",
            Stage::Introduction => "industry-tariff.introduction",
            Stage::TariffUpdates => "industry-tariff.tariff-updates",
            Stage::EvaluateIndustryAreas => "industry-tariff.evaluate-industry-areas",
            Stage::ExecutiveSummary => "industry-tariff.executive-summary",
            Stage::FinalConclusion => "industry-tariff.final-conclusion",
            Stage::ReportCover => "industry-tariff.report-cover",
            Stage::Criteria => "public-equity.criteria",
            Stage::EvaluateCriterion => "public-equity.evaluate-criterion",
            Stage::FinalSummary => "public-equity.final-summary",
        }
    }

    pub fn slot_kind(&self) -> SlotKind {
        match self {
            Stage::EvaluateIndustryAreas => SlotKind::Area,
            Stage::EvaluateCriterion => SlotKind::Criterion,
            _ => SlotKind::Whole,
        }
    }

    pub fn all() -> impl Iterator<Item = Stage> {
        ReportKind::ALL
            .into_iter()
            .flat_map(|k| k.stages().iter().copied())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one section within a stage
///
/// Ordering follows report order: areas by heading then sub-heading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionSlot {
    Whole,
    Area { heading: usize, sub_heading: usize },
    Criterion(String),
}

impl SectionSlot {
    /// Storage form: `""`, `"<heading>.<sub_heading>"` or the criterion key
    pub fn encode(&self) -> String {
        match self {
            SectionSlot::Whole => String::new(),
            SectionSlot::Area {
                heading,
                sub_heading,
            } => format!("{}.{}", heading, sub_heading),
            SectionSlot::Criterion(key) => key.clone(),
        }
    }

    pub fn decode(kind: SlotKind, s: &str) -> Result<Self, PipelineError> {
        let invalid = || PipelineError::InvalidRequest(format!("Invalid section slot: {:?}", s));
        match kind {
            SlotKind::Whole if s.is_empty() => Ok(SectionSlot::Whole),
            SlotKind::Whole => Err(invalid()),
            SlotKind::Area => {
                let (h, sub) = s.split_once('.').ok_or_else(invalid)?;
                Ok(SectionSlot::Area {
                    heading: h.parse().map_err(|_| invalid())?,
                    sub_heading: sub.parse().map_err(|_| invalid())?,
                })
            }
            SlotKind::Criterion => Self::criterion(s),
        }
    }

    /// Criterion slot; keys become file names so the charset is restricted
    pub fn criterion(key: &str) -> Result<Self, PipelineError> {
        if !is_valid_identifier(key, MAX_REPORT_ID_LEN) || key.contains('.') {
            return Err(PipelineError::InvalidRequest(format!(
                "Invalid criterion key: {:?}",
                key
            )));
        }
        Ok(SectionSlot::Criterion(key.to_string()))
    }
}

impl fmt::Display for SectionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for SectionSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

/// Stage plus slot: the unit of storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey {
    pub stage: Stage,
    pub slot: SectionSlot,
}

impl SectionKey {
    pub fn whole(stage: Stage) -> Self {
        Self {
            stage,
            slot: SectionSlot::Whole,
        }
    }

    /// Report order: stage position, then slot
    pub fn sort_key(&self) -> (usize, &SectionSlot) {
        (self.stage.position(), &self.slot)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            SectionSlot::Whole => write!(f, "{}", self.stage),
            _ => write!(f, "{}[{}]", self.stage, self.slot),
        }
    }
}

/// Body of a stage POST
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_heading_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion_key: Option<String>,
    /// Chain the next stage through the relay webhook after success
    #[serde(default)]
    pub trigger_next: bool,
}

impl StageRequest {
    /// Slot addressed by this request for `stage`
    pub fn slot_for(&self, stage: Stage) -> Result<SectionSlot, PipelineError> {
        match stage.slot_kind() {
            SlotKind::Whole => Ok(SectionSlot::Whole),
            SlotKind::Area => match (self.heading_index, self.sub_heading_index) {
                (Some(heading), Some(sub_heading)) => Ok(SectionSlot::Area {
                    heading,
                    sub_heading,
                }),
                _ => Err(PipelineError::InvalidRequest(format!(
                    "{} requires headingIndex and subHeadingIndex",
                    stage
                ))),
            },
            SlotKind::Criterion => match &self.criterion_key {
                Some(key) => SectionSlot::criterion(key),
                None => Err(PipelineError::InvalidRequest(format!(
                    "{} requires criterionKey",
                    stage
                ))),
            },
        }
    }

    /// Request that addresses `slot`
    pub fn for_slot(slot: &SectionSlot, trigger_next: bool) -> Self {
        let mut request = StageRequest {
            trigger_next,
            ..Default::default()
        };
        match slot {
            SectionSlot::Whole => {}
            SectionSlot::Area {
                heading,
                sub_heading,
            } => {
                request.heading_index = Some(*heading);
                request.sub_heading_index = Some(*sub_heading);
            }
            SectionSlot::Criterion(key) => request.criterion_key = Some(key.clone()),
        }
        request
    }
}
