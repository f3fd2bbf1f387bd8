//! Dependency loading and input document assembly

use serde_json::{json, Value};

use crate::pipeline::sections::{CriteriaList, ReportHeadings, SectionBody, TariffUpdates};
use crate::pipeline::{
    PipelineError, ReportKind, ReportRef, SectionArtifact, SectionKey, SectionSlot, Stage,
};
use crate::store::ArtifactStore;

/// Upstream artifacts a stage reads
#[derive(Debug, Default)]
pub(crate) struct Upstream {
    headings: Option<ReportHeadings>,
    tariff_updates: Option<TariffUpdates>,
    areas: Vec<SectionArtifact>,
    criteria: Option<CriteriaList>,
    evaluations: Vec<SectionArtifact>,
}

fn missing(stage: Stage) -> PipelineError {
    PipelineError::MissingDependency(format!("{} not found", stage.label()))
}

/// Load every dependency of `stage` in declared order
///
/// Fails on the first absent dependency. Indexed dependencies count as
/// present only when every slot implied by headings or criteria exists, and
/// only those slots are loaded, in headings or criteria order.
pub(crate) async fn load_upstream(
    store: &dyn ArtifactStore,
    report: &ReportRef,
    stage: Stage,
) -> Result<Upstream, PipelineError> {
    let mut upstream = Upstream::default();

    for dependency in stage.dependencies() {
        match dependency {
            Stage::Headings => {
                let artifact = store
                    .load_section(report, &SectionKey::whole(Stage::Headings))
                    .await?
                    .ok_or_else(|| missing(Stage::Headings))?;
                upstream.headings = artifact.body.as_headings().cloned();
            }
            Stage::TariffUpdates => {
                let artifact = store
                    .load_section(report, &SectionKey::whole(Stage::TariffUpdates))
                    .await?
                    .ok_or_else(|| missing(Stage::TariffUpdates))?;
                if let SectionBody::TariffUpdates(t) = artifact.body {
                    upstream.tariff_updates = Some(t);
                }
            }
            Stage::Criteria => {
                let artifact = store
                    .load_section(report, &SectionKey::whole(Stage::Criteria))
                    .await?
                    .ok_or_else(|| missing(Stage::Criteria))?;
                upstream.criteria = artifact.body.as_criteria().cloned();
            }
            Stage::EvaluateIndustryAreas => {
                let headings = upstream
                    .headings
                    .as_ref()
                    .ok_or_else(|| missing(Stage::Headings))?;
                let mut stored = store
                    .list_sections(report, Stage::EvaluateIndustryAreas)
                    .await?;
                // Areas left over from earlier, longer headings are ignored
                let mut areas = Vec::new();
                for (h, s) in headings.area_slots() {
                    let slot = SectionSlot::Area {
                        heading: h,
                        sub_heading: s,
                    };
                    let idx = stored
                        .iter()
                        .position(|a| a.key.slot == slot)
                        .ok_or_else(|| missing(Stage::EvaluateIndustryAreas))?;
                    areas.push(stored.swap_remove(idx));
                }
                upstream.areas = areas;
            }
            Stage::EvaluateCriterion => {
                let criteria = upstream
                    .criteria
                    .as_ref()
                    .ok_or_else(|| missing(Stage::Criteria))?;
                let mut stored = store.list_sections(report, Stage::EvaluateCriterion).await?;
                // Evaluations of criteria no longer listed are ignored
                let mut evaluations = Vec::new();
                for criterion in &criteria.criteria {
                    let slot = SectionSlot::Criterion(criterion.key.clone());
                    let idx = stored
                        .iter()
                        .position(|e| e.key.slot == slot)
                        .ok_or_else(|| missing(Stage::EvaluateCriterion))?;
                    evaluations.push(stored.swap_remove(idx));
                }
                upstream.evaluations = evaluations;
            }
            other => return Err(missing(*other)),
        }
    }

    Ok(upstream)
}

impl Upstream {
    /// Reject slots that headings or criteria do not define
    pub(crate) fn check_slot(&self, slot: &SectionSlot) -> Result<(), PipelineError> {
        match slot {
            SectionSlot::Whole => Ok(()),
            SectionSlot::Area {
                heading,
                sub_heading,
            } => {
                let in_range = self
                    .headings
                    .as_ref()
                    .and_then(|h| h.sub_heading(*heading, *sub_heading))
                    .is_some();
                if in_range {
                    Ok(())
                } else {
                    Err(PipelineError::InvalidRequest(format!(
                        "No sub-heading at headingIndex {} subHeadingIndex {}",
                        heading, sub_heading
                    )))
                }
            }
            SectionSlot::Criterion(key) => {
                let known = self
                    .criteria
                    .as_ref()
                    .and_then(|c| c.find(key))
                    .is_some();
                if known {
                    Ok(())
                } else {
                    Err(PipelineError::InvalidRequest(format!(
                        "Unknown criterion: {}",
                        key
                    )))
                }
            }
        }
    }

    /// Structured input handed to the generation service
    pub(crate) fn input_document(&self, report: &ReportRef, key: &SectionKey) -> Value {
        let mut doc = match report.kind {
            ReportKind::IndustryTariff => json!({ "industry": report.id }),
            ReportKind::PublicEquity => json!({ "ticker": report.id }),
        };

        let fields = match (&key.stage, &key.slot) {
            (Stage::Headings, _) | (Stage::Criteria, _) => json!({}),
            (Stage::Introduction, _) | (Stage::TariffUpdates, _) => json!({
                "headings": self.headings,
            }),
            (Stage::ReportCover, _) => json!({
                "headings": self.headings,
                "tariffUpdates": self.tariff_updates,
            }),
            (
                Stage::EvaluateIndustryAreas,
                SectionSlot::Area {
                    heading,
                    sub_heading,
                },
            ) => {
                let (parent, sub) = match self
                    .headings
                    .as_ref()
                    .and_then(|h| h.sub_heading(*heading, *sub_heading))
                {
                    Some((parent, sub)) => (json!({ "title": parent.title }), json!(sub)),
                    None => (Value::Null, Value::Null),
                };
                json!({
                    "heading": parent,
                    "subHeading": sub,
                    "tariffUpdates": self.tariff_updates,
                })
            }
            (Stage::ExecutiveSummary, _) | (Stage::FinalConclusion, _) => json!({
                "headings": self.headings,
                "tariffUpdates": self.tariff_updates,
                "evaluatedAreas": self.evaluated_areas(),
            }),
            (Stage::EvaluateCriterion, SectionSlot::Criterion(criterion_key)) => json!({
                "criterion": self.criteria.as_ref().and_then(|c| c.find(criterion_key)),
            }),
            (Stage::FinalSummary, _) => json!({
                "criteria": self.criteria,
                "evaluations": self
                    .evaluations
                    .iter()
                    .map(|e| &e.body)
                    .collect::<Vec<_>>(),
            }),
            _ => json!({}),
        };

        if let (Value::Object(doc), Value::Object(fields)) = (&mut doc, fields) {
            doc.extend(fields);
        }
        doc
    }

    fn evaluated_areas(&self) -> Vec<Value> {
        self.areas
            .iter()
            .map(|area| {
                let (heading, sub_heading) = match &area.key.slot {
                    SectionSlot::Area {
                        heading,
                        sub_heading,
                    } => self
                        .headings
                        .as_ref()
                        .and_then(|h| h.sub_heading(*heading, *sub_heading))
                        .map(|(parent, sub)| (parent.title.clone(), sub.title.clone()))
                        .unwrap_or_default(),
                    _ => Default::default(),
                };
                json!({
                    "heading": heading,
                    "subHeading": sub_heading,
                    "evaluation": area.body,
                })
            })
            .collect()
    }
}
