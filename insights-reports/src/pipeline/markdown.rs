//! Markdown rendering of section bodies
//!
//! Pure functions of the typed body: nothing is rendered that the JSON does
//! not contain, and the same body always renders to the same text.

use std::fmt::Write;

use crate::pipeline::sections::*;
use crate::pipeline::{Report, ReportKind, SectionKey};

/// Render one section
pub fn render_section(key: &SectionKey, body: &SectionBody) -> String {
    let mut out = String::new();
    match body {
        SectionBody::Headings(h) => render_headings(&mut out, h),
        SectionBody::Introduction(i) => render_introduction(&mut out, i),
        SectionBody::TariffUpdates(t) => render_tariff_updates(&mut out, t),
        SectionBody::IndustryArea(a) => render_industry_area(&mut out, a),
        SectionBody::ExecutiveSummary(s) => {
            let _ = write!(out, "## {}\n\n{}\n", s.title, s.summary);
        }
        SectionBody::FinalConclusion(c) => render_final_conclusion(&mut out, c),
        SectionBody::ReportCover(c) => {
            let _ = write!(out, "## {}\n\n{}\n", c.title, c.cover_text);
        }
        SectionBody::Criteria(c) => render_criteria(&mut out, c),
        SectionBody::CriterionEvaluation(e) => render_criterion_evaluation(&mut out, key, e),
        SectionBody::FinalSummary(s) => {
            let _ = write!(out, "## Final Summary\n\n{}\n", s.summary);
            bullet_list(&mut out, "Strengths", &s.strengths);
            bullet_list(&mut out, "Risks", &s.risks);
        }
    }
    out
}

/// Render the whole report page, sections in report order
pub fn render_report(report: &Report) -> String {
    let title = match report.report.kind {
        ReportKind::IndustryTariff => "Industry Tariff Report",
        ReportKind::PublicEquity => "Public Equity Report",
    };

    let mut out = format!("# {}: {}\n", title, report.report.id);
    for section in &report.sections {
        out.push('\n');
        out.push_str(&section.markdown());
    }
    out
}

fn render_headings(out: &mut String, h: &ReportHeadings) {
    out.push_str("## Report Outline\n\n");
    for (i, heading) in h.headings.iter().enumerate() {
        let _ = writeln!(out, "{}. **{}**", i + 1, heading.title);
        for sub in &heading.sub_headings {
            let _ = writeln!(out, "   - {}: {}", sub.title, sub.overview);
        }
    }
}

fn render_introduction(out: &mut String, i: &Introduction) {
    out.push_str("## Introduction\n");
    for (title, text) in [
        ("About the Sector", &i.about_sector),
        ("Consumption", &i.about_consumption),
        ("Past Growth", &i.past_growth),
        ("Future Growth", &i.future_growth),
    ] {
        let _ = write!(out, "\n### {}\n\n{}\n", title, text);
    }
}

fn render_tariff_updates(out: &mut String, t: &TariffUpdates) {
    out.push_str("## Tariff Updates\n");
    for country in &t.country_specific_tariffs {
        let _ = write!(out, "\n### {}\n\n{}\n", country.country_name, country.tariff_details);
        if let Some(amount) = country.existing_trade_amount {
            let _ = write!(out, "\n**Existing trade:** ${}\n", amount);
        }
        let _ = write!(out, "\n**New changes:** {}\n", country.new_changes);
    }
}

fn render_industry_area(out: &mut String, a: &IndustryAreaEvaluation) {
    let _ = write!(out, "## {}\n\n{}\n", a.title, a.summary);
    bullet_list(out, "Tailwinds", &a.tailwinds);
    bullet_list(out, "Headwinds", &a.headwinds);
    company_list(out, "Established Players", &a.established_players);
    company_list(out, "New Challengers", &a.new_challengers);
}

fn render_final_conclusion(out: &mut String, c: &FinalConclusion) {
    let _ = write!(out, "## {}\n\n{}\n", c.title, c.conclusion);
    bullet_list(out, "Positive Impacts", &c.positive_impacts);
    bullet_list(out, "Negative Impacts", &c.negative_impacts);
    let _ = write!(out, "\n{}\n", c.final_statements);
}

fn render_criteria(out: &mut String, c: &CriteriaList) {
    out.push_str("## Evaluation Criteria\n\n");
    for criterion in &c.criteria {
        let _ = writeln!(out, "- **{}**: {}", criterion.name, criterion.short_description);
    }
}

fn render_criterion_evaluation(out: &mut String, key: &SectionKey, e: &CriterionEvaluation) {
    let _ = write!(
        out,
        "## Criterion: {}\n\n{}\n\n**Checklist:** {}/{} passed\n",
        key.slot,
        e.summary,
        e.passed(),
        e.performance_checklist.len()
    );
    if !e.performance_checklist.is_empty() {
        out.push('\n');
        for item in &e.performance_checklist {
            let mark = if item.score == 1 { "x" } else { " " };
            let _ = writeln!(out, "- [{}] {}: {}", mark, item.checklist_item, item.one_line_explanation);
        }
    }
    if !e.important_metrics.is_empty() {
        out.push_str("\n| Metric | Value | Explanation |\n|---|---|---|\n");
        for metric in &e.important_metrics {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                metric.metric_name, metric.value, metric.explanation
            );
        }
    }
}

fn bullet_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n### {}\n\n", title);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

fn company_list(out: &mut String, title: &str, companies: &[CompanyNote]) {
    if companies.is_empty() {
        return;
    }
    let _ = write!(out, "\n### {}\n\n", title);
    for company in companies {
        let _ = writeln!(out, "- **{}**: {}", company.name, company.summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ReportRef, SectionArtifact, SectionSlot, Stage};
    use chrono::Utc;

    fn area() -> IndustryAreaEvaluation {
        IndustryAreaEvaluation {
            title: "Flat steel".to_string(),
            summary: "Demand holds".to_string(),
            tailwinds: vec!["Infrastructure bill".to_string()],
            headwinds: vec![],
            established_players: vec![CompanyNote {
                name: "Nucor".to_string(),
                summary: "Mini-mill leader".to_string(),
            }],
            new_challengers: vec![],
        }
    }

    #[test]
    fn test_empty_lists_are_omitted() {
        let key = SectionKey {
            stage: Stage::EvaluateIndustryAreas,
            slot: SectionSlot::Area { heading: 0, sub_heading: 0 },
        };
        let md = render_section(&key, &SectionBody::IndustryArea(area()));
        assert!(md.starts_with("## Flat steel\n\nDemand holds\n"));
        assert!(md.contains("### Tailwinds\n\n- Infrastructure bill\n"));
        assert!(!md.contains("Headwinds"));
        assert!(md.contains("- **Nucor**: Mini-mill leader"));
    }

    #[test]
    fn test_trade_amount_rendered_as_stored() {
        let key = SectionKey::whole(Stage::TariffUpdates);
        let body = SectionBody::TariffUpdates(TariffUpdates {
            country_specific_tariffs: vec![CountryTariff {
                country_name: "Canada".to_string(),
                tariff_details: "25% on steel".to_string(),
                existing_trade_amount: Some(1234.56),
                new_changes: "Exemption revoked".to_string(),
            }],
        });
        let md = render_section(&key, &body);
        assert!(md.contains("**Existing trade:** $1234.56\n"), "{}", md);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let key = SectionKey::whole(Stage::ReportCover);
        let body = SectionBody::ReportCover(ReportCover {
            title: "Steel".to_string(),
            cover_text: "Tariffs reshape the market".to_string(),
        });
        assert_eq!(render_section(&key, &body), render_section(&key, &body));
    }

    #[test]
    fn test_checklist_marks() {
        let key = SectionKey {
            stage: Stage::EvaluateCriterion,
            slot: SectionSlot::Criterion("margins".to_string()),
        };
        let body = SectionBody::CriterionEvaluation(CriterionEvaluation {
            criterion_key: "margins".to_string(),
            summary: "Solid".to_string(),
            performance_checklist: vec![
                ChecklistItem {
                    checklist_item: "Gross margin > 40%".to_string(),
                    one_line_explanation: "52%".to_string(),
                    score: 1,
                },
                ChecklistItem {
                    checklist_item: "Expanding".to_string(),
                    one_line_explanation: "Flat".to_string(),
                    score: 0,
                },
            ],
            important_metrics: vec![],
        });
        let md = render_section(&key, &body);
        assert!(md.contains("## Criterion: margins"));
        assert!(md.contains("**Checklist:** 1/2 passed"));
        assert!(md.contains("- [x] Gross margin > 40%: 52%"));
        assert!(md.contains("- [ ] Expanding: Flat"));
    }

    #[test]
    fn test_report_page_concatenates_sections_in_order() {
        let report = Report::new(
            ReportRef::new(crate::pipeline::ReportKind::IndustryTariff, "steel").unwrap(),
            Utc::now(),
            Utc::now(),
            vec![
                SectionArtifact::new(
                    SectionKey::whole(Stage::ReportCover),
                    SectionBody::ReportCover(ReportCover {
                        title: "Cover".to_string(),
                        cover_text: "Text".to_string(),
                    }),
                ),
                SectionArtifact::new(
                    SectionKey {
                        stage: Stage::EvaluateIndustryAreas,
                        slot: SectionSlot::Area { heading: 0, sub_heading: 0 },
                    },
                    SectionBody::IndustryArea(area()),
                ),
            ],
        );

        let page = render_report(&report);
        assert!(page.starts_with("# Industry Tariff Report: steel\n"));
        let area_pos = page.find("## Flat steel").unwrap();
        let cover_pos = page.find("## Cover").unwrap();
        assert!(area_pos < cover_pos);
    }
}
