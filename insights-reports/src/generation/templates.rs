//! Built-in prompt templates
//!
//! Seeded as version 1 of every stage prompt. `{{input}}` is replaced with the
//! pretty-printed input document.

use serde_json::Value;

use crate::pipeline::Stage;

pub const INPUT_PLACEHOLDER: &str = "{{input}}";

/// Version-1 template for `stage`
pub fn default_template(stage: Stage) -> &'static str {
    match stage {
        Stage::Headings => "Create the outline of a tariff impact report for the industry below. \
Return {\"headings\": [{\"title\", \"subHeadings\": [{\"title\", \"overview\"}]}]} with 3 headings \
of 2-3 sub-headings each, covering the main industry areas.\n\n{{input}}",
        Stage::Introduction => "Write the introduction of the tariff report for this industry. \
Return {\"aboutSector\", \"aboutConsumption\", \"pastGrowth\", \"futureGrowth\"}, each a short \
paragraph.\n\n{{input}}",
        Stage::TariffUpdates => "List the latest tariff changes affecting this industry for its \
main trading partners. Return {\"countrySpecificTariffs\": [{\"countryName\", \"tariffDetails\", \
\"existingTradeAmount\" (USD, optional), \"newChanges\"}]}.\n\n{{input}}",
        Stage::EvaluateIndustryAreas => "Evaluate how the tariff updates affect the industry area \
described by the heading and sub-heading below. Return {\"title\", \"summary\", \"tailwinds\": [], \
\"headwinds\": [], \"establishedPlayers\": [{\"name\", \"summary\"}], \"newChallengers\": \
[{\"name\", \"summary\"}]}.\n\n{{input}}",
        Stage::ExecutiveSummary => "Summarize the report for an executive reader using the \
evaluated areas and tariff updates. Return {\"title\", \"summary\"}.\n\n{{input}}",
        Stage::FinalConclusion => "Write the final conclusion of the report. Return {\"title\", \
\"conclusion\", \"positiveImpacts\": [], \"negativeImpacts\": [], \"finalStatements\"}.\n\n{{input}}",
        Stage::ReportCover => "Write the cover page text of the report. Return {\"title\", \
\"coverText\"} where coverText is 2-3 paragraphs of markdown.\n\n{{input}}",
        Stage::Criteria => "Define the criteria an investor should use to analyse the company \
below within its industry group. Return {\"criteria\": [{\"key\" (kebab-case), \"name\", \
\"shortDescription\"}]} with 5-7 criteria.\n\n{{input}}",
        Stage::EvaluateCriterion => "Evaluate the company against the criterion below. Return \
{\"summary\", \"performanceChecklist\": [{\"checklistItem\", \"oneLineExplanation\", \"score\" \
(0 or 1)}], \"importantMetrics\": [{\"metricName\", \"value\", \"explanation\"}]}.\n\n{{input}}",
        Stage::FinalSummary => "Write the investor summary of the company from the criterion \
evaluations below. Return {\"summary\", \"strengths\": [], \"risks\": []}.\n\n{{input}}",
    }
}

/// Human-readable prompt name for the catalog
pub fn default_name(stage: Stage) -> String {
    let kind = match stage.kind() {
        crate::pipeline::ReportKind::IndustryTariff => "Industry tariff report",
        crate::pipeline::ReportKind::PublicEquity => "Public equity report",
    };
    format!("{}: {}", kind, stage.label().to_lowercase())
}

/// Substitute the input document into `template`
///
/// Templates without the placeholder get the input appended.
pub fn render(template: &str, input: &Value) -> String {
    let document = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
    if template.contains(INPUT_PLACEHOLDER) {
        template.replace(INPUT_PLACEHOLDER, &document)
    } else {
        format!("{}\n\n{}", template, document)
    }
}
