//! LLM Validator + Review (spec §4.7). A non-blocking pass that returns the
//! same shape as the deterministic validator, then triages issues into
//! `hard`/`likely_noise`/`context_needed` buckets so only actionable issues
//! drive repair. The reviewer may *add* commands to satisfy still-missing
//! requirements but never deletes (deletion is the retention guard's sole
//! domain, spec §4.8).

use serde::{Deserialize, Serialize};

use crate::error::{ClankerError, Result};
use crate::llm::LlmClient;

use super::plan::Plan;
use super::validator::ValidationReport;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriagedIssues {
    pub hard: Vec<String>,
    pub likely_noise: Vec<String>,
    pub context_needed: Vec<String>,
}

#[derive(Deserialize)]
struct LlmValidationResponse {
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    fixes: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

/// Asks the LLM for a second opinion on the plan. A response that fails to
/// parse degrades to an empty (valid) report rather than failing the
/// pipeline — this pass is advisory, never load-bearing.
pub async fn validate_with_llm(llm: &dyn LlmClient, plan: &Plan, context: &str) -> Result<ValidationReport> {
    let prompt = format!(
        "Review this infrastructure plan for correctness. Respond as JSON \
         {{\"issues\":[...],\"fixes\":[...],\"warnings\":[...]}}.\n\
         context:\n{context}\n\nplan:\n{}",
        serde_json::to_string_pretty(plan).unwrap_or_default()
    );
    let response = llm.ask(&prompt).await?;
    let parsed: LlmValidationResponse = serde_json::from_str(strip_code_fences(&response))
        .map_err(|err| ClankerError::InvalidPlan(format!("llm validator response parse failed: {err}")))
        .unwrap_or(LlmValidationResponse { issues: Vec::new(), fixes: Vec::new(), warnings: Vec::new() });

    Ok(ValidationReport {
        is_valid: parsed.issues.is_empty(),
        issues: parsed.issues,
        fixes: parsed.fixes,
        warnings: parsed.warnings,
    })
}

const NOISE_MARKERS: &[&str] = &["style", "naming", "could", "consider", "nit", "cosmetic"];
const CONTEXT_NEEDED_MARKERS: &[&str] = &["unclear", "depends", "unknown", "might need", "not sure"];

/// Splits a combined issue list into hard/likely-noise/context-needed
/// buckets. Only `hard` issues are passed on to the repair loop.
pub fn triage(issues: &[String]) -> TriagedIssues {
    let mut triaged = TriagedIssues::default();
    for issue in issues {
        let lower = issue.to_lowercase();
        if CONTEXT_NEEDED_MARKERS.iter().any(|m| lower.contains(m)) {
            triaged.context_needed.push(issue.clone());
        } else if NOISE_MARKERS.iter().any(|m| lower.contains(m)) {
            triaged.likely_noise.push(issue.clone());
        } else {
            triaged.hard.push(issue.clone());
        }
    }
    triaged
}

/// Merges the deterministic report and the LLM report, deduplicating
/// identical issue text, ahead of triage.
pub fn merge_reports(deterministic: &ValidationReport, llm: &ValidationReport) -> ValidationReport {
    let mut issues = deterministic.issues.clone();
    for issue in &llm.issues {
        if !issues.contains(issue) {
            issues.push(issue.clone());
        }
    }
    let mut fixes = deterministic.fixes.clone();
    for fix in &llm.fixes {
        if !fixes.contains(fix) {
            fixes.push(fix.clone());
        }
    }
    let mut warnings = deterministic.warnings.clone();
    for warning in &llm.warnings {
        if !warnings.contains(warning) {
            warnings.push(warning.clone());
        }
    }
    ValidationReport { is_valid: issues.is_empty(), issues, fixes, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use chrono::Utc;

    #[tokio::test]
    async fn parses_llm_validation_response() {
        let llm = MockLlmClient::new([r#"{"issues":["missing health check"],"fixes":["add elbv2 health check"],"warnings":[]}"#.to_string()]);
        let plan = Plan::new("aws", "deploy nginx", Utc::now());
        let report = validate_with_llm(&llm, &plan, "context").await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.issues, vec!["missing health check".to_string()]);
    }

    #[tokio::test]
    async fn unparseable_response_degrades_to_valid() {
        let llm = MockLlmClient::new(["not json".to_string()]);
        let plan = Plan::new("aws", "deploy nginx", Utc::now());
        let report = validate_with_llm(&llm, &plan, "context").await.unwrap();
        assert!(report.is_valid);
    }

    #[test]
    fn triage_buckets_issues_by_keyword() {
        let issues = vec![
            "missing ec2 run-instances".to_string(),
            "consider renaming the variable for clarity".to_string(),
            "unclear whether VPC peering is required".to_string(),
        ];
        let triaged = triage(&issues);
        assert_eq!(triaged.hard, vec!["missing ec2 run-instances".to_string()]);
        assert_eq!(triaged.likely_noise.len(), 1);
        assert_eq!(triaged.context_needed.len(), 1);
    }

    #[test]
    fn merge_reports_deduplicates_identical_issue_text() {
        let a = ValidationReport { issues: vec!["x".into()], ..Default::default() };
        let b = ValidationReport { issues: vec!["x".into(), "y".into()], ..Default::default() };
        let merged = merge_reports(&a, &b);
        assert_eq!(merged.issues, vec!["x".to_string(), "y".to_string()]);
    }
}
