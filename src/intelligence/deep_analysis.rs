//! Phase 2 — deep analysis (spec §4.4.2). Asks the LLM to describe the
//! app's runtime shape using the file tree and key files gathered by the
//! clone+analyze phase.

use serde::{Deserialize, Serialize};

use crate::error::{ClankerError, Result};
use crate::llm::LlmClient;

use super::repo_profile::RepoProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepAnalysis {
    pub listening_port: Option<u16>,
    pub start_command: Option<String>,
    pub exposes_http: bool,
    pub health_endpoint: Option<String>,
    pub required_env: Vec<String>,
    pub optional_env: Vec<String>,
}

/// Builds the deep-analysis prompt from the repo profile and asks the LLM
/// to fill in the fields a `Dockerfile`/compose scan can't reliably infer
/// (start command, health endpoint). Falls back to the repo profile's own
/// facts when the LLM response doesn't parse, rather than failing the whole
/// pipeline over a non-essential phase.
pub async fn analyze(llm: &dyn LlmClient, profile: &RepoProfile) -> Result<DeepAnalysis> {
    let prompt = build_prompt(profile);
    let response = llm.ask(&prompt).await?;
    match parse_response(&response) {
        Ok(analysis) => Ok(analysis),
        Err(_) => Ok(fallback(profile)),
    }
}

fn build_prompt(profile: &RepoProfile) -> String {
    let files = profile.file_tree.iter().take(200).cloned().collect::<Vec<_>>().join("\n");
    format!(
        "Describe this application's runtime shape as JSON with fields \
         listening_port, start_command, exposes_http, health_endpoint, \
         required_env (array), optional_env (array).\n\
         language: {}\nframework: {:?}\nknown ports: {:?}\nknown env vars: {:?}\n\
         file tree:\n{files}",
        profile.language, profile.framework, profile.ports, profile.env_vars
    )
}

fn parse_response(response: &str) -> Result<DeepAnalysis> {
    let trimmed = strip_code_fences(response);
    serde_json::from_str(trimmed).map_err(|err| ClankerError::InvalidPlan(format!("deep analysis parse failed: {err}")))
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

fn fallback(profile: &RepoProfile) -> DeepAnalysis {
    DeepAnalysis {
        listening_port: profile.ports.first().copied(),
        start_command: None,
        exposes_http: !profile.ports.is_empty(),
        health_endpoint: None,
        required_env: profile.env_vars.clone(),
        optional_env: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn profile() -> RepoProfile {
        RepoProfile { language: "javascript".into(), ports: vec![3000], ..Default::default() }
    }

    #[tokio::test]
    async fn parses_well_formed_llm_json() {
        let llm = MockLlmClient::new([
            r#"{"listening_port":3000,"start_command":"node index.js","exposes_http":true,"health_endpoint":"/health","required_env":["DATABASE_URL"],"optional_env":[]}"#.to_string(),
        ]);
        let analysis = analyze(&llm, &profile()).await.unwrap();
        assert_eq!(analysis.listening_port, Some(3000));
        assert_eq!(analysis.health_endpoint.as_deref(), Some("/health"));
    }

    #[tokio::test]
    async fn falls_back_on_unparseable_response() {
        let llm = MockLlmClient::new(["not json at all".to_string()]);
        let analysis = analyze(&llm, &profile()).await.unwrap();
        assert_eq!(analysis.listening_port, Some(3000));
        assert!(analysis.exposes_http);
    }

    #[tokio::test]
    async fn strips_code_fences_before_parsing() {
        let llm = MockLlmClient::new([
            "```json\n{\"listening_port\":8080,\"exposes_http\":true,\"required_env\":[],\"optional_env\":[]}\n```".to_string(),
        ]);
        let analysis = analyze(&llm, &profile()).await.unwrap();
        assert_eq!(analysis.listening_port, Some(8080));
    }
}
