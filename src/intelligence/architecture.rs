//! Phase 4 — architecture choice (spec §4.4.4). Asks the LLM to pick a
//! `{provider, method}` pair from the enumerated launch-op table in spec §6.

use serde::{Deserialize, Serialize};

use crate::error::{ClankerError, Result};
use crate::llm::LlmClient;

use super::deep_analysis::DeepAnalysis;
use super::repo_profile::RepoProfile;

/// The enumerated deploy methods from spec §6, each mapped to its required
/// launch operation(s) by `planner::validator::LAUNCH_OPERATIONS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployMethod {
    Ec2,
    EcsFargate,
    AppRunner,
    Lambda,
    S3Cloudfront,
    Lightsail,
    CfPages,
    CfWorkers,
    CfContainers,
    CloudRun,
    GcpComputeEngine,
    Gke,
    AzureVm,
    AzureContainerApps,
    Aks,
}

impl DeployMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMethod::Ec2 => "ec2",
            DeployMethod::EcsFargate => "ecs-fargate",
            DeployMethod::AppRunner => "app-runner",
            DeployMethod::Lambda => "lambda",
            DeployMethod::S3Cloudfront => "s3-cloudfront",
            DeployMethod::Lightsail => "lightsail",
            DeployMethod::CfPages => "cf-pages",
            DeployMethod::CfWorkers => "cf-workers",
            DeployMethod::CfContainers => "cf-containers",
            DeployMethod::CloudRun => "cloud-run",
            DeployMethod::GcpComputeEngine => "gcp-compute-engine",
            DeployMethod::Gke => "gke",
            DeployMethod::AzureVm => "azure-vm",
            DeployMethod::AzureContainerApps => "azure-container-apps",
            DeployMethod::Aks => "aks",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureChoice {
    pub provider: String,
    pub method: DeployMethod,
}

fn build_prompt(profile: &RepoProfile, analysis: &DeepAnalysis) -> String {
    format!(
        "Pick the best deploy architecture for this app. Respond as JSON \
         {{\"provider\":..,\"method\":..}} where method is one of ec2, \
         ecs-fargate, app-runner, lambda, s3-cloudfront, lightsail, cf-pages, \
         cf-workers, cf-containers, cloud-run, gcp-compute-engine, gke, \
         azure-vm, azure-container-apps, aks.\n\
         language: {}\nframework: {:?}\nexposes_http: {}\nlistening_port: {:?}\nhas_dockerfile: {}",
        profile.language, profile.framework, analysis.exposes_http, analysis.listening_port, profile.has_dockerfile
    )
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|t| t.strip_suffix("```").unwrap_or(t))
        .unwrap_or(text)
        .trim()
}

/// Asks the LLM to choose an architecture; falls back to a static
/// Dockerfile-driven heuristic (`ec2` for containerized apps) if the
/// response doesn't parse, so the pipeline never dead-ends over a single
/// malformed LLM turn.
pub async fn choose(llm: &dyn LlmClient, profile: &RepoProfile, analysis: &DeepAnalysis) -> Result<ArchitectureChoice> {
    let prompt = build_prompt(profile, analysis);
    let response = llm.ask(&prompt).await?;
    parse_response(&response).or_else(|_| Ok(fallback(profile)))
}

fn parse_response(response: &str) -> Result<ArchitectureChoice> {
    serde_json::from_str(strip_code_fences(response))
        .map_err(|err| ClankerError::InvalidPlan(format!("architecture choice parse failed: {err}")))
}

fn fallback(profile: &RepoProfile) -> ArchitectureChoice {
    if profile.has_dockerfile {
        ArchitectureChoice { provider: "aws".into(), method: DeployMethod::Ec2 }
    } else {
        ArchitectureChoice { provider: "aws".into(), method: DeployMethod::Lambda }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn parses_llm_choice() {
        let llm = MockLlmClient::new([r#"{"provider":"aws","method":"ec2"}"#.to_string()]);
        let choice = choose(&llm, &RepoProfile::default(), &DeepAnalysis::default()).await.unwrap();
        assert_eq!(choice.method, DeployMethod::Ec2);
    }

    #[tokio::test]
    async fn falls_back_to_ec2_for_dockerized_app() {
        let llm = MockLlmClient::new(["garbage".to_string()]);
        let profile = RepoProfile { has_dockerfile: true, ..Default::default() };
        let choice = choose(&llm, &profile, &DeepAnalysis::default()).await.unwrap();
        assert_eq!(choice.method, DeployMethod::Ec2);
    }

    #[tokio::test]
    async fn falls_back_to_lambda_without_dockerfile() {
        let llm = MockLlmClient::new(["garbage".to_string()]);
        let choice = choose(&llm, &RepoProfile::default(), &DeepAnalysis::default()).await.unwrap();
        assert_eq!(choice.method, DeployMethod::Lambda);
    }
}
