//! Intelligence Pipeline (spec §4.4): the phased evidence-gathering core
//! that feeds the paged planner for `deploy` queries. Each phase's output
//! feeds the next: clone+analyze -> deep analysis -> infra snapshot ->
//! architecture choice -> prompt synthesis.

pub mod architecture;
pub mod deep_analysis;
pub mod infra_snapshot;
pub mod prompt;
pub mod repo_profile;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityRegistry;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::planner::validator::{ValidationReport, validate_deterministic};
use crate::planner::plan::Plan;

pub use architecture::{ArchitectureChoice, DeployMethod};
pub use deep_analysis::DeepAnalysis;
pub use infra_snapshot::InfraSnapshot;
pub use repo_profile::RepoProfile;

/// Facts about whether/where a Dockerfile or compose file was found, used
/// by the executor to decide whether to build+push an image between phases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerFacts {
    pub has_dockerfile: bool,
    pub has_compose: bool,
    pub dockerfile_path: Option<String>,
}

/// Everything the planner needs, assembled in order by the pipeline (spec §3
/// `IntelligenceBundle`).
#[derive(Debug, Clone)]
pub struct IntelligenceBundle {
    pub repo_profile: RepoProfile,
    pub deep_analysis: DeepAnalysis,
    pub docker_facts: DockerFacts,
    pub infra_snapshot: InfraSnapshot,
    pub architecture_choice: ArchitectureChoice,
    pub enriched_prompt: String,
    pub validation: ValidationReport,
}

/// Runs the five ordered phases against a real repository URL and AWS
/// target, within `deadline`. Phases run strictly in series since each
/// consumes the previous phase's output.
pub async fn gather(
    repo_url: &str,
    question: &str,
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
) -> Result<IntelligenceBundle> {
    tokio::time::timeout(deadline, gather_inner(repo_url, question, registry, llm))
        .await
        .map_err(|_| crate::error::ClankerError::DeadlineExceeded {
            phase: "intelligence_pipeline",
            minutes: deadline.as_secs() / 60,
        })?
}

async fn gather_inner(
    repo_url: &str,
    question: &str,
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmClient>,
) -> Result<IntelligenceBundle> {
    let repo_profile = repo_profile::clone_and_analyze(repo_url).await?;
    let docker_facts = DockerFacts {
        has_dockerfile: repo_profile.has_dockerfile,
        has_compose: repo_profile.has_compose,
        dockerfile_path: repo_profile.dockerfile_path.clone(),
    };

    let deep_analysis = deep_analysis::analyze(llm.as_ref(), &repo_profile).await?;
    let infra_snapshot = infra_snapshot::snapshot(registry.as_ref()).await?;
    let architecture_choice = architecture::choose(llm.as_ref(), &repo_profile, &deep_analysis).await?;
    let enriched_prompt = prompt::synthesize(
        question,
        &architecture_choice,
        &repo_profile,
        &deep_analysis,
        &infra_snapshot,
    );

    let baseline = Plan::new(architecture_choice.provider.clone(), question, chrono::Utc::now())
        .with_method(Some(architecture_choice.method));
    let validation = validate_deterministic(&baseline, &repo_profile, &deep_analysis, &docker_facts);

    Ok(IntelligenceBundle {
        repo_profile,
        deep_analysis,
        docker_facts,
        infra_snapshot,
        architecture_choice,
        enriched_prompt,
        validation,
    })
}
