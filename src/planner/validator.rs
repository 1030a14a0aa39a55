//! Deterministic Validator (spec §4.6). A pure function over
//! `(plan, repo_profile, deep_analysis, docker_facts)` that never rejects a
//! plan outright — it only emits issues/fixes/warnings for the repair loop
//! to act on.

use crate::intelligence::architecture::DeployMethod;
use crate::intelligence::{DeepAnalysis, DockerFacts, RepoProfile};

use super::plan::Plan;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub fixes: Vec<String>,
    pub warnings: Vec<String>,
}

/// Required launch operation(s) per deploy method (spec §6, "non-exhaustive;
/// enforced by the validator"). A method is satisfied when *every* listed
/// `(verb, subcommand)` pair appears in the plan at least once.
pub const LAUNCH_OPERATIONS: &[(DeployMethod, &[(&str, &str)])] = &[
    (DeployMethod::Ec2, &[("ec2", "run-instances")]),
    (DeployMethod::EcsFargate, &[("ecs", "create-service")]),
    (DeployMethod::AppRunner, &[("apprunner", "create-service")]),
    (DeployMethod::Lambda, &[("lambda", "create-function")]),
    (DeployMethod::S3Cloudfront, &[("s3api", "create-bucket"), ("cloudfront", "create-distribution")]),
    (DeployMethod::Lightsail, &[("lightsail", "create-container-service")]),
    (DeployMethod::CfPages, &[("pages", "")]),
    (DeployMethod::CfWorkers, &[("deploy", "")]),
    (DeployMethod::CfContainers, &[("containers", "")]),
    (DeployMethod::CloudRun, &[("run", "deploy")]),
    (DeployMethod::GcpComputeEngine, &[("compute", "instances")]),
    (DeployMethod::Gke, &[("container", "clusters")]),
    (DeployMethod::AzureVm, &[("vm", "create")]),
    (DeployMethod::AzureContainerApps, &[("containerapp", "create")]),
    (DeployMethod::Aks, &[("aks", "create")]),
];

/// `ecs-fargate` accepts either of two launch verbs (spec §6): this is the
/// one method with an OR relationship instead of an AND across required
/// pairs, so it's checked separately from [`LAUNCH_OPERATIONS`].
const ECS_FARGATE_ALTERNATIVES: &[(&str, &str)] = &[("ecs", "create-service"), ("ecs", "run-task")];

fn required_pairs_present(plan: &Plan, method: DeployMethod) -> bool {
    if method == DeployMethod::EcsFargate {
        return ECS_FARGATE_ALTERNATIVES
            .iter()
            .any(|pair| plan_has_pair(plan, *pair));
    }
    LAUNCH_OPERATIONS
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, pairs)| pairs.iter().all(|pair| plan_has_pair(plan, *pair)))
        .unwrap_or(false)
}

fn plan_has_pair(plan: &Plan, pair: (&str, &str)) -> bool {
    plan.commands.iter().any(|cmd| {
        cmd.verb_subcommand()
            .map(|(verb, subcommand)| verb == pair.0 && (pair.1.is_empty() || subcommand == pair.1))
            .unwrap_or(false)
    })
}

/// True when an `args` entry contains a dangling `${VAR}` shell-style
/// placeholder outside an inline user-data blob (recognized by `#!` /
/// `#cloud-config` prefix or embedded newlines, per spec §4.9/§4.6).
fn has_dangling_shell_placeholder(arg: &str) -> bool {
    let looks_like_script = arg.starts_with("#!") || arg.starts_with("#cloud-config") || arg.contains('\n');
    !looks_like_script && arg.contains("${")
}

pub fn validate_deterministic(
    plan: &Plan,
    repo_profile: &RepoProfile,
    deep_analysis: &DeepAnalysis,
    docker_facts: &DockerFacts,
) -> ValidationReport {
    let mut issues = Vec::new();
    let mut fixes = Vec::new();
    let mut warnings = Vec::new();

    if let Some(method) = plan.method {
        if !required_pairs_present(plan, method) {
            issues.push(format!("missing required launch operation for method {}", method.as_str()));
            fixes.push(format!("add the required launch command(s) for {}", method.as_str()));
        }

        if method == DeployMethod::Ec2 {
            let needs_ami = plan.commands.iter().any(|c| c.verb_subcommand() == Some(("ec2", "run-instances")));
            if needs_ami && !plan.commands.iter().any(|c| c.args.iter().any(|a| a.contains("<AMI_ID>") || a.contains("${AMI_ID}"))) {
                warnings.push("ec2 run-instances present without an AMI_ID placeholder".to_string());
            }
        }

        if matches!(method, DeployMethod::S3Cloudfront) {
            let ecr_create_index = plan.commands.iter().position(|c| c.verb_subcommand() == Some(("ecr", "create-repository")));
            let push_index = plan.commands.iter().position(|c| c.args.iter().any(|a| a == "push"));
            if let (Some(create), Some(push)) = (ecr_create_index, push_index)
                && create > push
            {
                issues.push("image push occurs before ECR repository creation".to_string());
                fixes.push("move ecr create-repository before the docker push step".to_string());
            }
        }
    }

    for required_env in &deep_analysis.required_env {
        let present = plan
            .commands
            .iter()
            .any(|c| c.args.iter().any(|a| a.contains(required_env.as_str())));
        if !present {
            issues.push(format!("required env var '{required_env}' not referenced by any command"));
            fixes.push(format!("pass --env {required_env}=<value> (or equivalent) to the launch command"));
        }
    }

    for command in &plan.commands {
        for arg in &command.args {
            if has_dangling_shell_placeholder(arg) {
                issues.push(format!("dangling shell-style placeholder in arg '{arg}'"));
                fixes.push(format!("rewrite '{arg}' to angle-bracket form or move it into a user-data blob"));
            }
        }
    }

    if docker_facts.has_dockerfile && !plan.commands.iter().any(|c| c.args.iter().any(|a| a == "build-image" || a.contains("ECR"))) {
        warnings.push("repository has a Dockerfile but no image build/push step was planned".to_string());
    }

    let _ = repo_profile;

    ValidationReport { is_valid: issues.is_empty(), issues, fixes, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan::Command;
    use chrono::Utc;

    fn plan_with(commands: Vec<Command>, method: DeployMethod) -> Plan {
        Plan::new("aws", "deploy nginx", Utc::now())
            .with_method(Some(method))
            .with_commands(commands)
    }

    #[test]
    fn missing_launch_operation_is_flagged() {
        let plan = plan_with(vec![], DeployMethod::Ec2);
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|i| i.contains("launch operation")));
    }

    #[test]
    fn present_launch_operation_satisfies_the_check() {
        let plan = plan_with(
            vec![Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into(), "--image-id".into(), "<AMI_ID>".into()], "launch")],
            DeployMethod::Ec2,
        );
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(report.is_valid);
    }

    #[test]
    fn ecs_fargate_accepts_either_alternative() {
        let plan = plan_with(
            vec![Command::new(vec!["aws".into(), "ecs".into(), "run-task".into()], "run task")],
            DeployMethod::EcsFargate,
        );
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(report.is_valid);
    }

    #[test]
    fn dangling_shell_placeholder_outside_userdata_is_flagged() {
        let plan = plan_with(
            vec![Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into(), "--tag".into(), "${NAME}".into()], "launch")],
            DeployMethod::Ec2,
        );
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(report.issues.iter().any(|i| i.contains("dangling shell-style placeholder")));
    }

    #[test]
    fn shell_placeholder_inside_userdata_script_is_not_flagged() {
        let script = "#!/bin/bash\necho ${NAME}".to_string();
        let plan = plan_with(
            vec![Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into(), "--user-data".into(), script], "launch")],
            DeployMethod::Ec2,
        );
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(report.issues.iter().all(|i| !i.contains("dangling")));
    }

    #[test]
    fn missing_required_env_var_is_flagged() {
        let plan = plan_with(
            vec![Command::new(vec!["aws".into(), "ec2".into(), "run-instances".into()], "launch")],
            DeployMethod::Ec2,
        );
        let analysis = DeepAnalysis { required_env: vec!["DATABASE_URL".to_string()], ..Default::default() };
        let report = validate_deterministic(&plan, &RepoProfile::default(), &analysis, &DockerFacts::default());
        assert!(report.issues.iter().any(|i| i.contains("DATABASE_URL")));
    }

    #[test]
    fn no_method_set_skips_launch_operation_checks() {
        // A plan with no method attached (e.g. a read-only investigation
        // path's plan stub) shouldn't be flagged for a missing launch op.
        let plan = Plan::new("aws", "deploy nginx", Utc::now());
        let report = validate_deterministic(&plan, &RepoProfile::default(), &DeepAnalysis::default(), &DockerFacts::default());
        assert!(report.issues.iter().all(|i| !i.contains("launch operation")));
    }
}
