//! Seed scenario tests (S1, S2, S5) run as black-box integration tests
//! against the public API, the way the teacher crate's `tests/` directory
//! exercises its pipeline from the outside rather than from inline
//! `#[cfg(test)]` modules. S3/S4/S6 need internal planner/executor
//! construction helpers that aren't part of the public surface and are
//! covered in-module instead (`planner::paged`, `planner::repair`,
//! `executor`).

use chrono::Utc;
use indexmap::IndexMap;

use clanker::intent::{Urgency, analyze_query};
use clanker::router::{RouteDestination, route};
use clanker::{Command, Plan};

#[test]
fn s1_lexical_classification() {
    let intent = analyze_query("urgent: api gateway errors after deploy");
    assert_eq!(intent.primary, "troubleshoot");
    assert_eq!(intent.urgency, Urgency::Critical);
    assert!(intent.target_services.iter().any(|s| s == "api_gateway"));
    assert!(intent.data_types.contains(&"logs".to_string()));
    assert!(intent.data_types.contains(&"metrics".to_string()));
    assert!(intent.data_types.contains(&"status".to_string()));
}

#[test]
fn s2_routing() {
    assert_eq!(route("list pods in prod"), RouteDestination::K8s);
    assert_eq!(
        route("create an eks cluster called demo with 2 node using t3.small"),
        RouteDestination::K8sMaker
    );
    assert_eq!(route("deploy nginx"), RouteDestination::K8sMaker);
    assert_eq!(route("what EC2 instances are running?"), RouteDestination::Cli);
}

#[tokio::test]
async fn s5_placeholder_resolution() {
    use clanker::llm::MockLlmClient;
    use clanker::intelligence::InfraSnapshot;
    use clanker::resolver::{DEFAULT_MAX_PLACEHOLDER_ROUNDS, apply_static_bindings, resolve_placeholders};

    let snapshot = InfraSnapshot {
        vpc_id: Some("vpc-abc123".to_string()),
        ..Default::default()
    };

    let mut run_instances = Command::new(
        vec!["aws".into(), "ec2".into(), "run-instances".into(), "--subnet-id".into(), "<VPC_ID>".into()],
        "launch instance",
    );
    run_instances.produces.insert("INSTANCE_ID".to_string(), "Instances[0].InstanceId".to_string());
    let tag = Command::new(
        vec!["aws".into(), "ec2".into(), "create-tags".into(), "--resources".into(), "<INSTANCE_ID>".into()],
        "tag instance",
    );

    let plan = Plan::new("aws", "deploy nginx", Utc::now()).with_commands(vec![run_instances, tag]);

    let mut bindings = IndexMap::new();
    apply_static_bindings(&mut bindings, &snapshot);
    assert_eq!(bindings.get("VPC_ID"), Some(&"vpc-abc123".to_string()));

    let llm: std::sync::Arc<dyn clanker::llm::LlmClient> = std::sync::Arc::new(MockLlmClient::new(Vec::<String>::new()));
    let resolved = resolve_placeholders(llm.as_ref(), &plan, &mut bindings, &snapshot, DEFAULT_MAX_PLACEHOLDER_ROUNDS)
        .await
        .unwrap();

    let first_args = &resolved.commands[0].args;
    assert!(first_args.contains(&"vpc-abc123".to_string()), "VPC_ID should resolve statically: {first_args:?}");

    let second_args = &resolved.commands[1].args;
    assert!(
        second_args.contains(&"<INSTANCE_ID>".to_string()),
        "INSTANCE_ID is produced at runtime by an earlier command and must stay unresolved: {second_args:?}"
    );
}
