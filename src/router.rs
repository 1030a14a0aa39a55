//! Conversational router (spec §4.11). A lightweight keyword-based
//! front-door for `ask` utterances: routes a query to one of
//! `{diagram, k8s_maker, maker, k8s, cli}` before any LLM call is made.
//! Read-only predicates win over mutation keywords when both co-occur, so
//! "what EC2 instances are running" never gets misrouted to a maker.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDestination {
    /// Architecture/infrastructure diagram subsystem.
    Diagram,
    /// A Kubernetes resource is being created/mutated.
    K8sMaker,
    /// A non-Kubernetes (AWS/GCP/Azure/Cloudflare) resource is being created/mutated.
    Maker,
    /// A read-only query about a Kubernetes resource.
    K8s,
    /// Default: the generic investigate/plan CLI path.
    Cli,
}

const DIAGRAM_KEYWORDS: &[&str] = &["diagram", "architecture diagram", "draw", "visualize", "topology"];

const K8S_RESOURCE_KEYWORDS: &[&str] =
    &["pod", "pods", "deployment", "deployments", "cluster", "eks", "gke", "aks", "k8s", "kubernetes", "namespace", "service", "ingress"];

const MUTATION_KEYWORDS: &[&str] =
    &["create", "deploy", "launch", "provision", "delete", "remove", "scale", "update", "rollout", "apply"];

const READ_ONLY_KEYWORDS: &[&str] =
    &["list", "get", "show", "describe", "what", "how", "status", "which"];

/// Explicit non-Kubernetes resource/provider nouns (spec §4.11). A mutation
/// utterance naming one of these is routed to the generic `Maker`; a
/// mutation utterance naming neither this list nor [`K8S_RESOURCE_KEYWORDS`]
/// has an unspecified resource and defaults to `K8sMaker` (spec §8 S2:
/// "deploy nginx" has no explicit provider noun, so it's implicitly
/// k8s-shaped).
const NON_K8S_RESOURCE_KEYWORDS: &[&str] = &[
    "s3", "bucket", "ec2", "lambda", "instance", "instances", "vpc", "rds", "lightsail", "cloudfront",
    "apprunner", "app runner", "fargate", "ecs", "azure", "gcp", "aws", "cloudflare", "worker", "workers",
    "vm", "virtual machine", "compute engine", "container app", "container apps", "functions",
];

fn contains_any(query: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| query.contains(kw))
}

/// Classify an utterance into one route destination. Read-only predicates
/// suppress mutation classification even when a mutation keyword is also
/// present (spec §4.11), e.g. "scale" co-occurring with "status".
pub fn route(query: &str) -> RouteDestination {
    let lower = query.to_lowercase();

    if contains_any(&lower, DIAGRAM_KEYWORDS) {
        return RouteDestination::Diagram;
    }

    let mentions_k8s = contains_any(&lower, K8S_RESOURCE_KEYWORDS);
    let is_read_only = contains_any(&lower, READ_ONLY_KEYWORDS);
    let is_mutation = !is_read_only && contains_any(&lower, MUTATION_KEYWORDS);

    if mentions_k8s {
        return if is_mutation { RouteDestination::K8sMaker } else { RouteDestination::K8s };
    }

    if is_mutation {
        return if contains_any(&lower, NON_K8S_RESOURCE_KEYWORDS) {
            RouteDestination::Maker
        } else {
            RouteDestination::K8sMaker
        };
    }

    RouteDestination::Cli
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_list_pods_routes_to_k8s_read() {
        assert_eq!(route("list pods in prod"), RouteDestination::K8s);
    }

    #[test]
    fn s2_create_eks_cluster_routes_to_k8s_maker() {
        assert_eq!(
            route("create an eks cluster called demo with 2 node using t3.small"),
            RouteDestination::K8sMaker
        );
    }

    #[test]
    fn s2_deploy_nginx_routes_to_k8s_maker() {
        assert_eq!(route("deploy nginx"), RouteDestination::K8sMaker);
    }

    #[test]
    fn s2_what_ec2_instances_routes_to_cli() {
        assert_eq!(route("what EC2 instances are running?"), RouteDestination::Cli);
    }

    #[test]
    fn diagram_keyword_wins_over_everything() {
        assert_eq!(route("draw me a diagram of the k8s cluster"), RouteDestination::Diagram);
    }

    #[test]
    fn non_k8s_mutation_routes_to_maker() {
        assert_eq!(route("create an s3 bucket called backups"), RouteDestination::Maker);
    }

    #[test]
    fn read_only_keyword_suppresses_mutation_even_when_both_present() {
        // "status" (read-only) and "scale" (mutation) co-occur; read wins.
        assert_eq!(route("what is the scale status of the deployment"), RouteDestination::K8s);
    }
}
