//! Purely lexical intent classification (spec §4.1). No network calls; the
//! same query always yields the same `Intent` (spec testable property #1/#2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    RealTime,
    Recent,
    Historical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub primary: String,
    pub secondary: Vec<String>,
    pub confidence: f64,
    pub target_services: Vec<String>,
    pub urgency: Urgency,
    pub timeframe: Timeframe,
    pub data_types: Vec<String>,
}

/// Per-token weight contribution to a candidate intent.
struct IntentSignal {
    intent: &'static str,
    keywords: &'static [&'static str],
    weight: f64,
}

const INTENT_SIGNALS: &[IntentSignal] = &[
    IntentSignal { intent: "troubleshoot", keywords: &["error", "errors", "failing", "failure", "broken", "down", "500ing", "crash", "crashing", "fix"], weight: 1.0 },
    IntentSignal { intent: "monitor", keywords: &["status", "health", "uptime", "watch", "monitoring"], weight: 0.8 },
    IntentSignal { intent: "analyze", keywords: &["why", "analyze", "investigate", "diagnose", "root", "cause"], weight: 0.8 },
    IntentSignal { intent: "deploy", keywords: &["deploy", "launch", "provision", "stand", "ship"], weight: 1.0 },
    IntentSignal { intent: "scale", keywords: &["scale", "resize", "autoscale", "replicas"], weight: 0.9 },
    IntentSignal { intent: "inspect", keywords: &["list", "show", "get", "describe", "what"], weight: 0.6 },
];

struct ServiceSignal {
    service: &'static str,
    keywords: &'static [&'static str],
}

const SERVICE_SIGNALS: &[ServiceSignal] = &[
    ServiceSignal { service: "api_gateway", keywords: &["api", "gateway", "apigateway", "api-gateway"] },
    ServiceSignal { service: "lambda", keywords: &["lambda", "function", "functions"] },
    ServiceSignal { service: "database", keywords: &["database", "db", "rds", "postgres", "mysql"] },
    ServiceSignal { service: "kubernetes", keywords: &["pod", "pods", "cluster", "deployment", "k8s", "kubernetes"] },
    ServiceSignal { service: "load_balancer", keywords: &["alb", "elb", "load", "balancer"] },
];

struct UrgencyWeight {
    keyword: &'static str,
    weight: f64,
}

const URGENCY_WEIGHTS: &[UrgencyWeight] = &[
    UrgencyWeight { keyword: "urgent", weight: 1.0 },
    UrgencyWeight { keyword: "critical", weight: 1.0 },
    UrgencyWeight { keyword: "emergency", weight: 1.0 },
    UrgencyWeight { keyword: "down", weight: 0.4 },
    UrgencyWeight { keyword: "outage", weight: 0.5 },
    UrgencyWeight { keyword: "asap", weight: 0.5 },
    UrgencyWeight { keyword: "now", weight: 0.3 },
    UrgencyWeight { keyword: "important", weight: 0.2 },
];

const TIMEFRAME_WORDS: &[(&str, Timeframe)] = &[
    ("now", Timeframe::RealTime),
    ("live", Timeframe::RealTime),
    ("currently", Timeframe::RealTime),
    ("today", Timeframe::Recent),
    ("yesterday", Timeframe::Recent),
    ("recent", Timeframe::Recent),
    ("recently", Timeframe::Recent),
    ("last week", Timeframe::Historical),
    ("last month", Timeframe::Historical),
    ("history", Timeframe::Historical),
    ("historical", Timeframe::Historical),
];

struct DataTypeSignal {
    data_type: &'static str,
    keywords: &'static [&'static str],
}

const DATA_TYPE_SIGNALS: &[DataTypeSignal] = &[
    DataTypeSignal { data_type: "logs", keywords: &["log", "logs", "logging"] },
    DataTypeSignal { data_type: "metrics", keywords: &["metric", "metrics", "cpu", "memory", "latency"] },
    DataTypeSignal { data_type: "status", keywords: &["status", "health", "state"] },
    DataTypeSignal { data_type: "traces", keywords: &["trace", "traces", "tracing", "span"] },
];

fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

fn default_data_types_for(intent: &str) -> Vec<String> {
    match intent {
        "troubleshoot" => vec!["logs".into(), "metrics".into(), "status".into()],
        "monitor" => vec!["metrics".into(), "status".into()],
        "analyze" => vec!["logs".into(), "metrics".into()],
        _ => vec!["status".into()],
    }
}

/// Tokenize, score every candidate intent by summing per-token weights, and
/// pick the argmax. Confidence is `max_score / token_count`, clamped to
/// `[0, 1]`. Deterministic and side-effect free.
pub fn analyze_query(query: &str) -> Intent {
    let tokens = tokenize(query);
    let token_count = tokens.len().max(1) as f64;

    let mut scores: Vec<(&'static str, f64)> = Vec::new();
    for signal in INTENT_SIGNALS {
        let hits = tokens.iter().filter(|t| signal.keywords.contains(&t.as_str())).count();
        if hits > 0 {
            let entry = scores.iter_mut().find(|(name, _)| *name == signal.intent);
            let contribution = signal.weight * hits as f64;
            match entry {
                Some((_, score)) => *score += contribution,
                None => scores.push((signal.intent, contribution)),
            }
        }
    }
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (primary, top_score) = scores.first().cloned().unwrap_or(("inspect", 0.0));
    let secondary = scores.iter().skip(1).map(|(name, _)| name.to_string()).collect();
    let confidence = (top_score / token_count).clamp(0.0, 1.0);

    let mut target_services = Vec::new();
    for signal in SERVICE_SIGNALS {
        if tokens.iter().any(|t| signal.keywords.contains(&t.as_str())) {
            target_services.push(signal.service.to_string());
        }
    }

    let urgency_score: f64 = URGENCY_WEIGHTS
        .iter()
        .filter(|w| tokens.iter().any(|t| t == w.keyword))
        .map(|w| w.weight)
        .sum();
    let urgency = if urgency_score >= 1.0 {
        Urgency::Critical
    } else if urgency_score >= 0.7 {
        Urgency::High
    } else if urgency_score >= 0.3 {
        Urgency::Medium
    } else {
        Urgency::Low
    };

    let lower = query.to_lowercase();
    let timeframe = TIMEFRAME_WORDS
        .iter()
        .find(|(word, _)| lower.contains(word))
        .map(|(_, tf)| *tf)
        .unwrap_or(Timeframe::Recent);

    let mut data_types = Vec::new();
    for signal in DATA_TYPE_SIGNALS {
        if tokens.iter().any(|t| signal.keywords.contains(&t.as_str())) {
            data_types.push(signal.data_type.to_string());
        }
    }
    if data_types.is_empty() {
        data_types = default_data_types_for(primary);
    }

    Intent {
        primary: primary.to_string(),
        secondary,
        confidence,
        target_services,
        urgency,
        timeframe,
        data_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_always_bounded() {
        for query in [
            "",
            "hello",
            "urgent: api gateway errors after deploy",
            "what is going on with everything all at once right now",
        ] {
            let intent = analyze_query(query);
            assert!((0.0..=1.0).contains(&intent.confidence), "query={query}");
        }
    }

    #[test]
    fn analysis_is_deterministic() {
        let query = "urgent: api gateway errors after deploy";
        assert_eq!(analyze_query(query), analyze_query(query));
    }

    #[test]
    fn s1_lexical_classification_scenario() {
        let intent = analyze_query("urgent: api gateway errors after deploy");
        assert_eq!(intent.primary, "troubleshoot");
        assert_eq!(intent.urgency, Urgency::Critical);
        assert!(intent.target_services.contains(&"api_gateway".to_string()));
        for expected in ["logs", "metrics", "status"] {
            assert!(
                intent.data_types.contains(&expected.to_string()),
                "missing {expected} in {:?}",
                intent.data_types
            );
        }
    }

    #[test]
    fn default_data_types_fill_in_when_no_explicit_keyword() {
        let intent = analyze_query("monitor the checkout flow");
        assert_eq!(intent.data_types, vec!["metrics".to_string(), "status".to_string()]);
    }
}
