use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static description of one kind of investigation agent (spec §3
/// `AgentType`). `execution_order` is a topological layer: agents sharing a
/// layer run concurrently; layers run strictly in series.
#[derive(Debug, Clone)]
pub struct AgentType {
    pub name: String,
    pub required_data: Vec<String>,
    pub provided_data: Vec<String>,
    pub execution_order: i32,
    pub operations: Vec<AgentOperation>,
}

impl AgentType {
    pub fn new(name: impl Into<String>, execution_order: i32) -> Self {
        Self {
            name: name.into(),
            required_data: Vec::new(),
            provided_data: Vec::new(),
            execution_order,
            operations: Vec::new(),
        }
    }

    pub fn requires<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_data = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn provides<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provided_data = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_operations(mut self, operations: Vec<AgentOperation>) -> Self {
        self.operations = operations;
        self
    }
}

/// One named capability call an agent will make, e.g. `get_recent_logs`.
/// `best_effort` is the open question from spec §9 resolved as a
/// capability-table attribute rather than a hard-coded operation list: a
/// failing best-effort operation is swallowed so its agent still completes
/// with partial results.
#[derive(Debug, Clone)]
pub struct AgentOperation {
    pub name: String,
    pub params: IndexMap<String, Value>,
    pub best_effort: bool,
}

impl AgentOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: IndexMap::new(),
            best_effort: false,
        }
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// One step of an agent's reasoning trail, recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub step: usize,
    pub thought: String,
    pub action: String,
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-investigation scratchpad (spec §3 `AgentContext`). Copied per agent
/// before a worker starts (spec §5: "a shallow copy of its top-level fields
/// plus fresh inner maps") so concurrent workers never race on shared state.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub original_query: String,
    pub current_step: usize,
    pub max_steps: usize,
    pub gathered_data: IndexMap<String, Value>,
    pub chain_of_thought: Vec<ThoughtStep>,
    pub service_data: IndexMap<String, Value>,
    pub metrics: IndexMap<String, Value>,
    pub service_status: IndexMap<String, Value>,
    pub last_update_time: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(original_query: impl Into<String>, max_steps: usize, now: DateTime<Utc>) -> Self {
        Self {
            original_query: original_query.into(),
            current_step: 0,
            max_steps,
            gathered_data: IndexMap::new(),
            chain_of_thought: Vec::new(),
            service_data: IndexMap::new(),
            metrics: IndexMap::new(),
            service_status: IndexMap::new(),
            last_update_time: now,
        }
    }

    /// Shallow copy with fresh inner collections, used to hand each worker
    /// an isolated scratchpad before a layer runs.
    pub fn fork(&self) -> Self {
        Self {
            original_query: self.original_query.clone(),
            current_step: self.current_step,
            max_steps: self.max_steps,
            gathered_data: self.gathered_data.clone(),
            chain_of_thought: Vec::new(),
            service_data: self.service_data.clone(),
            metrics: self.metrics.clone(),
            service_status: self.service_status.clone(),
            last_update_time: self.last_update_time,
        }
    }
}

/// What one agent produced: its per-operation results, keyed by operation
/// name, plus an optional error if the agent failed outright (as opposed to
/// a swallowed best-effort miss).
#[derive(Debug, Clone, Default)]
pub struct AgentResult {
    pub agent_name: String,
    pub results: IndexMap<String, Value>,
    pub error: Option<String>,
}

impl AgentResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
