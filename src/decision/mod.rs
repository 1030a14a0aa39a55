//! Keyword-predicate decision tree (spec §4.2). A rooted tree of nodes, each
//! carrying a small predicate DSL (`always` or `contains_keywords([...])`),
//! built once and read-only thereafter. Traversal is depth-first; a node
//! that matches is appended to the applicable list and its children are
//! visited; a node that doesn't match still lets its siblings run — "no
//! pruning on mismatch" (spec §4.2).

use indexmap::IndexMap;

/// The decision tree's predicate language. Parsed once at tree-construction
/// time per spec §9 ("cache a compiled predicate per node") — here the
/// predicate already *is* the compiled form, since both variants are cheap
/// to evaluate directly.
#[derive(Debug, Clone)]
pub enum Predicate {
    Always,
    ContainsKeywords(Vec<String>),
}

impl Predicate {
    pub fn contains_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::ContainsKeywords(keywords.into_iter().map(Into::into).collect())
    }

    fn matches(&self, tokens: &[String]) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::ContainsKeywords(keywords) => {
                keywords.iter().any(|kw| tokens.iter().any(|t| t == kw))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionNode {
    pub id: String,
    pub name: String,
    pub condition: Predicate,
    pub action: String,
    pub priority: i32,
    pub children: Vec<DecisionNode>,
    pub agent_types: Vec<String>,
    pub parameters: IndexMap<String, String>,
}

impl DecisionNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, condition: Predicate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition,
            action: String::new(),
            priority: 0,
            children: Vec::new(),
            agent_types: Vec::new(),
            parameters: IndexMap::new(),
        }
    }

    pub fn with_agent_types<I, S>(mut self, agent_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_types = agent_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_children(mut self, children: Vec<DecisionNode>) -> Self {
        self.children = children;
        self
    }
}

/// A node that matched, plus the path of node names from the root, for
/// auditing which rules fired.
#[derive(Debug, Clone)]
pub struct MatchedNode<'a> {
    pub node: &'a DecisionNode,
    pub path: Vec<String>,
}

pub struct DecisionTree {
    pub roots: Vec<DecisionNode>,
}

impl DecisionTree {
    pub fn new(roots: Vec<DecisionNode>) -> Self {
        Self { roots }
    }

    /// Depth-first traversal producing the applicable-node list in
    /// traversal order. Deterministic: the same `(tree, query)` always
    /// produces the same list in the same order (spec testable property #2).
    pub fn applicable(&self, query: &str) -> Vec<MatchedNode<'_>> {
        let tokens: Vec<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();

        let mut out = Vec::new();
        for root in &self.roots {
            visit(root, &tokens, Vec::new(), &mut out);
        }
        out
    }
}

fn visit<'a>(
    node: &'a DecisionNode,
    tokens: &[String],
    mut path: Vec<String>,
    out: &mut Vec<MatchedNode<'a>>,
) {
    if node.condition.matches(tokens) {
        path.push(node.name.clone());
        out.push(MatchedNode { node, path: path.clone() });
        for child in &node.children {
            visit(child, tokens, path.clone(), out);
        }
    }
    // Mismatch: this node's children are not visited, but since `visit` is
    // called for every sibling independently from the parent loop, sibling
    // traversal is unaffected either way.
}
