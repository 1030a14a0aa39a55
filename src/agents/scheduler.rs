use super::bus::SharedDataBus;
use super::types::AgentType;

/// Groups agent configs by declared `execution_order`, preserving the
/// relative order each layer's members were supplied in. Layers are
/// returned sorted ascending by execution order; the coordinator runs them
/// strictly in series and all members of a layer concurrently.
pub fn group_into_layers(agent_types: Vec<AgentType>) -> Vec<Vec<AgentType>> {
    let mut layers: Vec<(i32, Vec<AgentType>)> = Vec::new();
    for agent in agent_types {
        match layers.iter_mut().find(|(order, _)| *order == agent.execution_order) {
            Some((_, bucket)) => bucket.push(agent),
            None => layers.push((agent.execution_order, vec![agent])),
        }
    }
    layers.sort_by_key(|(order, _)| *order);
    layers.into_iter().map(|(_, bucket)| bucket).collect()
}

/// An agent is ready once every name in its `required_data` is present on
/// the bus (spec §3, testable property #3).
pub fn is_ready(agent: &AgentType, bus: &SharedDataBus) -> bool {
    bus.has_all(&agent.required_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_preserve_order_and_sort_by_layer() {
        let agents = vec![
            AgentType::new("c", 2),
            AgentType::new("a", 0),
            AgentType::new("b", 0),
        ];
        let layers = group_into_layers(agents);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(layers[1][0].name, "c");
    }

    #[test]
    fn readiness_checks_required_data_against_bus() {
        let bus = SharedDataBus::new();
        let agent = AgentType::new("needs-logs", 0).requires(["logs"]);
        assert!(!is_ready(&agent, &bus));
        bus.publish("logs", serde_json::Value::Null);
        assert!(is_ready(&agent, &bus));
    }
}
