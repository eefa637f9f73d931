use crate::constants::{
    ADVANCED_EDGE_THRESHOLD, ADVANCED_NODE_THRESHOLD, MEDIUM_EDGE_THRESHOLD,
    MEDIUM_NODE_THRESHOLD,
};
use crate::error::{ConsoleError, Result};
use crate::models::{AgentNode, Complexity, Edge, StepNode, Template, TemplateBody};
use crate::utils::now_ms;

/// Client-generated template id, `custom-<unix millis>`.
pub fn new_custom_id() -> String {
    format!("custom-{}", now_ms())
}

/// Derive the gallery complexity label from graph size.
pub fn infer_complexity(node_count: usize, edge_count: usize) -> Complexity {
    if node_count > ADVANCED_NODE_THRESHOLD || edge_count > ADVANCED_EDGE_THRESHOLD {
        Complexity::Advanced
    } else if node_count > MEDIUM_NODE_THRESHOLD || edge_count > MEDIUM_EDGE_THRESHOLD {
        Complexity::Medium
    } else {
        Complexity::Simple
    }
}

/// Business rule checked before a template is saved or exported.
pub fn validate_template_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ConsoleError::Validation(
            "Please enter a template name".to_string(),
        ));
    }
    Ok(())
}

fn push_tag(tags: &mut Vec<String>, tag: &str) {
    let tag = tag.trim().to_ascii_lowercase();
    if !tag.is_empty() && !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// Build an agent-organization template from the current canvas.
pub fn create_template_from_agent(
    name: &str,
    description: &str,
    category: &str,
    nodes: Vec<AgentNode>,
    edges: Vec<Edge>,
    features: Vec<String>,
    use_case: &str,
) -> Template {
    let mut tags = Vec::new();
    push_tag(&mut tags, category);
    for node in &nodes {
        push_tag(&mut tags, node.data.role.as_str());
    }

    Template {
        id: new_custom_id(),
        name: name.trim().to_string(),
        description: description.to_string(),
        category: category.to_string(),
        complexity: infer_complexity(nodes.len(), edges.len()),
        usage_count: 0,
        tags,
        created_at: Some(chrono::Utc::now()),
        is_custom: true,
        body: TemplateBody::Agent {
            agent_count: nodes.len(),
            nodes,
            edges,
            features,
            use_case: use_case.to_string(),
        },
    }
}

/// Build a workflow template from the current canvas. When `steps` is empty
/// the step list is taken from the node labels in canvas order.
pub fn create_template_from_workflow(
    name: &str,
    description: &str,
    category: &str,
    nodes: Vec<StepNode>,
    edges: Vec<Edge>,
    steps: Vec<String>,
) -> Template {
    let steps = if steps.is_empty() {
        nodes.iter().map(|n| n.data.label.clone()).collect()
    } else {
        steps
    };

    let mut tags = Vec::new();
    push_tag(&mut tags, category);
    for node in &nodes {
        push_tag(&mut tags, node.data.step_type.as_str());
    }

    Template {
        id: new_custom_id(),
        name: name.trim().to_string(),
        description: description.to_string(),
        category: category.to_string(),
        complexity: infer_complexity(nodes.len(), edges.len()),
        usage_count: 0,
        tags,
        created_at: Some(chrono::Utc::now()),
        is_custom: true,
        body: TemplateBody::Workflow {
            nodes,
            edges,
            steps,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentData, AgentRole, Node, Position, TemplateType, WorkflowStepData};
    use proptest::prelude::*;

    fn agent(id: &str, role: AgentRole) -> AgentNode {
        Node {
            id: id.to_string(),
            node_type: "agent".into(),
            position: Position::new(0.0, 0.0),
            data: AgentData {
                role,
                ..AgentData::named(id)
            },
        }
    }

    #[test]
    fn agent_template_counts_agents() {
        let nodes = vec![
            agent("a", AgentRole::Supervisor),
            agent("b", AgentRole::Executor),
        ];
        let edges = vec![Edge::between("a", "b")];
        let t = create_template_from_agent(
            "Ops team",
            "desc",
            "Operations",
            nodes,
            edges,
            vec!["escalation".into()],
            "incident response",
        );

        assert_eq!(t.template_type(), TemplateType::Agent);
        assert!(t.id.starts_with("custom-"));
        assert!(t.is_custom);
        assert_eq!(t.complexity, Complexity::Simple);
        assert_eq!(t.tags, vec!["operations", "supervisor", "executor"]);
        match t.body {
            TemplateBody::Agent { agent_count, ref use_case, .. } => {
                assert_eq!(agent_count, 2);
                assert_eq!(use_case, "incident response");
            }
            _ => panic!("expected agent body"),
        }
    }

    #[test]
    fn workflow_steps_default_to_node_labels() {
        let nodes = ["Fetch", "Summarise"]
            .iter()
            .enumerate()
            .map(|(i, label)| Node {
                id: format!("step-{}", i + 1),
                node_type: "action".into(),
                position: Position::default(),
                data: WorkflowStepData::labelled(*label),
            })
            .collect();
        let t = create_template_from_workflow("Digest", "", "content", nodes, vec![], vec![]);
        assert_eq!(t.template_type(), TemplateType::Workflow);
        match t.body {
            TemplateBody::Workflow { steps, .. } => assert_eq!(steps, vec!["Fetch", "Summarise"]),
            _ => panic!("expected workflow body"),
        }
    }

    #[test]
    fn complexity_boundaries() {
        assert_eq!(infer_complexity(3, 4), Complexity::Simple);
        assert_eq!(infer_complexity(4, 0), Complexity::Medium);
        assert_eq!(infer_complexity(0, 5), Complexity::Medium);
        assert_eq!(infer_complexity(6, 8), Complexity::Medium);
        assert_eq!(infer_complexity(7, 0), Complexity::Advanced);
        assert_eq!(infer_complexity(0, 9), Complexity::Advanced);
    }

    #[test]
    fn blank_names_fail_validation() {
        assert!(validate_template_name("   ").is_err());
        assert!(validate_template_name("Team").is_ok());
    }

    proptest! {
        #[test]
        fn complexity_matches_thresholds(nodes in 0usize..20, edges in 0usize..20) {
            let expected = if nodes > 6 || edges > 8 {
                Complexity::Advanced
            } else if nodes > 3 || edges > 4 {
                Complexity::Medium
            } else {
                Complexity::Simple
            };
            prop_assert_eq!(infer_complexity(nodes, edges), expected);
        }

        #[test]
        fn agent_count_always_matches_nodes(count in 0usize..12) {
            let nodes: Vec<AgentNode> = (0..count)
                .map(|i| agent(&format!("n{}", i), AgentRole::Specialist))
                .collect();
            let t = create_template_from_agent("x", "", "c", nodes, vec![], vec![], "");
            prop_assert_eq!(t.template_type(), TemplateType::Agent);
            match t.body {
                TemplateBody::Agent { agent_count, .. } => prop_assert_eq!(agent_count, count),
                _ => prop_assert!(false),
            }
        }
    }
}
