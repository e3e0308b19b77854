//! Collaboration graph: who delegates to whom, which models they use, and
//! what is running right now.

use crate::format::truncate_chars;
use crate::sources::Roster;
use crate::types::{AgentStatus, AgentStatusRecord, RunRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Active runs shown as task nodes
pub const TASK_NODE_LIMIT: usize = 10;

/// Maximum characters of a task node name
pub const TASK_NODE_NAME_MAX: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Agent,
    Model,
    Task,
}

/// Node status as the graph renders it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Idle,
    Working,
    Error,
}

impl From<AgentStatus> for NodeStatus {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Idle => NodeStatus::Idle,
            AgentStatus::Working => NodeStatus::Working,
            AgentStatus::Down => NodeStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaborationNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Delegates,
    Uses,
    Calls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaborationEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationGraph {
    pub nodes: Vec<CollaborationNode>,
    pub edges: Vec<CollaborationEdge>,
    /// Node ids on active delegation paths, deduplicated
    pub active_path: Vec<String>,
    pub main_agent_id: String,
    /// Epoch milliseconds
    pub last_update: i64,
}

/// Build the graph from the roster, the run registry and computed statuses.
pub fn collaboration_graph(
    roster: &Roster,
    runs: &[RunRecord],
    statuses: &[AgentStatusRecord],
    now_ms: i64,
) -> CollaborationGraph {
    let main_id = roster.main_agent_id().to_string();
    let active: Vec<&RunRecord> = runs.iter().filter(|r| r.is_active()).collect();
    let status_of: HashMap<&str, AgentStatus> =
        statuses.iter().map(|s| (s.id.as_str(), s.status)).collect();

    let mut nodes = vec![CollaborationNode {
        id: main_id.clone(),
        kind: NodeKind::Agent,
        name: roster.display_name(&main_id),
        status: if active.is_empty() {
            NodeStatus::Idle
        } else {
            NodeStatus::Working
        },
        timestamp: Some(now_ms),
    }];
    let mut edges = Vec::new();

    for agent in roster.agents().iter().filter(|a| a.id != main_id) {
        let status = status_of
            .get(agent.id.as_str())
            .copied()
            .unwrap_or(AgentStatus::Idle);
        nodes.push(CollaborationNode {
            id: agent.id.clone(),
            kind: NodeKind::Agent,
            name: agent.name.clone(),
            status: status.into(),
            timestamp: None,
        });
        edges.push(CollaborationEdge {
            id: format!("edge-{}-{}", main_id, agent.id),
            source: main_id.clone(),
            target: agent.id.clone(),
            kind: EdgeKind::Delegates,
            label: "delegates".to_string(),
        });
    }

    // One node per distinct primary model, shared by every agent using it
    let mut models = HashSet::new();
    for agent in roster.agents() {
        let Some(model) = roster.model_of(agent).primary else {
            continue;
        };
        let model_id = format!("model-{}", model);
        if models.insert(model.clone()) {
            nodes.push(CollaborationNode {
                id: model_id.clone(),
                kind: NodeKind::Model,
                name: model,
                status: NodeStatus::Idle,
                timestamp: None,
            });
        }
        edges.push(CollaborationEdge {
            id: format!("edge-{}-{}", agent.id, model_id),
            source: agent.id.clone(),
            target: model_id,
            kind: EdgeKind::Uses,
            label: "uses".to_string(),
        });
    }

    let mut active_path: Vec<String> = Vec::new();
    let mut on_path = HashSet::new();
    for run in active.iter().take(TASK_NODE_LIMIT) {
        let agent_id = run.agent_id();
        if agent_id.is_empty() {
            continue;
        }
        let task_id = format!("task-{}", run.run_id);
        let name = if run.task.is_empty() {
            "Unknown Task".to_string()
        } else {
            truncate_chars(&run.task, TASK_NODE_NAME_MAX)
        };

        nodes.push(CollaborationNode {
            id: task_id.clone(),
            kind: NodeKind::Task,
            name,
            status: NodeStatus::Working,
            timestamp: Some(run.started_at),
        });
        edges.push(CollaborationEdge {
            id: format!("edge-{}-{}", agent_id, task_id),
            source: agent_id.to_string(),
            target: task_id.clone(),
            kind: EdgeKind::Calls,
            label: "executes".to_string(),
        });

        for id in [main_id.clone(), agent_id.to_string(), task_id] {
            if on_path.insert(id.clone()) {
                active_path.push(id);
            }
        }
    }

    CollaborationGraph {
        nodes,
        edges,
        active_path,
        main_agent_id: main_id,
        last_update: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::parse(
            r#"{"agents":{
                "defaults":{"model":"glm-4.7"},
                "list":[
                    {"id":"main","name":"Coordinator"},
                    {"id":"devops","name":"DevOps","model":{"primary":"qwen3-coder"}},
                    {"id":"analyst","name":"Analyst"}
                ]}}"#,
        )
        .unwrap()
    }

    fn run(id: &str, agent: &str, ended_at: Option<i64>) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            child_session_key: format!("agent:{}:subagent:{}", agent, id),
            task: "roll out the new build to staging and production".to_string(),
            started_at: 1000,
            ended_at,
            outcome: None,
            total_tokens: None,
        }
    }

    fn status(id: &str, status: AgentStatus) -> AgentStatusRecord {
        AgentStatusRecord {
            id: id.to_string(),
            name: id.to_string(),
            role: id.to_string(),
            status,
            current_task: String::new(),
            last_active_at: 0,
            error: None,
        }
    }

    #[test]
    fn test_idle_graph() {
        let graph = collaboration_graph(&roster(), &[], &[], 5);
        assert_eq!(graph.main_agent_id, "main");
        assert_eq!(graph.nodes[0].status, NodeStatus::Idle);
        assert_eq!(graph.nodes[0].name, "Coordinator");

        let delegates = graph.edges.iter().filter(|e| e.kind == EdgeKind::Delegates).count();
        assert_eq!(delegates, 2);

        let models: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Model)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(models, vec!["glm-4.7", "qwen3-coder"]);
        let uses = graph.edges.iter().filter(|e| e.kind == EdgeKind::Uses).count();
        assert_eq!(uses, 3);
        assert!(graph.active_path.is_empty());
        assert_eq!(graph.last_update, 5);
    }

    #[test]
    fn test_active_runs_become_task_nodes() {
        let runs = vec![
            run("r1", "devops", None),
            run("r2", "devops", None),
            run("r3", "analyst", Some(2000)),
        ];
        let statuses = vec![
            status("devops", AgentStatus::Working),
            status("analyst", AgentStatus::Down),
        ];
        let graph = collaboration_graph(&roster(), &runs, &statuses, 0);

        assert_eq!(graph.nodes[0].status, NodeStatus::Working);
        let analyst = graph.nodes.iter().find(|n| n.id == "analyst").unwrap();
        assert_eq!(analyst.status, NodeStatus::Error);

        let tasks: Vec<_> = graph.nodes.iter().filter(|n| n.kind == NodeKind::Task).collect();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name.chars().count(), TASK_NODE_NAME_MAX + 3);

        assert_eq!(graph.active_path, vec!["main", "devops", "task-r1", "task-r2"]);
    }

    #[test]
    fn test_empty_roster_still_has_main() {
        let graph = collaboration_graph(&Roster::default(), &[run("r1", "x", None)], &[], 0);
        assert_eq!(graph.nodes[0].id, "main");
        assert_eq!(graph.nodes[0].status, NodeStatus::Working);
        assert_eq!(graph.active_path, vec!["main", "x", "task-r1"]);
    }

    #[test]
    fn test_wire_shape() {
        let graph = collaboration_graph(&roster(), &[], &[], 0);
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["nodes"][0]["type"], "agent");
        assert!(value["activePath"].is_array());
        assert_eq!(value["mainAgentId"], "main");
    }
}
