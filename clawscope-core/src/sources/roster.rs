//! Agent roster from `openclaw.json`.

use super::expand_home;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Id the runtime gives its coordinating agent
pub const MAIN_AGENT_ID: &str = "main";

/// Model selection of an agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub primary: Option<String>,
    pub fallbacks: Vec<String>,
}

/// One configured agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub workspace: Option<PathBuf>,
    pub model: Option<ModelConfig>,
}

/// The ordered agent list plus roster-wide defaults
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<AgentDescriptor>,
    default_workspace: Option<PathBuf>,
    default_model: ModelConfig,
}

// `model` is either `"glm-4.7"` or `{"primary": ..., "fallbacks": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawModel {
    Name(String),
    Detailed {
        #[serde(default)]
        primary: Option<String>,
        #[serde(default)]
        fallbacks: Vec<String>,
    },
}

impl From<RawModel> for ModelConfig {
    fn from(raw: RawModel) -> Self {
        match raw {
            RawModel::Name(name) => ModelConfig {
                primary: Some(name),
                fallbacks: Vec::new(),
            },
            RawModel::Detailed { primary, fallbacks } => ModelConfig { primary, fallbacks },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    workspace: Option<String>,
    #[serde(default)]
    model: Option<RawModel>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDefaults {
    workspace: Option<String>,
    model: Option<RawModel>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawAgents {
    list: Vec<serde_json::Value>,
    defaults: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOpenClaw {
    agents: RawAgents,
}

impl Roster {
    /// Load the roster; a missing or malformed file is an empty roster.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Malformed agent roster");
                Self::default()
            }),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read agent roster");
                }
                Self::default()
            }
        }
    }

    /// Parse roster JSON. Individual malformed agent entries are skipped.
    pub fn parse(content: &str) -> crate::Result<Self> {
        let raw: RawOpenClaw = serde_json::from_str(content)?;

        let agents = raw
            .agents
            .list
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawAgent>(value) {
                Ok(agent) if !agent.id.is_empty() => Some(agent),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed roster entry");
                    None
                }
            })
            .map(|agent| AgentDescriptor {
                name: agent.name.unwrap_or_else(|| agent.id.clone()),
                id: agent.id,
                role: agent.role,
                workspace: agent.workspace.as_deref().map(expand_home),
                model: agent.model.map(ModelConfig::from),
            })
            .collect();

        let defaults: RawDefaults = raw
            .agents
            .defaults
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Ok(Self {
            agents,
            default_workspace: defaults.workspace.as_deref().map(expand_home),
            default_model: defaults.model.map(ModelConfig::from).unwrap_or_default(),
        })
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Display name of an agent, falling back to its id
    pub fn display_name(&self, id: &str) -> String {
        self.get(id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// `main` if configured, otherwise the first roster entry
    pub fn main_agent_id(&self) -> &str {
        if self.get(MAIN_AGENT_ID).is_some() {
            return MAIN_AGENT_ID;
        }
        self.agents
            .first()
            .map(|a| a.id.as_str())
            .unwrap_or(MAIN_AGENT_ID)
    }

    pub fn workspace_of(&self, agent: &AgentDescriptor) -> Option<PathBuf> {
        agent
            .workspace
            .clone()
            .or_else(|| self.default_workspace.clone())
    }

    pub fn model_of(&self, agent: &AgentDescriptor) -> ModelConfig {
        agent
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Distinct workspaces in roster order
    pub fn workspaces(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.agents
            .iter()
            .filter_map(|a| self.workspace_of(a))
            .chain(self.default_workspace.clone())
            .filter(|ws| seen.insert(ws.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"{
        "agents": {
            "defaults": {"workspace": "/srv/ws-default", "model": {"primary": "glm-4.7", "fallbacks": ["qwen-max"]}},
            "list": [
                {"id": "main", "name": "Coordinator", "workspace": "/srv/ws-main"},
                {"id": "devops", "name": "DevOps", "model": "qwen3-coder"},
                {"name": "no id"},
                {"id": "analyst"}
            ]
        },
        "gateway": {"port": 1}
    }"#;

    #[test]
    fn test_parse_roster() {
        let roster = Roster::parse(ROSTER).unwrap();
        let ids: Vec<_> = roster.agents().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["main", "devops", "analyst"]);
        assert_eq!(roster.display_name("analyst"), "analyst");
        assert_eq!(roster.display_name("ghost"), "ghost");
        assert_eq!(roster.main_agent_id(), "main");
    }

    #[test]
    fn test_model_string_or_object() {
        let roster = Roster::parse(ROSTER).unwrap();
        let devops = roster.get("devops").unwrap();
        assert_eq!(roster.model_of(devops).primary.as_deref(), Some("qwen3-coder"));

        let main = roster.get("main").unwrap();
        let model = roster.model_of(main);
        assert_eq!(model.primary.as_deref(), Some("glm-4.7"));
        assert_eq!(model.fallbacks, vec!["qwen-max".to_string()]);
    }

    #[test]
    fn test_workspaces_dedup_with_defaults() {
        let roster = Roster::parse(ROSTER).unwrap();
        assert_eq!(
            roster.workspaces(),
            vec![PathBuf::from("/srv/ws-main"), PathBuf::from("/srv/ws-default")]
        );
    }

    #[test]
    fn test_main_agent_falls_back_to_first() {
        let roster = Roster::parse(r#"{"agents":{"list":[{"id":"lead"},{"id":"dev"}]}}"#).unwrap();
        assert_eq!(roster.main_agent_id(), "lead");
        assert_eq!(Roster::default().main_agent_id(), "main");
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        assert!(Roster::load(&path).is_empty());

        std::fs::write(&path, "{ nope").unwrap();
        assert!(Roster::load(&path).is_empty());
    }
}
