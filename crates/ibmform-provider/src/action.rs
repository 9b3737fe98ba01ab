//! Plan and apply result types

use crate::schema::AttributeChange;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A planned action for one resource or data source address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Address in the manifest (e.g. "ibm_is_vpc.main", "data.ibm_is_image.ubuntu")
    pub address: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "ibm_is_vpc")
    pub resource_type: String,

    /// Remote id when the resource already exists
    pub resource_id: Option<String>,

    /// Description of the action
    pub description: String,

    /// Attribute changes driving the action
    pub changes: Vec<AttributeChange>,

    /// Data source attributes already read while planning, `id` included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_result: Option<Map<String, Value>>,
}

impl Action {
    pub fn new(
        address: impl Into<String>,
        action_type: ActionType,
        resource_type: impl Into<String>,
    ) -> Self {
        let address = address.into();
        Self {
            description: format!("{} {}", action_type, address),
            address,
            action_type,
            resource_type: resource_type.into(),
            resource_id: None,
            changes: Vec::new(),
            read_result: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_changes(mut self, changes: Vec<AttributeChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_read_result(mut self, id: &str, attributes: &Map<String, Value>) -> Self {
        let mut read = attributes.clone();
        read.insert("id".into(), Value::String(id.to_string()));
        self.read_result = Some(read);
        self
    }

    /// Attributes forcing a replacement
    pub fn replace_reasons(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.requires_replace)
            .map(|c| c.path.as_str())
            .collect()
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and re-create a resource
    Replace,
    /// Delete a resource
    Delete,
    /// Read a data source
    Read,
    /// No changes needed
    NoOp,
}

impl ActionType {
    pub fn symbol(&self) -> &'static str {
        match self {
            ActionType::Create => "+",
            ActionType::Update => "~",
            ActionType::Replace => "-/+",
            ActionType::Delete => "-",
            ActionType::Read => "<=",
            ActionType::NoOp => " ",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::Read => write!(f, "read"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Actions not attempted because something they depend on failed
    pub skipped: Vec<String>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn add_success(&mut self, address: String, message: String) {
        self.succeeded.push(ActionResult {
            address,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, address: String, error: String) {
        self.failed.push(ActionResult {
            address,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }

    pub fn add_skipped(&mut self, address: String) {
        self.skipped.push(address);
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Address of the resource acted on
    pub address: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions in execution order
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions
            .iter()
            .any(|a| !matches!(a.action_type, ActionType::NoOp | ActionType::Read));
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn get(&self, address: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.address == address)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            read: self.actions_by_type(ActionType::Read).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub read: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
