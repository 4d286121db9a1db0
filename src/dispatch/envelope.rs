//! Typed push-message envelope.
//!
//! Every frame on the socket is a JSON object whose `type` field selects the
//! variant. The enum is closed: a frame with an unknown type fails to decode
//! and gets dropped by the client, it can never reach the session cache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sample of cluster load, appended to a rolling series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyCoresValue {
    pub busy_cores: u32,
}

/// Busy-cores series snapshot pushed by the computation manager.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyCoresSeries {
    pub available_cores: u32,
    #[serde(default)]
    pub values: Vec<BusyCoresValue>,
}

/// Parameters a workflow was created with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreationParams {
    pub base_case_date: Option<String>,
    pub histo_interval: Option<HistoInterval>,
    pub countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoInterval {
    pub start: String,
    pub end: String,
}

/// One row of a workflow-list snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInfo {
    pub workflow_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub running: Option<bool>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub creation_parameters: Option<CreationParams>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PushMessage {
    /// Per-workflow lifecycle status changed.
    #[serde(rename = "status", rename_all = "camelCase")]
    Status { workflow_id: String, status: String },

    /// Server-side connection flag (the socket itself staying open).
    #[serde(rename = "connection")]
    Connection { connected: bool },

    #[serde(rename = "running", rename_all = "camelCase")]
    Running { workflow_id: String, running: bool },

    #[serde(rename = "wcaRunning", rename_all = "camelCase")]
    WcaRunning { workflow_id: String, running: bool },

    /// Per-step status vector of the active run.
    #[serde(rename = "workStatus", rename_all = "camelCase")]
    WorkStatus {
        workflow_id: String,
        status: Value,
    },

    /// Aggregated state/action table. Kept opaque: the dashboard swaps the
    /// whole snapshot, it never reaches into it.
    #[serde(rename = "statesWithActionsSyntesis", rename_all = "camelCase")]
    StatesWithActionsSynthesis {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    #[serde(rename = "statesWithIndexesSyntesis", rename_all = "camelCase")]
    StatesWithIndexesSynthesis {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    #[serde(
        rename = "statesWithSecurityRulesResultSyntesis",
        rename_all = "camelCase"
    )]
    StatesWithSecurityRulesSynthesis {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    #[serde(rename = "busyCores")]
    BusyCores(BusyCoresSeries),

    /// Full workflow-map snapshot (online dashboard).
    #[serde(rename = "workflows")]
    Workflows { workflows: Value },

    #[serde(rename = "selectedWorkFlowInfo", rename_all = "camelCase")]
    SelectedWorkflowInfo {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    #[serde(rename = "wcaContingencies", rename_all = "camelCase")]
    WcaContingencies {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    /// Per-workflow status object (offline dashboard).
    #[serde(rename = "workflowStatus")]
    WorkflowStatus(WorkflowInfo),

    /// Full workflow-list snapshot (offline dashboard).
    #[serde(rename = "workflowList")]
    WorkflowList {
        #[serde(default)]
        workflows: Vec<WorkflowInfo>,
    },

    #[serde(rename = "samplesSynthesis", rename_all = "camelCase")]
    SamplesSynthesis {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    #[serde(rename = "workflowCreation", rename_all = "camelCase")]
    WorkflowCreation {
        workflow_id: String,
        #[serde(default)]
        creation_parameters: Option<CreationParams>,
    },

    #[serde(rename = "workflowRemoval", rename_all = "camelCase")]
    WorkflowRemoval { workflow_id: String },

    #[serde(rename = "securityRuleComputation", rename_all = "camelCase")]
    SecurityRuleComputation {
        workflow_id: String,
        #[serde(flatten)]
        body: Value,
    },

    /// The rule set of a workflow changed; carries the new rule ids.
    #[serde(rename = "securityRulesChange", rename_all = "camelCase")]
    SecurityRulesChange {
        workflow_id: String,
        #[serde(default)]
        rule_ids: Vec<String>,
    },

    #[serde(rename = "securityRulesProgress", rename_all = "camelCase")]
    SecurityRulesProgress {
        workflow_id: String,
        progress: f64,
    },

    /// Login outcome for the identity sent in the handshake.
    #[serde(rename = "login", rename_all = "camelCase")]
    Login {
        #[serde(default)]
        logged: bool,
        #[serde(default)]
        user_name: Option<String>,
        #[serde(default)]
        error_msg: Option<String>,
    },
}

impl PushMessage {
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("decoding push message")
    }

    /// Workflow the message is scoped to, `None` for session-wide messages.
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            PushMessage::Status { workflow_id, .. }
            | PushMessage::Running { workflow_id, .. }
            | PushMessage::WcaRunning { workflow_id, .. }
            | PushMessage::WorkStatus { workflow_id, .. }
            | PushMessage::StatesWithActionsSynthesis { workflow_id, .. }
            | PushMessage::StatesWithIndexesSynthesis { workflow_id, .. }
            | PushMessage::StatesWithSecurityRulesSynthesis { workflow_id, .. }
            | PushMessage::SelectedWorkflowInfo { workflow_id, .. }
            | PushMessage::WcaContingencies { workflow_id, .. }
            | PushMessage::SamplesSynthesis { workflow_id, .. }
            | PushMessage::WorkflowCreation { workflow_id, .. }
            | PushMessage::WorkflowRemoval { workflow_id }
            | PushMessage::SecurityRuleComputation { workflow_id, .. }
            | PushMessage::SecurityRulesChange { workflow_id, .. }
            | PushMessage::SecurityRulesProgress { workflow_id, .. } => Some(workflow_id),
            PushMessage::WorkflowStatus(info) => Some(&info.workflow_id),
            PushMessage::Connection { .. }
            | PushMessage::BusyCores(_)
            | PushMessage::Workflows { .. }
            | PushMessage::WorkflowList { .. }
            | PushMessage::Login { .. } => None,
        }
    }
}
