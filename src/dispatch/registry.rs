//! Session cache: the client-side mirror of the server's workflow state.
//!
//! All mutation goes through `Session::apply`, one message at a time, on the
//! client's read task. Each handler is a per-message delta against the cache
//! and reports what changed so consumers can redraw selectively.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::dispatch::envelope::{BusyCoresSeries, CreationParams, PushMessage, WorkflowInfo};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub status: Option<String>,
    pub running: bool,
    pub wca_running: bool,
    pub step: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<u64>,
    pub creation_parameters: Option<CreationParams>,
    /// Latest snapshots, kept opaque and swapped wholesale.
    pub work_status: Option<Value>,
    pub states_with_actions: Option<Value>,
    pub states_with_indexes: Option<Value>,
    pub states_with_security_rules: Option<Value>,
    pub samples_synthesis: Option<Value>,
    pub wca_contingencies: Option<Value>,
    pub security_rule_computation: Option<Value>,
    pub security_rule_ids: Vec<String>,
    pub security_rules_progress: Option<f64>,
}

impl Workflow {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// What a consumer should refresh after one message was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Connection { connected: bool },
    Login { logged: bool },
    WorkflowChanged { workflow_id: String },
    WorkflowCreated { workflow_id: String },
    WorkflowRemoved { workflow_id: String },
    WorkflowListReplaced { count: usize },
    BusyCores { busy: u32, available: u32 },
    /// The socket went away; the session cache has been cleared.
    Disconnected,
}

#[derive(Debug, Default)]
pub struct Session {
    pub connected: bool,
    pub current_user: Option<String>,
    pub login_error: Option<String>,
    pub selected_workflow: Option<String>,
    pub workflows: BTreeMap<String, Workflow>,
    pub busy_cores: Option<BusyCoresSeries>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(&self, id: &str) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Apply one decoded message. Returns `None` when nothing changed, e.g.
    /// a delta for a workflow the cache does not know about.
    pub fn apply(&mut self, msg: PushMessage) -> Option<Update> {
        match msg {
            PushMessage::Connection { connected } => {
                self.connected = connected;
                Some(Update::Connection { connected })
            }
            PushMessage::Login {
                logged,
                user_name,
                error_msg,
            } => {
                if logged {
                    self.current_user = user_name;
                    self.login_error = None;
                } else {
                    self.current_user = None;
                    self.login_error = error_msg;
                }
                Some(Update::Login { logged })
            }
            PushMessage::BusyCores(series) => {
                let busy = series.values.last().map(|v| v.busy_cores).unwrap_or(0);
                let available = series.available_cores;
                self.busy_cores = Some(series);
                Some(Update::BusyCores { busy, available })
            }
            PushMessage::Status {
                workflow_id,
                status,
            } => self.update_existing(&workflow_id, |wf| wf.status = Some(status)),
            PushMessage::Running {
                workflow_id,
                running,
            } => self.update_existing(&workflow_id, |wf| wf.running = running),
            PushMessage::WcaRunning {
                workflow_id,
                running,
            } => self.update_existing(&workflow_id, |wf| wf.wca_running = running),
            PushMessage::WorkStatus {
                workflow_id,
                status,
            } => self.update_existing(&workflow_id, |wf| wf.work_status = Some(status)),
            PushMessage::StatesWithActionsSynthesis { workflow_id, body } => {
                self.update_existing(&workflow_id, |wf| wf.states_with_actions = Some(body))
            }
            PushMessage::StatesWithIndexesSynthesis { workflow_id, body } => {
                self.update_existing(&workflow_id, |wf| wf.states_with_indexes = Some(body))
            }
            PushMessage::StatesWithSecurityRulesSynthesis { workflow_id, body } => self
                .update_existing(&workflow_id, |wf| {
                    wf.states_with_security_rules = Some(body)
                }),
            PushMessage::SamplesSynthesis { workflow_id, body } => {
                self.update_existing(&workflow_id, |wf| wf.samples_synthesis = Some(body))
            }
            PushMessage::WcaContingencies { workflow_id, body } => {
                self.update_existing(&workflow_id, |wf| wf.wca_contingencies = Some(body))
            }
            PushMessage::SecurityRuleComputation { workflow_id, body } => self
                .update_existing(&workflow_id, |wf| {
                    wf.security_rule_computation = Some(body)
                }),
            PushMessage::SecurityRulesChange {
                workflow_id,
                rule_ids,
            } => self.update_existing(&workflow_id, |wf| wf.security_rule_ids = rule_ids),
            PushMessage::SecurityRulesProgress {
                workflow_id,
                progress,
            } => self.update_existing(&workflow_id, |wf| {
                wf.security_rules_progress = Some(progress)
            }),
            PushMessage::SelectedWorkflowInfo { workflow_id, .. } => {
                self.selected_workflow = Some(workflow_id.clone());
                Some(Update::WorkflowChanged { workflow_id })
            }
            PushMessage::WorkflowStatus(info) => {
                let id = info.workflow_id.clone();
                let wf = self
                    .workflows
                    .entry(id.clone())
                    .or_insert_with(|| Workflow::new(&id));
                merge_info(wf, info);
                Some(Update::WorkflowChanged { workflow_id: id })
            }
            PushMessage::Workflows { workflows } => {
                self.replace_from_snapshot(&workflows);
                Some(Update::WorkflowListReplaced {
                    count: self.workflows.len(),
                })
            }
            PushMessage::WorkflowList { workflows } => {
                self.workflows.clear();
                for info in workflows {
                    let id = info.workflow_id.clone();
                    let mut wf = Workflow::new(&id);
                    merge_info(&mut wf, info);
                    self.workflows.insert(id, wf);
                }
                Some(Update::WorkflowListReplaced {
                    count: self.workflows.len(),
                })
            }
            PushMessage::WorkflowCreation {
                workflow_id,
                creation_parameters,
            } => {
                let mut wf = Workflow::new(&workflow_id);
                wf.creation_parameters = creation_parameters;
                self.workflows.insert(workflow_id.clone(), wf);
                Some(Update::WorkflowCreated { workflow_id })
            }
            PushMessage::WorkflowRemoval { workflow_id } => {
                self.workflows.remove(&workflow_id)?;
                if self.selected_workflow.as_deref() == Some(workflow_id.as_str()) {
                    self.selected_workflow = None;
                }
                Some(Update::WorkflowRemoved { workflow_id })
            }
        }
    }

    fn update_existing(
        &mut self,
        workflow_id: &str,
        f: impl FnOnce(&mut Workflow),
    ) -> Option<Update> {
        let wf = self.workflows.get_mut(workflow_id)?;
        f(wf);
        Some(Update::WorkflowChanged {
            workflow_id: workflow_id.to_string(),
        })
    }

    /// Online-dashboard snapshot: an object keyed by workflow id, each value
    /// at least carrying a status.
    fn replace_from_snapshot(&mut self, snapshot: &Value) {
        self.workflows.clear();
        if let Some(map) = snapshot.as_object() {
            for (id, entry) in map {
                let mut wf = Workflow::new(id);
                wf.status = entry
                    .get("status")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                wf.running = entry
                    .get("running")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                self.workflows.insert(id.clone(), wf);
            }
        }
    }

    /// Drop everything tied to the connection. Called when the socket
    /// closes; the next session starts from an empty cache.
    pub fn clear(&mut self) {
        self.connected = false;
        self.current_user = None;
        self.login_error = None;
        self.selected_workflow = None;
        self.workflows.clear();
        self.busy_cores = None;
    }
}

fn merge_info(wf: &mut Workflow, info: WorkflowInfo) {
    if info.status.is_some() {
        wf.status = info.status;
    }
    if let Some(running) = info.running {
        wf.running = running;
    }
    if info.step.is_some() {
        wf.step = info.step;
    }
    if info.start_time.is_some() {
        wf.start_time = info.start_time;
    }
    if info.duration.is_some() {
        wf.duration = info.duration;
    }
    if info.creation_parameters.is_some() {
        wf.creation_parameters = info.creation_parameters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_msg(id: &str, status: &str) -> PushMessage {
        PushMessage::Status {
            workflow_id: id.to_string(),
            status: status.to_string(),
        }
    }

    fn session_with(ids: &[&str]) -> Session {
        let mut session = Session::new();
        for id in ids {
            session.apply(PushMessage::WorkflowCreation {
                workflow_id: id.to_string(),
                creation_parameters: None,
            });
        }
        session
    }

    #[test]
    fn status_updates_are_scoped_to_one_workflow() {
        let mut session = session_with(&["wf-1", "wf-2"]);
        session.apply(status_msg("wf-1", "RUNNING"));
        session.apply(status_msg("wf-2", "IDLE"));
        assert_eq!(session.workflow("wf-1").unwrap().status.as_deref(), Some("RUNNING"));
        assert_eq!(session.workflow("wf-2").unwrap().status.as_deref(), Some("IDLE"));

        session.apply(status_msg("wf-1", "DONE"));
        assert_eq!(session.workflow("wf-1").unwrap().status.as_deref(), Some("DONE"));
        assert_eq!(session.workflow("wf-2").unwrap().status.as_deref(), Some("IDLE"));
    }

    #[test]
    fn status_for_unknown_workflow_changes_nothing() {
        let mut session = session_with(&["wf-1"]);
        let update = session.apply(status_msg("wf-9", "RUNNING"));
        assert_eq!(update, None);
        assert_eq!(session.workflows.len(), 1);
        assert!(session.workflow("wf-1").unwrap().status.is_none());
    }

    #[test]
    fn creation_and_removal_lifecycle() {
        let mut session = Session::new();
        let created = session.apply(PushMessage::WorkflowCreation {
            workflow_id: "wf-3".to_string(),
            creation_parameters: None,
        });
        assert_eq!(
            created,
            Some(Update::WorkflowCreated {
                workflow_id: "wf-3".to_string()
            })
        );
        assert!(session.workflow("wf-3").is_some());

        let removed = session.apply(PushMessage::WorkflowRemoval {
            workflow_id: "wf-3".to_string(),
        });
        assert_eq!(
            removed,
            Some(Update::WorkflowRemoved {
                workflow_id: "wf-3".to_string()
            })
        );
        assert!(session.workflow("wf-3").is_none());

        // Removing again is a no-op.
        let again = session.apply(PushMessage::WorkflowRemoval {
            workflow_id: "wf-3".to_string(),
        });
        assert_eq!(again, None);
    }

    #[test]
    fn list_snapshot_replaces_the_registry() {
        let mut session = session_with(&["stale"]);
        let update = session.apply(PushMessage::WorkflowList {
            workflows: vec![
                WorkflowInfo {
                    workflow_id: "wf-1".to_string(),
                    status: Some("IDLE".to_string()),
                    running: None,
                    step: None,
                    start_time: None,
                    duration: None,
                    creation_parameters: None,
                },
                WorkflowInfo {
                    workflow_id: "wf-2".to_string(),
                    status: None,
                    running: Some(true),
                    step: Some("sampling".to_string()),
                    start_time: Some("2013-01-15T18:45:00".to_string()),
                    duration: Some(120),
                    creation_parameters: None,
                },
            ],
        });
        assert_eq!(update, Some(Update::WorkflowListReplaced { count: 2 }));
        assert!(session.workflow("stale").is_none());
        assert!(session.workflow("wf-2").unwrap().running);
        assert_eq!(session.workflow("wf-2").unwrap().duration, Some(120));
    }

    #[test]
    fn online_snapshot_replaces_from_object_keys() {
        let mut session = Session::new();
        let snapshot: Value = serde_json::json!({
            "wf-a": {"status": "RUNNING", "running": true},
            "wf-b": {"status": "IDLE"}
        });
        session.apply(PushMessage::Workflows {
            workflows: snapshot,
        });
        assert_eq!(session.workflows.len(), 2);
        assert!(session.workflow("wf-a").unwrap().running);
        assert_eq!(session.workflow("wf-b").unwrap().status.as_deref(), Some("IDLE"));
    }

    #[test]
    fn login_success_and_failure() {
        let mut session = Session::new();
        session.apply(PushMessage::Login {
            logged: true,
            user_name: Some("operator".to_string()),
            error_msg: None,
        });
        assert_eq!(session.current_user.as_deref(), Some("operator"));

        session.apply(PushMessage::Login {
            logged: false,
            user_name: None,
            error_msg: Some("bad password".to_string()),
        });
        assert_eq!(session.current_user, None);
        assert_eq!(session.login_error.as_deref(), Some("bad password"));
    }

    #[test]
    fn clear_drops_all_session_state() {
        let mut session = session_with(&["wf-1"]);
        session.apply(PushMessage::Connection { connected: true });
        session.apply(PushMessage::Login {
            logged: true,
            user_name: Some("operator".to_string()),
            error_msg: None,
        });
        session.clear();
        assert!(!session.connected);
        assert!(session.current_user.is_none());
        assert!(session.workflows.is_empty());
        assert!(session.busy_cores.is_none());
    }

    #[test]
    fn busy_cores_reports_latest_sample() {
        let mut session = Session::new();
        let update = session.apply(PushMessage::BusyCores(BusyCoresSeries {
            available_cores: 8,
            values: vec![
                crate::dispatch::envelope::BusyCoresValue { busy_cores: 2 },
                crate::dispatch::envelope::BusyCoresValue { busy_cores: 6 },
            ],
        }));
        assert_eq!(
            update,
            Some(Update::BusyCores {
                busy: 6,
                available: 8
            })
        );
    }
}
