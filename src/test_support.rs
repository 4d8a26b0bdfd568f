//! In-memory tracker and CI doubles shared by the unit tests.

use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::ci::CiScheduleClient;
use crate::errors::RemoteError;
use crate::tracker::TrackerClient;
use crate::types::{
    Board, NewSchedule, PipelineSchedule, ScheduleVariable, Sprint, SprintState,
};

pub(crate) const SERVER: &str = "https://tracker.example.com";

pub(crate) fn board(id: u64, name: &str) -> Board {
    Board {
        id,
        name: name.to_string(),
    }
}

pub(crate) fn sprint(id: u64, name: &str, state: SprintState) -> Sprint {
    Sprint {
        id,
        name: name.to_string(),
        state,
        board_id: None,
    }
}

pub(crate) fn issue(key: &str, summary: &str) -> Value {
    json!({
        "key": key,
        "fields": {
            "summary": summary,
            "labels": [],
            "status": {"name": "Open"},
            "project": {"key": key.split('-').next().unwrap_or(key)},
            "issuetype": {"name": "Task"}
        }
    })
}

fn status_error(service: &'static str, path: &str, code: u16) -> RemoteError {
    match code {
        401 => RemoteError::Unauthorized { service },
        403 => RemoteError::Forbidden {
            service,
            path: path.to_string(),
        },
        404 => RemoteError::NotFound {
            service,
            path: path.to_string(),
        },
        _ => RemoteError::Status {
            service,
            path: path.to_string(),
            code,
            body: String::new(),
        },
    }
}

#[derive(Default)]
pub(crate) struct FakeTracker {
    boards: RefCell<Vec<(Board, Result<Vec<Sprint>, u16>)>>,
    boards_fail: bool,
    sprint_creation_fails: bool,
    search_results: Vec<Value>,
    issues: RefCell<BTreeMap<String, Value>>,
    json: BTreeMap<String, Value>,
    comments: BTreeMap<String, Vec<Value>>,
    calls: RefCell<Vec<String>>,
    next_id: Cell<u64>,
}

impl FakeTracker {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(100),
            ..Self::default()
        }
    }

    pub(crate) fn with_board(mut self, board: Board, sprints: Result<Vec<Sprint>, u16>) -> Self {
        self.boards.get_mut().push((board, sprints));
        self
    }

    pub(crate) fn failing_boards(mut self) -> Self {
        self.boards_fail = true;
        self
    }

    pub(crate) fn failing_sprint_creation(mut self) -> Self {
        self.sprint_creation_fails = true;
        self
    }

    pub(crate) fn with_search_results(mut self, results: Vec<Value>) -> Self {
        self.search_results = results;
        self
    }

    pub(crate) fn with_issue(self, issue: Value) -> Self {
        let key = issue["key"].as_str().unwrap_or_default().to_string();
        self.issues.borrow_mut().insert(key, issue);
        self
    }

    pub(crate) fn with_json(mut self, path: &str, value: Value) -> Self {
        self.json.insert(path.to_string(), value);
        self
    }

    pub(crate) fn with_comments(mut self, key: &str, comments: Vec<Value>) -> Self {
        self.comments.insert(key.to_string(), comments);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls other than the read-only cache refresh ones.
    pub(crate) fn command_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("boards") && !call.starts_with("sprints "))
            .collect()
    }

    pub(crate) fn stored_issue(&self, key: &str) -> Option<Value> {
        self.issues.borrow().get(key).cloned()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn lookup(&self, key: &str) -> Result<Value, RemoteError> {
        self.issues
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| status_error("tracker", &format!("/rest/api/2/issue/{}", key), 404))
    }
}

impl TrackerClient for FakeTracker {
    fn server_url(&self) -> &str {
        SERVER
    }

    fn boards(&self) -> Result<Vec<Board>, RemoteError> {
        self.record("boards".to_string());
        if self.boards_fail {
            return Err(status_error("tracker", "/rest/agile/1.0/board", 500));
        }
        Ok(self
            .boards
            .borrow()
            .iter()
            .map(|(board, _)| board.clone())
            .collect())
    }

    fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>, RemoteError> {
        self.record(format!("sprints {}", board_id));
        match self.boards.borrow().iter().find(|(board, _)| board.id == board_id) {
            Some((_, Ok(sprints))) => Ok(sprints.clone()),
            Some((_, Err(code))) => Err(status_error(
                "tracker",
                &format!("/rest/agile/1.0/board/{}/sprint", board_id),
                *code,
            )),
            None => Ok(Vec::new()),
        }
    }

    fn search_issues(&self, jql: &str, max_results: u32) -> Result<Vec<Value>, RemoteError> {
        self.record(format!("search {} max={}", jql, max_results));
        Ok(self
            .search_results
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    fn issue(&self, key: &str) -> Result<Value, RemoteError> {
        self.record(format!("issue {}", key));
        self.lookup(key)
    }

    fn create_issue(&self, fields: Map<String, Value>) -> Result<Value, RemoteError> {
        let fields = Value::Object(fields);
        self.record(format!("create {}", fields));
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let project = fields
            .pointer("/project/key")
            .and_then(Value::as_str)
            .unwrap_or("NEW")
            .to_string();
        let key = format!("{}-{}", project, id);
        let created = json!({ "key": key, "fields": fields });
        self.issues.borrow_mut().insert(key, created.clone());
        Ok(created)
    }

    fn update_issue(&self, key: &str, fields: Map<String, Value>) -> Result<(), RemoteError> {
        self.record(format!("update {} {}", key, Value::Object(fields.clone())));
        let mut issue = self.lookup(key)?;
        if let Some(existing) = issue.get_mut("fields").and_then(Value::as_object_mut) {
            existing.extend(fields);
        }
        self.issues.borrow_mut().insert(key.to_string(), issue);
        Ok(())
    }

    fn delete_issue(&self, key: &str) -> Result<(), RemoteError> {
        self.record(format!("delete {}", key));
        self.lookup(key)?;
        self.issues.borrow_mut().remove(key);
        Ok(())
    }

    fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        self.record(format!("get {}", path));
        self.json
            .get(path)
            .cloned()
            .ok_or_else(|| status_error("tracker", path, 404))
    }

    fn comments(&self, key: &str) -> Result<Vec<Value>, RemoteError> {
        self.record(format!("comments {}", key));
        Ok(self.comments.get(key).cloned().unwrap_or_default())
    }

    fn add_comment(&self, key: &str, body: &str) -> Result<Value, RemoteError> {
        self.record(format!("comment {} {}", key, body));
        Ok(json!({"id": "1", "body": body}))
    }

    fn transition_issue(&self, key: &str, transition: &str) -> Result<(), RemoteError> {
        self.record(format!("transition {} {}", key, transition));
        Ok(())
    }

    fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), RemoteError> {
        self.record(format!("assign {} {}", key, account_id));
        Ok(())
    }

    fn add_issues_to_sprint(&self, sprint_id: u64, keys: &[String]) -> Result<(), RemoteError> {
        self.record(format!("sprint_add {} {}", sprint_id, keys.join(",")));
        Ok(())
    }

    fn add_issues_to_epic(&self, epic: &str, keys: &[String]) -> Result<(), RemoteError> {
        self.record(format!("epic_add {} {}", epic, keys.join(",")));
        Ok(())
    }

    fn update_sprint_state(&self, sprint_id: u64, state: &str) -> Result<(), RemoteError> {
        self.record(format!("sprint_state {} {}", sprint_id, state));
        for (_, sprints) in self.boards.borrow_mut().iter_mut() {
            if let Ok(sprints) = sprints {
                for sprint in sprints.iter_mut().filter(|sprint| sprint.id == sprint_id) {
                    sprint.state = SprintState::parse(state);
                }
            }
        }
        Ok(())
    }

    fn create_sprint(&self, board_id: u64, name: &str) -> Result<Sprint, RemoteError> {
        self.record(format!("create_sprint {} {}", board_id, name));
        if self.sprint_creation_fails {
            return Err(status_error("tracker", "/rest/agile/1.0/sprint", 400));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(Sprint {
            id,
            name: name.to_string(),
            state: SprintState::Future,
            board_id: Some(board_id),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeCi {
    schedules: RefCell<Vec<PipelineSchedule>>,
    fail: bool,
    calls: RefCell<Vec<String>>,
    next_id: Cell<u64>,
}

impl FakeCi {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(50),
            ..Self::default()
        }
    }

    pub(crate) fn with_schedule(self, id: u64, description: &str) -> Self {
        self.schedules.borrow_mut().push(PipelineSchedule {
            id,
            description: description.to_string(),
            git_ref: "main".to_string(),
            cron: "0 0 * * *".to_string(),
            variables: Vec::new(),
        });
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn schedules(&self) -> Vec<PipelineSchedule> {
        self.schedules.borrow().clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn variable(&self, schedule_id: u64, key: &str) -> Option<String> {
        self.schedules
            .borrow()
            .iter()
            .find(|schedule| schedule.id == schedule_id)
            .and_then(|schedule| schedule.variables.iter().find(|v| v.key == key))
            .map(|variable| variable.value.clone())
    }
}

impl CiScheduleClient for FakeCi {
    fn list_schedules(&self, project: &str) -> Result<Vec<PipelineSchedule>, RemoteError> {
        self.calls.borrow_mut().push(format!("list {}", project));
        if self.fail {
            return Err(status_error("CI", "/projects/x/pipeline_schedules", 500));
        }
        let mut schedules = self.schedules();
        for schedule in &mut schedules {
            schedule.variables.clear();
        }
        Ok(schedules)
    }

    fn schedule(&self, project: &str, schedule_id: u64) -> Result<PipelineSchedule, RemoteError> {
        self.calls
            .borrow_mut()
            .push(format!("get {} {}", project, schedule_id));
        self.schedules()
            .into_iter()
            .find(|schedule| schedule.id == schedule_id)
            .ok_or_else(|| status_error("CI", "/projects/x/pipeline_schedules/id", 404))
    }

    fn create_schedule(
        &self,
        project: &str,
        schedule: &NewSchedule,
    ) -> Result<PipelineSchedule, RemoteError> {
        self.calls
            .borrow_mut()
            .push(format!("create {} {}", project, schedule.description));
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let created = PipelineSchedule {
            id,
            description: schedule.description.clone(),
            git_ref: schedule.git_ref.clone(),
            cron: schedule.cron.clone(),
            variables: Vec::new(),
        };
        self.schedules.borrow_mut().push(created.clone());
        Ok(created)
    }

    fn upsert_variable(
        &self,
        project: &str,
        schedule_id: u64,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError> {
        self.calls
            .borrow_mut()
            .push(format!("variable {} {} {}={}", project, schedule_id, key, value));
        let mut schedules = self.schedules.borrow_mut();
        let schedule = schedules
            .iter_mut()
            .find(|schedule| schedule.id == schedule_id)
            .ok_or_else(|| status_error("CI", "/variables", 404))?;
        match schedule.variables.iter_mut().find(|v| v.key == key) {
            Some(variable) => variable.value = value.to_string(),
            None => schedule.variables.push(ScheduleVariable {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }
}

pub(crate) const CONFIG_YAML: &str = r#"
tracker:
  server: "https://tracker.example.com"
  username: "me@example.com"
  token: "secret"
  default_project: "APP"
  sprint_name_format: "Sprint %Y-%m-%d"
users:
  ada: "acc-ada"
  bob: "acc-bob"
field_map:
  key: key
  summary: fields.summary
  status: fields.status.name
  labels: fields.labels
  project: fields.project
  issuetype: fields.issuetype
transitions:
  start: "In Progress"
  done: "Done"
ci:
  token: "ci-secret"
  project: "qa/testing"
"#;

pub(crate) fn config() -> crate::config::Config {
    serde_yaml::from_str(CONFIG_YAML).expect("test config parses")
}
