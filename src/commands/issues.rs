use serde_json::{json, Map, Value};

use super::{
    AddToEpicArgs, AssignArgs, CommentArgs, CreateArgs, LabelArgs, OpenArgs, OutputFormat,
    Session, ShowArgs, TransitionArgs,
};
use crate::errors::ShellError;
use crate::projection::{browse_url, project_issue, FieldMap};
use crate::render::{highlight_yaml, json as render_json, yaml};
use crate::repl::ShellIo;
use crate::shell::launch_browser;
use crate::types::IssueType;

/// Projected fields that describe where an issue lives rather than what it
/// is, so they are not copied by `clone` and `move`.
pub(crate) const NON_COPYABLE_FIELDS: [&str; 5] = ["key", "reporter", "sprint", "status", "url"];

impl Session<'_> {
    fn print_yaml<T: serde::Serialize>(
        &self,
        value: &T,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let text = yaml(value)?;
        if self.highlight {
            io.write_out(&highlight_yaml(&text))?;
        } else {
            io.write_out(&text)?;
        }
        Ok(())
    }

    fn print_issue(&self, issue: &Value, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let record = project_issue(&self.config.field_map, issue, self.tracker.server_url());
        self.print_yaml(&record, io)
    }

    pub(super) fn show(&mut self, args: &ShowArgs, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let issue = self.tracker.issue(&args.id)?;
        let record = project_issue(&self.config.field_map, &issue, self.tracker.server_url());
        match args.output {
            OutputFormat::Yaml => self.print_yaml(&record, io),
            OutputFormat::Json => {
                io.write_out(&render_json(&record)?)?;
                Ok(())
            }
        }
    }

    pub(super) fn create(
        &mut self,
        args: &CreateArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let issue_type = IssueType::parse(&args.issuetype).ok_or_else(|| {
            ShellError::usage(format!(
                "unknown issue type {:?}; expected one of {}",
                args.issuetype,
                IssueType::NAMES.join(", ")
            ))
        })?;
        let project = args
            .project
            .as_deref()
            .unwrap_or(&self.config.tracker.default_project);

        let mut fields = Map::new();
        fields.insert("project".to_string(), json!({ "key": project }));
        fields.insert("summary".to_string(), json!(args.summary));
        fields.insert("description".to_string(), json!(args.description));
        fields.insert(
            "issuetype".to_string(),
            json!({ "name": issue_type.tracker_name() }),
        );
        if let Some(assignee) = &args.assignee {
            fields.insert(
                "assignee".to_string(),
                json!({ "accountId": self.users.resolve(assignee) }),
            );
        }
        match (issue_type, &args.epicname) {
            (IssueType::Epic, Some(name)) => {
                fields.insert(self.config.tracker.epic_name_field.clone(), json!(name));
            }
            (IssueType::Epic, None) => {
                return Err(ShellError::usage("--epicname is required when creating an epic"));
            }
            _ => {}
        }

        let created = self.tracker.create_issue(fields)?;
        self.print_issue(&created, io)
    }

    pub(super) fn open(&mut self, args: &OpenArgs, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let url = browse_url(self.tracker.server_url(), &args.id);
        launch_browser(&args.browser, &url, self.logger)?;
        io.write_out(&format!("{}\n", url))?;
        Ok(())
    }

    pub(super) fn delete(&mut self, id: &str, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        self.tracker.delete_issue(id)?;
        io.write_out(&format!("Deleted {}\n", id))?;
        Ok(())
    }

    /// Creates a copy of `id` from its projected fields, optionally in another
    /// project. Field-map names are used as the tracker field ids.
    pub(super) fn clone_issue(
        &mut self,
        id: &str,
        project: Option<&str>,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let issue = self.tracker.issue(id)?;
        let copyable: FieldMap = self.config.field_map.without(&NON_COPYABLE_FIELDS);
        let mut fields = copyable.project(&issue).into_fields();
        let project = match project {
            Some(project) => json!({ "key": project }),
            None => issue
                .pointer("/fields/project/key")
                .map(|key| json!({ "key": key }))
                .unwrap_or_else(|| json!({ "key": self.config.tracker.default_project })),
        };
        fields.insert("project".to_string(), project);
        if !fields.contains_key("issuetype") {
            if let Some(name) = issue.pointer("/fields/issuetype/name") {
                fields.insert("issuetype".to_string(), json!({ "name": name }));
            }
        }
        let created = self.tracker.create_issue(fields)?;
        self.print_issue(&created, io)
    }

    pub(super) fn assign(
        &mut self,
        args: &AssignArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let account = self.users.resolve(&args.nick);
        self.tracker.assign_issue(&args.id, account)?;
        io.write_out(&format!("Assigned {} to {}\n", args.id, args.nick))?;
        Ok(())
    }

    pub(super) fn comment(
        &mut self,
        args: &CommentArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let body = self.users.rewrite_mentions(&args.comment);
        let created = self.tracker.add_comment(&args.id, &body)?;
        self.print_yaml(&FieldMap::comment_map().project(&created), io)
    }

    pub(super) fn comments(&mut self, id: &str, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let map = FieldMap::comment_map();
        for comment in self.tracker.comments(id)? {
            io.write_out("---\n")?;
            self.print_yaml(&map.project(&comment), io)?;
        }
        Ok(())
    }

    pub(super) fn transition(
        &mut self,
        args: &TransitionArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let Some(target) = self.config.transitions.get(&args.transition) else {
            let known: Vec<&str> = self.config.transitions.keys().map(String::as_str).collect();
            return Err(ShellError::usage(format!(
                "unknown transition {:?}; configured transitions: {}",
                args.transition,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            )));
        };
        self.tracker.transition_issue(&args.id, target)?;
        if !args.comment.trim().is_empty() {
            let body = self.users.rewrite_mentions(&args.comment);
            self.tracker.add_comment(&args.id, &body)?;
        }
        io.write_out(&format!("{} -> {}\n", args.id, target))?;
        Ok(())
    }

    /// Appends labels, keeping existing ones and skipping duplicates.
    pub(super) fn label(&mut self, args: &LabelArgs, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let issue = self.tracker.issue(&args.id)?;
        let mut labels: Vec<String> = issue
            .pointer("/fields/labels")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for label in args.labels.split(',').map(str::trim) {
            if !label.is_empty() && !labels.iter().any(|existing| existing == label) {
                labels.push(label.to_string());
            }
        }

        let mut fields = Map::new();
        fields.insert("labels".to_string(), json!(labels));
        self.tracker.update_issue(&args.id, fields)?;
        io.write_out(&format!("{}: {}\n", args.id, labels.join(",")))?;
        Ok(())
    }

    pub(super) fn add_to_epic(
        &mut self,
        args: &AddToEpicArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        self.tracker.add_issues_to_epic(&args.epic, &args.ids)?;
        io.write_out(&format!("Added {} to {}\n", args.ids.join(", "), args.epic))?;
        Ok(())
    }
}
