use chrono::format::{Item, StrftimeItems};
use chrono::Local;

use super::{AddToSprintArgs, MySprintArgs, RollSprintArgs, Session, SprintsArgs};
use crate::errors::ShellError;
use crate::logger::sanitize_log_value;
use crate::query::{Ordering, QueryIntent, SPRINT_STATUSES};
use crate::render::{scalar, table};
use crate::repl::ShellIo;
use crate::types::{IssueType, Sprint, SprintRef};

const WAITING_FOR_QA: &str = "status = \"Waiting for QA\"";

impl Session<'_> {
    pub(super) fn sprints(
        &mut self,
        args: &SprintsArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let sprint = self.active_sprint()?;
        let mut intent = QueryIntent::sprint(sprint.id)
            .with_statuses(SPRINT_STATUSES)
            .with_assignee(self.users.resolve(&args.assignee));
        if let Some(project) = &args.project {
            intent = intent.with_project(project);
        }
        if let Some(issue_type) = args.issuetype.as_deref().and_then(IssueType::parse) {
            intent = intent.with_predicate(format!(
                "issuetype = \"{}\"",
                issue_type.tracker_name()
            ));
        }
        self.sprint_listing(&sprint, &intent, io)
    }

    pub(super) fn current_sprint(
        &mut self,
        predicate: &str,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let sprint = self.active_sprint()?;
        let intent = QueryIntent::sprint(sprint.id)
            .with_statuses(SPRINT_STATUSES)
            .with_predicate(predicate);
        self.sprint_listing(&sprint, &intent, io)
    }

    pub(super) fn my_sprint(
        &mut self,
        args: &MySprintArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let sprint = self.active_sprint()?;
        let mut intent = QueryIntent::sprint(sprint.id).with_assignee("currentUser()");
        match args.query.as_deref() {
            Some(query) => intent = intent.with_predicate(query),
            None if !args.all => intent = intent.with_statuses(SPRINT_STATUSES),
            None => {}
        }
        self.sprint_listing(&sprint, &intent, io)
    }

    /// Numbered key/summary listing of one sprint.
    fn sprint_listing(
        &self,
        sprint: &Sprint,
        intent: &QueryIntent,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let jql = intent.build(&Ordering::UpdatedThenCreated);
        io.write_out(&format!("{}\n", jql))?;
        let issues = self
            .tracker
            .search_issues(&jql, self.config.limits.sprint)?;
        io.write_out(&format!("Current Sprint : {}\n", sprint))?;
        let rows: Vec<Vec<String>> = issues
            .iter()
            .enumerate()
            .map(|(index, issue)| {
                vec![
                    index.to_string(),
                    scalar(issue.get("key")),
                    scalar(issue.pointer("/fields/summary")),
                ]
            })
            .collect();
        io.write_out(&table(&rows))?;
        Ok(())
    }

    /// Closes the current sprint, opens the next one on the same board and
    /// carries over everything still waiting for QA.
    pub(super) fn roll_sprint(
        &mut self,
        args: &RollSprintArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        self.cache.refresh(self.tracker, self.logger)?;
        let sprint = self.active_sprint()?;
        let board_id = sprint
            .board_id
            .ok_or_else(|| ShellError::usage(format!("sprint {} has no board", sprint)))?;
        let next_name = next_sprint_name(&self.config.tracker.sprint_name_format)?;

        if !args.yes {
            io.write_out(&format!(
                "Close {} and start {:?}? [y/N] ",
                sprint, next_name
            ))?;
            io.flush_out()?;
            let answer = io.read_line()?.unwrap_or_default();
            if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                io.write_out("Aborted.\n")?;
                return Ok(());
            }
        }

        let waiting_jql = QueryIntent::sprint(sprint.id)
            .with_predicate(WAITING_FOR_QA)
            .build(&Ordering::UpdatedThenCreated);
        let waiting: Vec<String> = self
            .tracker
            .search_issues(&waiting_jql, self.config.limits.sprint)?
            .iter()
            .map(|issue| scalar(issue.get("key")))
            .filter(|key| !key.is_empty())
            .collect();

        self.tracker.update_sprint_state(sprint.id, "closed")?;
        io.write_out(&format!("Closed {}\n", sprint))?;
        let opened = self.open_next_sprint(&sprint, board_id, &next_name, &waiting, io);
        // Once the old sprint is closed the cache is stale whatever happens next.
        let refreshed = self.cache.refresh(self.tracker, self.logger);
        opened?;
        refreshed?;
        Ok(())
    }

    fn open_next_sprint(
        &self,
        closed: &Sprint,
        board_id: u64,
        name: &str,
        waiting: &[String],
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let created = self.tracker.create_sprint(board_id, name)?;
        self.logger.log_event(&format!(
            "sprint roll closed={} created={} carried={}",
            closed.id,
            created.id,
            waiting.len()
        ));
        io.write_out(&format!("Created {}\n", created))?;
        if !waiting.is_empty() {
            self.tracker.add_issues_to_sprint(created.id, waiting)?;
            io.write_out(&format!("Moved {} to {}\n", waiting.join(", "), created.name))?;
        }
        Ok(())
    }

    pub(super) fn add_to_sprint(
        &mut self,
        args: &AddToSprintArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let reference = SprintRef::parse(&args.sprint);
        let sprint_id = self.cache.resolve(&reference).ok_or_else(|| match &reference {
            SprintRef::Current => ShellError::usage("no active sprint found (run load_sprints?)"),
            _ => ShellError::usage(format!(
                "unknown sprint {:?} (run load_sprints?)",
                sanitize_log_value(&args.sprint)
            )),
        })?;
        if let SprintRef::Name(name) = &reference {
            io.write_out(&format!("Sprint {} <id:{}>\n", name, sprint_id))?;
        }
        self.tracker.add_issues_to_sprint(sprint_id, &args.ids)?;
        io.write_out(&format!(
            "Added {} to sprint {}\n",
            args.ids.join(", "),
            sprint_id
        ))?;
        Ok(())
    }
}

/// Formats today's date with the configured strftime pattern, refusing
/// patterns chrono cannot render.
pub(crate) fn next_sprint_name(format: &str) -> Result<String, ShellError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ShellError::usage(format!(
            "invalid tracker.sprint_name_format: {:?}",
            format
        )));
    }
    Ok(Local::now().format(format).to_string())
}
