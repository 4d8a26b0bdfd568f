use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{CannedSearch, Session};
use crate::errors::ShellError;
use crate::query::{ensure_ordering, Ordering, QueryIntent, OPEN_STATUSES};
use crate::render::{join_names, scalar, table};
use crate::repl::ShellIo;

impl CannedSearch {
    pub(crate) fn intent(self) -> QueryIntent {
        let open = || QueryIntent::default().with_statuses(OPEN_STATUSES);
        match self {
            Self::RecentlyViewed => QueryIntent::default().ordered_by(Ordering::LastViewed),
            Self::RecentlyViewedOpen => open().ordered_by(Ordering::LastViewed),
            Self::MyRecentlyViewedOpen => open()
                .with_assignee("currentUser()")
                .ordered_by(Ordering::LastViewed),
            Self::RecentlyCreated => {
                open().ordered_by(Ordering::Custom("created DESC, lastViewed DESC".to_string()))
            }
            Self::MyRecentlyCreated => open()
                .with_assignee("currentUser()")
                .ordered_by(Ordering::Custom("created DESC, lastViewed DESC".to_string())),
            Self::ReportedByMe => QueryIntent::default()
                .with_predicate("reporter in (currentUser())")
                .ordered_by(Ordering::Custom(
                    "updated DESC, created DESC, lastViewed DESC".to_string(),
                )),
        }
    }
}

impl Session<'_> {
    pub(super) fn search(&mut self, text: &str, io: &mut dyn ShellIo) -> Result<(), ShellError> {
        let jql = ensure_ordering(text, &Ordering::UpdatedThenCreated);
        self.search_table(&jql, self.config.limits.search, io)
    }

    pub(super) fn canned_search(
        &mut self,
        kind: CannedSearch,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let jql = kind.intent().build(&Ordering::UpdatedThenCreated);
        self.search_table(&jql, self.config.limits.search, io)
    }

    /// Runs `jql` and prints key, summary, sprints and labels per issue.
    pub(super) fn search_table(
        &self,
        jql: &str,
        limit: u32,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let issues = self.tracker.search_issues(jql, limit)?;
        let sprint_field = &self.config.tracker.sprint_field;
        let rows: Vec<Vec<String>> = issues
            .iter()
            .map(|issue| {
                let fields = issue.get("fields");
                vec![
                    scalar(issue.get("key")),
                    scalar(fields.and_then(|f| f.get("summary"))),
                    sprint_names(fields.and_then(|f| f.get(sprint_field))),
                    join_names(fields.and_then(|f| f.get("labels"))),
                ]
            })
            .collect();
        io.write_out(&table(&rows))?;
        Ok(())
    }
}

/// Names of the sprints an issue belongs to. Older servers return each sprint
/// as a `...Sprint@1f[id=1,name=Sprint 1,...]` string instead of an object.
pub(crate) fn sprint_names(value: Option<&Value>) -> String {
    let Some(Value::Array(items)) = value else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            Value::String(text) => legacy_sprint_name(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn legacy_sprint_name(text: &str) -> Option<String> {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = NAME
        .get_or_init(|| Regex::new(r"[\[,]name=([^,\]]*)").ok())
        .as_ref()?;
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canned_searches_render_expected_queries() {
        let build = |kind: CannedSearch| kind.intent().build(&Ordering::UpdatedThenCreated);
        assert_eq!(
            build(CannedSearch::RecentlyViewed),
            "ORDER BY lastViewed DESC"
        );
        assert_eq!(
            build(CannedSearch::MyRecentlyViewedOpen),
            "status in (\"In Progress\", Open, Pending, Reopened, Testing, \"Waiting for QA\", \
             \"Work in progress\") AND assignee = currentUser() ORDER BY lastViewed DESC"
        );
        assert_eq!(
            build(CannedSearch::ReportedByMe),
            "reporter in (currentUser()) ORDER BY updated DESC, created DESC, lastViewed DESC"
        );
        assert!(build(CannedSearch::RecentlyCreated).ends_with("ORDER BY created DESC, lastViewed DESC"));
    }

    #[test]
    fn sprint_names_reads_objects_and_legacy_strings() {
        let value = json!([
            {"id": 9, "name": "Sprint 9"},
            "com.atlassian.greenhopper.service.sprint.Sprint@5f[id=10,rapidViewId=1,state=ACTIVE,name=Sprint 10,startDate=2024]",
            7
        ]);
        assert_eq!(sprint_names(Some(&value)), "Sprint 9,Sprint 10");
        assert_eq!(sprint_names(None), "");
        assert_eq!(sprint_names(Some(&json!(null))), "");
    }
}
