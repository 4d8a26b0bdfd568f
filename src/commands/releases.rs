use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::{ReleaseIssuesArgs, ReleasesArgs, RunRegressionArgs, Session};
use crate::errors::ShellError;
use crate::query::{Ordering, QueryIntent};
use crate::reconcile::{reconcile_regression_schedule, ScheduleAction};
use crate::render::{scalar, table};
use crate::repl::ShellIo;
use crate::tracker::project_versions_path;

impl Session<'_> {
    /// Unreleased versions of `project` (all with `--all`) by start date.
    pub(super) fn releases(
        &mut self,
        args: &ReleasesArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let versions = self
            .tracker
            .get_json(&project_versions_path(&args.project)?)?;
        let Value::Array(versions) = versions else {
            return Err(ShellError::Render {
                what: "release list",
                message: format!("expected an array of versions for {}", args.project),
            });
        };

        let mut selected: Vec<&Value> = versions
            .iter()
            .filter(|version| args.all || !version["released"].as_bool().unwrap_or(false))
            .collect();
        selected.sort_by_key(|version| scalar(version.get("startDate")));

        let mut rows = vec![vec!["name".to_string(), "userStartDate".to_string()]];
        rows.extend(selected.iter().map(|version| {
            vec![
                scalar(version.get("name")),
                scalar(version.get("userStartDate")),
            ]
        }));
        io.write_out(&table(&rows))?;
        Ok(())
    }

    pub(super) fn release_issues(
        &mut self,
        args: &ReleaseIssuesArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let jql = release_query(&args.release, args.project.as_deref());
        self.search_table(&jql, self.config.limits.release, io)
    }

    /// Collects the release's tickets and points the CI regression schedule
    /// at them.
    pub(super) fn run_regression(
        &mut self,
        args: &RunRegressionArgs,
        io: &mut dyn ShellIo,
    ) -> Result<(), ShellError> {
        let jql = release_query(&args.release, None);
        let keys: BTreeSet<String> = self
            .tracker
            .search_issues(&jql, self.config.limits.release)?
            .iter()
            .map(|issue| scalar(issue.get("key")))
            .filter(|key| !key.is_empty())
            .collect();

        let listed: Vec<&str> = keys.iter().map(String::as_str).collect();
        io.write_out(&format!("{}\n", listed.join(" --tags ")))?;
        if args.verbose {
            for (project, members) in group_by_project(&keys) {
                io.write_out(&format!("{}: {}\n", project, members.join(", ")))?;
            }
        }

        let outcome = reconcile_regression_schedule(
            self.ci,
            &self.config.ci.project,
            &args.release,
            &keys,
            self.logger,
        )?;
        let verb = match outcome.action {
            ScheduleAction::Created => "Created",
            ScheduleAction::Reused => "Updated",
        };
        io.write_out(&format!(
            "{} schedule #{}: {}\nTAGS={}\n",
            verb, outcome.schedule_id, outcome.description, outcome.tags
        ))?;
        Ok(())
    }
}

fn release_query(release: &str, project: Option<&str>) -> String {
    let mut intent = QueryIntent::fix_version(release);
    if let Some(project) = project {
        intent = intent.with_project(project);
    }
    intent.build(&Ordering::UpdatedThenCreated)
}

fn group_by_project(keys: &BTreeSet<String>) -> BTreeMap<&str, Vec<&str>> {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for key in keys {
        let project = key.split_once('-').map(|(project, _)| project).unwrap_or(key);
        groups.entry(project).or_default().push(key);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_query_scopes_by_fix_version() {
        assert_eq!(
            release_query("3.11.0", None),
            "fixVersion = \"3.11.0\" ORDER BY updated DESC, created DESC"
        );
        assert_eq!(
            release_query("Summer", Some("APP")),
            "fixVersion = Summer AND project = APP ORDER BY updated DESC, created DESC"
        );
    }

    #[test]
    fn tickets_group_by_project_prefix() {
        let keys: BTreeSet<String> = ["APP-2", "APP-1", "WEB-7"]
            .iter()
            .map(|key| key.to_string())
            .collect();
        let groups = group_by_project(&keys);
        assert_eq!(groups["APP"], vec!["APP-1", "APP-2"]);
        assert_eq!(groups["WEB"], vec!["WEB-7"]);
    }
}
