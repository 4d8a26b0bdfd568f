//! Keeps one recurring regression pipeline per release in the CI system.
//!
//! The schedule is identified by its description prefix, never by numeric id,
//! so repeated runs converge on a single schedule whose variables reflect the
//! latest set of tickets.

use std::collections::BTreeSet;

use crate::ci::CiScheduleClient;
use crate::errors::RemoteError;
use crate::logger::{sanitize_log_value, Logger};
use crate::types::{NewSchedule, PipelineSchedule};

pub(crate) const REGRESSION_REF: &str = "staging";
pub(crate) const REGRESSION_CRON: &str = "0 */3 * * *";
pub(crate) const REGRESSION_TAG: &str = "tracksh-regression";
pub(crate) const TAGS_VARIABLE: &str = "TAGS";
pub(crate) const DEPLOYMENTS_VARIABLE: &str = "DEPLOYMENTS";
pub(crate) const DEPLOYMENT_TARGET: &str = "staging";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScheduleAction {
    Created,
    Reused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconcileOutcome {
    pub(crate) schedule_id: u64,
    pub(crate) description: String,
    pub(crate) action: ScheduleAction,
    pub(crate) tags: String,
}

pub(crate) fn regression_description(release: &str) -> String {
    format!("{} - Regression created by tracksh", release.trim())
}

/// The marker tag first, then the ticket keys in sorted order.
pub(crate) fn regression_tags(keys: &BTreeSet<String>) -> String {
    std::iter::once(REGRESSION_TAG)
        .chain(keys.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",")
}

/// Creates the release's schedule if absent, otherwise reuses the first match,
/// then upserts the tag and deployment variables. CI failures propagate.
pub(crate) fn reconcile_regression_schedule(
    ci: &dyn CiScheduleClient,
    project: &str,
    release: &str,
    keys: &BTreeSet<String>,
    logger: &Logger,
) -> Result<ReconcileOutcome, RemoteError> {
    let description = regression_description(release);
    let existing: Option<PipelineSchedule> = ci
        .list_schedules(project)?
        .into_iter()
        .find(|schedule| schedule.description.starts_with(&description));

    let (schedule, action) = match existing {
        Some(listed) => {
            let schedule = ci.schedule(project, listed.id)?;
            let previous_tags = schedule
                .variables
                .iter()
                .find(|variable| variable.key == TAGS_VARIABLE)
                .map(|variable| variable.value.as_str())
                .unwrap_or("");
            logger.log_event(&format!(
                "schedule reuse id={} description={} previous_tags={}",
                schedule.id,
                sanitize_log_value(&description),
                sanitize_log_value(previous_tags)
            ));
            (schedule, ScheduleAction::Reused)
        }
        None => {
            let created = ci.create_schedule(
                project,
                &NewSchedule {
                    git_ref: REGRESSION_REF.to_string(),
                    description: description.clone(),
                    cron: REGRESSION_CRON.to_string(),
                },
            )?;
            logger.log_event(&format!(
                "schedule create id={} description={} ref={} cron={}",
                created.id,
                sanitize_log_value(&description),
                created.git_ref,
                created.cron
            ));
            (created, ScheduleAction::Created)
        }
    };

    let tags = regression_tags(keys);
    ci.upsert_variable(project, schedule.id, TAGS_VARIABLE, &tags)?;
    ci.upsert_variable(project, schedule.id, DEPLOYMENTS_VARIABLE, DEPLOYMENT_TARGET)?;

    Ok(ReconcileOutcome {
        schedule_id: schedule.id,
        description,
        action,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCi;
    use std::fs;
    use tempfile::TempDir;

    fn keys(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn creates_schedule_when_absent() {
        let ci = FakeCi::new();
        let outcome = reconcile_regression_schedule(
            &ci,
            "qa/testing",
            "3.11.0",
            &keys(&["APP-2", "APP-1"]),
            &Logger::new(None),
        )
        .expect("reconcile");
        assert_eq!(outcome.action, ScheduleAction::Created);
        assert_eq!(outcome.tags, "tracksh-regression,APP-1,APP-2");

        let schedules = ci.schedules();
        assert_eq!(schedules.len(), 1);
        assert_eq!(
            schedules[0].description,
            "3.11.0 - Regression created by tracksh"
        );
        assert_eq!(schedules[0].git_ref, REGRESSION_REF);
        assert_eq!(schedules[0].cron, REGRESSION_CRON);
        assert_eq!(
            ci.variable(schedules[0].id, "DEPLOYMENTS").as_deref(),
            Some("staging")
        );
    }

    #[test]
    fn running_twice_keeps_one_schedule_with_latest_variables() {
        let ci = FakeCi::new();
        let logger = Logger::new(None);
        reconcile_regression_schedule(&ci, "qa/testing", "3.11.0", &keys(&["APP-1"]), &logger)
            .expect("first run");
        let second = reconcile_regression_schedule(
            &ci,
            "qa/testing",
            "3.11.0",
            &keys(&["APP-1", "APP-3"]),
            &logger,
        )
        .expect("second run");

        assert_eq!(second.action, ScheduleAction::Reused);
        let schedules = ci.schedules();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].variables.len(), 2);
        assert_eq!(
            ci.variable(schedules[0].id, "TAGS").as_deref(),
            Some("tracksh-regression,APP-1,APP-3")
        );
        assert_eq!(
            ci.variable(schedules[0].id, "DEPLOYMENTS").as_deref(),
            Some("staging")
        );
    }

    #[test]
    fn reuse_logs_the_tags_it_replaces() {
        let temp = TempDir::new().expect("temp dir");
        let log_path = temp.path().join("tracksh.log");
        let logger = Logger::new(Some(log_path.clone()));
        let ci = FakeCi::new();
        reconcile_regression_schedule(&ci, "qa/testing", "3.11.0", &keys(&["APP-1"]), &logger)
            .expect("first run");
        reconcile_regression_schedule(&ci, "qa/testing", "3.11.0", &keys(&["APP-2"]), &logger)
            .expect("second run");

        assert!(ci.calls().contains(&"get qa/testing 50".to_string()), "got: {:?}", ci.calls());
        let log = fs::read_to_string(&log_path).expect("read log");
        assert!(
            log.contains("schedule reuse id=50")
                && log.contains("previous_tags=tracksh-regression,APP-1"),
            "got: {log:?}"
        );
    }

    #[test]
    fn first_matching_duplicate_wins() {
        let ci = FakeCi::new()
            .with_schedule(5, "unrelated nightly")
            .with_schedule(6, "3.11.0 - Regression created by tracksh")
            .with_schedule(7, "3.11.0 - Regression created by tracksh (copy)");
        let outcome = reconcile_regression_schedule(
            &ci,
            "qa/testing",
            "3.11.0",
            &keys(&["APP-1"]),
            &Logger::new(None),
        )
        .expect("reconcile");
        assert_eq!(outcome.schedule_id, 6);
        assert_eq!(ci.schedules().len(), 3);
        assert_eq!(ci.variable(7, "TAGS"), None);
    }

    #[test]
    fn other_releases_do_not_match() {
        let ci = FakeCi::new().with_schedule(6, "3.10.0 - Regression created by tracksh");
        let outcome = reconcile_regression_schedule(
            &ci,
            "qa/testing",
            "3.11.0",
            &keys(&[]),
            &Logger::new(None),
        )
        .expect("reconcile");
        assert_eq!(outcome.action, ScheduleAction::Created);
        assert_eq!(outcome.tags, "tracksh-regression");
        assert_eq!(ci.schedules().len(), 2);
    }

    #[test]
    fn ci_failures_propagate() {
        let ci = FakeCi::new().failing();
        let err = reconcile_regression_schedule(
            &ci,
            "qa/testing",
            "3.11.0",
            &keys(&["APP-1"]),
            &Logger::new(None),
        )
        .expect_err("listing fails");
        assert!(err.to_string().contains("CI"), "got: {err}");
    }
}
