//! CI pipeline-schedule access and its GitLab REST implementation.

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::errors::RemoteError;
use crate::http::{agent, path_segment};
use crate::types::{NewSchedule, PipelineSchedule};

const SERVICE: &str = "CI";
const PER_PAGE: usize = 100;

pub(crate) trait CiScheduleClient {
    /// Schedules without their variables; the list endpoint omits them.
    fn list_schedules(&self, project: &str) -> Result<Vec<PipelineSchedule>, RemoteError>;
    /// One schedule including its variables.
    fn schedule(&self, project: &str, schedule_id: u64) -> Result<PipelineSchedule, RemoteError>;
    fn create_schedule(
        &self,
        project: &str,
        schedule: &NewSchedule,
    ) -> Result<PipelineSchedule, RemoteError>;
    /// Sets `key` on the schedule, creating the variable when it is missing.
    fn upsert_variable(
        &self,
        project: &str,
        schedule_id: u64,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError>;
}

pub(crate) struct GitLabClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl GitLabClient {
    pub(crate) fn new(server: &str, token: &str) -> Self {
        Self {
            agent: agent(),
            api_base: format!("{}/api/v4", server.trim_end_matches('/')),
            token: token.to_string(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api_base, path))
            .set("PRIVATE-TOKEN", &self.token)
            .set("Accept", "application/json")
    }

    fn parse<T: DeserializeOwned>(path: &str, resp: ureq::Response) -> Result<T, RemoteError> {
        resp.into_json().map_err(|err| RemoteError::Parse {
            service: SERVICE,
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    fn schedules_path(project: &str) -> Result<String, RemoteError> {
        Ok(format!(
            "/projects/{}/pipeline_schedules",
            path_segment(SERVICE, project)?
        ))
    }
}

impl CiScheduleClient for GitLabClient {
    fn list_schedules(&self, project: &str) -> Result<Vec<PipelineSchedule>, RemoteError> {
        let path = Self::schedules_path(project)?;
        let mut schedules = Vec::new();
        let mut page = 1usize;
        loop {
            let resp = self
                .request("GET", &path)
                .query("per_page", &PER_PAGE.to_string())
                .query("page", &page.to_string())
                .call()
                .map_err(|err| RemoteError::from_ureq(SERVICE, &path, err))?;
            let batch: Vec<PipelineSchedule> = Self::parse(&path, resp)?;
            let fetched = batch.len();
            schedules.extend(batch);
            if fetched < PER_PAGE {
                return Ok(schedules);
            }
            page += 1;
        }
    }

    fn schedule(&self, project: &str, schedule_id: u64) -> Result<PipelineSchedule, RemoteError> {
        let path = format!("{}/{}", Self::schedules_path(project)?, schedule_id);
        let resp = self
            .request("GET", &path)
            .call()
            .map_err(|err| RemoteError::from_ureq(SERVICE, &path, err))?;
        Self::parse(&path, resp)
    }

    fn create_schedule(
        &self,
        project: &str,
        schedule: &NewSchedule,
    ) -> Result<PipelineSchedule, RemoteError> {
        let path = Self::schedules_path(project)?;
        let resp = self
            .request("POST", &path)
            .send_json(schedule)
            .map_err(|err| RemoteError::from_ureq(SERVICE, &path, err))?;
        Self::parse(&path, resp)
    }

    fn upsert_variable(
        &self,
        project: &str,
        schedule_id: u64,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError> {
        let variables = format!("{}/{}/variables", Self::schedules_path(project)?, schedule_id);
        let existing = format!("{}/{}", variables, path_segment(SERVICE, key)?);
        match self
            .request("PUT", &existing)
            .send_json(json!({ "value": value }))
            .map_err(|err| RemoteError::from_ureq(SERVICE, &existing, err))
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                self.request("POST", &variables)
                    .send_json(json!({ "key": key, "value": value }))
                    .map_err(|err| RemoteError::from_ureq(SERVICE, &variables, err))?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
