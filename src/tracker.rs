//! Ticket tracker access: the capability set the shell needs and a Jira
//! REST implementation of it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::RemoteError;
use crate::http::{agent, path_segment};
use crate::types::{Board, Sprint};

const SERVICE: &str = "tracker";
const PAGE_SIZE: u32 = 50;
/// Jira clamps `maxResults` on search to 100 regardless of what is asked.
const SEARCH_PAGE_SIZE: u32 = 100;

pub(crate) trait TrackerClient {
    fn server_url(&self) -> &str;
    fn boards(&self) -> Result<Vec<Board>, RemoteError>;
    fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>, RemoteError>;
    fn search_issues(&self, jql: &str, max_results: u32) -> Result<Vec<Value>, RemoteError>;
    fn issue(&self, key: &str) -> Result<Value, RemoteError>;
    fn create_issue(&self, fields: Map<String, Value>) -> Result<Value, RemoteError>;
    fn update_issue(&self, key: &str, fields: Map<String, Value>) -> Result<(), RemoteError>;
    fn delete_issue(&self, key: &str) -> Result<(), RemoteError>;
    /// Raw JSON for a REST sub-resource such as `project/KEY/versions`.
    fn get_json(&self, path: &str) -> Result<Value, RemoteError>;
    fn comments(&self, key: &str) -> Result<Vec<Value>, RemoteError>;
    fn add_comment(&self, key: &str, body: &str) -> Result<Value, RemoteError>;
    /// Transitions by transition name (case-insensitive) or id.
    fn transition_issue(&self, key: &str, transition: &str) -> Result<(), RemoteError>;
    fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), RemoteError>;
    fn add_issues_to_sprint(&self, sprint_id: u64, keys: &[String]) -> Result<(), RemoteError>;
    fn add_issues_to_epic(&self, epic: &str, keys: &[String]) -> Result<(), RemoteError>;
    fn update_sprint_state(&self, sprint_id: u64, state: &str) -> Result<(), RemoteError>;
    fn create_sprint(&self, board_id: u64, name: &str) -> Result<Sprint, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    #[serde(rename = "isLast", default)]
    is_last: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Value>,
    #[serde(default)]
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<TransitionOption>,
}

#[derive(Debug, Deserialize)]
struct TransitionOption {
    id: String,
    name: String,
}

/// Jira Cloud/Server client over REST v2 and the Agile 1.0 API, using basic
/// auth with an API token.
pub(crate) struct JiraClient {
    agent: ureq::Agent,
    server: String,
    authorization: String,
}

impl JiraClient {
    pub(crate) fn new(server: &str, username: &str, token: &str) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", username, token));
        Self {
            agent: agent(),
            server: server.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", credentials),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.server, path))
            .set("Authorization", &self.authorization)
            .set("Accept", "application/json")
    }

    fn read_json<T: DeserializeOwned>(path: &str, resp: ureq::Response) -> Result<T, RemoteError> {
        resp.into_json().map_err(|err| RemoteError::Parse {
            service: SERVICE,
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, RemoteError> {
        let mut request = self.request("GET", path);
        for (name, value) in query {
            request = request.query(name, value);
        }
        let resp = request
            .call()
            .map_err(|err| RemoteError::from_ureq(SERVICE, path, err))?;
        Self::read_json(path, resp)
    }

    fn send(&self, method: &str, path: &str, body: Value) -> Result<Option<Value>, RemoteError> {
        let resp = self
            .request(method, path)
            .send_json(body)
            .map_err(|err| RemoteError::from_ureq(SERVICE, path, err))?;
        // 204 No Content is the common answer for updates.
        if resp.status() == 204 {
            return Ok(None);
        }
        let text = resp.into_string().map_err(|err| RemoteError::Parse {
            service: SERVICE,
            path: path.to_string(),
            message: err.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| RemoteError::Parse {
                service: SERVICE,
                path: path.to_string(),
                message: err.to_string(),
            })
    }

    /// `/rest/api/2/issue/{key}{tail}` with the key encoded as one segment.
    fn issue_path(key: &str, tail: &str) -> Result<String, RemoteError> {
        Ok(format!("/rest/api/2/issue/{}{}", path_segment(SERVICE, key)?, tail))
    }

    fn paged<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut start_at = 0u32;
        loop {
            let page: Page<T> = self.get(
                path,
                &[
                    ("startAt", start_at.to_string()),
                    ("maxResults", PAGE_SIZE.to_string()),
                ],
            )?;
            let fetched = page.values.len() as u32;
            items.extend(page.values);
            if page.is_last || fetched == 0 {
                return Ok(items);
            }
            start_at += fetched;
        }
    }
}

impl TrackerClient for JiraClient {
    fn server_url(&self) -> &str {
        &self.server
    }

    fn boards(&self) -> Result<Vec<Board>, RemoteError> {
        self.paged("/rest/agile/1.0/board")
    }

    fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>, RemoteError> {
        self.paged(&format!("/rest/agile/1.0/board/{}/sprint", board_id))
    }

    fn search_issues(&self, jql: &str, max_results: u32) -> Result<Vec<Value>, RemoteError> {
        collect_search_pages(max_results, |start_at, page_size| {
            self.get(
                "/rest/api/2/search",
                &[
                    ("jql", jql.to_string()),
                    ("startAt", start_at.to_string()),
                    ("maxResults", page_size.to_string()),
                ],
            )
        })
    }

    fn issue(&self, key: &str) -> Result<Value, RemoteError> {
        self.get(&Self::issue_path(key, "")?, &[])
    }

    fn create_issue(&self, fields: Map<String, Value>) -> Result<Value, RemoteError> {
        let path = "/rest/api/2/issue";
        let created = self.send("POST", path, json!({ "fields": fields }))?;
        let key = created
            .as_ref()
            .and_then(|value| value.get("key"))
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Parse {
                service: SERVICE,
                path: path.to_string(),
                message: "created issue has no key".to_string(),
            })?;
        self.issue(key)
    }

    fn update_issue(&self, key: &str, fields: Map<String, Value>) -> Result<(), RemoteError> {
        self.send(
            "PUT",
            &Self::issue_path(key, "")?,
            json!({ "fields": fields }),
        )?;
        Ok(())
    }

    fn delete_issue(&self, key: &str) -> Result<(), RemoteError> {
        let path = Self::issue_path(key, "")?;
        self.request("DELETE", &path)
            .call()
            .map_err(|err| RemoteError::from_ureq(SERVICE, &path, err))?;
        Ok(())
    }

    fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        self.get(&format!("/rest/api/2/{}", path.trim_start_matches('/')), &[])
    }

    fn comments(&self, key: &str) -> Result<Vec<Value>, RemoteError> {
        let response: CommentsResponse =
            self.get(&Self::issue_path(key, "/comment")?, &[])?;
        Ok(response.comments)
    }

    fn add_comment(&self, key: &str, body: &str) -> Result<Value, RemoteError> {
        let added = self.send(
            "POST",
            &Self::issue_path(key, "/comment")?,
            json!({ "body": body }),
        )?;
        Ok(added.unwrap_or(Value::Null))
    }

    fn transition_issue(&self, key: &str, transition: &str) -> Result<(), RemoteError> {
        let path = Self::issue_path(key, "/transitions")?;
        let available: TransitionsResponse = self.get(&path, &[])?;
        let chosen = available
            .transitions
            .iter()
            .find(|option| option.id == transition || option.name.eq_ignore_ascii_case(transition))
            .ok_or_else(|| RemoteError::Status {
                service: SERVICE,
                path: path.clone(),
                code: 400,
                body: format!(
                    "transition {:?} is not available (available: {})",
                    transition,
                    available
                        .transitions
                        .iter()
                        .map(|option| option.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })?;
        self.send("POST", &path, json!({ "transition": { "id": chosen.id } }))?;
        Ok(())
    }

    fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), RemoteError> {
        self.send(
            "PUT",
            &Self::issue_path(key, "/assignee")?,
            json!({ "accountId": account_id }),
        )?;
        Ok(())
    }

    fn add_issues_to_sprint(&self, sprint_id: u64, keys: &[String]) -> Result<(), RemoteError> {
        self.send(
            "POST",
            &format!("/rest/agile/1.0/sprint/{}/issue", sprint_id),
            json!({ "issues": keys }),
        )?;
        Ok(())
    }

    fn add_issues_to_epic(&self, epic: &str, keys: &[String]) -> Result<(), RemoteError> {
        self.send(
            "POST",
            &format!("/rest/agile/1.0/epic/{}/issue", path_segment(SERVICE, epic)?),
            json!({ "issues": keys }),
        )?;
        Ok(())
    }

    fn update_sprint_state(&self, sprint_id: u64, state: &str) -> Result<(), RemoteError> {
        self.send(
            "POST",
            &format!("/rest/agile/1.0/sprint/{}", sprint_id),
            json!({ "state": state }),
        )?;
        Ok(())
    }

    fn create_sprint(&self, board_id: u64, name: &str) -> Result<Sprint, RemoteError> {
        let path = "/rest/agile/1.0/sprint";
        let created = self
            .send("POST", path, json!({ "name": name, "originBoardId": board_id }))?
            .unwrap_or(Value::Null);
        serde_json::from_value(created).map_err(|err| RemoteError::Parse {
            service: SERVICE,
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

/// Relative path of a project's versions, for [`TrackerClient::get_json`].
pub(crate) fn project_versions_path(project: &str) -> Result<String, RemoteError> {
    Ok(format!("project/{}/versions", path_segment(SERVICE, project)?))
}

/// Pages through a search until `max_results` issues are collected or the
/// server runs out of them.
fn collect_search_pages<F>(max_results: u32, mut fetch: F) -> Result<Vec<Value>, RemoteError>
where
    F: FnMut(u32, u32) -> Result<SearchResponse, RemoteError>,
{
    let mut issues = Vec::new();
    let mut start_at = 0u32;
    while start_at < max_results {
        let page_size = (max_results - start_at).min(SEARCH_PAGE_SIZE);
        let page = fetch(start_at, page_size)?;
        let fetched = page.issues.len() as u32;
        issues.extend(page.issues);
        start_at += fetched;
        if fetched == 0 || page.total.is_some_and(|total| start_at >= total) {
            break;
        }
    }
    issues.truncate(max_results as usize);
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_encodes_credentials() {
        let client = JiraClient::new("https://tracker.example.com/", "me@example.com", "secret");
        assert_eq!(
            client.authorization,
            format!("Basic {}", STANDARD.encode("me@example.com:secret"))
        );
        assert_eq!(client.server_url(), "https://tracker.example.com");
    }

    #[test]
    fn agile_pages_tolerate_missing_fields() {
        let page: Page<Board> = serde_json::from_str(r#"{"values": [{"id": 1, "name": "Team"}]}"#)
            .expect("parse page");
        assert_eq!(page.values.len(), 1);
        assert!(!page.is_last);
        let empty: Page<Board> = serde_json::from_str("{}").expect("parse empty page");
        assert!(empty.values.is_empty());
    }

    #[test]
    fn issue_keys_cannot_escape_the_issue_resource() {
        let client = JiraClient::new("https://tracker.example.com", "me", "secret");
        let path = JiraClient::issue_path("../project/APP", "").expect("path");
        let url = client.request("DELETE", &path).request_url().expect("url");
        assert_eq!(url.path(), "/rest/api/2/issue/..%2Fproject%2FAPP");

        let path = JiraClient::issue_path("APP-1?fields=x#top", "/comment").expect("path");
        let url = client.request("GET", &path).request_url().expect("url");
        assert_eq!(url.path(), "/rest/api/2/issue/APP-1%3Ffields%3Dx%23top/comment");
        assert!(url.query_pairs().is_empty());

        assert!(matches!(
            client.delete_issue(".."),
            Err(RemoteError::InvalidId { .. })
        ));
        assert!(matches!(
            project_versions_path("../../user"),
            Ok(path) if path == "project/..%2F..%2Fuser/versions"
        ));
    }

    fn page(keys: std::ops::Range<u32>, total: u32) -> SearchResponse {
        SearchResponse {
            issues: keys.map(|n| json!({ "key": format!("APP-{}", n) })).collect(),
            total: Some(total),
        }
    }

    #[test]
    fn search_follows_pages_up_to_the_limit() {
        let mut requests = Vec::new();
        let issues = collect_search_pages(500, |start_at, page_size| {
            requests.push((start_at, page_size));
            Ok(match start_at {
                0 => page(0..100, 120),
                100 => page(100..120, 120),
                _ => page(0..0, 120),
            })
        })
        .expect("search");
        assert_eq!(requests, vec![(0, 100), (100, 100)]);
        assert_eq!(issues.len(), 120);
        assert_eq!(issues[119]["key"], "APP-119");
    }

    #[test]
    fn search_stops_at_max_results_and_on_short_servers() {
        let mut requests = Vec::new();
        let issues = collect_search_pages(10, |start_at, page_size| {
            requests.push((start_at, page_size));
            Ok(page(start_at..start_at + page_size, 500))
        })
        .expect("search");
        assert_eq!(requests, vec![(0, 10)]);
        assert_eq!(issues.len(), 10);

        // A server that clamps pages harder than asked and reports no total.
        let mut calls = 0;
        let issues = collect_search_pages(150, |start_at, _| {
            calls += 1;
            Ok(SearchResponse {
                issues: if start_at < 60 {
                    (start_at..start_at + 30).map(|n| json!({ "key": n })).collect()
                } else {
                    Vec::new()
                },
                total: None,
            })
        })
        .expect("search");
        assert_eq!(issues.len(), 60);
        assert_eq!(calls, 3);
    }
}
