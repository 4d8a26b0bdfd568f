//! Pieces shared by the tracker and CI REST clients.

use std::time::Duration;

use crate::errors::RemoteError;

const USER_AGENT: &str = concat!("tracksh/", env!("CARGO_PKG_VERSION"));

pub(crate) fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
}

/// Percent-encodes one URL path segment (issue keys, project paths such as
/// `group/project`). Only RFC 3986 unreserved bytes pass through, so `/`,
/// `?` and `#` can never change which resource a request targets. Segments
/// made only of dots would still be collapsed by URL normalisation and are
/// rejected.
pub(crate) fn path_segment(service: &'static str, value: &str) -> Result<String, RemoteError> {
    let value = value.trim();
    if value.is_empty() || value.bytes().all(|byte| byte == b'.') {
        return Err(RemoteError::InvalidId {
            service,
            value: value.to_string(),
        });
    }
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    Ok(encoded)
}
