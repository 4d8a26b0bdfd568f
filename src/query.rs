//! Builds tracker query strings (JQL) from structured intents.

/// Statuses treated as "still open" by the canned searches.
pub(crate) const OPEN_STATUSES: [&str; 7] = [
    "In Progress",
    "Open",
    "Pending",
    "Reopened",
    "Testing",
    "Waiting for QA",
    "Work in progress",
];

/// Statuses that count as "on my plate" within a sprint.
pub(crate) const SPRINT_STATUSES: [&str; 2] = ["In Progress", "Open"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Ordering {
    UpdatedThenCreated,
    LastViewed,
    Custom(String),
}

impl Ordering {
    pub(crate) fn clause(&self) -> String {
        match self {
            Self::UpdatedThenCreated => "ORDER BY updated DESC, created DESC".to_string(),
            Self::LastViewed => "ORDER BY lastViewed DESC".to_string(),
            Self::Custom(fields) => format!("ORDER BY {}", fields.trim()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    Sprint(u64),
    FixVersion(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct QueryIntent {
    pub(crate) scope: Option<Scope>,
    pub(crate) statuses: Vec<String>,
    pub(crate) assignee: Option<String>,
    pub(crate) predicates: Vec<String>,
    pub(crate) order: Option<Ordering>,
}

impl QueryIntent {
    pub(crate) fn sprint(id: u64) -> Self {
        Self {
            scope: Some(Scope::Sprint(id)),
            ..Self::default()
        }
    }

    pub(crate) fn fix_version(release: &str) -> Self {
        Self {
            scope: Some(Scope::FixVersion(release.to_string())),
            ..Self::default()
        }
    }

    pub(crate) fn with_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn with_project(mut self, project: &str) -> Self {
        self.predicates.push(format!("project = {}", quote_value(project)));
        self
    }

    pub(crate) fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Adds a raw predicate; blank text is ignored.
    pub(crate) fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        if !predicate.trim().is_empty() {
            self.predicates.push(predicate.trim().to_string());
        }
        self
    }

    pub(crate) fn ordered_by(mut self, order: Ordering) -> Self {
        self.order = Some(order);
        self
    }

    /// Renders the query. `default_order` applies only when the intent carries
    /// no ordering of its own and no predicate already orders the results.
    pub(crate) fn build(&self, default_order: &Ordering) -> String {
        let mut clauses = Vec::new();
        match &self.scope {
            Some(Scope::Sprint(id)) => clauses.push(format!("sprint = {}", id)),
            Some(Scope::FixVersion(release)) => {
                clauses.push(format!("fixVersion = {}", quote_value(release)))
            }
            None => {}
        }
        if !self.statuses.is_empty() {
            let values: Vec<String> = self.statuses.iter().map(|s| quote_value(s)).collect();
            clauses.push(format!("status in ({})", values.join(", ")));
        }
        if let Some(assignee) = &self.assignee {
            clauses.push(format!("assignee = {}", quote_value(assignee)));
        }
        clauses.extend(self.predicates.iter().cloned());

        let order = self.order.as_ref().unwrap_or(default_order);
        ensure_ordering(&clauses.join(" AND "), order)
    }
}

pub(crate) fn has_ordering(text: &str) -> bool {
    text.to_lowercase().contains("order by")
}

/// Appends `order` unless the text already orders its results.
pub(crate) fn ensure_ordering(text: &str, order: &Ordering) -> String {
    let trimmed = text.trim();
    if has_ordering(trimmed) {
        return trimmed.to_string();
    }
    if trimmed.is_empty() {
        return order.clause();
    }
    format!("{} {}", trimmed, order.clause())
}

/// Bare words and function calls such as `currentUser()` stay unquoted;
/// everything else is double-quoted.
pub(crate) fn quote_value(value: &str) -> String {
    let value = value.trim();
    let is_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');
    let is_call = value
        .strip_suffix("()")
        .map(|name| is_word(name))
        .unwrap_or(false);
    if is_word(value) || is_call {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
