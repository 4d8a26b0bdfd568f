use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Maps short user aliases to tracker account ids. Unknown names pass through
/// unchanged so raw account ids and JQL functions keep working.
#[derive(Clone, Debug, Default)]
pub(crate) struct UserResolver {
    aliases: BTreeMap<String, String>,
}

impl UserResolver {
    pub(crate) fn new(aliases: BTreeMap<String, String>) -> Self {
        Self { aliases }
    }

    pub(crate) fn resolve<'a>(&'a self, user: &'a str) -> &'a str {
        self.aliases
            .get(user)
            .map(String::as_str)
            .unwrap_or(user)
    }

    /// Rewrites `@alias` mentions into tracker mention markup. An `@` glued to
    /// a preceding word character or another `@` is left alone (emails).
    pub(crate) fn rewrite_mentions(&self, text: &str) -> String {
        let Some(regex) = mention_regex() else {
            return text.to_string();
        };
        regex
            .replace_all(text, |caps: &Captures| {
                format!("{}[~accountid:{}]", &caps[1], self.resolve(&caps[2]))
            })
            .into_owned()
    }
}

fn mention_regex() -> Option<&'static Regex> {
    static MENTION: OnceLock<Option<Regex>> = OnceLock::new();
    MENTION
        .get_or_init(|| Regex::new(r"(^|[^@\w])@(\w{1,25})").ok())
        .as_ref()
}
