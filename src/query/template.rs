use crate::error::{QueryError, QueryResult};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Named values substituted into `{{name}}` placeholders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `name=value` pair as given on the command line
    pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got `{}`", raw))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing parameter name in `{}`", raw));
        }
        Ok((name.to_string(), value.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Query text with `{{name}}` placeholders
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    text: String,
    source: Option<PathBuf>,
}

impl QueryTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| QueryError::QueryFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            text,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Distinct placeholder names in order of name
    pub fn placeholders(&self) -> Vec<String> {
        placeholder_names(&self.text)
    }

    /// Substitute every known placeholder; any left over is an error
    pub fn render(&self, params: &QueryParams) -> QueryResult<String> {
        let rendered = placeholder_regex().replace_all(&self.text, |caps: &regex::Captures| {
            match params.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        });

        let unresolved = placeholder_names(&rendered);
        if !unresolved.is_empty() {
            return Err(QueryError::UnresolvedPlaceholders(unresolved));
        }
        Ok(rendered.into_owned())
    }
}

fn placeholder_names(text: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
