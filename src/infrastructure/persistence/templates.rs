use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::template_repository::{RenderedTemplate, TemplateRenderer};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::fs;

const SUBJECT_PREFIX: &str = "Subject:";

/// Notification templates stored as `{base_path}/{name}.html`.
///
/// An optional first line `Subject: ...` carries the subject; the rest is the
/// HTML body. Both may use `{{ Path.To.Value }}` placeholders. Values placed
/// in the body are HTML-escaped, the subject is plain text.
#[derive(Clone)]
pub struct LocalTemplateRepository {
    base_path: PathBuf,
}

impl LocalTemplateRepository {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.html", name))
    }
}

#[async_trait]
impl TemplateRenderer for LocalTemplateRepository {
    async fn render_stored_template(
        &self,
        name: &str,
        data: &Value,
    ) -> DomainResult<RenderedTemplate> {
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(DomainError::ValidationError(format!(
                "Invalid template name: {}",
                name
            )));
        }

        let path = self.resolve_path(name);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::NotFound(format!("Template not found: {}", name)));
            }
            Err(e) => {
                return Err(DomainError::Internal(format!(
                    "Failed to read template {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let (subject, body) = split_subject(&content);
        Ok(RenderedTemplate {
            subject: render(subject, data),
            body: render_html(body, data),
        })
    }
}

fn split_subject(content: &str) -> (&str, &str) {
    let (first, rest) = content.split_once('\n').unwrap_or((content, ""));
    match first.trim_end_matches('\r').strip_prefix(SUBJECT_PREFIX) {
        Some(subject) => (subject.trim(), rest),
        None => ("", content),
    }
}

/// Replace every placeholder with the value at its dotted path.
/// Missing values render as an empty string.
pub fn render(template: &str, data: &Value) -> String {
    substitute(template, data, |value| value)
}

/// Same as [`render`], with each substituted value HTML-escaped
pub fn render_html(template: &str, data: &Value) -> String {
    substitute(template, data, |value| {
        askama::filters::escape(askama::Html, value)
            .map(|escaped| escaped.to_string())
            .unwrap_or_default()
    })
}

fn substitute(template: &str, data: &Value, encode: impl Fn(String) -> String) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("Invalid placeholder regex")
    });

    placeholder
        .replace_all(template, |caps: &Captures| encode(lookup(data, &caps[1])))
        .into_owned()
}

fn lookup(data: &Value, path: &str) -> String {
    let value = path
        .split('.')
        .try_fold(data, |current, key| current.get(key));
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
