//! Manifest template rendering.
//!
//! Templates use the usual double-brace markup:
//!
//! - `{{ build.commit }}` - variable substitution
//! - `{% if build.tag %}...{% endif %}` - conditionals
//! - `{% raw %}{{ literal }}{% endraw %}` - escaping
//! - `{{ build.commit | truncate(8) }}` - helper filters
//!
//! Variables are limited to the pipeline namespace (`repo.*`, `build.*`,
//! `job.*`, `namespace`). A reference to anything else is rejected before
//! evaluation, so a failed render never produces partial output.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::Path;

use base64::Engine as _;
use chrono::format::{Item, StrftimeItems};
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use tracing::debug;

use crate::context::{ReconcileContext, PLACEHOLDERS};
use crate::error::{ReconcileError, TemplateError};

/// Functions the engine provides as globals; not pipeline variables.
const ENGINE_GLOBALS: &[&str] = &["range", "dict", "debug"];

const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Renders manifest templates against a [`ReconcileContext`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Read a template file and render it.
    pub fn render_file(
        &self,
        path: &Path,
        ctx: &ReconcileContext,
    ) -> Result<String, ReconcileError> {
        let source = std::fs::read_to_string(path).map_err(|source| ReconcileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = source.len(), "Template loaded");
        Ok(self.render(&source, ctx)?)
    }

    /// Render template text.
    ///
    /// Output is trimmed of surrounding whitespace. The same source and
    /// context always produce the same output.
    pub fn render(&self, source: &str, ctx: &ReconcileContext) -> Result<String, TemplateError> {
        let env = environment();
        let template = env
            .template_from_str(source)
            .map_err(TemplateError::Syntax)?;

        // sorted so the reported name is stable across runs
        let referenced: BTreeSet<String> = template.undeclared_variables(true).into_iter().collect();
        if let Some(unknown) = referenced.into_iter().find(|name| !is_known(name)) {
            return Err(TemplateError::UnknownPlaceholder(unknown));
        }

        let rendered = template
            .render(ctx.template_values())
            .map_err(|e| match e.kind() {
                ErrorKind::SyntaxError => TemplateError::Syntax(e),
                _ => TemplateError::Render(e),
            })?;

        Ok(rendered.trim().to_string())
    }
}

fn is_known(name: &str) -> bool {
    PLACEHOLDERS.contains(&name) || ENGINE_GLOBALS.contains(&name)
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    env.add_filter("uppercasefirst", uppercasefirst);
    env.add_filter("truncate", truncate);
    env.add_filter("datetime", datetime);
    env.add_filter("b64enc", b64enc);
    env
}

fn uppercasefirst(value: String) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

fn datetime(timestamp: i64, format: Option<String>) -> Result<String, minijinja::Error> {
    let format = format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT);
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid datetime format {format:?}"),
        ));
    }

    let Some(at) = chrono::DateTime::from_timestamp(timestamp, 0) else {
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("timestamp {timestamp} is out of range"),
        ));
    };

    let mut out = String::new();
    write!(out, "{}", at.format(format)).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot format timestamp {timestamp}"),
        )
    })?;
    Ok(out)
}

fn b64enc(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}
