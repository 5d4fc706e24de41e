//! Workload template rendering
//!
//! A template is a multi-document YAML manifest carrying four placeholder
//! tokens. Rendering substitutes them literally and splits the result into
//! one [`RenderedResource`] per document. Fetching the template is the
//! caller's job, so everything here is pure.

use serde::Deserialize;
use tracing::debug;

use crate::error::InstanceError;

pub const TOKEN_INSTANCE_NAME: &str = "{{INSTANCE_NAME}}";
pub const TOKEN_DB_NAME: &str = "{{DB_NAME}}";
pub const TOKEN_DB_USER: &str = "{{DB_USER}}";
pub const TOKEN_DB_PASSWORD: &str = "{{DB_PASSWORD}}";

/// Tokens the renderer fills in. Any other `{{...}}` is left as written.
pub const KNOWN_TOKENS: [&str; 4] = [
    TOKEN_INSTANCE_NAME,
    TOKEN_DB_NAME,
    TOKEN_DB_USER,
    TOKEN_DB_PASSWORD,
];

/// Values substituted into a template
#[derive(Clone, Copy)]
pub struct TemplateVars<'a> {
    pub instance_name: &'a str,
    pub db_name: &'a str,
    pub db_user: &'a str,
    pub db_password: &'a str,
}

impl TemplateVars<'_> {
    fn value_for(&self, token: &str) -> &str {
        match token {
            TOKEN_INSTANCE_NAME => self.instance_name,
            TOKEN_DB_NAME => self.db_name,
            TOKEN_DB_USER => self.db_user,
            _ => self.db_password,
        }
    }
}

/// One parsed manifest document, ready for the provisioner
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResource {
    /// The manifest `kind`, verbatim
    pub kind: String,
    /// `metadata.name`, when present
    pub name: Option<String>,
    /// Whole document as JSON, suitable for the Kubernetes API
    pub document: serde_json::Value,
}

/// Replace the known tokens in `template`.
///
/// Each token is replaced from the original text in a single pass, so a value
/// containing another token's text is never expanded a second time.
pub fn substitute(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let tail = &rest[start..];
        match KNOWN_TOKENS.iter().find(|token| tail.starts_with(**token)) {
            Some(token) => {
                output.push_str(&rest[..start]);
                output.push_str(vars.value_for(token));
                rest = &tail[token.len()..];
            }
            None => {
                output.push_str(&rest[..start + 2]);
                rest = &tail[2..];
            }
        }
    }
    output.push_str(rest);
    output
}

/// Substitute `vars` into `template` and parse every YAML document in it.
///
/// Fails with [`InstanceError::TemplateParse`] when a document is not valid
/// YAML, is not a mapping with a string `kind`, when a known token survives
/// substitution, or when the template holds no documents at all.
pub fn render(
    template: &str,
    vars: &TemplateVars<'_>,
) -> Result<Vec<RenderedResource>, InstanceError> {
    let text = substitute(template, vars);

    if let Some(token) = KNOWN_TOKENS.iter().find(|token| text.contains(**token)) {
        return Err(InstanceError::TemplateParse {
            reason: format!("placeholder {} is still present after substitution", token),
        });
    }

    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(&text).enumerate() {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| {
            InstanceError::TemplateParse {
                reason: format!("document {}: {}", index, e),
            }
        })?;

        if value.is_null() {
            continue;
        }

        resources.push(parse_document(index, value)?);
    }

    if resources.is_empty() {
        return Err(InstanceError::TemplateParse {
            reason: "template contains no resources".to_string(),
        });
    }

    debug!("Rendered {} resources for {}", resources.len(), vars.instance_name);
    Ok(resources)
}

fn parse_document(index: usize, value: serde_yaml::Value) -> Result<RenderedResource, InstanceError> {
    let document = serde_json::to_value(&value).map_err(|e| InstanceError::TemplateParse {
        reason: format!("document {}: {}", index, e),
    })?;

    if !document.is_object() {
        return Err(InstanceError::TemplateParse {
            reason: format!("document {} is not a mapping", index),
        });
    }

    let kind = document
        .get("kind")
        .and_then(|kind| kind.as_str())
        .ok_or_else(|| InstanceError::TemplateParse {
            reason: format!("document {} has no kind", index),
        })?
        .to_string();

    let name = document
        .pointer("/metadata/name")
        .and_then(|name| name.as_str())
        .map(str::to_string);

    Ok(RenderedResource {
        kind,
        name,
        document,
    })
}
