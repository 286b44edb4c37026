//! Manifest templates.
//!
//! A placeholder is `{{ dotted.path }}` or `{{ dotted.path | b64enc }}`. The
//! path is looked up in the config document; numeric segments index arrays.
//! A path that resolves to nothing is an error, never an empty string.

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;

const PLACEHOLDER: &str = r"\{\{\s*\.?([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*(?:\|\s*([A-Za-z0-9_]+)\s*)?\}\}";

/// Read and render a template file.
pub fn render_file(path: &Path, data: &Value) -> Result<Vec<u8>> {
    let template = fs::read_to_string(path)
        .with_context(|| format!("Could not read template {}", path.display()))?;
    let rendered = render(&template, data)
        .with_context(|| format!("Could not render template {}", path.display()))?;
    Ok(rendered.into_bytes())
}

/// Substitute every placeholder in `template`.
pub fn render(template: &str, data: &Value) -> Result<String> {
    let re = Regex::new(PLACEHOLDER)?;
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in re.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        push_literal(&mut out, template, last, whole.start())?;

        let path = &caps[1];
        let line = line_of(template, whole.start());
        let value = lookup(data, path)
            .ok_or_else(|| anyhow!("line {line}: no value for {path}"))?;
        let text = scalar(value).with_context(|| format!("line {line}: {path}"))?;

        match caps.get(2).map(|m| m.as_str()) {
            None => out.push_str(&text),
            Some("b64enc") => out.push_str(&STANDARD.encode(text)),
            Some(other) => bail!("line {line}: unknown filter {other:?}"),
        }
        last = whole.end();
    }

    push_literal(&mut out, template, last, template.len())?;
    Ok(out)
}

fn push_literal(out: &mut String, template: &str, start: usize, end: usize) -> Result<()> {
    let literal = &template[start..end];
    if let Some(offset) = literal.find("{{") {
        bail!(
            "line {}: malformed placeholder",
            line_of(template, start + offset)
        );
    }
    out.push_str(literal);
    Ok(())
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => bail!("value is null"),
        Value::Array(_) | Value::Object(_) => bail!("value is not a scalar"),
    }
}

fn line_of(template: &str, offset: usize) -> usize {
    template[..offset].matches('\n').count() + 1
}
