//! Template filters shared by chart templates and the charts configuration
//!
//! Names follow the Helm vocabulary so existing chart templates port over
//! with little change.

use base64::Engine as _;
use chartline_core::VersionConstraint;
use minijinja::{Environment, Error, ErrorKind, Value};
use semver::Version;

/// Every filter registered by [`register`]
pub const AVAILABLE_FILTERS: &[&str] = &[
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "indent",
    "nindent",
    "required",
    "sha256",
    "trunc",
    "trimprefix",
    "trimsuffix",
    "semver_match",
];

/// Register all filters on an environment
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("toyaml", toyaml);
    env.add_filter("tojson", tojson);
    env.add_filter("b64encode", b64encode);
    env.add_filter("b64decode", b64decode);
    env.add_filter("quote", quote);
    env.add_filter("squote", squote);
    env.add_filter("indent", indent);
    env.add_filter("nindent", nindent);
    env.add_filter("required", required);
    env.add_filter("sha256", sha256);
    env.add_filter("trunc", trunc);
    env.add_filter("trimprefix", trimprefix);
    env.add_filter("trimsuffix", trimsuffix);
    env.add_filter("semver_match", semver_match);
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

fn display(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Serialize to YAML without document marker or trailing newline
///
/// Usage: {{ values.resources | toyaml | nindent(4) }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Usage: {{ values.config | tojson }}
pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

/// Usage: {{ values.password | b64encode }}
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| invalid(format!("base64 decode error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("decoded data is not UTF-8: {}", e)))
}

/// Usage: {{ values.name | quote }}
pub fn quote(value: Value) -> String {
    let text = display(&value);
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn squote(value: Value) -> String {
    format!("'{}'", display(&value).replace('\'', "''"))
}

/// Prefix every non-empty line with `spaces` spaces
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like `indent`, starting with a newline
///
/// Usage: {{ values.labels | toyaml | nindent(4) }}
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Fail the render when the value is undefined, none or an empty string
///
/// Usage: {{ values.host | required("host is required") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined() || value.is_none() || value.as_str() == Some("");
    if missing {
        return Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ));
    }
    Ok(value)
}

pub fn sha256(value: String) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Keep at most `length` characters
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

pub fn trimprefix(value: String, prefix: String) -> String {
    match value.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

pub fn trimsuffix(value: String, suffix: String) -> String {
    match value.strip_suffix(suffix.as_str()) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

/// Check a version against a constraint, using the chart selection grammar
///
/// Usage: {% if chart.version | semver_match("~>1.0") %}
pub fn semver_match(version: String, constraint: String) -> Result<bool, Error> {
    let constraint = VersionConstraint::parse(&constraint).map_err(|e| invalid(e.to_string()))?;

    let text = version.trim().trim_start_matches('v');
    let version = Version::parse(text)
        .or_else(|_| Version::parse(&format!("{}.0", text)))
        .or_else(|_| Version::parse(&format!("{}.0.0", text)))
        .map_err(|e| invalid(format!("invalid version '{}': {}", version, e)))?;

    Ok(constraint.matches(&version))
}
