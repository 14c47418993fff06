//! Template functions (global functions available in templates)

use minijinja::value::Rest;
use minijinja::{Environment, Error, ErrorKind, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;

/// `${NAME}` or `$NAME`
static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("environment reference pattern is valid")
});

/// Source of environment variables for `env` and `expandenv`
#[derive(Debug, Clone, Default)]
pub enum Bindings {
    /// The process environment
    #[default]
    Process,
    /// A fixed set of variables
    Fixed(HashMap<String, String>),
}

impl Bindings {
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn lookup(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Replace `$VAR` and `${VAR}` references; unset variables become empty
    pub fn expand(&self, text: &str) -> String {
        ENV_REFERENCE
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                self.lookup(name).unwrap_or_default()
            })
            .into_owned()
    }
}

/// Register `env` and `expandenv` backed by the given bindings
///
/// `env("NAME")` is undefined when the variable is unset, so
/// `env("NAME") | default("x")` works as expected.
pub fn register_env(env: &mut Environment<'_>, bindings: Arc<Bindings>) {
    let lookup = Arc::clone(&bindings);
    env.add_function("env", move |name: String| -> Value {
        lookup.lookup(&name).map(Value::from).unwrap_or(Value::UNDEFINED)
    });
    env.add_function("expandenv", move |text: String| -> String { bindings.expand(&text) });
}

/// Register the general purpose functions
pub fn register(env: &mut Environment<'_>) {
    env.add_function("fail", fail);
    env.add_function("dict", dict);
    env.add_function("list", list);
    env.add_function("coalesce", coalesce);
    env.add_function("ternary", ternary);
    env.add_function("tostring", tostring);
}

/// Usage: {{ fail("replicas must be positive") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Build a mapping from alternating keys and values
///
/// Usage: {{ dict("app", "web", "tier", "frontend") | toyaml }}
pub fn dict(args: Rest<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = serde_json::Map::new();
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value = serde_json::to_value(&pair[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

pub fn list(args: Rest<Value>) -> Value {
    Value::from(args.0)
}

/// First argument that is defined, not none and not an empty string
pub fn coalesce(args: Rest<Value>) -> Value {
    args.0
        .into_iter()
        .find(|v| !v.is_undefined() && !v.is_none() && v.as_str() != Some(""))
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary("yes", "no", values.enabled) }}
pub fn ternary(when_true: Value, when_false: Value, condition: Value) -> Value {
    if condition.is_true() {
        when_true
    } else {
        when_false
    }
}

pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
