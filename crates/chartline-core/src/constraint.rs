//! Version constraints for chart selection
//!
//! Builds on [`semver::VersionReq`] and adds the forms chart repositories
//! commonly use on top of it:
//!
//! - bare versions are exact (`1.2.3` means `=1.2.3`, not `^1.2.3`)
//! - pessimistic `~>` (`~>1.0` is `>=1.0.0, <2.0.0`, `~>1.2.3` is `>=1.2.3, <1.3.0`)
//! - hyphen ranges (`1.2 - 1.4.5`)
//! - whitespace as well as comma between comparators, `||` between alternatives
//! - `!=` exclusions and an optional `v` prefix

use semver::{Version, VersionReq};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version constraint '{constraint}': {reason}")]
pub struct ConstraintError {
    pub constraint: String,
    pub reason: String,
}

/// A parsed version constraint
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    raw: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
struct Alternative {
    req: VersionReq,
    exclusions: Vec<VersionReq>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        self.req.matches(version) && !self.exclusions.iter().any(|e| e.matches(version))
    }
}

const OPERATORS: [&str; 9] = ["~>", ">=", "<=", "!=", ">", "<", "=", "~", "^"];

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let fail = |reason: String| ConstraintError {
            constraint: input.to_string(),
            reason,
        };

        if input.trim().is_empty() {
            return Err(fail("constraint is empty".to_string()));
        }

        let mut alternatives = Vec::new();
        for part in input.split("||") {
            let part = part.trim();
            if part.is_empty() {
                return Err(fail("empty alternative around '||'".to_string()));
            }
            alternatives.push(parse_alternative(part).map_err(fail)?);
        }

        Ok(Self {
            raw: input.trim().to_string(),
            alternatives,
        })
    }

    /// Check if a version satisfies the constraint
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(version))
    }

    /// Pick the highest version satisfying the constraint
    pub fn highest_match<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_alternative(part: &str) -> Result<Alternative, String> {
    let mut positive = Vec::new();
    let mut exclusions = Vec::new();

    if let Some((low, high)) = part.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        if low.is_empty() || high.is_empty() {
            return Err(format!("incomplete hyphen range '{}'", part));
        }
        positive.push(format!(">={}", low));
        positive.push(format!("<={}", high));
    } else {
        for token in tokenize(part) {
            let (op, version) = split_operator(&token);
            let version = strip_v(version);
            if version.is_empty() {
                return Err(format!("operator '{}' is missing a version", op));
            }

            match op {
                "~>" => positive.extend(pessimistic(version)?),
                "!=" => exclusions.push(parse_req(&format!("={}", version))?),
                "" if is_wildcard(version) => positive.push(version.to_string()),
                "" => positive.push(format!("={}", version)),
                op => positive.push(format!("{}{}", op, version)),
            }
        }
    }

    let req = if positive.is_empty() {
        VersionReq::STAR
    } else {
        parse_req(&positive.join(", "))?
    };

    Ok(Alternative { req, exclusions })
}

fn parse_req(text: &str) -> Result<VersionReq, String> {
    VersionReq::parse(text).map_err(|e| e.to_string())
}

/// Split on whitespace and commas, gluing a lone operator to the version after it
fn tokenize(part: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;

    for raw in part.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.is_empty() {
            continue;
        }
        if raw.chars().all(|c| "<>=!~^".contains(c)) {
            pending_op = Some(pending_op.unwrap_or_default() + raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{}{}", op, raw)),
            None => tokens.push(raw.to_string()),
        }
    }

    if let Some(op) = pending_op {
        tokens.push(op);
    }

    tokens
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("", token)
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|c| matches!(c, "*" | "x" | "X"))
}

/// Expand `~>` into a lower and upper bound
fn pessimistic(version: &str) -> Result<Vec<String>, String> {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let parts = core
        .split('.')
        .map(|p| {
            p.parse::<u64>()
                .map_err(|_| format!("'~>' needs a numeric version, got '{}'", version))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let too_large = || format!("'~>' version '{}' has no upper bound", version);
    let upper = match parts.as_slice() {
        [major] | [major, _] => format!("<{}.0.0", major.checked_add(1).ok_or_else(too_large)?),
        [major, minor, _] => format!(
            "<{}.{}.0",
            major,
            minor.checked_add(1).ok_or_else(too_large)?
        ),
        _ => return Err(format!("'~>' needs 1 to 3 version components, got '{}'", version)),
    };

    Ok(vec![format!(">={}", version), upper])
}
