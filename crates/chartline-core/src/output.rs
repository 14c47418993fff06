//! Filtering and assembly of rendered manifests

use indexmap::IndexMap;

/// Documentation file rendered by charts, never a manifest
pub const NOTES_FILE: &str = "NOTES.txt";

/// Leading character of partial/library templates
pub const PARTIAL_MARKER: char = '_';

/// YAML document marker
pub const DOCUMENT_MARKER: &str = "---";

/// Whether a rendered output is a manifest to keep
pub fn is_retained(output_name: &str, text: &str) -> bool {
    let base = output_name.rsplit(['/', '\\']).next().unwrap_or(output_name);

    base != NOTES_FILE && !base.starts_with(PARTIAL_MARKER) && !text.trim().is_empty()
}

/// Trim surrounding blank lines and make sure the text opens a YAML document
pub fn normalize(text: &str) -> String {
    let body = trim_blank_lines(text);

    if has_document_marker(body) {
        body.to_string()
    } else {
        format!("{}\n{}", DOCUMENT_MARKER, body)
    }
}

/// Keep retained outputs, normalized, in renderer order
pub fn retain_manifests(outputs: IndexMap<String, String>) -> Vec<(String, String)> {
    outputs
        .into_iter()
        .filter(|(name, text)| {
            let keep = is_retained(name, text);
            if !keep {
                tracing::debug!(output = %name, "skipping non-manifest output");
            }
            keep
        })
        .map(|(name, text)| {
            let text = normalize(&text);
            (name, text)
        })
        .collect()
}

fn has_document_marker(text: &str) -> bool {
    text == DOCUMENT_MARKER
        || text.starts_with("---\n")
        || text.starts_with("---\r\n")
        || text.starts_with("--- ")
}

/// Drop leading whitespace-only lines and all trailing whitespace
///
/// Indentation on the first content line is kept.
fn trim_blank_lines(text: &str) -> &str {
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    text[start..].trim_end()
}

/// Accumulates normalized documents across charts in declaration order
#[derive(Debug, Default)]
pub struct OutputAssembler {
    documents: Vec<String>,
}

impl OutputAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chart's retained documents
    pub fn push_chart<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.documents.extend(documents);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// One blank line between documents, no surrounding blank lines, one trailing newline
    pub fn finish(self) -> String {
        let joined = self.documents.join("\n\n");
        format!("{}\n", joined.trim_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_retention_rules() {
        assert!(is_retained("web/templates/deployment.yaml", "kind: Deployment"));
        assert!(!is_retained("web/templates/NOTES.txt", "Thanks for installing"));
        assert!(!is_retained("web/templates/_helpers.tpl", "kind: X"));
        assert!(!is_retained("_partial.yaml", "kind: X"));
        assert!(!is_retained("web/templates/empty.yaml", " \n\n  \n"));
        assert!(is_retained("notes.txt", "kind: X"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("kind: Deployment\n"), "---\nkind: Deployment");
        assert_eq!(normalize("\n\n---\nkind: A\n\n"), "---\nkind: A");
        assert_eq!(normalize("--- # comment\nkind: A"), "--- # comment\nkind: A");
        assert_eq!(normalize("\n  - item\n"), "---\n  - item");
        assert_eq!(normalize("---kind"), "---\n---kind");
    }

    #[test]
    fn test_retain_manifests_keeps_order() {
        let kept = retain_manifests(outputs(&[
            ("z.yaml", "kind: Z"),
            ("NOTES.txt", "notes"),
            ("a.yaml", "kind: A"),
            ("_helpers.tpl", "helper"),
            ("off.yaml", "\n"),
        ]));

        let names: Vec<&str> = kept.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["z.yaml", "a.yaml"]);
        assert_eq!(kept[1].1, "---\nkind: A");
    }

    #[test]
    fn test_assembly() {
        let mut assembler = OutputAssembler::new();
        assembler.push_chart(vec!["---\nkind: A".to_string(), "---\nkind: B".to_string()]);
        assembler.push_chart(vec!["---\nkind: C".to_string()]);
        assert_eq!(assembler.len(), 3);

        let stream = assembler.finish();
        assert_eq!(stream, "---\nkind: A\n\n---\nkind: B\n\n---\nkind: C\n");
        assert_eq!(stream.matches("---").count(), 3);
        insta::assert_snapshot!(stream, @r"
        ---
        kind: A

        ---
        kind: B

        ---
        kind: C
        ");
    }

    #[test]
    fn test_single_document() {
        let mut assembler = OutputAssembler::new();
        assembler.push_chart([normalize("kind: Deployment\n")]);
        assert_eq!(assembler.finish(), "---\nkind: Deployment\n");
    }

    #[test]
    fn test_empty_stream_is_single_newline() {
        let assembler = OutputAssembler::new();
        assert!(assembler.is_empty());
        assert_eq!(assembler.finish(), "\n");
    }
}
