//! The hybrid resource text format.
//!
//! A serialized resource is the body text, a separator line of dashes, and a
//! flat `key: value` block. Entries of the default family keep their bare
//! keys; entries of any other family are flattened to `"<family>.<key>"`.
//! The system family is typed metadata and never serialized.
//!
//! Keys and values that would be ambiguous on a single line (empty, embedded
//! newlines, surrounding whitespace, a leading quote, or a `:` inside a key)
//! are written as JSON string literals; everything else is written bare.
//!
//! Known limits of the format: a body line consisting solely of dashes reads
//! as the separator, and a bare default-family key containing `.` re-routes
//! into a family on read.

use std::collections::BTreeMap;

use tracing::warn;

use quire_types::Resource;

use crate::error::{CodecError, CodecResult};

/// Serialize a resource into its text form.
///
/// The body is trimmed of surrounding whitespace; this is the one intentional
/// normalization of the round trip.
pub fn serialize_resource(resource: &Resource) -> String {
    let body = resource.content().trim();

    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    if let Some(default) = resource.family(Resource::DEFAULT_FAMILY) {
        for (key, value) in default {
            if key != Resource::CONTENT_FIELD {
                flat.insert(key.clone(), value.clone());
            }
        }
    }
    for (family, entries) in resource.families() {
        if family == Resource::SYSTEM_FAMILY || family == Resource::DEFAULT_FAMILY {
            continue;
        }
        for (key, value) in entries {
            flat.insert(format!("{family}.{key}"), value.clone());
        }
    }

    format!("{body}\n\n-------\n\n{}", render_properties(&flat))
}

/// Decode a text blob into the given resource.
///
/// The body lands in the content field (trimmed); flattened property keys are
/// routed back into their families. A malformed structured block is not an
/// error: it is logged and treated as empty.
pub fn deserialize_resource(text: &str, resource: &mut Resource) {
    let (body, block) = split_sections(text);
    match parse_properties(&block) {
        Ok(entries) => {
            for (flat_key, value) in entries {
                match split_family_key(&flat_key) {
                    Some((family, key)) => {
                        resource.set_family_property(family, key, value);
                    }
                    None => resource.set_property(flat_key, value),
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "discarding malformed property block");
        }
    }
    resource.set_content(body.trim());
}

/// Split a flattened key into `(family, key)` when it carries a family
/// prefix. A `.` at position zero does not count as a prefix.
fn split_family_key(flat_key: &str) -> Option<(&str, &str)> {
    match flat_key.find('.') {
        Some(idx) if idx > 0 => Some((&flat_key[..idx], &flat_key[idx + 1..])),
        _ => None,
    }
}

/// Split the raw text at the first separator line (one or more dashes and
/// nothing else). Later separator lines inside the block collapse away, so a
/// doubled separator parses the same as a single one.
fn split_sections(text: &str) -> (String, String) {
    let mut body_lines: Vec<&str> = Vec::new();
    let mut block_lines: Vec<&str> = Vec::new();
    let mut in_block = false;
    for raw in text.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if is_dash_line(line) {
            in_block = true;
            continue;
        }
        if in_block {
            block_lines.push(line);
        } else {
            body_lines.push(line);
        }
    }
    (body_lines.join("\n"), block_lines.join("\n"))
}

fn is_dash_line(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn render_properties(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(&render_token(key, true));
        out.push_str(": ");
        out.push_str(&render_token(value, false));
        out.push('\n');
    }
    out
}

fn render_token(text: &str, is_key: bool) -> String {
    if needs_quoting(text, is_key) {
        serde_json::to_string(text).expect("string serialization is infallible")
    } else {
        text.to_string()
    }
}

fn needs_quoting(text: &str, is_key: bool) -> bool {
    text.is_empty()
        || text != text.trim()
        || text.contains('\n')
        || text.contains('\r')
        || text.starts_with('"')
        || (is_key && text.contains(':'))
}

fn parse_properties(block: &str) -> CodecResult<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    for (line_no, raw) in block.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            continue;
        }
        let (key, rest) = parse_key(line, line_no)?;
        let rest = rest
            .strip_prefix(':')
            .ok_or_else(|| CodecError::MalformedLine {
                line: line_no,
                reason: "missing `:` after key".into(),
            })?;
        let value_text = rest.trim();
        let value = if value_text.starts_with('"') {
            serde_json::from_str::<String>(value_text).map_err(|e| CodecError::MalformedLine {
                line: line_no,
                reason: format!("bad quoted value: {e}"),
            })?
        } else {
            value_text.to_string()
        };
        entries.insert(key, value);
    }
    Ok(entries)
}

/// Parse the key portion of a property line. Returns the key and the rest of
/// the line starting at the `:` separator.
fn parse_key(line: &str, line_no: usize) -> CodecResult<(String, &str)> {
    if line.starts_with('"') {
        let inner = &line[1..];
        let mut escaped = false;
        for (idx, c) in inner.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => {
                    let end = 1 + idx + 1;
                    let key = serde_json::from_str::<String>(&line[..end]).map_err(|e| {
                        CodecError::MalformedLine {
                            line: line_no,
                            reason: format!("bad quoted key: {e}"),
                        }
                    })?;
                    return Ok((key, &line[end..]));
                }
                _ => {}
            }
        }
        Err(CodecError::MalformedLine {
            line: line_no,
            reason: "unterminated quoted key".into(),
        })
    } else {
        match line.find(':') {
            Some(idx) => Ok((line[..idx].trim_end().to_string(), &line[idx..])),
            None => Err(CodecError::MalformedLine {
                line: line_no,
                reason: "missing `:` separator".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resource_with(
        body: &str,
        properties: &[(&str, &str)],
        families: &[(&str, &str, &str)],
    ) -> Resource {
        let mut resource = Resource::new("test");
        resource.set_content(body);
        for (key, value) in properties {
            resource.set_property(*key, *value);
        }
        for (family, key, value) in families {
            resource.set_family_property(family, *key, *value);
        }
        resource
    }

    fn round_trip(resource: &Resource) -> Resource {
        let text = serialize_resource(resource);
        let mut back = Resource::new(resource.key());
        deserialize_resource(&text, &mut back);
        back
    }

    #[test]
    fn body_and_properties_round_trip() {
        let resource = resource_with(
            "Hello, world.\n\nSecond paragraph.",
            &[("label", "greeting"), ("weight", "12")],
            &[],
        );
        let back = round_trip(&resource);
        assert_eq!(back.content(), "Hello, world.\n\nSecond paragraph.");
        assert_eq!(back.property("label"), Some("greeting"));
        assert_eq!(back.property("weight"), Some("12"));
    }

    #[test]
    fn families_are_flattened_and_restored() {
        let resource = resource_with(
            "body",
            &[("plain", "x")],
            &[("meta", "label", "first"), ("meta", "order", "2"), ("audit", "by", "me")],
        );
        let text = serialize_resource(&resource);
        assert!(text.contains("meta.label: first"));
        assert!(text.contains("audit.by: me"));
        let back = round_trip(&resource);
        assert_eq!(back.family("meta").unwrap().get("label").unwrap(), "first");
        assert_eq!(back.family("meta").unwrap().get("order").unwrap(), "2");
        assert_eq!(back.family("audit").unwrap().get("by").unwrap(), "me");
        assert_eq!(back.property("plain"), Some("x"));
    }

    #[test]
    fn body_trimming_is_the_only_normalization() {
        let resource = resource_with("  \n\nspaced body\n\n  ", &[("k", "v")], &[]);
        let back = round_trip(&resource);
        assert_eq!(back.content(), "spaced body");
        assert_eq!(back.property("k"), Some("v"));
    }

    #[test]
    fn empty_resource() {
        let back = round_trip(&resource_with("", &[], &[]));
        assert_eq!(back.content(), "");
        assert!(back
            .family(Resource::DEFAULT_FAMILY)
            .map(|f| f.len() == 1)
            .unwrap_or(true));
    }

    #[test]
    fn awkward_values_are_quoted() {
        let resource = resource_with(
            "body",
            &[
                ("multiline", "a\nb"),
                ("padded", " x "),
                ("empty", ""),
                ("quoted", "\"already\""),
                ("colons", "a: b: c"),
            ],
            &[],
        );
        let back = round_trip(&resource);
        assert_eq!(back.property("multiline"), Some("a\nb"));
        assert_eq!(back.property("padded"), Some(" x "));
        assert_eq!(back.property("empty"), Some(""));
        assert_eq!(back.property("quoted"), Some("\"already\""));
        assert_eq!(back.property("colons"), Some("a: b: c"));
    }

    #[test]
    fn keys_with_separators_are_quoted() {
        let resource = resource_with("body", &[("a:b", "v"), (" padded ", "w")], &[]);
        let back = round_trip(&resource);
        assert_eq!(back.property("a:b"), Some("v"));
        assert_eq!(back.property(" padded "), Some("w"));
    }

    #[test]
    fn no_properties_still_round_trips() {
        let text = serialize_resource(&resource_with("just a body", &[], &[]));
        assert_eq!(text, "just a body\n\n-------\n\n");
        let mut back = Resource::new("t");
        deserialize_resource(&text, &mut back);
        assert_eq!(back.content(), "just a body");
    }

    #[test]
    fn separator_variants_are_accepted() {
        for text in [
            "body\n---\nk: v",
            "body\n\n-\n\nk: v",
            "body\n----------\nk: v\n",
            "body\n---\n---\nk: v",
        ] {
            let mut back = Resource::new("t");
            deserialize_resource(text, &mut back);
            assert_eq!(back.content(), "body", "text {text:?}");
            assert_eq!(back.property("k"), Some("v"), "text {text:?}");
        }
    }

    #[test]
    fn missing_separator_means_all_body() {
        let mut back = Resource::new("t");
        deserialize_resource("only a body\nwith lines", &mut back);
        assert_eq!(back.content(), "only a body\nwith lines");
        assert_eq!(back.property("k"), None);
    }

    #[test]
    fn malformed_block_is_recovered_as_empty() {
        let mut back = Resource::new("t");
        deserialize_resource("body\n\n-------\n\nnot a property line", &mut back);
        assert_eq!(back.content(), "body");
        assert_eq!(
            back.family(Resource::DEFAULT_FAMILY)
                .map(|f| f.iter().filter(|(k, _)| *k != Resource::CONTENT_FIELD).count())
                .unwrap_or(0),
            0
        );
    }

    #[test]
    fn leading_dot_key_stays_in_default_family() {
        let mut back = Resource::new("t");
        deserialize_resource("body\n\n-------\n\n.hidden: v", &mut back);
        assert_eq!(back.property(".hidden"), Some("v"));
    }

    #[test]
    fn dotted_key_routes_to_family() {
        let mut back = Resource::new("t");
        deserialize_resource("body\n\n-------\n\nmeta.a.b: v", &mut back);
        // Only the first dot splits; the rest stays in the key.
        assert_eq!(back.family("meta").unwrap().get("a.b").unwrap(), "v");
    }

    // Generators respect the documented format limits: no all-dash body
    // lines, no dots in default-family keys.
    fn body_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 .,!?\nàéß日]{0,120}".prop_filter("no all-dash lines", |s| {
            !s.lines().any(|l| !l.is_empty() && l.chars().all(|c| c == '-'))
        })
    }

    proptest! {
        #[test]
        fn arbitrary_resources_round_trip(
            body in body_strategy(),
            props in proptest::collection::btree_map("[a-zA-Z0-9 :_-]{1,12}", "\\PC{0,30}", 0..6),
            family_props in proptest::collection::btree_map("[a-z]{1,6}", proptest::collection::btree_map("[a-zA-Z0-9_-]{1,8}", "\\PC{0,30}", 1..4), 0..3),
        ) {
            let mut resource = Resource::new("p");
            resource.set_content(body.clone());
            for (k, v) in &props {
                prop_assume!(k.as_str() != Resource::CONTENT_FIELD);
                resource.set_property(k.clone(), v.clone());
            }
            for (family, entries) in &family_props {
                prop_assume!(
                    family.as_str() != Resource::SYSTEM_FAMILY
                        && family.as_str() != Resource::DEFAULT_FAMILY
                );
                for (k, v) in entries {
                    resource.set_family_property(family, k.clone(), v.clone());
                }
            }
            let back = round_trip(&resource);
            prop_assert_eq!(back.content(), body.trim());
            for (k, v) in &props {
                prop_assert_eq!(back.property(k), Some(v.as_str()));
            }
            for (family, entries) in &family_props {
                for (k, v) in entries {
                    prop_assert_eq!(back.family(family).and_then(|f| f.get(k)), Some(v));
                }
            }
        }
    }
}
