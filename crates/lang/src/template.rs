//! `{name}` placeholder templates
//!
//! Templates drive the `parse` and `build` instructions. `parse` matches the
//! literal text between placeholders against an input and captures the
//! substrings in between; `build` is the inverse, substituting rendered map
//! values into the placeholders.

use agerun_core::{MapValue, Value};

/// Match `input` against `template`, capturing each `{name}` placeholder as
/// a string value. The literal text between placeholders must appear in the
/// input; any mismatch yields an empty map.
pub fn parse_with_template(template: &str, input: &str) -> MapValue {
    let mut captured = MapValue::new();
    let mut template = template;
    let mut input = input;

    loop {
        let Some(open) = template.find('{') else {
            // Trailing literal must consume the rest of the input exactly.
            if template == input {
                return captured;
            }
            return MapValue::new();
        };

        let literal = &template[..open];
        let Some(rest) = input.strip_prefix(literal) else {
            return MapValue::new();
        };
        input = rest;
        template = &template[open + 1..];

        let Some(close) = template.find('}') else {
            // Unterminated placeholder never matches.
            return MapValue::new();
        };
        let name = &template[..close];
        template = &template[close + 1..];

        // The capture runs to the next literal segment (or end of input for
        // a trailing placeholder).
        let next_literal_end = template.find('{').unwrap_or(template.len());
        let next_literal = &template[..next_literal_end];
        let value = if next_literal.is_empty() {
            if template.is_empty() {
                let all = input;
                input = "";
                all
            } else {
                // Adjacent placeholders: the first captures nothing.
                ""
            }
        } else {
            let Some(at) = input.find(next_literal) else {
                return MapValue::new();
            };
            let piece = &input[..at];
            input = &input[at..];
            piece
        };
        captured.insert(name, Value::String(value.to_string()));
    }
}

/// Substitute `{name}` placeholders with the rendered value under `name`.
/// Placeholders with no matching key (or with an unrenderable container
/// value) are left literally in place.
pub fn build_with_template(template: &str, values: &MapValue) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // Unterminated brace: keep the tail literally.
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match values.get(name).and_then(Value::render) {
            Some(rendered) => out.push_str(&rendered),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
