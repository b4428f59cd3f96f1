use serde_json::Value;

/// Pulls a JSON value out of a model answer that may wrap it in markdown
/// fences or prose. Falls back to the widest `{ … }` slice.
pub fn loose_parse_json(text: &str) -> Option<Value> {
    let clean = strip_fences(text);
    if clean.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(&clean) {
        return Some(value);
    }

    let start = clean.find('{')?;
    let end = clean.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str(&clean[start..=end]).ok()
}

fn strip_fences(text: &str) -> String {
    let mut clean = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(index) = rest.find("```") {
        clean.push_str(&rest[..index]);
        rest = &rest[index + 3..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    clean.push_str(rest);

    clean.trim().to_string()
}
