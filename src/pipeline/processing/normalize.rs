/// Canonical form of review text: missing input is `""`, every line break
/// becomes one space, outer whitespace is trimmed. Idempotent.
pub fn normalize(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}
