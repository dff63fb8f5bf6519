/// Rewrite a captured `href`/`src` value into an absolute URL.
///
/// Empty input stays empty so callers can tell "no value" apart from a real
/// link. Anything already carrying a scheme, or in a form we don't recognise,
/// passes through untouched.
pub fn normalize_url(raw: &str, base_origin: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if raw.starts_with("http") {
        return raw.to_string();
    }
    if raw.starts_with("//") {
        return format!("https:{}", raw);
    }
    if raw.starts_with('/') {
        return format!("{}{}", base_origin.trim_end_matches('/'), raw);
    }
    raw.to_string()
}
