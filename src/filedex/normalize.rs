use regex::Regex;
use std::sync::LazyLock;

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@\w+|[_\-.+]").unwrap_or_else(|e| panic!("invalid noise pattern: {e}"))
});

/// Replace `@mentions` and the separators `_ - . +` with a single space each.
///
/// Spaces are neither trimmed nor collapsed.
pub fn normalize(text: &str) -> String {
    NOISE.replace_all(text, " ").into_owned()
}
