use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;

// create a single time; an empty tag allowlist strips all markup while
// script and style content is removed entirely
static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut cleaner = Builder::default();
    cleaner.tags(HashSet::new());
    cleaner
});

/// Strips every HTML/script construct from untrusted input, leaving the
/// text content. Performs no semantic validation.
pub fn sanitize(raw: &str) -> String {
    CLEANER.clean(raw).to_string()
}

/// Sanitizes every value of a field map, preserving the keys.
pub fn sanitize_fields(fields: HashMap<String, String>) -> HashMap<String, String> {
    fields
        .into_iter()
        .map(|(name, value)| (name, sanitize(&value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{sanitize, sanitize_fields};

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(sanitize("<b>Near</b> campus"), "Near campus");
        assert_eq!(sanitize("plain text"), "plain text");
    }

    #[test]
    fn removes_script_content_entirely() {
        assert_eq!(sanitize("Boston<script>alert(1)</script>"), "Boston");
    }

    #[test]
    fn strips_event_handlers_with_their_tags() {
        let cleaned = sanitize("<img src=x onerror=alert(1)>1bhk");
        assert_eq!(cleaned, "1bhk");
    }

    #[test]
    fn sanitizes_every_field_of_a_map() {
        let fields = vec![
            ("city".to_owned(), "<i>Boston</i>".to_owned()),
            ("rent".to_owned(), "1200".to_owned()),
        ]
        .into_iter()
        .collect();

        let sanitized = sanitize_fields(fields);

        assert_eq!(sanitized["city"], "Boston");
        assert_eq!(sanitized["rent"], "1200");
    }
}
