// src/utils/html.rs

/// Sanitizes user-edited quiz text with ammonia before it is stored.
///
/// Safe inline markup survives; `<script>` (with its content), `<iframe>` and event-handler
/// attributes are dropped. Plain text passes through except for HTML-escaping of `<`, `>` and `&`.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
