// src/utils/html.rs

use ammonia;

/// Clean author-supplied text using the ammonia library.
///
/// Quiz titles and question texts are shown to every test-taker, so unsafe
/// markup (`<script>`, event handler attributes) is stripped while harmless
/// formatting tags are kept. Text without any markup is returned unchanged,
/// so `Q&A` stays `Q&A` instead of being entity-escaped. Answer options are
/// left untouched because they double as identifiers for submitted answers.
pub fn clean_html(input: &str) -> String {
    if !input.contains('<') {
        return input.to_string();
    }
    ammonia::clean(input)
}
