//! Host page served at `/`.

/// Page template; `{{host}}` is replaced with the request host.
const INDEX_TEMPLATE: &str = include_str!("../assets/index.html");

/// Render the host page for `host`, HTML-escaped.
pub fn render_index(host: &str) -> String {
    INDEX_TEMPLATE.replace("{{host}}", &escape_html(host))
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
