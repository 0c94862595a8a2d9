//! Post card markup

use app_core::PostCard;

/// CSS class of a feed entry
pub const POST_CLASS: &str = "post";

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inner HTML of a feed entry
pub fn post_card_html(card: &PostCard) -> String {
    format!(
        "<hr/>\n<h3>{}</h3>\n<p>{}...</p>\n<p><strong>Reading time:</strong> {} minutes</p>\n<p><strong>By</strong> {}</p>",
        escape_html(&card.title),
        escape_html(&card.preview),
        card.reading_time,
        escape_html(&card.author),
    )
}

/// Full feed entry element
pub fn post_card_element(card: &PostCard) -> String {
    format!("<div class=\"{}\">{}</div>", POST_CLASS, post_card_html(card))
}
