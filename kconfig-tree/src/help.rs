use std::sync::LazyLock;

use regex::{Captures, Regex};

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``(.*?)``").expect("code span pattern"));

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{2,256}\.[a-z]{2,4}\b([-a-zA-Z0-9@:%_+.~#?&/=]*)",
    )
    .expect("link pattern")
});

/// Turn raw Kconfig help text into display markup.
///
/// Blank-line separated paragraphs become `<br><br>` breaks, paragraphs of
/// `-` items become `<ul>` lists, ``` ``code`` ``` becomes `<span>` and bare
/// URLs become anchors.
pub fn format_help_text(raw: &str) -> String {
    let mut out = String::new();
    let mut prev_was_list = true;

    for paragraph in raw.split("\n\n") {
        let paragraph = paragraph.trim_matches('\n');
        if paragraph.trim().is_empty() {
            continue;
        }
        let is_list = paragraph.trim_start().starts_with('-');
        if !out.is_empty() && !is_list && !prev_was_list {
            out.push_str("<br><br>");
        }
        if is_list {
            out.push_str(&format_list(paragraph));
        } else {
            out.push_str(&format_inline(paragraph));
        }
        prev_was_list = is_list;
    }
    out
}

fn format_list(paragraph: &str) -> String {
    let items = paragraph
        .trim_start()
        .trim_start_matches('-')
        .split("\n-")
        .map(|item| format!("<li>{}</li>", format_inline(item.trim())))
        .collect::<String>();
    format!("<ul>{items}</ul>")
}

fn format_inline(text: &str) -> String {
    let text = CODE_SPAN.replace_all(text, "<span>$1</span>");
    LINK.replace_all(&text, |caps: &Captures| {
        format!(r#"<a href="{0}">{0}</a>"#, &caps[0])
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_code_and_links() {
        let raw = "Enable logging.\n\nSee https://docs.espressif.com/log for ``esp_log_write``";
        assert_eq!(
            format_help_text(raw),
            "Enable logging.<br><br>See <a href=\"https://docs.espressif.com/log\">\
             https://docs.espressif.com/log</a> for <span>esp_log_write</span>"
        );
    }

    #[test]
    fn bullet_lists() {
        let raw = "Select a mode:\n\n- fast\n- slow, uses ``sleep``\n\nDefaults to fast.";
        assert_eq!(
            format_help_text(raw),
            "Select a mode:<ul><li>fast</li><li>slow, uses <span>sleep</span></li></ul>\
             Defaults to fast."
        );
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(format_help_text("Just text\non two lines"), "Just text\non two lines");
        assert_eq!(format_help_text(""), "");
    }
}
