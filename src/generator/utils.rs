use std::{borrow::Borrow, cmp::Ordering, sync::OnceLock};

use maud::{html, Markup};
use regex::Regex;

use super::data::{NavAnchor, Post};

/// Width of the summary shown for each post on the index.
pub(super) const SUMMARY_WIDTH: usize = 200;
/// Width of a heading label in the page navigation.
pub(super) const NAV_LABEL_WIDTH: usize = 25;
pub(super) const PLACEHOLDER: &str = "...";

/// URL fragment for a heading: non-alphanumeric runs become `-`, trimmed, lowercased.
pub(super) fn anchor_id(text: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());
    separators
        .replace_all(text, "-")
        .trim_matches('-')
        .to_lowercase()
}

/// Fits `text` in `width` characters, cutting at a word boundary and appending `placeholder`.
///
/// Text that already fits is returned as is. Otherwise whitespace is collapsed and as many
/// whole words are kept as leave room for the placeholder; when not even the first word fits,
/// only the placeholder remains.
pub(super) fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut kept = String::new();
    let mut kept_len = 0;
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if kept.is_empty() { word_len } else { kept_len + 1 + word_len };
        if needed > budget {
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
        }
        kept.push_str(word);
        kept_len = needed;
    }

    if kept.is_empty() {
        placeholder.trim_start().to_string()
    } else {
        kept + placeholder
    }
}

/// Newest first. Ties keep their relative order when used with a stable sort.
pub(super) fn sort_post<T: Borrow<Post>>(a: &T, b: &T) -> Ordering {
    b.borrow().date.cmp(&a.borrow().date)
}

pub(super) fn render_nav(anchors: &[NavAnchor]) -> Markup {
    html! {
        nav #nav {
            ul {
                li { a.active href="index.html" { "Back to all write-ups" } }
                br;
                @for anchor in anchors {
                    li { a href={ "#" (anchor.id) } style=[anchor.style()] { (anchor.label) } }
                }
            }
        }
    }
}

pub(super) fn render_entry(post: &Post, summary: &str) -> Markup {
    html! {
        article {
            h4 { a href=(post.output_filename) { (post.title) } }
            div {
                p { (post.date_text) }
                p { (summary) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::data::sample_post;

    #[test]
    fn anchor_collapses_separators() {
        assert_eq!(anchor_id("Section: Overview (v2)"), "section-overview-v2");
        assert_eq!(anchor_id("  --Hello,   World!!  "), "hello-world");
        assert_eq!(anchor_id("日本語"), "");
    }

    #[test]
    fn short_text_is_unchanged() {
        let text = "A short\nsummary.";
        assert_eq!(shorten(text, SUMMARY_WIDTH, PLACEHOLDER), text);
        let exact = "x".repeat(SUMMARY_WIDTH);
        assert_eq!(shorten(&exact, SUMMARY_WIDTH, PLACEHOLDER), exact);
    }

    #[test]
    fn long_text_is_cut_at_a_word_boundary() {
        let text = "word ".repeat(60);
        let summary = shorten(&text, SUMMARY_WIDTH, PLACEHOLDER);
        assert!(summary.ends_with("word..."));
        assert!(summary.chars().count() <= SUMMARY_WIDTH);
        // 39 words and their separators take 194 characters, a 40th would not leave room
        assert_eq!(summary, "word ".repeat(39).trim_end().to_string() + "...");
    }

    #[test]
    fn nav_labels_are_shortened() {
        assert_eq!(
            shorten("Understanding the borrow checker in depth", NAV_LABEL_WIDTH, PLACEHOLDER),
            "Understanding the..."
        );
        assert_eq!(shorten("Introduction", NAV_LABEL_WIDTH, PLACEHOLDER), "Introduction");
        assert_eq!(shorten(&"z".repeat(30), NAV_LABEL_WIDTH, PLACEHOLDER), "...");
    }

    #[test]
    fn newest_first_and_stable() {
        let mut posts = vec![
            sample_post("a", (2023, 1, 1)),
            sample_post("b", (2023, 6, 15)),
            sample_post("c", (2022, 12, 31)),
            sample_post("d", (2023, 1, 1)),
        ];
        posts.sort_by(sort_post);
        let order: Vec<_> = posts.iter().map(|p| p.output_filename.as_str()).collect();
        assert_eq!(order, ["b.html", "a.html", "d.html", "c.html"]);
    }

    #[test]
    fn entry_markup() {
        let post = sample_post("hello", (2023, 3, 5));
        assert_eq!(
            render_entry(&post, "Body & soul").into_string(),
            r#"<article><h4><a href="hello.html">Title of hello</a></h4><div><p>5 March 2023</p><p>Body &amp; soul</p></div></article>"#
        );
    }

    #[test]
    fn nav_markup() {
        let anchors = vec![
            NavAnchor {
                id: "intro".into(),
                label: "Intro".into(),
                level: 2,
            },
            NavAnchor {
                id: "deep".into(),
                label: "Deep".into(),
                level: 4,
            },
        ];
        let nav = render_nav(&anchors).into_string();
        assert!(nav.starts_with(
            r#"<nav id="nav"><ul><li><a class="active" href="index.html">Back to all write-ups</a></li><br>"#
        ));
        assert!(nav.contains(
            r##"<li><a href="#intro" style="font-size: 0.95em; font-weight: 500;">Intro</a></li>"##
        ));
        assert!(nav.contains(
            r##"<a href="#deep" style="font-size: 0.75em; font-weight: 300;">Deep</a>"##
        ));
    }
}
