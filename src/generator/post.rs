use std::{collections::HashSet, path::Path};

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use kuchiki::NodeRef;
use log::{debug, warn};

use crate::dom;

use super::data::{NavAnchor, Post};
use super::utils::{anchor_id, shorten, NAV_LABEL_WIDTH, PLACEHOLDER};

const DATE_FORMAT: &str = "%d %B %Y";

/// Heading renames, deepest first so that no renamed heading gets renamed twice.
const HEADING_SHIFT: [(&str, &str); 4] = [("h4", "h5"), ("h3", "h4"), ("h2", "h3"), ("h1", "h2")];

/// Headings listed in the navigation, as named after the shift.
const NAV_HEADINGS: &str = "h2, h3, h4";

/// Normalised content of a post, ready to be placed into the page template.
#[derive(Debug)]
pub(crate) struct PostTree {
    root: NodeRef,
}

impl PostTree {
    /// Top-level nodes of the content, detached and in document order.
    pub fn into_nodes(self) -> Vec<NodeRef> {
        let nodes: Vec<NodeRef> = self.root.children().collect();
        for node in nodes.iter() {
            node.detach();
        }
        nodes
    }
}

#[derive(Debug)]
pub(crate) struct ParsedPost {
    pub post: Post,
    pub tree: PostTree,
}

/// `_my-post.md` is published as `my-post.html`: the first character is a filler.
pub(super) fn output_filename(source_path: &Path) -> anyhow::Result<String> {
    let stem = source_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("{source_path:?} has no usable file name"))?;
    let mut chars = stem.chars();
    chars.next();
    let name = chars.as_str();
    if name.is_empty() {
        bail!("{source_path:?} leaves an empty page name once its leading character is dropped");
    }
    Ok(format!("{name}.html"))
}

/// A date like `5 March 2023`. The month is spelled out in full.
pub(super) fn parse_date(text: &str) -> anyhow::Result<NaiveDate> {
    let text = text.trim();
    let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
        .with_context(|| format!("{text:?} is not a date like \"5 March 2023\""))?;
    // %B also accepts "Mar"
    let month = text.split_whitespace().nth(1).unwrap_or_default();
    if !month.eq_ignore_ascii_case(&date.format("%B").to_string()) {
        bail!("{text:?} abbreviates the month, write it out like \"5 March 2023\"");
    }
    Ok(date)
}

/// Extracts the metadata of a rendered post and normalises its tree for the page template.
pub(crate) fn parse_post(source_path: &Path, html: &str) -> anyhow::Result<ParsedPost> {
    let document = dom::parse_document(html);
    let root = dom::select_first(&document, "body")?
        .ok_or_else(|| anyhow!("rendered post has no body"))?;

    merge_lists(&root);

    let first_p = dom::select_first(&root, "p")?
        .ok_or_else(|| anyhow!("no paragraph holding the publication date"))?;
    let first_h1 =
        dom::select_first(&root, "h1")?.ok_or_else(|| anyhow!("no level 1 heading (title)"))?;

    let date_text = first_p.text_contents();
    let date = parse_date(&date_text)?;
    let title = first_h1.text_contents();
    dom::wrap(&first_p, dom::new_element("div", &[("class", "date")]));

    shift_headings(&root)?;
    let anchors = build_anchors(&root)?;

    let body_text = dom::select_all(&root, "p")?
        .iter()
        .skip(1)
        .map(|p| p.text_contents())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ParsedPost {
        post: Post {
            source_path: source_path.to_owned(),
            date,
            title,
            date_text,
            output_filename: output_filename(source_path)?,
            body_text,
            anchors,
        },
        tree: PostTree { root },
    })
}

fn is_list(node: &NodeRef) -> bool {
    matches!(dom::tag_name(node), Some("ul" | "ol"))
}

/// Joins sibling lists of the same kind that the renderer split apart.
fn merge_lists(root: &NodeRef) {
    let mut current = root.first_child();
    while let Some(node) = current {
        if is_list(&node) {
            while let Some(next) = dom::next_significant_sibling(&node)
                .filter(|next| is_list(next) && dom::tag_name(next) == dom::tag_name(&node))
            {
                debug!("merging adjacent <{}> lists", dom::tag_name(&node).unwrap_or(""));
                for item in next.children().collect::<Vec<_>>() {
                    if dom::tag_name(&item) == Some("li") {
                        node.append(item);
                    }
                }
                next.detach();
            }
        }
        current = node.next_sibling();
    }
}

/// Moves every heading one level down: the page template owns the only `<h1>`.
fn shift_headings(root: &NodeRef) -> anyhow::Result<()> {
    for (from, to) in HEADING_SHIFT {
        for heading in dom::select_all(root, from)? {
            dom::rename(&heading, to);
        }
    }
    Ok(())
}

fn build_anchors(root: &NodeRef) -> anyhow::Result<Vec<NavAnchor>> {
    let mut seen = HashSet::new();
    let mut anchors = vec![];
    for heading in dom::select_all(root, NAV_HEADINGS)? {
        let text = heading.text_contents();
        let id = anchor_id(&text);
        // same id twice: links reach the first heading only
        if !seen.insert(id.clone()) {
            warn!("heading {text:?} repeats the anchor #{id}");
        }
        dom::set_attribute(&heading, "id", &id);

        let level = match dom::tag_name(&heading) {
            Some("h2") => 2,
            Some("h3") => 3,
            _ => 4,
        };
        anchors.push(NavAnchor {
            label: shorten(&text, NAV_LABEL_WIDTH, PLACEHOLDER),
            id,
            level,
        });
    }
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_html(tree: PostTree) -> String {
        tree.into_nodes()
            .iter()
            .map(|node| dom::to_html(node).unwrap())
            .collect()
    }

    fn parse(html: &str) -> ParsedPost {
        parse_post(Path::new("markdown/_post.md"), html).unwrap()
    }

    #[test]
    fn extracts_metadata() {
        let parsed = parse(
            "<p>5 March 2023</p>\n<h1>Hello World</h1>\n<p>First.</p>\n<p>Second.</p>\n",
        );
        let post = parsed.post;
        assert_eq!(post.date, NaiveDate::from_ymd_opt(2023, 3, 5).unwrap());
        assert_eq!(post.date_text, "5 March 2023");
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.output_filename, "post.html");
        assert_eq!(post.body_text, "First.\nSecond.");
    }

    #[test]
    fn wraps_the_date_paragraph() {
        let parsed = parse("<p>5 March 2023</p><h1>T</h1>");
        assert_eq!(
            content_html(parsed.tree),
            r#"<div class="date"><p>5 March 2023</p></div><h2 id="t">T</h2>"#
        );
    }

    #[test]
    fn dates_round_trip() {
        for (text, ymd) in [
            ("1 January 2020", (2020, 1, 1)),
            ("05 March 2023", (2023, 3, 5)),
            ("29 February 2024", (2024, 2, 29)),
            ("31 December 1999", (1999, 12, 31)),
            ("7 july 2021", (2021, 7, 7)),
        ] {
            let expected = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap();
            assert_eq!(parse_date(text).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn malformed_dates_fail() {
        for text in [
            "2023-03-05",
            "March 5 2023",
            "30 February 2023",
            "5 Marchember 2023",
            "5 Mar 2023",
            "1 sept 2020",
            "",
        ] {
            assert!(parse_date(text).is_err(), "{text}");
        }
        assert!(parse_post(Path::new("_x.md"), "<p>yesterday</p><h1>T</h1>").is_err());
    }

    #[test]
    fn missing_date_or_title_fails() {
        assert!(parse_post(Path::new("_x.md"), "<h1>T</h1>").is_err());
        assert!(parse_post(Path::new("_x.md"), "<p>5 March 2023</p><h2>T</h2>").is_err());
    }

    #[test]
    fn shifts_heading_levels() {
        let parsed = parse("<p>5 March 2023</p><h1>A</h1><h3>B</h3><h4>C</h4><h5>D</h5>");
        let html = content_html(parsed.tree);
        assert!(html.contains(r#"<h2 id="a">A</h2>"#));
        assert!(html.contains(r#"<h4 id="b">B</h4>"#));
        assert!(html.contains("<h5>C</h5>"));
        assert!(html.contains("<h5>D</h5>"));
        assert!(!html.contains("<h1") && !html.contains("<h3"));
    }

    #[test]
    fn builds_navigation_from_shifted_headings() {
        let parsed = parse(
            "<p>5 March 2023</p><h1>Title</h1><h2>Section: Overview (v2)</h2>\
             <h3>A rather long subsection heading</h3><h4>Too deep</h4>",
        );
        let anchors = parsed.post.anchors;
        let summary: Vec<_> = anchors
            .iter()
            .map(|a| (a.id.as_str(), a.label.as_str(), a.level))
            .collect();
        assert_eq!(
            summary,
            [
                ("title", "Title", 2),
                ("section-overview-v2", "Section: Overview (v2)", 3),
                ("a-rather-long-subsection-heading", "A rather long...", 4),
            ]
        );
        let html = content_html(parsed.tree);
        assert!(html.contains(r#"<h3 id="section-overview-v2">"#));
        assert!(html.contains("<h5>Too deep</h5>"));
    }

    #[test]
    fn duplicate_anchors_are_kept() {
        let parsed = parse("<p>5 March 2023</p><h1>T</h1><h2>Notes</h2><h2>Notes</h2>");
        let ids: Vec<_> = parsed.post.anchors.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, ["t", "notes", "notes"]);
    }

    #[test]
    fn merges_adjacent_lists_of_the_same_kind() {
        let parsed = parse(
            "<p>5 March 2023</p><h1>T</h1>\
             <ul><li>A</li></ul>\n<ul><li>B</li></ul><ul><li>C</li></ul>\
             <ol><li>1</li></ol><p>gap</p><ol><li>2</li></ol>",
        );
        let html = content_html(parsed.tree);
        assert!(html.contains("<ul><li>A</li><li>B</li><li>C</li></ul>"));
        assert!(html.contains("<ol><li>1</li></ol><p>gap</p><ol><li>2</li></ol>"));
    }

    #[test]
    fn different_list_kinds_stay_apart() {
        let parsed = parse("<p>5 March 2023</p><h1>T</h1><ul><li>A</li></ul><ol><li>B</li></ol>");
        assert!(content_html(parsed.tree).contains("<ul><li>A</li></ul><ol><li>B</li></ol>"));
    }

    #[test]
    fn output_filenames() {
        assert_eq!(output_filename(Path::new("md/_hello.md")).unwrap(), "hello.html");
        assert_eq!(output_filename(Path::new("__draft.md")).unwrap(), "_draft.html");
        assert!(output_filename(Path::new("x.md")).is_err());
    }
}
