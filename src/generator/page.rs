use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use kuchiki::NodeRef;
use log::info;

use crate::dom;

use super::post::ParsedPost;
use super::utils::render_nav;

const TITLE: &str = "title";
const CONTENT_CONTAINER: &str = "div.post-container";
const NAV_PLACEHOLDER: &str = "nav#nav";

/// The page every post is poured into.
#[derive(Debug)]
pub(crate) struct Template {
    path: PathBuf,
    source: String,
}

impl Template {
    /// Reads the template and checks that it has the elements pages are built around.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("while reading the page template {path:?}"))?;
        let document = dom::parse_document(&source);
        for selector in [TITLE, CONTENT_CONTAINER] {
            if dom::select_first(&document, selector)?.is_none() {
                bail!("page template {path:?} has no {selector} element");
            }
        }
        Ok(Self {
            path: path.to_owned(),
            source,
        })
    }

    fn expect(&self, document: &NodeRef, selector: &str) -> anyhow::Result<NodeRef> {
        dom::select_first(document, selector)?
            .ok_or_else(|| anyhow!("page template {:?} has no {selector} element", self.path))
    }

    /// Builds the page of `parsed`, consuming its content tree.
    pub fn compose(&self, parsed: ParsedPost) -> anyhow::Result<String> {
        let ParsedPost { post, tree } = parsed;
        let document = dom::parse_document(&self.source);

        let title = self.expect(&document, TITLE)?;
        dom::clear(&title);
        title.append(NodeRef::new_text(post.title.as_str()));

        let container = self.expect(&document, CONTENT_CONTAINER)?;
        dom::prepend_all(&container, tree.into_nodes());

        let nav = dom::parse_fragment(&render_nav(&post.anchors).into_string())?;
        match dom::select_first(&document, NAV_PLACEHOLDER)? {
            Some(placeholder) => {
                for node in nav {
                    placeholder.insert_before(node);
                }
                placeholder.detach();
            }
            None => nav.into_iter().for_each(|node| container.insert_before(node)),
        }

        dom::to_html(&document)
    }
}

/// Whole-file overwrite of a generated page.
pub(crate) fn write_page(out_dir: &Path, filename: &str, html: &str) -> anyhow::Result<()> {
    let out_path = out_dir.join(filename);
    std::fs::write(&out_path, html).with_context(|| format!("while writing {out_path:?}"))?;
    info!("wrote {out_path:?}");
    Ok(())
}
