use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use log::info;

use crate::dom;

use super::data::{Catalog, Post};
use super::utils::{render_entry, shorten, sort_post, PLACEHOLDER, SUMMARY_WIDTH};

const POSTS_CONTAINER: &str = "div#posts-container";

/// The index page, whose post listing is rebuilt from scratch on every run.
#[derive(Debug)]
pub(crate) struct IndexPage {
    path: PathBuf,
    source: String,
}

impl IndexPage {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("while reading the index page {path:?}"))?;
        if dom::select_first(&dom::parse_document(&source), POSTS_CONTAINER)?.is_none() {
            bail!("index page {path:?} has no {POSTS_CONTAINER} element");
        }
        Ok(Self {
            path: path.to_owned(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-renders the listing; returns the page and the listed posts, newest first.
    pub fn rebuild<'a>(&self, catalog: &'a Catalog) -> anyhow::Result<(String, Vec<&'a Post>)> {
        let document = dom::parse_document(&self.source);
        let container = dom::select_first(&document, POSTS_CONTAINER)?
            .ok_or_else(|| anyhow!("index page {:?} has no {POSTS_CONTAINER}", self.path))?;
        dom::clear(&container);

        let mut listed: Vec<&Post> = catalog.posts().iter().filter(|p| !p.is_draft()).collect();
        listed.sort_by(sort_post);

        for post in listed.iter() {
            let summary = shorten(&post.body_text, SUMMARY_WIDTH, PLACEHOLDER);
            for node in dom::parse_fragment(&render_entry(post, &summary).into_string())? {
                container.append(node);
            }
        }
        info!("{} of {} posts listed on the index", listed.len(), catalog.len());

        Ok((dom::prettify(&document)?, listed))
    }
}
