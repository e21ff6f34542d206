use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _};
use log::{debug, info};

use crate::{context::Context, preprocess::Preprocessor, renderer::Renderer};

mod data;
mod index;
mod page;
mod post;
mod utils;

pub(crate) use data::Catalog;
use data::ListingLine;
use index::IndexPage;
use page::{write_page, Template};
use post::parse_post;

const MARKDOWN_EXTENSION: &str = "md";

/// Markdown sources under `source_dir`, breadth first, each directory in file name order.
fn collect_sources(source_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = vec![];
    let mut q = VecDeque::new();
    q.push_back(source_dir.to_path_buf());
    while let Some(dir) = q.pop_front() {
        let mut entries = std::fs::read_dir(&dir)
            .with_context(|| format!("while listing {dir:?}"))?
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let meta = entry.metadata()?;
            if meta.is_dir() {
                q.push_back(path);
            } else if meta.is_file()
                && path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION)
            {
                sources.push(path);
            } else {
                debug!("skipping {path:?}");
            }
        }
    }
    Ok(sources)
}

/// Builds every post page, then the index. Stops at the first failing document.
pub(crate) fn generate(ctx: &Context) -> anyhow::Result<Catalog> {
    if !ctx.source_dir.is_dir() {
        bail!("source directory {:?} does not exist", ctx.source_dir);
    }
    // configuration problems surface before any page is touched
    let template = Template::load(&ctx.template_path)?;
    let index_page = IndexPage::load(&ctx.index_path)?;
    fs_extra::dir::create_all(&ctx.posts_dir, false)?;

    let preprocessor = Preprocessor::new(ctx.render.math);
    let renderer = Renderer::new(ctx.render);

    let mut catalog = Catalog::default();
    for source_path in collect_sources(&ctx.source_dir)? {
        let markdown = std::fs::read_to_string(&source_path)
            .with_context(|| format!("while reading {source_path:?}"))?;
        let body_html = renderer.render(&preprocessor.apply(&markdown));
        let parsed = parse_post(&source_path, &body_html)
            .with_context(|| format!("while parsing {source_path:?}"))?;

        let output_filename = parsed.post.output_filename.clone();
        catalog.push(parsed.post.clone())?;
        let page = template
            .compose(parsed)
            .with_context(|| format!("while composing the page of {source_path:?}"))?;
        write_page(&ctx.posts_dir, &output_filename, &page)?;
    }

    let (index_html, listed) = index_page.rebuild(&catalog)?;
    for post in listed {
        println!("{}", serde_json::to_string(&ListingLine::from(post))?);
    }
    std::fs::write(index_page.path(), index_html)
        .with_context(|| format!("while writing {:?}", index_page.path()))?;
    info!("wrote {:?}", index_page.path());

    Ok(catalog)
}
