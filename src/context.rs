use std::path::PathBuf;

use crate::renderer::RenderOptions;

#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub source_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub index_path: PathBuf,
    pub template_path: PathBuf,

    pub render: RenderOptions,
}

impl Context {
    /// Layout used by the bare invocation: `markdown/` sources rendered into `posts/`,
    /// next to `posts/index.html` and `posts/_template.html`.
    pub fn new(source_dir: PathBuf, posts_dir: PathBuf, render: RenderOptions) -> Self {
        Self {
            index_path: posts_dir.join("index.html"),
            template_path: posts_dir.join("_template.html"),
            source_dir,
            posts_dir,
            render,
        }
    }
}
