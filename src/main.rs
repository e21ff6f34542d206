use std::path::PathBuf;

use anyhow::bail;
use clap::{command, Arg, ArgAction};
use context::Context;
use generator::generate;
use log::info;
use renderer::RenderOptions;

mod context;
mod dom;
mod generator;
mod preprocess;
mod renderer;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = command!()
        .args([
            Arg::new("source_dir")
                .long("source-dir")
                .help("Directory of the Markdown posts, searched recursively")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("markdown"),
            Arg::new("posts_dir")
                .long("posts-dir")
                .help("Directory receiving the generated pages")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("posts"),
            Arg::new("index")
                .long("index")
                .help("Index page whose post listing is rebuilt [default: <posts-dir>/index.html]")
                .value_parser(clap::value_parser!(PathBuf)),
            Arg::new("template")
                .long("template")
                .help("Page template of a post [default: <posts-dir>/_template.html]")
                .value_parser(clap::value_parser!(PathBuf)),
            Arg::new("no_math")
                .long("no-math")
                .help("Leave $...$ to a client-side renderer instead of converting it to MathML")
                .action(ArgAction::SetTrue),
            Arg::new("hard_breaks")
                .long("hard-breaks")
                .help("Turn every newline inside a paragraph into a line break")
                .action(ArgAction::SetTrue),
        ])
        .get_matches();

    let source_dir: &PathBuf = matches.get_one("source_dir").unwrap();
    if !source_dir.is_dir() {
        bail!("source-dir must be a directory.");
    }
    let posts_dir: &PathBuf = matches.get_one("posts_dir").unwrap();
    if posts_dir.exists() && !posts_dir.is_dir() {
        bail!("if posts-dir exists, it must be a directory.");
    }

    let render = RenderOptions {
        math: !matches.get_flag("no_math"),
        hard_breaks: matches.get_flag("hard_breaks"),
    };
    let mut ctx = Context::new(source_dir.to_owned(), posts_dir.to_owned(), render);
    if let Some(index) = matches.get_one::<PathBuf>("index") {
        ctx.index_path = index.to_owned();
    }
    if let Some(template) = matches.get_one::<PathBuf>("template") {
        ctx.template_path = template.to_owned();
    }
    for (name, path) in [("index", &ctx.index_path), ("template", &ctx.template_path)] {
        if !path.is_file() {
            bail!("{name} file {path:?} does not exist.");
        }
    }

    let catalog = generate(&ctx)?;
    info!("generated {} posts", catalog.len());

    Ok(())
}
