use std::{collections::HashSet, path::PathBuf};

use anyhow::bail;
use chrono::NaiveDate;
use serde::Serialize;

/// Leading character of an output filename that keeps the post out of the index.
pub(crate) const DRAFT_PREFIX: char = '_';

#[derive(Debug, Clone)]
pub(crate) struct NavAnchor {
    pub id: String,
    pub label: String,
    /// Heading level after the shift, 2 to 4.
    pub level: u8,
}

impl NavAnchor {
    pub fn style(&self) -> Option<&'static str> {
        match self.level {
            2 => Some("font-size: 0.95em; font-weight: 500;"),
            3 => Some("font-size: 0.85em; font-weight: 400;"),
            4 => Some("font-size: 0.75em; font-weight: 300;"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Post {
    pub source_path: PathBuf,
    pub date: NaiveDate,
    pub title: String,
    /// First paragraph as written; shown on the index instead of a reformatted date.
    pub date_text: String,
    pub output_filename: String,
    /// Every paragraph but the date one, newline separated. Source of the index summary.
    pub body_text: String,
    pub anchors: Vec<NavAnchor>,
}

impl Post {
    pub fn is_draft(&self) -> bool {
        self.output_filename.starts_with(DRAFT_PREFIX)
    }
}

/// Posts of one run, in traversal order.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    posts: Vec<Post>,
    filenames: HashSet<String>,
}

impl Catalog {
    pub fn push(&mut self, post: Post) -> anyhow::Result<()> {
        if !self.filenames.insert(post.output_filename.clone()) {
            bail!(
                "{:?} would overwrite the page of another post ({})",
                post.source_path,
                post.output_filename
            );
        }
        self.posts.push(post);
        Ok(())
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }
}

/// The stdout line printed for each listed post: `[date_text, title, output_filename]`.
#[derive(Serialize, Debug)]
pub(crate) struct ListingLine<'a>(pub &'a str, pub &'a str, pub &'a str);

impl<'a> From<&'a Post> for ListingLine<'a> {
    fn from(post: &'a Post) -> Self {
        Self(&post.date_text, &post.title, &post.output_filename)
    }
}

#[cfg(test)]
pub(crate) fn sample_post(filename: &str, date: (i32, u32, u32)) -> Post {
    let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
    Post {
        source_path: PathBuf::from(format!("markdown/_{filename}.md")),
        date,
        title: format!("Title of {filename}"),
        date_text: date.format("%-d %B %Y").to_string(),
        output_filename: format!("{filename}.html"),
        body_text: format!("Body of {filename}."),
        anchors: vec![],
    }
}
