use log::debug;

/// Media referenced from the sources as `../posts/media/...` lives next to the pages.
const MEDIA_PATH: (&str, &str) = ("../posts/media", "media");

/// Keeps raw TeX intact through Markdown escaping when math is left to the browser.
const TEX_PASSTHROUGH: [(&str, &str); 4] = [
    ("align*", "align\\*"),
    ("\\\\", "\\\\\\"),
    ("\\left\\{", "\\left\\\\{"),
    ("\\right\\}", "\\right\\\\}"),
];

/// Literal substitutions applied to the Markdown source before rendering.
///
/// Order matters: each replacement sees the output of the previous one.
#[derive(Debug, Clone)]
pub(crate) struct Preprocessor {
    substitutions: Vec<(&'static str, &'static str)>,
}

impl Preprocessor {
    pub fn new(math: bool) -> Self {
        let mut substitutions = vec![MEDIA_PATH];
        // the renderer keeps `$...$` verbatim when it understands math
        if !math {
            substitutions.extend(TEX_PASSTHROUGH);
        }
        Self { substitutions }
    }

    pub fn apply(&self, source: &str) -> String {
        self.substitutions
            .iter()
            .fold(source.to_string(), |text, (from, to)| {
                if text.contains(from) {
                    debug!("replacing {from:?} with {to:?}");
                    text.replace(from, to)
                } else {
                    text
                }
            })
    }
}
