use std::borrow::Cow;

use latex2mathml::{latex_to_mathml, DisplayStyle};
use log::warn;
use maud::html;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::{Captures, Regex};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Capabilities of the Markdown renderer. Fixed for a whole run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderOptions {
    /// `$inline$` and `$$display$$` math, converted to MathML.
    pub math: bool,
    /// Every newline inside a paragraph becomes `<br />`.
    pub hard_breaks: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            math: true,
            hard_breaks: false,
        }
    }
}

/// Smart symbols, matched in a single pass. Arrows also match the forms left behind once
/// smart punctuation has turned `--` into an en dash.
const SMART_SYMBOLS: &str = r"(?x)
    (?P<arrow><-->|<–>|<==>|-->|–>|<--|<–|==>|<==)
    | (?P<mark>\((?:tm|c|r)\))
    | (?P<sign>\+/-|=/=)
    | (?P<care_of>\bc/o\b)
    | (?P<fraction>\b(?:1/2|1/3|2/3|1/4|3/4|1/5|2/5|3/5|4/5|1/6|5/6|1/8|3/8|5/8|7/8)\b)
    | \b(?P<number>[0-9]+)(?P<suffix>st|nd|rd|th)\b
";

fn symbol_glyph(token: &str) -> Option<&'static str> {
    Some(match token {
        "<-->" | "<–>" => "↔",
        "-->" | "–>" => "→",
        "<--" | "<–" => "←",
        "<==>" => "⇔",
        "==>" => "⇒",
        "<==" => "⇐",
        "(tm)" => "™",
        "(c)" => "©",
        "(r)" => "®",
        "+/-" => "±",
        "=/=" => "≠",
        "c/o" => "℅",
        "1/2" => "½",
        "1/3" => "⅓",
        "2/3" => "⅔",
        "1/4" => "¼",
        "3/4" => "¾",
        "1/5" => "⅕",
        "2/5" => "⅖",
        "3/5" => "⅗",
        "4/5" => "⅘",
        "1/6" => "⅙",
        "5/6" => "⅚",
        "1/8" => "⅛",
        "3/8" => "⅜",
        "5/8" => "⅝",
        "7/8" => "⅞",
        _ => return None,
    })
}

/// English ordinal suffix of `number`: 1st, 2nd, 3rd, 4th, 11th, 21st, 112th.
fn ordinal_suffix(number: u64) -> &'static str {
    match (number % 10, number % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

enum Segment<'t> {
    Text(&'t str),
    Glyph(&'static str),
    Ordinal(&'t str, &'t str),
}

pub(crate) struct Renderer {
    options: RenderOptions,
    syntax_set: SyntaxSet,
    symbol_pattern: Regex,
    emoji_pattern: Regex,
    inline_hilite_pattern: Regex,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            symbol_pattern: Regex::new(SMART_SYMBOLS).unwrap(),
            emoji_pattern: Regex::new(r":([a-z0-9_+\-]+):").unwrap(),
            inline_hilite_pattern: Regex::new(r"^#!([A-Za-z0-9_+\-]+)\s+(.*)$").unwrap(),
        }
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        if self.options.math {
            options.insert(Options::ENABLE_MATH);
        }
        options
    }

    pub fn render(&self, markdown: &str) -> String {
        let parser = TextMergeStream::new(Parser::new_ext(markdown, self.parser_options()));

        // fenced code is buffered until its end tag, then emitted highlighted
        let mut code_block: Option<(String, String)> = None;
        let events = parser.filter_map(|event| match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                code_block = Some((lang, String::new()));
                None
            }
            Event::End(TagEnd::CodeBlock) => code_block
                .take()
                .map(|(lang, code)| Event::Html(self.highlight_block(&lang, &code).into())),
            Event::Text(text) => match code_block.as_mut() {
                Some((_, code)) => {
                    code.push_str(&text);
                    None
                }
                None => Some(self.decorate_text(text)),
            },
            Event::Code(code) => {
                let hilite = self
                    .inline_hilite_pattern
                    .captures(&code)
                    .map(|caps| self.highlight_inline(&caps[1], &caps[2]));
                Some(match hilite {
                    Some(highlighted) => Event::InlineHtml(highlighted.into()),
                    None => Event::Code(code),
                })
            }
            Event::InlineMath(tex) => Some(self.render_math(tex, false)),
            Event::DisplayMath(tex) => Some(self.render_math(tex, true)),
            Event::SoftBreak if self.options.hard_breaks => Some(Event::HardBreak),
            _ => Some(event),
        });

        let mut body_html = String::new();
        pulldown_cmark::html::push_html(&mut body_html, events);
        body_html
    }

    /// Emoji shortcodes, then smart symbols. Never applied to code or math.
    fn decorate_text<'a>(&self, text: CowStr<'a>) -> Event<'a> {
        let text = match self.expand_emoji(&text) {
            Some(expanded) => CowStr::from(expanded),
            None => text,
        };
        match self.substitute_symbols(&text) {
            Some(decorated) => decorated,
            None => Event::Text(text),
        }
    }

    /// `None` when `text` holds no smart symbol. Ordinals carry a `<sup>`, so text holding
    /// one comes back as inline HTML.
    fn substitute_symbols(&self, text: &str) -> Option<Event<'static>> {
        let segments = self.smart_symbols(text);
        if segments.iter().all(|s| matches!(s, Segment::Text(_))) {
            return None;
        }

        if segments.iter().any(|s| matches!(s, Segment::Ordinal(..))) {
            let markup = html! {
                @for segment in segments.iter() {
                    @match segment {
                        Segment::Text(text) => { (text) }
                        Segment::Glyph(glyph) => { (glyph) }
                        Segment::Ordinal(number, suffix) => { (number) sup { (suffix) } }
                    }
                }
            };
            return Some(Event::InlineHtml(markup.into_string().into()));
        }
        let mut decorated = String::with_capacity(text.len());
        for segment in segments.iter() {
            match segment {
                Segment::Text(text) => decorated.push_str(text),
                Segment::Glyph(glyph) => decorated.push_str(glyph),
                Segment::Ordinal(number, suffix) => {
                    decorated.push_str(number);
                    decorated.push_str(suffix);
                }
            }
        }
        Some(Event::Text(decorated.into()))
    }

    fn expand_emoji(&self, text: &str) -> Option<String> {
        if !text.contains(':') {
            return None;
        }
        match self.emoji_pattern.replace_all(text, |caps: &Captures| {
            emojis::get_by_shortcode(&caps[1])
                .map(|emoji| emoji.as_str().to_string())
                .unwrap_or_else(|| caps[0].to_string())
        }) {
            Cow::Borrowed(_) => None,
            Cow::Owned(expanded) => Some(expanded),
        }
    }

    /// Splits `text` around the smart symbols it holds. Fractions, `c/o` and ordinals must
    /// stand alone, and `(c)` or `(r)` right after a letter reads as a call: `11/22`,
    /// `etc/o` and `f(c)` stay as written.
    fn smart_symbols<'t>(&self, text: &'t str) -> Vec<Segment<'t>> {
        let mut segments = vec![];
        let mut last = 0;
        for caps in self.symbol_pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let ordinal = caps.name("number").zip(caps.name("suffix"));
            let segment = if let Some((number, suffix)) = ordinal {
                let valid = number
                    .as_str()
                    .parse::<u64>()
                    .map_or(false, |n| ordinal_suffix(n) == suffix.as_str());
                valid.then(|| Segment::Ordinal(number.as_str(), suffix.as_str()))
            } else {
                let glued = caps.name("mark").map_or(false, |mark| mark.as_str().len() == 3)
                    && text[..whole.start()]
                        .chars()
                        .next_back()
                        .map_or(false, char::is_alphanumeric);
                symbol_glyph(whole.as_str())
                    .filter(|_| !glued)
                    .map(Segment::Glyph)
            };
            let Some(segment) = segment else { continue };
            if last < whole.start() {
                segments.push(Segment::Text(&text[last..whole.start()]));
            }
            segments.push(segment);
            last = whole.end();
        }
        if last < text.len() || segments.is_empty() {
            segments.push(Segment::Text(&text[last..]));
        }
        segments
    }

    /// TeX to MathML; TeX that does not convert is kept in the plain math span.
    fn render_math<'a>(&self, tex: CowStr<'a>, display: bool) -> Event<'a> {
        let (style, class) = if display {
            (DisplayStyle::Block, "math math-display")
        } else {
            (DisplayStyle::Inline, "math math-inline")
        };
        match latex_to_mathml(&tex, style) {
            Ok(mathml) => {
                let markup = html! { span class=(class) { (maud::PreEscaped(mathml)) } };
                Event::InlineHtml(markup.into_string().into())
            }
            Err(e) => {
                warn!("could not convert math {tex:?}, keeping the TeX: {e}");
                if display {
                    Event::DisplayMath(tex)
                } else {
                    Event::InlineMath(tex)
                }
            }
        }
    }

    fn highlight_lines(&self, lang: &str, code: &str) -> Option<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                warn!("could not highlight {lang:?} code, keeping it plain: {e}");
                return None;
            }
        }
        Some(generator.finalize())
    }

    fn highlight_block(&self, lang: &str, code: &str) -> String {
        let class = (!lang.is_empty()).then(|| format!("language-{lang}"));
        let markup = match self.highlight_lines(lang, code) {
            Some(highlighted) => html! {
                div.highlight { pre { code class=[class] { (maud::PreEscaped(highlighted)) } } }
            },
            None => html! {
                div.highlight { pre { code class=[class] { (code) } } }
            },
        };
        markup.into_string() + "\n"
    }

    fn highlight_inline(&self, lang: &str, code: &str) -> String {
        let class = format!("highlight language-{lang}");
        let markup = match self.highlight_lines(lang, code) {
            Some(highlighted) => html! { code class=(class) { (maud::PreEscaped(highlighted)) } },
            None => html! { code class=(class) { (code) } },
        };
        markup.into_string()
    }
}
