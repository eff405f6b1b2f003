//! Markup transcoding: raw board markup → plain text → display HTML.
//!
//! Both directions are ordered lists of rewrite steps built once and reused.
//! Order matters: entity decoding runs last in the text pipeline, and the
//! display pipeline only ever sees already decoded text, so nothing a step
//! produces is re-scanned into something else by a later step.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

/// URL scheme used for cross-reference links inside display fragments.
/// The UI is expected to intercept it instead of following it.
pub const REPLY_ANCHOR_SCHEME: &str = "internal-reply-anchor://";

/// How a matched span is rewritten.
#[derive(Clone, Copy)]
pub enum Rewrite {
    /// Drop the whole match.
    Strip,
    /// Keep only the first capture group (the element's inner text).
    Unwrap,
    /// Replace with a fixed string.
    Literal(&'static str),
    /// Build the replacement from the captures.
    Expand(fn(&Captures) -> String),
}

/// A named pattern plus its rewrite strategy.
pub struct RewriteRule {
    name: &'static str,
    pattern: Regex,
    rewrite: Rewrite,
}

impl RewriteRule {
    fn new(name: &'static str, pattern: &str, rewrite: Rewrite) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("Invalid rewrite pattern"),
            rewrite,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self.rewrite {
            Rewrite::Strip => self.pattern.replace_all(input, NoExpand("")),
            Rewrite::Unwrap => self.pattern.replace_all(input, "${1}"),
            Rewrite::Literal(s) => self.pattern.replace_all(input, NoExpand(s)),
            Rewrite::Expand(f) => self.pattern.replace_all(input, |caps: &Captures| f(caps)),
        }
    }
}

/// One stage of a pipeline.
pub enum Step {
    Rewrite(RewriteRule),
    /// Decode HTML entities. Sequences that don't name a known entity are
    /// left untouched, so this step never fails.
    DecodeEntities,
    /// Escape `&`, `<` and `>` so text is inert inside HTML.
    EscapeHtml,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rewrite(rule) => rule.name(),
            Self::DecodeEntities => "decode-entities",
            Self::EscapeHtml => "escape-html",
        }
    }

    fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            Self::Rewrite(rule) => rule.apply(input),
            Self::DecodeEntities => html_escape::decode_html_entities(input),
            Self::EscapeHtml => html_escape::encode_text(input),
        }
    }
}

/// Ordered list of steps applied one after another.
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::name).collect()
    }

    pub fn apply(&self, input: &str) -> String {
        self.steps
            .iter()
            .fold(input.to_string(), |acc, step| step.apply(&acc).into_owned())
    }
}

const ANCHOR_PATTERN: &str = r"(?is)<a\s+href=[^>]*>(.*?)</a>";

// Runs after escaping, so the only `&` a URL can contain is `&amp;`. Stopping
// at any other entity keeps an adjacent `&gt;&gt;N` out of the link.
const URL_PATTERN: &str = r"(h?ttp)(s?)(://(?:[-_.!~*'()a-zA-Z0-9;/?:@=+$,%#]|&amp;)+)";

static TEXT_PIPELINE: Lazy<Pipeline> = Lazy::new(|| {
    Pipeline::new(vec![
        Step::Rewrite(RewriteRule::new("strip-comments", r"(?s)<!--.*?-->", Rewrite::Strip)),
        Step::Rewrite(RewriteRule::new(
            "strip-scripts",
            r"(?is)<script\b[^>]*>.*?</script>",
            Rewrite::Strip,
        )),
        Step::Rewrite(RewriteRule::new("strip-rules", r"(?i)<hr\b[^>]*>", Rewrite::Strip)),
        Step::Rewrite(RewriteRule::new(
            "strip-divs",
            r"(?is)<div\b[^>]*>.*?</div>",
            Rewrite::Strip,
        )),
        Step::Rewrite(RewriteRule::new("unwrap-links", ANCHOR_PATTERN, Rewrite::Unwrap)),
        Step::Rewrite(RewriteRule::new(
            "unwrap-fonts",
            r"(?is)<font\b[^>]*>(.*?)</font>",
            Rewrite::Unwrap,
        )),
        Step::Rewrite(RewriteRule::new("unwrap-bold", r"(?is)<b>(.*?)</b>", Rewrite::Unwrap)),
        Step::Rewrite(RewriteRule::new("unwrap-lists", r"(?is)<ul>(.*?)</ul>", Rewrite::Unwrap)),
        Step::Rewrite(RewriteRule::new("line-breaks", r"(?i)<br\s*/?>", Rewrite::Literal("\n"))),
        Step::DecodeEntities,
    ])
});

static DISPLAY_PIPELINE: Lazy<Pipeline> = Lazy::new(|| {
    Pipeline::new(vec![
        Step::Rewrite(RewriteRule::new("unwrap-links", ANCHOR_PATTERN, Rewrite::Unwrap)),
        Step::EscapeHtml,
        Step::Rewrite(RewriteRule::new(
            "link-urls",
            URL_PATTERN,
            Rewrite::Expand(link_url),
        )),
        Step::Rewrite(RewriteRule::new(
            "link-replies",
            r"&gt;&gt;([0-9]+)",
            Rewrite::Expand(link_reply),
        )),
        Step::Rewrite(RewriteRule::new("newlines", r"\r?\n", Rewrite::Literal("<br>"))),
    ])
});

// `ttp://` is a common way of pasting links without triggering auto-linkers;
// the href always gets the full scheme back.
fn link_url(caps: &Captures) -> String {
    format!("<a href=\"http{}{}\">{}</a>", &caps[2], &caps[3], &caps[0])
}

fn link_reply(caps: &Captures) -> String {
    format!(
        "<a href=\"{REPLY_ANCHOR_SCHEME}{}\">{}</a>",
        &caps[1], &caps[0]
    )
}

/// Steps that turn raw board markup into speakable plain text.
pub fn text_pipeline() -> &'static Pipeline {
    &TEXT_PIPELINE
}

/// Steps that turn plain text into a display-safe HTML body.
pub fn display_pipeline() -> &'static Pipeline {
    &DISPLAY_PIPELINE
}

/// Convert raw board markup into plain text.
pub fn to_plain_text(markup: &str) -> String {
    TEXT_PIPELINE.apply(markup)
}

/// Convert already transcoded plain text into an HTML body with auto-linked
/// URLs and cross-reference anchors.
pub fn to_display_html(text: &str) -> String {
    DISPLAY_PIPELINE.apply(text)
}

/// Header fields shown above a post body.
pub struct PostHeader<'a> {
    pub number: i32,
    pub author: &'a str,
    pub mail_address: &'a str,
    pub posted_at: &'a str,
    pub poster_id: &'a str,
}

/// Wrap a display body in the presentational container used by the UI.
pub fn render_post_html(header: &PostHeader<'_>, body_html: &str) -> String {
    let mut html = String::with_capacity(body_html.len() + 320);
    html.push_str("<div style=\"margin: 0px 0px 16px 0px; line-height: 1.25em;\">");
    html.push_str(&format!(
        "<div><a name=\"res{0}\"><span style=\"color: #0000ff;\">{0}</span></a> \
         Name: <span style=\"color: #228B22; font-weight: bold;\">{1}</span>[{2}] Date: {3}",
        header.number,
        html_escape::encode_text(header.author),
        html_escape::encode_text(header.mail_address),
        html_escape::encode_text(header.posted_at),
    ));
    if !header.poster_id.is_empty() {
        html.push_str(&format!(" ID:{}", html_escape::encode_text(header.poster_id)));
    }
    html.push_str("</div>");
    html.push_str(&format!("<div style=\"margin-left: 2em;\">{body_html}</div>"));
    html.push_str("</div>");
    html
}
