//! Final answer extraction
//!
//! The model is asked to answer with an HTML `img` tag. This module pulls the
//! first such tag out of the final reply and turns it into a [`FinalAnswer`].

use crate::agent::ModelTurn;
use crate::error::IconAgentError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use url::Url;

/// The image reference produced by a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Absolute http(s) URL of the logo image
    pub image_url: String,
    /// Alt text, e.g. "Acme Corp logo"; empty when the tag had none
    pub alt_text: String,
    /// Short description of the image; empty when the tag had none
    pub title_text: String,
}

impl FinalAnswer {
    /// Render the answer as an `img` tag with escaped attribute values
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::agent::FinalAnswer;
    ///
    /// let answer = FinalAnswer {
    ///     image_url: "https://acme.example/logo.png".to_string(),
    ///     alt_text: "Acme Corp logo".to_string(),
    ///     title_text: "Red \"A\" wordmark".to_string(),
    /// };
    /// assert_eq!(
    ///     answer.to_html(),
    ///     r#"<img src="https://acme.example/logo.png" title="Red &quot;A&quot; wordmark" alt="Acme Corp logo">"#
    /// );
    /// ```
    pub fn to_html(&self) -> String {
        format!(
            r#"<img src="{}" title="{}" alt="{}">"#,
            escape_attr(&self.image_url),
            escape_attr(&self.title_text),
            escape_attr(&self.alt_text)
        )
    }
}

/// Extract the final answer from the model's last reply
///
/// Finds the first `<img ...>` tag (case-insensitive, attributes in any
/// order, single or double quotes) and decodes HTML entities in its
/// attribute values.
///
/// # Errors
///
/// Returns `UnparsableAnswer` when there is no `img` tag, the tag has no
/// `src`, or `src` is not an absolute http(s) URL
///
/// # Examples
///
/// ```
/// use iconagent::agent::{extract, ModelTurn};
///
/// let turn = ModelTurn::text(
///     "Here it is: <IMG alt='Acme Corp logo' SRC=\"https://acme.example/logo.png?a=1&amp;b=2\">",
/// );
/// let answer = extract(&turn).unwrap();
/// assert_eq!(answer.image_url, "https://acme.example/logo.png?a=1&b=2");
/// assert_eq!(answer.alt_text, "Acme Corp logo");
/// assert_eq!(answer.title_text, "");
/// ```
pub fn extract(turn: &ModelTurn) -> std::result::Result<FinalAnswer, IconAgentError> {
    let unparsable = |reason: &str| IconAgentError::UnparsableAnswer(reason.to_string());
    let text = turn.text_or_empty();

    let tag_re = Regex::new(r#"(?is)<img\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .map_err(|e| unparsable(&format!("invalid tag pattern: {}", e)))?;
    let attr_re =
        Regex::new(r#"(?is)(?:^|\s)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .map_err(|e| unparsable(&format!("invalid attribute pattern: {}", e)))?;

    let attrs = tag_re
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| unparsable("reply contains no <img> tag"))?;

    let mut src = None;
    let mut alt = None;
    let mut title = None;

    for caps in attr_re.captures_iter(attrs) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let slot = match name.as_str() {
            "src" => &mut src,
            "alt" => &mut alt,
            "title" => &mut title,
            _ => continue,
        };
        // first occurrence wins
        if slot.is_none() {
            *slot = Some(decode_entities(value));
        }
    }

    let image_url = src
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| unparsable("<img> tag has no src"))?;

    let parsed = Url::parse(&image_url)
        .map_err(|e| unparsable(&format!("src '{}' is not a URL: {}", image_url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(unparsable(&format!(
            "src '{}' is not an http(s) URL",
            image_url
        )));
    }

    Ok(FinalAnswer {
        image_url,
        alt_text: alt.unwrap_or_default(),
        title_text: title.unwrap_or_default(),
    })
}

fn decode_entities(value: &str) -> String {
    match Regex::new(r"&(amp|quot|#39|#x27|apos|lt|gt);") {
        Ok(re) => re
            .replace_all(value, |caps: &Captures| match &caps[1] {
                "amp" => "&",
                "quot" => "\"",
                "lt" => "<",
                "gt" => ">",
                _ => "'",
            })
            .into_owned(),
        Err(_) => value.to_string(),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
