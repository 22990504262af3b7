//! Best-effort wiki markup stripping.
//!
//! Dumps are untrusted, heterogeneous input: nothing in here is allowed to
//! fail. Unparseable fragments degrade to whatever plain text can be
//! salvaged rather than aborting the record.

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    // <ref name="x"/>, <ref>...</ref>, then any leftover HTML tag
    static ref HTML_TAG: Regex =
        Regex::new(r"(?s)<ref[^>]*?/>|<ref[^>]*?>.*?</ref>|</?[a-zA-Z][^>]*>").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

// Link-ish templates whose first positional argument is display text;
// every other template is dropped outright.
static INLINE_TEMPLATES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["w", "lien", "term", "terme"].into_iter().collect());

/// Reduce a markup fragment to normalized plain text: XML entities decoded,
/// ref/HTML tags removed, templates stripped or rendered, wikilinks reduced
/// to their display text, bold/italic quote runs removed, smart quotes
/// normalized to ASCII, whitespace collapsed.
pub fn strip_markup(fragment: &str) -> String {
    let text = decode_entities(fragment);
    let text = HTML_TAG.replace_all(&text, "");
    let text = strip_templates(&text);
    let text = strip_wikilinks(&text);
    let text = text.replace("'''", "").replace("''", "");
    let text = normalize_quotes(&text);
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Map typographic quotation marks and apostrophes to their ASCII forms.
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect()
}

// The page body sits inside an XML <text> element, so the wikitext itself
// arrives with the standard five entities escaped.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn strip_templates(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        match balanced_template_len(&rest[start..]) {
            Some(len) => {
                let inner = &rest[start + 2..start + len - 2];
                out.push_str(&render_template(inner));
                rest = &rest[start + len..];
            }
            None => {
                // Unterminated template: drop through end of fragment
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte length of the balanced `{{...}}` opening at the start of `text`.
fn balanced_template_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            depth = depth.saturating_sub(1);
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

fn render_template(inner: &str) -> String {
    let mut parts = inner.split('|');
    let name = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    if !INLINE_TEMPLATES.contains(name.as_str()) {
        return String::new();
    }
    let display = parts
        .map(str::trim)
        .find(|part| !part.is_empty() && !part.contains('='));
    match display {
        Some(part) if part.contains("{{") => strip_templates(part),
        Some(part) => part.to_string(),
        None => String::new(),
    }
}

fn strip_wikilinks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("]]") {
            Some(end) => {
                out.push_str(render_link(&after[..end]));
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated link: keep the raw text rather than losing it
                out.push_str(after);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// `[[target|label]]` renders the label, `[[target]]` the target,
/// `[[target#anchor]]` the bare target.
fn render_link(inner: &str) -> &str {
    match inner.split_once('|') {
        Some((target, label)) => {
            if label.is_empty() {
                target
            } else {
                label
            }
        }
        None => match inner.split_once('#') {
            Some((target, _)) if !target.is_empty() => target,
            _ => inner,
        },
    }
}
