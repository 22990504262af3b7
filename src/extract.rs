//! Term-block to dictionary-entry extraction.
//!
//! A block that is missing anything required (wrong language marker, no
//! bolded title, no definitions) yields no entry and no error: partial
//! garbage is expected in a dump and must never halt the run.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::language::LanguageProfile;
use crate::scanner::{term_pattern_source, RawPage, TermBlock};
use crate::wikitext::{normalize_quotes, strip_markup};

lazy_static! {
    // Bolded title line: '''term''' {{pron|ipa|lang}} rest
    static ref TITLE_LINE: Regex = Regex::new(
        r"^'''(?P<title>.+?)'''\s?(?:\{\{pron\|(?P<ipa>[^|]*)\|[^}]+\}\}(?P<rest>.*))?"
    )
    .unwrap();

    // One definition item: optional leading grammar template, then the body
    static ref DEFINITION_LINE: Regex = Regex::new(
        r"^#\s?(?:\{\{(?P<grammar>[^|}]+)(?:\|\w+)?\}\}\s?)?(?P<rest>.*)"
    )
    .unwrap();
}

/// One normalized dictionary entry. `altterm`, `examples` and `audio` are
/// reserved placeholders, always empty, kept for forward compatibility with
/// the richer downstream schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub term: String,
    pub altterm: String,
    pub pronunciation: String,
    pub pos: String,
    pub definition: String,
    pub examples: String,
    pub audio: String,
    pub id: usize,
}

pub struct Extractor<'a> {
    profile: &'a LanguageProfile,
    grammar_tags: HashSet<&'static str>,
    language_marker: Regex,
    term_pattern: Regex,
}

impl<'a> Extractor<'a> {
    pub fn new(profile: &'a LanguageProfile) -> Self {
        let language_marker = Regex::new(&format!(r"\|{}(?:\||\}}\}})", profile.target_code))
            .expect("language marker pattern");
        let term_pattern = RegexBuilder::new(&term_pattern_source(profile))
            .multi_line(true)
            .case_insensitive(true)
            .build()
            .expect("term pattern");
        Self {
            profile,
            grammar_tags: profile.grammar_tags.iter().copied().collect(),
            language_marker,
            term_pattern,
        }
    }

    /// Fast-reject guard: does the section marker carry the target language?
    pub fn is_target_language(&self, word_template: &str) -> bool {
        self.language_marker.is_match(word_template)
    }

    /// At most one entry per term block; `id` is assigned by the caller and
    /// is only meaningful within the caller's own pass.
    pub fn entry_from_block(&self, block: &TermBlock, id: usize) -> Option<DictionaryEntry> {
        if !self.is_target_language(&block.word_template) {
            return None;
        }
        let (title, ipa) = self.parse_title_line(&block.title_group)?;
        let definition = self.extract_definitions(&block.defs);
        if definition.is_empty() {
            return None;
        }
        Some(DictionaryEntry {
            term: normalize_text(&title),
            altterm: String::new(),
            pronunciation: normalize_text(&ipa),
            pos: block.word_type.trim().to_lowercase(),
            definition,
            examples: String::new(),
            audio: String::new(),
            id,
        })
    }

    /// All entries on one `<page>` record - one per word-type block. Ids are
    /// left at zero for the caller to assign.
    pub fn entries_from_page(&self, page: &RawPage) -> Vec<DictionaryEntry> {
        if self
            .profile
            .special_prefixes
            .iter()
            .any(|prefix| page.title.starts_with(prefix))
        {
            return Vec::new();
        }
        self.term_pattern
            .captures_iter(&page.text)
            .filter_map(|cap| {
                let block = TermBlock {
                    word_template: named(&cap, "word_template"),
                    word_type: named(&cap, "word_type"),
                    title_group: named(&cap, "title_group"),
                    defs: named(&cap, "defs"),
                };
                self.entry_from_block(&block, 0)
            })
            .collect()
    }

    fn parse_title_line(&self, title_group: &str) -> Option<(String, String)> {
        let cap = TITLE_LINE.captures(title_group.trim_end())?;
        let title = cap.name("title")?.as_str().to_string();
        let ipa = cap
            .name("ipa")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Some((title, ipa))
    }

    /// Render the run of `#` items as "1. (tag) text" lines joined with
    /// newlines. Sub-items (`##`, `#:`, `#*`) belong to the current sense
    /// and are skipped; unrecognized grammar tags are dropped silently.
    pub(crate) fn extract_definitions(&self, defs: &str) -> String {
        let mut rendered: Vec<String> = Vec::new();
        for line in defs.lines() {
            if !line.starts_with('#')
                || matches!(line.as_bytes().get(1), Some(&b'#') | Some(&b':') | Some(&b'*'))
            {
                continue;
            }
            let cap = match DEFINITION_LINE.captures(line) {
                Some(cap) => cap,
                None => continue,
            };
            let body = strip_markup(cap.name("rest").map(|m| m.as_str()).unwrap_or(""));
            let mut item = format!("{}.", rendered.len() + 1);
            if let Some(tag) = cap.name("grammar") {
                let tag = tag.as_str().trim();
                if self.grammar_tags.contains(tag.to_lowercase().as_str()) {
                    item.push_str(&format!(" ({})", tag));
                }
            }
            item.push(' ');
            item.push_str(&body);
            rendered.push(item);
        }
        rendered.join("\n")
    }
}

fn named(cap: &regex::Captures<'_>, name: &str) -> String {
    cap.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn normalize_text(raw: &str) -> String {
    let nfc: String = raw.nfc().collect();
    normalize_quotes(&nfc).trim().to_string()
}
