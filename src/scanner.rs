//! Memory-mapped record scanning.
//!
//! The dump is never loaded into heap memory: the scanner maps the file and
//! runs compiled byte patterns over the mapping, yielding owned copies of
//! each matched record. Positions that match nothing are simply skipped -
//! dumps routinely contain pages with no qualifying content.

use lazy_static::lazy_static;
use memmap2::Mmap;
use regex::bytes::{Captures, Regex, RegexBuilder};
use std::fs::File;
use std::path::Path;

use crate::error::RunError;
use crate::language::LanguageProfile;

lazy_static! {
    // One <page> record: title and text body. Lazy bounds everywhere so the
    // first well-formed close tag wins even when the body embeds look-alike
    // markup.
    static ref PAGE_PATTERN: Regex = RegexBuilder::new(
        r"<page>.*?<title>(?P<title>.*?)</title>.*?<text[^>]*>(?P<text>.*?)\s*</text>.*?</page>"
    )
    .dot_matches_new_line(true)
    .case_insensitive(true)
    .build()
    .unwrap();
}

/// Source of the term-block pattern for `profile`, shared between the byte
/// scanner and the page-level extractor. Groups: `word_template` (the whole
/// section marker line), `word_type`, `title_group` (the bolded title line),
/// `defs` (the run of `#` definition lines). The lazily-matched middle
/// tolerates out-of-order media and template lines between the section
/// marker and the title line.
pub fn term_pattern_source(profile: &LanguageProfile) -> String {
    format!(
        r"(?P<word_template>^=== \{{\{{S\|(?P<word_type>{types})\|{lang}(?:\||\}}\}}).*)(?:.*\n)+?(?P<title_group>^'''.*\n)(?P<defs>(?:^#.*\n?)*)",
        types = profile.word_type_alternation(),
        lang = profile.target_code,
    )
}

/// Owned copy of one matched term block. Produced by the scanner, consumed
/// immediately by the extractor, never persisted.
#[derive(Debug, Clone)]
pub struct TermBlock {
    pub word_template: String,
    pub word_type: String,
    pub title_group: String,
    pub defs: String,
}

/// Owned copy of one `<page>` record.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub title: String,
    pub text: String,
}

pub struct Scanner {
    // None for an empty file, which cannot be mapped
    mmap: Option<Mmap>,
    term_pattern: Regex,
}

impl Scanner {
    pub fn open(path: &Path, profile: &LanguageProfile) -> Result<Self, RunError> {
        let file = File::open(path)?;
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // Safety: the dump is treated as read-only for the scan's lifetime
            Some(unsafe { Mmap::map(&file)? })
        };
        let term_pattern = RegexBuilder::new(&term_pattern_source(profile))
            .multi_line(true)
            .case_insensitive(true)
            .build()
            .expect("term pattern");
        Ok(Self { mmap, term_pattern })
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Lazy sequence of term blocks in source order.
    pub fn term_blocks(&self) -> impl Iterator<Item = TermBlock> + '_ {
        self.term_pattern.captures_iter(self.bytes()).map(|cap| TermBlock {
            word_template: capture_lossy(&cap, "word_template"),
            word_type: capture_lossy(&cap, "word_type"),
            title_group: capture_lossy(&cap, "title_group"),
            defs: capture_lossy(&cap, "defs"),
        })
    }

    /// Lazy sequence of `<page>` records in source order.
    pub fn pages(&self) -> impl Iterator<Item = RawPage> + '_ {
        PAGE_PATTERN.captures_iter(self.bytes()).map(|cap| RawPage {
            title: capture_lossy(&cap, "title"),
            text: capture_lossy(&cap, "text"),
        })
    }

    /// Counting pass for ETA estimation; never required for correctness.
    pub fn count_terms(&self) -> usize {
        self.term_pattern.find_iter(self.bytes()).count()
    }

    pub fn count_pages(&self) -> usize {
        PAGE_PATTERN.find_iter(self.bytes()).count()
    }
}

fn capture_lossy(cap: &Captures<'_>, name: &str) -> String {
    cap.name(name)
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::profile_for;
    use std::io::Write;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const TWO_PAGE_DUMP: &str = "\
<page>
  <title>accueil</title>
  <ns>0</ns>
  <text xml:space=\"preserve\">== {{langue|fr}} ==
=== {{S|nom|fr}} ===
'''accueil''' {{pron|a.k\u{153}j|fr}} {{m}}
# [[lieu|Lieu]] où sont accueillies les [[personne]]s.
# {{vieilli|fr}} Fait d\u{2019}[[accueillir]] ou [[héberger]].
</text>
</page>

<page>
  <title>Hauptseite</title>
  <ns>0</ns>
  <text xml:space=\"preserve\">== {{langue|de}} ==
=== {{S|nom|de}} ===
'''Hauptseite'''
# Seite ohne fr.
</text>
</page>
";

    #[test]
    fn pages_yields_every_record_with_titles() {
        let file = write_fixture(TWO_PAGE_DUMP);
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        let pages: Vec<RawPage> = scanner.pages().collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "accueil");
        assert_eq!(pages[1].title, "Hauptseite");
        assert!(pages[0].text.contains("{{S|nom|fr}}"));
        assert_eq!(scanner.count_pages(), 2);
    }

    #[test]
    fn term_blocks_match_only_target_language_sections() {
        let file = write_fixture(TWO_PAGE_DUMP);
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        let blocks: Vec<TermBlock> = scanner.term_blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].word_type, "nom");
        assert!(blocks[0].title_group.starts_with("'''accueil'''"));
        assert_eq!(blocks[0].defs.lines().count(), 2);
        assert_eq!(scanner.count_terms(), 1);
    }

    #[test]
    fn out_of_order_media_lines_do_not_break_the_block() {
        let dump = "\
=== {{S|nom|fr}} ===
[[Fichier:Travaux.jpg|vignette|Des travaux.]]
{{fr-rég|tʁa.vo}}
'''travaux''' {{pron|tʁa.vo|fr}}
# Pluriel de [[travail]].
";
        let file = write_fixture(dump);
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        let blocks: Vec<TermBlock> = scanner.term_blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].title_group.starts_with("'''travaux'''"));
        assert_eq!(blocks[0].defs, "# Pluriel de [[travail]].\n");
    }

    #[test]
    fn definitions_at_end_of_input_without_newline_still_match() {
        let dump = "\
=== {{S|nom|fr}} ===
'''constats''' {{pron|kɔ̃s.ta|fr}}
# Pluriel de [[constat]].";
        let file = write_fixture(dump);
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        let blocks: Vec<TermBlock> = scanner.term_blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].defs, "# Pluriel de [[constat]].");
    }

    #[test]
    fn empty_file_scans_to_nothing() {
        let file = write_fixture("");
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        assert_eq!(scanner.count_terms(), 0);
        assert_eq!(scanner.count_pages(), 0);
        assert!(scanner.term_blocks().next().is_none());
    }

    #[test]
    fn section_without_title_line_is_skipped() {
        let dump = "\
=== {{S|nom|fr}} ===
# Une définition orpheline.
";
        let file = write_fixture(dump);
        let scanner = Scanner::open(file.path(), profile_for("fr", "fr").unwrap()).unwrap();
        assert_eq!(scanner.count_terms(), 0);
    }
}
