//! Per-language vocabulary tables.
//!
//! A `LanguageProfile` bundles everything the scanner and extractor need to
//! know about one (dump language, target language) pair: the word-type
//! section markers, the grammar-tag templates surfaced in definitions, and
//! the namespace prefixes of pages that never hold dictionary content. The
//! registry is a read-only static lookup resolved before any I/O starts.

/// Vocabulary for one (source dump, target entries) language pair.
pub struct LanguageProfile {
    /// Wiktionary language code of the dump (L1).
    pub source_code: &'static str,
    /// Wiktionary language code of the terms to extract (L2), also the
    /// marker token used by the fast-reject filter.
    pub target_code: &'static str,
    /// Word-type markers accepted in section templates, e.g. {{S|nom|fr}}.
    pub word_types: &'static [&'static str],
    /// Grammar-tag templates rendered as a "(tag)" definition prefix.
    /// Lowercase; unrecognized tags are dropped silently.
    pub grammar_tags: &'static [&'static str],
    /// Title prefixes of non-content namespaces, skipped at page level.
    pub special_prefixes: &'static [&'static str],
}

impl LanguageProfile {
    /// Alternation body for the word-type capture group of the term pattern.
    pub fn word_type_alternation(&self) -> String {
        self.word_types.join("|")
    }
}

// Multi-word variants come before their head word so the alternation reads
// unambiguously; match correctness does not depend on the order.
static FRENCH_WORD_TYPES: &[&str] = &[
    "adjectif démonstratif",
    "adjectif exclamatif",
    "adjectif indéfini",
    "adjectif interrogatif",
    "adjectif numéral",
    "adjectif possessif",
    "adjectif",
    "adverbe interrogatif",
    "adverbe relatif",
    "adverbe",
    "article défini",
    "article indéfini",
    "article partitif",
    "article",
    "conjonction de coordination",
    "conjonction",
    "interjection",
    "locution-phrase",
    "locution adjectivale",
    "locution adverbiale",
    "locution conjonctive",
    "locution interjective",
    "locution nominale",
    "locution prépositive",
    "locution verbale",
    "locution",
    "nom propre",
    "nom",
    "numéral",
    "onomatopée",
    "particule",
    "préfixe",
    "préposition",
    "pronom démonstratif",
    "pronom indéfini",
    "pronom interrogatif",
    "pronom personnel",
    "pronom possessif",
    "pronom relatif",
    "pronom",
    "suffixe",
    "verbe",
];

static FRENCH_GRAMMAR_TAGS: &[&str] = &[
    "absolument",
    "analogie",
    "anglicisme",
    "archaïsme",
    "argot",
    "au figuré",
    "au pluriel",
    "au singulier",
    "courant",
    "désuet",
    "ellipse",
    "en particulier",
    "familier",
    "figuré",
    "histoire",
    "hyperbole",
    "impersonnel",
    "indénombrable",
    "injurieux",
    "intransitif",
    "ironique",
    "littéraire",
    "métaphore",
    "métonymie",
    "néologisme",
    "par analogie",
    "par extension",
    "péjoratif",
    "populaire",
    "pronominal",
    "proverbial",
    "rare",
    "régionalisme",
    "sens propre",
    "soutenu",
    "spécialement",
    "transitif",
    "très rare",
    "vieilli",
    "vieux",
    "vulgaire",
];

static FRENCH_SPECIAL_PREFIXES: &[&str] = &[
    "Aide:",
    "Annexe:",
    "Catégorie:",
    "Conjugaison:",
    "MediaWiki:",
    "Modèle:",
    "Module:",
    "Portail:",
    "Projet:",
    "Racine:",
    "Reconstruction:",
    "Rimes:",
    "Thésaurus:",
    "Wiktionnaire:",
];

static FRENCH_TO_FRENCH: LanguageProfile = LanguageProfile {
    source_code: "fr",
    target_code: "fr",
    word_types: FRENCH_WORD_TYPES,
    grammar_tags: FRENCH_GRAMMAR_TAGS,
    special_prefixes: FRENCH_SPECIAL_PREFIXES,
};

static PROFILES: &[&LanguageProfile] = &[&FRENCH_TO_FRENCH];

/// Look up the profile for a (source, target) pair.
pub fn profile_for(source: &str, target: &str) -> Option<&'static LanguageProfile> {
    PROFILES
        .iter()
        .copied()
        .find(|p| p.source_code == source && p.target_code == target)
}

/// Human-readable list of shipped pairs, for the configuration error message.
pub fn known_pairs() -> String {
    PROFILES
        .iter()
        .map(|p| format!("{}-{}", p.source_code, p.target_code))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_pair_resolves() {
        let profile = profile_for("fr", "fr").expect("fr-fr profile");
        assert_eq!(profile.target_code, "fr");
        assert!(profile.word_types.contains(&"nom"));
        assert!(profile.grammar_tags.contains(&"vieilli"));
    }

    #[test]
    fn unknown_pair_is_none() {
        assert!(profile_for("fr", "de").is_none());
        assert!(profile_for("xx", "xx").is_none());
    }

    #[test]
    fn known_pairs_names_the_shipped_tables() {
        assert!(known_pairs().contains("fr-fr"));
    }
}
