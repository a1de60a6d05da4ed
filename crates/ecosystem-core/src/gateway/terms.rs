//! Search-term derivation from free task text.

/// One domain rule: if any keyword occurs in the lowercased task text, the
/// fixed term list is used.
pub struct TermRule {
    pub keywords: &'static [&'static str],
    pub terms: &'static [&'static str],
}

/// Evaluated top to bottom; the first matching rule wins. Reordering changes
/// the derived terms (e.g. "ai" is a substring of many words).
pub const TERM_RULES: &[TermRule] = &[
    TermRule {
        keywords: &["healthcare", "medical"],
        terms: &["artificial intelligence healthcare", "machine learning medicine", "AI diagnosis"],
    },
    TermRule {
        keywords: &["ai", "artificial intelligence"],
        terms: &["artificial intelligence", "machine learning", "deep learning"],
    },
    TermRule {
        keywords: &["generative", "gpt"],
        terms: &["generative ai", "gpt", "transformer models"],
    },
    TermRule {
        keywords: &["blockchain", "crypto"],
        terms: &["blockchain technology", "cryptocurrency", "decentralized finance"],
    },
    TermRule {
        keywords: &["sustainability", "climate"],
        terms: &["sustainability technology", "climate change AI", "green technology"],
    },
    TermRule {
        keywords: &["robotics", "automation"],
        terms: &["robotics technology", "automation systems", "AI robotics"],
    },
    TermRule {
        keywords: &["finance", "investment"],
        terms: &["financial technology", "investment strategies", "AI in finance"],
    },
    TermRule {
        keywords: &["education", "learning"],
        terms: &["educational technology", "AI in education", "personalized learning"],
    },
    TermRule {
        keywords: &["energy", "renewable"],
        terms: &["renewable energy technology", "solar power AI", "wind energy systems"],
    },
    TermRule {
        keywords: &["cybersecurity", "security"],
        terms: &["cybersecurity AI", "threat detection", "security automation"],
    },
    TermRule {
        keywords: &["transportation", "mobility"],
        terms: &["transportation technology", "autonomous vehicles", "smart mobility"],
    },
    TermRule {
        keywords: &["agriculture", "farming"],
        terms: &["agricultural technology", "precision farming AI", "smart agriculture"],
    },
    TermRule {
        keywords: &["entertainment", "media"],
        terms: &["entertainment technology", "media AI", "content creation tools"],
    },
    TermRule {
        keywords: &["gaming", "game"],
        terms: &["gaming technology", "game AI", "interactive entertainment"],
    },
    TermRule {
        keywords: &["smart home", "iot"],
        terms: &["smart home technology", "IoT devices", "home automation"],
    },
    TermRule {
        keywords: &["supply chain", "logistics"],
        terms: &["supply chain technology", "logistics AI", "smart logistics"],
    },
    TermRule {
        keywords: &["social media", "communication"],
        terms: &["social media technology", "communication AI", "digital marketing tools"],
    },
];

const MAX_FALLBACK_TERMS: usize = 3;
const MIN_FALLBACK_WORD_CHARS: usize = 4;

/// Derive up to three search terms for a task.
///
/// Falls back to the first title words longer than three characters when no
/// domain rule matches; the result may be empty.
pub fn derive_search_terms(title: &str, description: &str) -> Vec<String> {
    let combined = format!("{title} {description}").to_lowercase();

    if let Some(rule) = TERM_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| combined.contains(kw)))
    {
        return rule.terms.iter().map(|term| term.to_string()).collect();
    }

    title
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_FALLBACK_WORD_CHARS)
        .take(MAX_FALLBACK_TERMS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthcare_description_selects_healthcare_terms() {
        let terms = derive_search_terms("Market scan", "Adoption of tools in healthcare systems");
        assert_eq!(
            terms,
            vec![
                "artificial intelligence healthcare",
                "machine learning medicine",
                "AI diagnosis"
            ]
        );
    }

    #[test]
    fn earlier_rule_wins_over_later_match() {
        // mentions both "ai" and "blockchain"; the ai rule is listed first
        let terms = derive_search_terms("AI on the blockchain", "");
        assert_eq!(terms[0], "artificial intelligence");
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let terms = derive_search_terms("Crypto Winter", "");
        assert_eq!(terms[0], "blockchain technology");
    }

    #[test]
    fn unmatched_text_falls_back_to_long_title_words() {
        let terms = derive_search_terms("Quantum Computing Roadmap for the next decade", "overview of qubits");
        assert_eq!(terms, vec!["Quantum", "Computing", "Roadmap"]);
    }

    #[test]
    fn short_title_words_can_yield_no_terms() {
        assert!(derive_search_terms("On the go", "").is_empty());
    }
}
