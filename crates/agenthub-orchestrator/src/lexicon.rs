//! Keyword tables used to infer which capabilities a task description needs.

use std::collections::{BTreeSet, HashMap};

/// Words that carry no routing signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "how", "i", "in",
    "into", "is", "it", "me", "my", "of", "on", "or", "our", "please", "some", "that", "the",
    "their", "this", "to", "us", "we", "what", "with", "you", "your",
];

const DEFAULT_ENTRIES: &[(&str, &[&str])] = &[
    (
        "coding",
        &[
            "code", "coding", "program", "programming", "function", "implement", "python",
            "rust", "javascript", "typescript", "java", "script", "sort", "array", "algorithm",
            "debug", "bug", "fix", "refactor", "compile", "api", "class", "method",
        ],
    ),
    (
        "research",
        &[
            "research", "investigate", "trends", "study", "survey", "literature", "papers",
            "sources", "explore", "discover", "latest", "findings",
        ],
    ),
    (
        "writing",
        &[
            "write", "writing", "draft", "essay", "article", "blog", "document", "documentation",
            "copy", "story", "summary", "summarize", "summarise", "email",
        ],
    ),
    (
        "analysis",
        &[
            "analyze", "analyse", "analysis", "evaluate", "assess", "compare", "metrics",
            "insights", "statistics", "report",
        ],
    ),
    (
        "testing",
        &["test", "tests", "testing", "unit", "integration", "coverage", "qa", "verify"],
    ),
    (
        "review",
        &["review", "audit", "inspect", "critique", "feedback", "lint"],
    ),
    (
        "data",
        &["data", "dataset", "csv", "sql", "database", "query", "etl", "schema", "table"],
    ),
    (
        "design",
        &["design", "ui", "ux", "layout", "mockup", "wireframe", "architecture", "diagram"],
    ),
    (
        "devops",
        &["deploy", "deployment", "docker", "kubernetes", "ci", "pipeline", "infrastructure", "server"],
    ),
    (
        "translation",
        &["translate", "translation", "french", "spanish", "german", "japanese", "language"],
    ),
];

/// Split text into lowercase, non-stopword tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .map(|w| w.trim_matches(|c| c == '-' || c == '_'))
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Capabilities a task needs, as inferred from its description plus any
/// explicitly declared capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRequirement {
    capabilities: BTreeSet<String>,
}

impl TaskRequirement {
    /// Requirement consisting of exactly one declared capability.
    pub fn declared(capability: &str) -> Self {
        let mut capabilities = BTreeSet::new();
        capabilities.insert(capability.trim().to_lowercase());
        Self { capabilities }
    }

    /// `true` if `capability` is part of the requirement.
    pub fn contains(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// `true` if nothing could be inferred.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Required capabilities, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    /// Whether any of `tags` (already lowercase) is part of the requirement.
    pub fn intersects<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().any(|t| self.capabilities.contains(t))
    }
}

/// Maps capability tags to the keywords that signal them.
#[derive(Debug, Clone)]
pub struct CapabilityLexicon {
    keywords: HashMap<String, BTreeSet<String>>,
}

impl CapabilityLexicon {
    /// An empty lexicon: only literal capability names in a description match.
    pub fn empty() -> Self {
        Self {
            keywords: HashMap::new(),
        }
    }

    /// Add keywords for a capability, merging with existing ones.
    pub fn add<I, S>(&mut self, capability: &str, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self
            .keywords
            .entry(capability.trim().to_lowercase())
            .or_default();
        for kw in keywords {
            entry.insert(kw.as_ref().trim().to_lowercase());
        }
    }

    /// Builder form of [`CapabilityLexicon::add`].
    pub fn with(mut self, capability: &str, keywords: &[&str]) -> Self {
        self.add(capability, keywords.iter().copied());
        self
    }

    /// Keywords registered for a capability.
    pub fn keywords_for(&self, capability: &str) -> Option<&BTreeSet<String>> {
        self.keywords.get(capability)
    }

    /// Infer the requirement of a task description.
    ///
    /// The result holds every description token (so literal capability tags
    /// match) plus every capability whose keywords appear in the description.
    pub fn infer(&self, description: &str) -> TaskRequirement {
        let tokens = tokenize(description);
        let mut capabilities: BTreeSet<String> = tokens.iter().cloned().collect();
        for (capability, words) in &self.keywords {
            if tokens.iter().any(|t| words.contains(t)) {
                capabilities.insert(capability.clone());
            }
        }
        TaskRequirement { capabilities }
    }
}

impl Default for CapabilityLexicon {
    fn default() -> Self {
        let mut lexicon = Self::empty();
        for (capability, words) in DEFAULT_ENTRIES {
            lexicon.add(capability, words.iter().copied());
        }
        lexicon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stopwords_and_punctuation() {
        let tokens = tokenize("Write a Python function, to sort an array!");
        assert_eq!(tokens, vec!["write", "python", "function", "sort", "array"]);
    }

    #[test]
    fn test_infer_maps_keywords_to_capabilities() {
        let lexicon = CapabilityLexicon::default();
        let req = lexicon.infer("Write a Python function to sort an array");
        assert!(req.contains("coding"));
        assert!(!req.contains("research"));

        let req = lexicon.infer("Research AI trends");
        assert!(req.contains("research"));
        assert!(!req.contains("coding"));
    }

    #[test]
    fn test_infer_keeps_literal_tags() {
        let req = CapabilityLexicon::empty().infer("needs astrology today");
        assert!(req.contains("astrology"));
    }

    #[test]
    fn test_custom_keywords() {
        let lexicon = CapabilityLexicon::empty().with("legal", &["contract", "NDA"]);
        assert!(lexicon.infer("review this nda").contains("legal"));
        assert!(lexicon.keywords_for("legal").is_some_and(|k| k.contains("nda")));
    }

    #[test]
    fn test_declared_requirement() {
        let req = TaskRequirement::declared("  Coding ");
        assert!(req.contains("coding"));
        assert!(req.intersects(&["coding".to_string()]));
        assert!(!req.intersects(&["research".to_string()]));
        assert!(TaskRequirement::default().is_empty());
    }
}
