//! The "looks like code" heuristic.
//!
//! A deliberately loose predicate that rejects obviously non-code input
//! (plain prose, greetings) before an AI call is made. It is not a parser:
//! any common code indicator is enough to accept.

use regex::Regex;
use std::sync::LazyLock;

static CODE_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // function declarations
        r"\bfunction\s+\w+\s*\(",
        r"\bfn\s+\w+\s*\(",
        r"\bdef\s+\w+\s*\(",
        // class declarations
        r"\b(class|struct|enum|trait|interface)\s+\w+",
        // variable declarations
        r"\b(var|let|const|mut)\s+\w+",
        // control structures
        r"\b(if|for|while|switch|match|loop)\s*[\s(]",
        // module syntax
        r"\b(import|export|use|require)\b",
        // jump keywords
        r"\b(return|break|continue)\b",
        // arrow tokens
        r"=>|->",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("invalid code indicator pattern"))
    .collect()
});

/// Punctuation that almost never appears in plain prose but is ubiquitous in code.
const CODE_PUNCTUATION: &[char] = &['{', '}', '[', ']', '(', ')', ';'];

/// Returns true if the input contains at least one common code indicator.
pub fn looks_like_code(input: &str) -> bool {
    if input.contains(CODE_PUNCTUATION) {
        return true;
    }
    CODE_INDICATORS.iter().any(|pattern| pattern.is_match(input))
}
