// Whole-word substitutions applied to text that already passed moderation.
//
// Runs after the dedup comparison (dedup sees pre-replacement text) and
// before speech synthesis. Keys are matched longest-first so a long key is
// not shadowed by a shorter one sharing a prefix.

use regex::{NoExpand, Regex};
use std::collections::HashMap;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Word-boundary-anchored pattern for one literal key. `\b` only has
/// meaning next to a word character, so keys that start or end with
/// punctuation get no anchor on that side.
fn key_pattern(key: &str) -> String {
    let mut pattern = String::new();
    if key.chars().next().map_or(false, is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(key));
    if key.chars().last().map_or(false, is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// Apply every mapping as a whole-word substitution, keys longest-first.
pub fn apply_replacements(text: &str, replacements: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = replacements.keys().collect();
    keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let mut result = text.to_string();
    for key in keys {
        if key.is_empty() {
            continue;
        }
        // Keys come from the rule file; escaping keeps them literal.
        let re = match Regex::new(&key_pattern(key)) {
            Ok(re) => re,
            Err(_) => continue,
        };
        result = re
            .replace_all(&result, NoExpand(&replacements[key]))
            .into_owned();
    }
    result
}
