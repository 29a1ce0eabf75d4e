// Content filter - core business logic for post moderation.
//
// This service handles:
// - Phone number extraction against the allow-list
// - Strict (substring) and whole-word ban checks
// - Link allow-listing
// - Phrase stripping and final sanitization
//
// NO Telegram dependencies here - just pure domain logic. The order of the
// checks is fixed: bans run before phrase stripping could hide a banned term
// inside a removed phrase, and sanitization runs last so it cannot erase
// evidence the earlier checks inspect.

use super::moderation_models::{ModerationRejection, ModerationVerdict, RuleList, RuleSet};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Rule store error: {0}")]
    Store(String),

    #[error("Policy model error: {0}")]
    Model(String),

    #[error("Invalid list item: {0}")]
    InvalidItem(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting the rule set.
///
/// `load` returns `None` when no rule file exists yet; the service then
/// writes the stock rules so the file is present from the first run on.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn load(&self) -> Result<Option<RuleSet>, ModerationError>;

    /// Persist the whole rule set. Implementations must write atomically.
    async fn save(&self, rules: &RuleSet) -> Result<(), ModerationError>;
}

// ============================================================================
// PATTERN FAMILY
// ============================================================================

/// The telephone/URL shapes the filter scans for. Owned by the filter as
/// data so the patterns are unit-testable in isolation.
pub struct ModerationPatterns {
    /// Telephone-shaped substrings: mobile, landline, toll-free, star codes.
    pub phones: Vec<Regex>,
    /// URL-shaped substrings, including scheme-less known-domain forms.
    pub links: Vec<Regex>,
    word_token: Regex,
    disallowed: Regex,
    whitespace: Regex,
}

impl Default for ModerationPatterns {
    fn default() -> Self {
        let compile = |p: &str| Regex::new(p).expect("built-in moderation pattern");
        Self {
            phones: vec![
                compile(r"05\d[-\s]?\d{7}"),
                compile(r"0[23489][-\s]?\d{7}"),
                compile(r"1[-\s]?800[-\s]?\d{3}[-\s]?\d{3}"),
                compile(r"\*\d{3,5}"),
            ],
            links: vec![
                compile(r"https?://\S+"),
                compile(r"www\.\S+"),
                compile(
                    r"\b[\w-]+(?:\.[\w-]+)*\.(?:com|net|org|io|me|ly|info|co\.il|org\.il|net\.il|gov\.il)(?:/\S*)?",
                ),
            ],
            word_token: compile(r"\w+"),
            // Keep alphanumerics, Hebrew letters, basic punctuation and
            // whitespace; sanitization drops everything else.
            disallowed: compile(r"[^\w\s.,!?()\u{0590}-\u{05FF}]"),
            whitespace: compile(r"\s+"),
        }
    }
}

/// Source-attribution credit: posts starting with the marker get the fixed
/// suffix appended to the cleaned text.
#[derive(Debug, Clone)]
pub struct CreditPolicy {
    pub marker: String,
    pub suffix: String,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            marker: "חדשות המוקד".to_string(),
            suffix: "באדיבות חדשות המוקד".to_string(),
        }
    }
}

fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '*')
        .collect()
}

/// Host part of a URL-shaped match: scheme stripped, cut at the first slash.
fn link_host(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

// ============================================================================
// THE DECISION FUNCTION
// ============================================================================

/// Classify and rewrite one raw post text against a rule snapshot.
///
/// Pure over its inputs; callers notify and log. The evaluation order is
/// load-bearing - see the module header.
pub fn moderate_text(
    raw: &str,
    rules: &RuleSet,
    patterns: &ModerationPatterns,
    credit: &CreditPolicy,
) -> ModerationVerdict {
    let mut working = raw.to_string();

    // 1. Phone numbers: every match must be allow-listed, and even allowed
    //    numbers are removed - they must not be spoken.
    let mut phone_matches: Vec<String> = Vec::new();
    for pattern in &patterns.phones {
        for m in pattern.find_iter(&working) {
            phone_matches.push(m.as_str().to_string());
        }
    }
    if !phone_matches.is_empty() {
        let allowed: Vec<String> = rules
            .allowed_phones
            .iter()
            .map(|p| normalize_phone(p))
            .collect();
        if phone_matches
            .iter()
            .any(|m| !allowed.contains(&normalize_phone(m)))
        {
            return ModerationVerdict::Rejected(ModerationRejection::UnapprovedPhone);
        }
        for m in &phone_matches {
            working = working.replace(m.as_str(), "");
        }
    }

    // 2. Strict bans: substring match, not bypassable by word boundaries.
    for term in &rules.strict_banned {
        if !term.is_empty() && working.contains(term.as_str()) {
            return ModerationVerdict::Rejected(ModerationRejection::BannedTerm(term.clone()));
        }
    }

    // 3. Whole-word bans over word-boundary tokens.
    for token in patterns.word_token.find_iter(&working) {
        if let Some(word) = rules
            .word_banned
            .iter()
            .find(|w| w.as_str() == token.as_str())
        {
            return ModerationVerdict::Rejected(ModerationRejection::BannedWord(word.clone()));
        }
    }

    // 4. Links: each URL-shaped match (or its host) must be a substring of
    //    some allow-list entry.
    for pattern in &patterns.links {
        for m in pattern.find_iter(&working) {
            let url = m.as_str();
            let host = link_host(url);
            let allowed = rules
                .allowed_links
                .iter()
                .any(|entry| entry.contains(url) || entry.contains(host));
            if !allowed {
                return ModerationVerdict::Rejected(ModerationRejection::UnapprovedLink);
            }
        }
    }

    // 5. Phrase stripping, longest first (RuleSet keeps the order).
    for phrase in &rules.blocked_phrases {
        if !phrase.is_empty() {
            working = working.replace(phrase.as_str(), "");
        }
    }

    // 6. Sanitization: drop remaining URL-likes (allowed links are removed
    //    too - they are never spoken), characters outside the allow-list,
    //    and whitespace runs.
    for pattern in &patterns.links {
        working = pattern.replace_all(&working, "").into_owned();
    }
    working = patterns.disallowed.replace_all(&working, "").into_owned();
    working = patterns
        .whitespace
        .replace_all(&working, " ")
        .trim()
        .to_string();

    // 7. Nothing left to speak.
    if working.is_empty() {
        return ModerationVerdict::Rejected(ModerationRejection::EmptyAfterCleanup);
    }

    // 8. Credit for attributed sources, decided on the original text.
    if raw.trim_start().starts_with(credit.marker.as_str()) {
        working = format!("{} {}", working, credit.suffix);
    }

    ModerationVerdict::Accepted(working)
}

// ============================================================================
// RULE SERVICE
// ============================================================================

/// Owns the in-memory rule snapshot and its persistence.
///
/// Readers take one `Arc` snapshot for the duration of a post; writers
/// persist the whole set and swap the snapshot, so the next post sees the
/// update (last write wins).
pub struct RulesService<S: RuleStore> {
    store: S,
    snapshot: RwLock<Arc<RuleSet>>,
}

impl<S: RuleStore> RulesService<S> {
    /// Load the rules from the store, or persist the stock set when none
    /// exist yet.
    pub async fn init(store: S) -> Result<Self, ModerationError> {
        let rules = match store.load().await? {
            Some(mut rules) => {
                rules.normalize();
                rules
            }
            None => {
                let rules = RuleSet::stock();
                store.save(&rules).await?;
                rules
            }
        };
        Ok(Self {
            store,
            snapshot: RwLock::new(Arc::new(rules)),
        })
    }

    pub async fn snapshot(&self) -> Arc<RuleSet> {
        self.snapshot.read().await.clone()
    }

    /// Add an item to a list. Replacements use `key=value` syntax.
    /// Returns false when the item was already present.
    pub async fn add(&self, list: RuleList, item: &str) -> Result<bool, ModerationError> {
        let mut rules = (*self.snapshot().await).clone();
        let added = match list {
            RuleList::Replacements => {
                let (key, value) = item.split_once('=').ok_or_else(|| {
                    ModerationError::InvalidItem(format!("expected key=value, got '{}'", item))
                })?;
                rules
                    .replacements
                    .insert(key.trim().to_string(), value.trim().to_string())
                    .is_none()
            }
            _ => {
                let entries = Self::list_mut(&mut rules, list);
                if entries.iter().any(|e| e == item) {
                    false
                } else {
                    entries.push(item.to_string());
                    true
                }
            }
        };
        if added {
            self.commit(rules).await?;
        }
        Ok(added)
    }

    /// Remove an item from a list (for replacements, the item is the key).
    /// Returns false when no such item existed.
    pub async fn remove(&self, list: RuleList, item: &str) -> Result<bool, ModerationError> {
        let mut rules = (*self.snapshot().await).clone();
        let removed = match list {
            RuleList::Replacements => rules.replacements.remove(item.trim()).is_some(),
            _ => {
                let entries = Self::list_mut(&mut rules, list);
                let before = entries.len();
                entries.retain(|e| e != item);
                entries.len() != before
            }
        };
        if removed {
            self.commit(rules).await?;
        }
        Ok(removed)
    }

    /// The current items of one list, replacements rendered as `key=value`.
    pub async fn items(&self, list: RuleList) -> Vec<String> {
        let rules = self.snapshot().await;
        match list {
            RuleList::StrictBanned => rules.strict_banned.clone(),
            RuleList::WordBanned => rules.word_banned.clone(),
            RuleList::BlockedPhrases => rules.blocked_phrases.clone(),
            RuleList::AllowedLinks => rules.allowed_links.clone(),
            RuleList::AllowedPhones => rules.allowed_phones.clone(),
            RuleList::Replacements => {
                let mut items: Vec<String> = rules
                    .replacements
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                items.sort();
                items
            }
        }
    }

    fn list_mut(rules: &mut RuleSet, list: RuleList) -> &mut Vec<String> {
        match list {
            RuleList::StrictBanned => &mut rules.strict_banned,
            RuleList::WordBanned => &mut rules.word_banned,
            RuleList::BlockedPhrases => &mut rules.blocked_phrases,
            RuleList::AllowedLinks => &mut rules.allowed_links,
            RuleList::AllowedPhones => &mut rules.allowed_phones,
            RuleList::Replacements => unreachable!("replacements are a map"),
        }
    }

    /// Persist-then-swap: the file write happens before the in-memory
    /// snapshot changes, so a failed write leaves both sides consistent.
    async fn commit(&self, mut rules: RuleSet) -> Result<(), ModerationError> {
        rules.normalize();
        self.store.save(&rules).await?;
        *self.snapshot.write().await = Arc::new(rules);
        Ok(())
    }
}

// ============================================================================
// MODERATION STRATEGY (CAPABILITY)
// ============================================================================

/// A moderation strategy. The pipeline depends only on this capability and
/// never on which implementation is active.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn moderate(&self, raw_text: &str) -> ModerationVerdict;
}

/// The rule-based strategy: snapshots the rule set and runs the decision
/// function.
pub struct RuleBasedModerator<S: RuleStore> {
    rules: Arc<RulesService<S>>,
    patterns: ModerationPatterns,
    credit: CreditPolicy,
}

impl<S: RuleStore> RuleBasedModerator<S> {
    pub fn new(rules: Arc<RulesService<S>>) -> Self {
        Self {
            rules,
            patterns: ModerationPatterns::default(),
            credit: CreditPolicy::default(),
        }
    }
}

#[async_trait]
impl<S: RuleStore> Moderator for RuleBasedModerator<S> {
    async fn moderate(&self, raw_text: &str) -> ModerationVerdict {
        let rules = self.rules.snapshot().await;
        moderate_text(raw_text, &rules, &self.patterns, &self.credit)
    }
}

// ============================================================================
// TESTS
// ============================================================================
