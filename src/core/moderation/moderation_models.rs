// Moderation domain models - data structures for the content filter.
//
// These are pure domain types with no Telegram dependencies.
// The transport layer renders verdicts into status messages for the channel.

use serde::{Deserialize, Serialize};

/// The moderation configuration: banned terms, allowed links/phones and
/// word replacements. Persisted as a whole to the rule store and reloaded
/// after every administrative mutation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RuleSet {
    /// Terms that reject a message on any substring occurrence.
    #[serde(default)]
    pub strict_banned: Vec<String>,
    /// Words that reject a message when they appear as a whole token.
    #[serde(default)]
    pub word_banned: Vec<String>,
    /// Phrases stripped from accepted text, longest first.
    #[serde(default)]
    pub blocked_phrases: Vec<String>,
    /// Link allow-list; a matched URL (or its host) must be a substring of
    /// one of these entries to pass.
    #[serde(default)]
    pub allowed_links: Vec<String>,
    /// Phone numbers that may appear in a post (they are still removed
    /// before synthesis).
    #[serde(default)]
    pub allowed_phones: Vec<String>,
    /// Whole-word substitutions applied to accepted text before synthesis.
    #[serde(default)]
    pub replacements: std::collections::HashMap<String, String>,
}

impl RuleSet {
    /// Restore internal invariants after deserialization or mutation:
    /// blocked phrases must be ordered longest-first so a long phrase is
    /// stripped before any of its substrings.
    pub fn normalize(&mut self) {
        self.blocked_phrases
            .sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    }

    /// The stock rule set used when no rule file exists yet.
    pub fn stock() -> Self {
        let mut rules = Self {
            strict_banned: vec![
                "טיקטוק".to_string(),
                "OnlyFans".to_string(),
                "פורנו".to_string(),
            ],
            word_banned: vec![
                "חזה".to_string(),
                "מחשוף".to_string(),
                "נשיקה".to_string(),
            ],
            ..Default::default()
        };
        rules.normalize();
        rules
    }
}

/// The rule lists an administrator can mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleList {
    StrictBanned,
    WordBanned,
    BlockedPhrases,
    AllowedLinks,
    AllowedPhones,
    Replacements,
}

impl RuleList {
    /// Parse an administrator-supplied list name. Accepts the store field
    /// name and a short alias.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "strict_banned" | "strict" => Some(Self::StrictBanned),
            "word_banned" | "words" => Some(Self::WordBanned),
            "blocked_phrases" | "phrases" => Some(Self::BlockedPhrases),
            "allowed_links" | "links" => Some(Self::AllowedLinks),
            "allowed_phones" | "phones" => Some(Self::AllowedPhones),
            "replacements" | "replace" => Some(Self::Replacements),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictBanned => "strict_banned",
            Self::WordBanned => "word_banned",
            Self::BlockedPhrases => "blocked_phrases",
            Self::AllowedLinks => "allowed_links",
            Self::AllowedPhones => "allowed_phones",
            Self::Replacements => "replacements",
        }
    }

}

/// Why a message was turned away by the filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationRejection {
    /// A strict-ban term occurred somewhere in the text.
    BannedTerm(String),
    /// A banned word appeared as a whole token.
    BannedWord(String),
    /// The text carried a phone number that is not allow-listed.
    UnapprovedPhone,
    /// The text carried a link that is not allow-listed.
    UnapprovedLink,
    /// Sanitization removed everything.
    EmptyAfterCleanup,
    /// The external policy model turned the message away (or could not be
    /// reached - judged fail-closed).
    PolicyRejected,
}

impl std::fmt::Display for ModerationRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BannedTerm(term) => {
                write!(f, "⛔️ הודעה לא נשלחה: מכילה ביטוי אסור ('{}').", term)
            }
            Self::BannedWord(word) => {
                write!(f, "⛔️ הודעה לא נשלחה: מכילה מילה אסורה ('{}').", word)
            }
            Self::UnapprovedPhone => {
                write!(f, "⛔️ הודעה לא נשלחה: מספר טלפון לא מאושר.")
            }
            Self::UnapprovedLink => write!(f, "⛔️ הודעה לא נשלחה: קישור לא מאושר."),
            Self::EmptyAfterCleanup => {
                write!(f, "⛔️ הודעה לא נשלחה: הטקסט נמחק כולו בניקוי.")
            }
            Self::PolicyRejected => {
                write!(f, "⛔️ הודעה לא נשלחה: נפסלה על ידי מסנן התוכן.")
            }
        }
    }
}

/// Outcome of running a raw post text through a moderation strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationVerdict {
    /// The message may be spoken; carries the cleaned text.
    Accepted(String),
    /// The message must not be spoken; carries the user-facing reason.
    Rejected(ModerationRejection),
}
