// Duplicate suppression - core business logic for the recency log.
//
// An incoming cleaned text is compared against the last N accepted texts;
// anything too similar is rejected without touching the log. The comparison
// runs on pre-replacement text so wording substitutions cannot defeat it.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Recency store error: {0}")]
    Store(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting the bounded log of recently accepted texts.
#[async_trait]
pub trait RecencyStore: Send + Sync {
    async fn load(&self) -> Result<Vec<String>, DedupError>;

    /// Persist the whole log. Implementations must write atomically.
    async fn save(&self, entries: &[String]) -> Result<(), DedupError>;
}

/// User-facing notice for suppressed near-duplicates.
pub const TOO_SIMILAR_NOTICE: &str = "⏩ הודעה דומה מדי להודעה קודמת – לא תועלה";

// ============================================================================
// SIMILARITY
// ============================================================================

/// Character-sequence similarity in [0, 1]: twice the longest common
/// subsequence over the combined length. 1.0 for two empty strings.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Two-row LCS table; texts are short news flashes, quadratic is fine.
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];
    (2.0 * lcs as f64) / ((a.len() + b.len()) as f64)
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Outcome of a dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    /// Not similar to anything recent; the text is now committed to the log.
    Fresh,
    /// Too similar to a recent message; the log is untouched.
    TooSimilar,
}

/// Duplicate-suppression service over a [`RecencyStore`].
pub struct DedupService<S: RecencyStore> {
    store: S,
    threshold: f64,
    capacity: usize,
    // Makes check-and-commit atomic per message: a text is never compared
    // against a log that already counts itself or a concurrent sibling.
    gate: Mutex<()>,
}

impl<S: RecencyStore> DedupService<S> {
    pub fn new(store: S, threshold: f64, capacity: usize) -> Self {
        Self {
            store,
            threshold,
            capacity,
            gate: Mutex::new(()),
        }
    }

    /// Compare `cleaned_text` against the log; commit it when fresh.
    pub async fn check_and_commit(&self, cleaned_text: &str) -> Result<DedupVerdict, DedupError> {
        let _held = self.gate.lock().await;

        let mut entries = self.store.load().await?;
        for previous in &entries {
            let ratio = similarity_ratio(cleaned_text, previous);
            if ratio >= self.threshold {
                debug!("Message too similar to a recent one (ratio {:.2})", ratio);
                return Ok(DedupVerdict::TooSimilar);
            }
        }

        entries.push(cleaned_text.to_string());
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
        self.store.save(&entries).await?;
        Ok(DedupVerdict::Fresh)
    }
}

// ============================================================================
// TESTS
// ============================================================================
