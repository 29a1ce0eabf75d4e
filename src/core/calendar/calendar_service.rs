// Restricted-period gate. During externally-defined restricted windows
// (sabbath and holidays at the configured location) the whole pipeline
// stands down: nothing is processed, nothing is delivered, and no status
// goes back to the channel.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Calendar lookup error: {0}")]
    Lookup(String),
}

/// Trait for the external calendar lookup.
#[async_trait]
pub trait CalendarLookup: Send + Sync {
    /// Whether the current moment falls inside a restricted period.
    async fn is_restricted_now(&self) -> Result<bool, CalendarError>;
}

/// Short-circuits the pipeline during restricted periods.
///
/// Lookup failures resolve to "not restricted": missing one restriction is
/// cheaper than dropping all traffic on every transient network hiccup,
/// the opposite of the fail-closed moderation and media gates.
pub struct RestrictedPeriodGate<C: CalendarLookup> {
    lookup: C,
}

impl<C: CalendarLookup> RestrictedPeriodGate<C> {
    pub fn new(lookup: C) -> Self {
        Self { lookup }
    }

    pub async fn is_restricted(&self) -> bool {
        match self.lookup.is_restricted_now().await {
            Ok(restricted) => restricted,
            Err(err) => {
                warn!("Calendar lookup failed, assuming unrestricted: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCalendar {
        answer: Result<bool, ()>,
    }

    #[async_trait]
    impl CalendarLookup for FixedCalendar {
        async fn is_restricted_now(&self) -> Result<bool, CalendarError> {
            self.answer
                .map_err(|_| CalendarError::Lookup("timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn restricted_answer_silences() {
        let gate = RestrictedPeriodGate::new(FixedCalendar { answer: Ok(true) });
        assert!(gate.is_restricted().await);
    }

    #[tokio::test]
    async fn open_answer_lets_traffic_through() {
        let gate = RestrictedPeriodGate::new(FixedCalendar { answer: Ok(false) });
        assert!(!gate.is_restricted().await);
    }

    #[tokio::test]
    async fn lookup_failure_fails_open() {
        let gate = RestrictedPeriodGate::new(FixedCalendar { answer: Err(()) });
        assert!(!gate.is_restricted().await);
    }
}
