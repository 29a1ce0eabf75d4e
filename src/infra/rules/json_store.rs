// JSON file store for the rule set.
//
// One structured record, rewritten whole on every mutation. The write goes
// through a temp file and a rename so a crash mid-write never leaves a
// half-serialized rule file behind.

use crate::core::moderation::{ModerationError, RuleSet, RuleStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct JsonRuleStore {
    path: PathBuf,
}

impl JsonRuleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RuleStore for JsonRuleStore {
    async fn load(&self) -> Result<Option<RuleSet>, ModerationError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ModerationError::Store(e.to_string()))?;
        let rules: RuleSet =
            serde_json::from_str(&text).map_err(|e| ModerationError::Store(e.to_string()))?;
        Ok(Some(rules))
    }

    async fn save(&self, rules: &RuleSet) -> Result<(), ModerationError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ModerationError::Store(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(rules)
            .map_err(|e| ModerationError::Store(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)
            .await
            .map_err(|e| ModerationError::Store(e.to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ModerationError::Store(e.to_string()))
    }
}
