// Administrative command surface for the moderation lists.
//
// Private messages to the bot are parsed here: /add, /remove, /list and
// /view over the named rule lists. Only the single configured admin
// identity may use them; everyone else gets a fixed denial.

use crate::core::moderation::{ModerationError, RuleList, RuleStore, RulesService};
use std::sync::Arc;

pub const DENIED: &str = "⛔️ אין הרשאה.";

const USAGE: &str = "פקודות: /add <רשימה> <פריט>, /remove <רשימה> <פריט>, \
/list <רשימה>, /view <רשימה>\n\
רשימות: strict_banned, word_banned, blocked_phrases, allowed_links, \
allowed_phones, replacements (פריט בצורת key=value)";

pub struct AdminCommands<R: RuleStore> {
    rules: Arc<RulesService<R>>,
    admin_id: i64,
}

impl<R: RuleStore> AdminCommands<R> {
    pub fn new(rules: Arc<RulesService<R>>, admin_id: i64) -> Self {
        Self { rules, admin_id }
    }

    /// Handle one private message. Returns the reply text, or `None` when
    /// the message is not a command at all.
    pub async fn handle(&self, from_id: i64, text: &str) -> Option<String> {
        let mut parts = text.split_whitespace();
        let command = parts.next()?;
        if !command.starts_with('/') {
            return None;
        }
        if from_id != self.admin_id {
            return Some(DENIED.to_string());
        }

        let reply = match command {
            "/add" | "/remove" => {
                let Some(list) = parts.next().and_then(RuleList::parse) else {
                    return Some(USAGE.to_string());
                };
                let item = parts.collect::<Vec<_>>().join(" ");
                if item.is_empty() {
                    return Some(USAGE.to_string());
                }
                if command == "/add" {
                    self.add(list, &item).await
                } else {
                    self.remove(list, &item).await
                }
            }
            "/list" | "/view" => {
                let Some(list) = parts.next().and_then(RuleList::parse) else {
                    return Some(USAGE.to_string());
                };
                let items = self.rules.items(list).await;
                if command == "/list" {
                    if items.is_empty() {
                        "הרשימה ריקה.".to_string()
                    } else {
                        items.join("\n")
                    }
                } else {
                    let mut lines = vec![format!("📋 {} ({} פריטים):", list.as_str(), items.len())];
                    lines.extend(
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| format!("{}. {}", i + 1, item)),
                    );
                    lines.join("\n")
                }
            }
            _ => USAGE.to_string(),
        };
        Some(reply)
    }

    async fn add(&self, list: RuleList, item: &str) -> String {
        match self.rules.add(list, item).await {
            Ok(true) => format!("✅ נוסף אל {}.", list.as_str()),
            Ok(false) => "הפריט כבר קיים.".to_string(),
            Err(ModerationError::InvalidItem(_)) => USAGE.to_string(),
            Err(err) => format!("שגיאה בשמירה: {}", err),
        }
    }

    async fn remove(&self, list: RuleList, item: &str) -> String {
        match self.rules.remove(list, item).await {
            Ok(true) => format!("✅ הוסר מ-{}.", list.as_str()),
            Ok(false) => "הפריט לא נמצא.".to_string(),
            Err(err) => format!("שגיאה בשמירה: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::RuleSet;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct MemoryRuleStore {
        rules: Mutex<Option<RuleSet>>,
    }

    #[async_trait]
    impl RuleStore for MemoryRuleStore {
        async fn load(&self) -> Result<Option<RuleSet>, ModerationError> {
            Ok(self.rules.lock().await.clone())
        }

        async fn save(&self, rules: &RuleSet) -> Result<(), ModerationError> {
            *self.rules.lock().await = Some(rules.clone());
            Ok(())
        }
    }

    async fn commands() -> AdminCommands<MemoryRuleStore> {
        let rules = Arc::new(
            RulesService::init(MemoryRuleStore {
                rules: Mutex::new(Some(RuleSet::default())),
            })
            .await
            .unwrap(),
        );
        AdminCommands::new(rules, 7)
    }

    #[tokio::test]
    async fn non_admin_gets_the_fixed_denial() {
        let commands = commands().await;
        assert_eq!(
            commands.handle(8, "/add strict_banned מילה").await,
            Some(DENIED.to_string())
        );
    }

    #[tokio::test]
    async fn non_command_text_is_ignored() {
        let commands = commands().await;
        assert_eq!(commands.handle(7, "סתם הודעה").await, None);
    }

    #[tokio::test]
    async fn add_then_list_shows_the_item() {
        let commands = commands().await;
        let reply = commands.handle(7, "/add blocked_phrases שידור חוזר").await;
        assert!(reply.unwrap().starts_with("✅"));

        let listing = commands.handle(7, "/list blocked_phrases").await.unwrap();
        assert_eq!(listing, "שידור חוזר");

        let view = commands.handle(7, "/view blocked_phrases").await.unwrap();
        assert!(view.contains("1 פריטים"));
        assert!(view.contains("1. שידור חוזר"));
    }

    #[tokio::test]
    async fn unknown_list_name_returns_usage() {
        let commands = commands().await;
        let reply = commands.handle(7, "/add nosuchlist פריט").await.unwrap();
        assert!(reply.contains("/add"));
    }
}
