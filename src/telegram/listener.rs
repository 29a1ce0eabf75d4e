// Channel listener - the long-polling loop feeding the pipeline.
//
// Updates are processed strictly in order, one at a time: a post runs
// start-to-finish before the next update is even looked at, so the stores
// never see concurrent pipeline runs. Polling errors pause the loop briefly
// instead of crashing the process.

use crate::core::moderation::RuleStore;
use crate::core::pipeline::{IncomingPost, MediaKind, MediaRef, PostHandler};
use crate::telegram::admin::AdminCommands;
use crate::telegram::api::{Message, TelegramClient, Update};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, warn};

/// Pause after a failed poll before trying again.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(30);

pub struct ChannelListener<R: RuleStore> {
    api: Arc<TelegramClient>,
    handler: Arc<dyn PostHandler>,
    admin: AdminCommands<R>,
    work_root: PathBuf,
}

impl<R: RuleStore> ChannelListener<R> {
    pub fn new(
        api: Arc<TelegramClient>,
        handler: Arc<dyn PostHandler>,
        admin: AdminCommands<R>,
        work_root: PathBuf,
    ) -> Self {
        Self {
            api,
            handler,
            admin,
            work_root,
        }
    }

    /// Poll forever. Never returns under normal operation.
    pub async fn run(&self) {
        info!("Listening for channel posts");
        let mut offset = 0i64;
        loop {
            match self.api.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        self.dispatch(update).await;
                    }
                }
                Err(err) => {
                    error!("Polling failed: {}", err);
                    tokio::time::sleep(POLL_RETRY_PAUSE).await;
                }
            }
        }
    }

    async fn dispatch(&self, update: Update) {
        if let Some(post) = update.channel_post {
            self.handle_channel_post(update.update_id, post).await;
        } else if let Some(message) = update.message {
            self.handle_private_message(message).await;
        }
    }

    async fn handle_channel_post(&self, update_id: i64, message: Message) {
        let work_dir = self.work_root.join(format!("post-{}", update_id));
        if let Err(err) = fs::create_dir_all(&work_dir).await {
            error!("Cannot create work dir for post {}: {}", update_id, err);
            return;
        }

        let post = match self.build_post(update_id, message, work_dir.clone()).await {
            Ok(post) => post,
            Err(err) => {
                error!("Skipping post {}: download failed: {}", update_id, err);
                let _ = fs::remove_dir_all(&work_dir).await;
                return;
            }
        };
        self.handler.handle_post(post).await;
    }

    /// Map a raw channel message into a pipeline post, fetching any
    /// attachment to local disk first.
    async fn build_post(
        &self,
        update_id: i64,
        message: Message,
        work_dir: PathBuf,
    ) -> Result<IncomingPost, crate::telegram::api::TelegramError> {
        let video = match &message.video {
            Some(file) => {
                let path = work_dir.join("media.mp4");
                self.api.download_file(&file.file_id, &path).await?;
                Some(MediaRef {
                    path,
                    kind: MediaKind::Video,
                })
            }
            None => None,
        };

        let audio_or_voice = match (&message.audio, &message.voice) {
            (Some(file), _) => {
                let path = work_dir.join("media.ogg");
                self.api.download_file(&file.file_id, &path).await?;
                Some(MediaRef {
                    path,
                    kind: MediaKind::Audio,
                })
            }
            (None, Some(file)) => {
                let path = work_dir.join("media.ogg");
                self.api.download_file(&file.file_id, &path).await?;
                Some(MediaRef {
                    path,
                    kind: MediaKind::Voice,
                })
            }
            (None, None) => None,
        };

        Ok(IncomingPost {
            chat_id: message.chat.id,
            post_id: update_id,
            text: message.text.or(message.caption),
            video,
            audio_or_voice,
            work_dir,
        })
    }

    async fn handle_private_message(&self, message: Message) {
        let Some(from) = message.from.as_ref() else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        if let Some(reply) = self.admin.handle(from.id, text).await {
            if let Err(err) = self.api.send_message(message.chat.id, &reply).await {
                warn!("Could not answer admin command: {}", err);
            }
        }
    }
}
