// Pipeline domain models - the inbound post and what became of it.

use std::path::PathBuf;

/// What kind of attachment a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Voice,
}

/// A media attachment already fetched to local disk by the transport.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// One inbound channel item. Text and media may both be present (caption
/// case); a post with neither is a no-op.
#[derive(Debug, Clone)]
pub struct IncomingPost {
    /// Source channel, used for status notifications.
    pub chat_id: i64,
    /// Transport-level id, used for logging.
    pub post_id: i64,
    pub text: Option<String>,
    pub video: Option<MediaRef>,
    pub audio_or_voice: Option<MediaRef>,
    /// Scratch directory for this post; downloads live here and the
    /// pipeline writes its intermediate audio here. Removed when the post
    /// is done, whatever the outcome.
    pub work_dir: PathBuf,
}

impl IncomingPost {
    pub fn media(&self) -> Option<&MediaRef> {
        self.video.as_ref().or(self.audio_or_voice.as_ref())
    }
}

/// Terminal state of one post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// Neither text nor media; nothing to do.
    Ignored,
    /// Restricted period; dropped without any status.
    Restricted,
    /// Content rejection or media unsuitability; the reason was sent to
    /// the source channel.
    Rejected(String),
    /// The artifact reached the line.
    Delivered,
    /// Infrastructure failure (store, synthesis, delivery exhaustion).
    Failed(String),
}
