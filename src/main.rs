// This is the entry point of the channel-to-hotline announcer.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic): moderation, dedup,
//   media gate, synthesis, delivery, and the pipeline tying them together
// - `infra/` = Implementations of core traits (file stores, REST clients,
//   ffmpeg, VAD)
// - `telegram/` = Transport adapter (polling, admin commands, status sends)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Start the polling loop

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

mod config;

use crate::config::{Config, ModerationStrategy};
use crate::core::calendar::RestrictedPeriodGate;
use crate::core::clock::SystemClock;
use crate::core::dedup::DedupService;
use crate::core::delivery::DeliveryService;
use crate::core::media::MediaGate;
use crate::core::moderation::{ModelModerator, Moderator, RuleBasedModerator, RulesService};
use crate::core::pipeline::Pipeline;
use crate::core::retry::RetryPolicy;
use crate::core::speech::SpeechService;
use crate::infra::calendar::HebcalClient;
use crate::infra::clock::TokioSleeper;
use crate::infra::delivery::YemotClient;
use crate::infra::judge::OpenRouterJudge;
use crate::infra::media::{FfmpegToolkit, WebRtcSpeechDetector};
use crate::infra::recency::JsonRecencyStore;
use crate::infra::rules::JsonRuleStore;
use crate::infra::tts::GoogleTtsClient;
use crate::telegram::admin::AdminCommands;
use crate::telegram::api::TelegramClient;
use crate::telegram::listener::ChannelListener;
use crate::telegram::notifier::TelegramNotifier;
use anyhow::Context as _;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load .env file if present (for local development)
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .context("creating work directory")?;

    // ========================================================================
    // STORES AND SERVICES
    // ========================================================================

    let rules = Arc::new(
        RulesService::init(JsonRuleStore::new(&config.rules_file))
            .await
            .context("loading rule store")?,
    );

    let moderator: Arc<dyn Moderator> = match config.moderation_strategy {
        ModerationStrategy::Rules => Arc::new(RuleBasedModerator::new(Arc::clone(&rules))),
        ModerationStrategy::Model => {
            let api_key = config
                .openrouter_api_key
                .clone()
                .context("OPENROUTER_API_KEY is not set")?;
            Arc::new(ModelModerator::new(OpenRouterJudge::new(
                api_key,
                config.openrouter_model.clone(),
            )?))
        }
    };

    let dedup = DedupService::new(
        JsonRecencyStore::new(&config.recency_file),
        config.dedup_threshold,
        config.history_size,
    );

    let toolkit = Arc::new(FfmpegToolkit::new());
    let detector = Arc::new(WebRtcSpeechDetector::new(Arc::clone(&toolkit)));
    let media_gate = MediaGate::new(Arc::clone(&toolkit), detector);

    let synthesizer = Arc::new(
        GoogleTtsClient::from_base64_json(&config.google_credentials_b64)
            .context("loading TTS credentials")?,
    );
    let speech = SpeechService::new(
        synthesizer,
        Arc::clone(&toolkit),
        Arc::new(SystemClock),
        chrono_tz::Asia::Jerusalem,
        config.station_name.clone(),
    );

    let sleeper = Arc::new(TokioSleeper);
    let delivery = DeliveryService::new(
        Arc::new(YemotClient::new(
            config.ymot_token.clone(),
            config.ymot_path.clone(),
        )?),
        Arc::clone(&sleeper),
        RetryPolicy::default(),
    );

    let api = Arc::new(TelegramClient::new(&config.bot_token)?);
    let notifier = Arc::new(TelegramNotifier::new(
        Arc::clone(&api),
        Arc::clone(&sleeper),
        RetryPolicy::default(),
    ));

    let pipeline = Arc::new(Pipeline::new(
        RestrictedPeriodGate::new(HebcalClient::new(config.geoname_id)?),
        moderator,
        Arc::clone(&rules),
        dedup,
        media_gate,
        speech,
        delivery,
        notifier,
    ));

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    let admin = AdminCommands::new(Arc::clone(&rules), config.admin_id);
    let listener = ChannelListener::new(api, pipeline, admin, config.work_dir.clone());

    info!("Announcer is up, posts go to extension {}", config.ymot_path);
    listener.run().await;
    Ok(())
}
