// =============================================================================
// GOOGLE CLOUD TEXT-TO-SPEECH CLIENT WITH SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Implements the `SpeechSynthesizer` port against the Cloud TTS REST API
// (https://cloud.google.com/text-to-speech/docs/reference/rest).
//
// **Authentication:** service account JSON key, supplied base64-encoded in
// the environment (`GOOGLE_SERVICE_ACCOUNT_B64`) so deployments never need
// a key file on disk. The JWT is exchanged for an OAuth2 access token at
// the credential's token endpoint; tokens are cached until shortly before
// expiry.
//
// **Voice:** Hebrew WaveNet, male, slightly sped up - tuned for short news
// flashes read over a phone line. The engine returns MP3; the toolkit
// transcodes to the canonical WAV afterwards.

use crate::core::retry::RetryPolicy;
use crate::core::speech::{SpeechError, SpeechInput, SpeechSynthesizer};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::warn;

const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const TTS_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Transient synthesis failures get a short retry budget before the error
/// surfaces to the pipeline.
const SYNTHESIS_ATTEMPTS: u32 = 3;

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// Service account credentials from the JSON key.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// The token URI (where to exchange JWT for an access token).
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Response of the synthesize call: base64-encoded audio.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleTtsClient {
    client: Client,
    credentials: ServiceAccountCredentials,
    cached_token: RwLock<Option<CachedToken>>,
    language_code: String,
    voice_name: String,
    speaking_rate: f32,
}

impl GoogleTtsClient {
    /// Build a client from the base64-encoded service account JSON.
    pub fn from_base64_json(encoded: &str) -> Result<Self, SpeechError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| SpeechError::Synthesis(format!("credentials decode: {}", e)))?;
        let credentials: ServiceAccountCredentials = serde_json::from_slice(&raw)
            .map_err(|e| SpeechError::Synthesis(format!("credentials parse: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            cached_token: RwLock::new(None),
            language_code: "he-IL".to_string(),
            voice_name: "he-IL-Wavenet-B".to_string(),
            speaking_rate: 1.2,
        })
    }

    /// Gets a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, SpeechError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                expires_at: SystemTime::now() + Duration::from_secs(55 * 60),
            });
        }

        Ok(new_token)
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<String, SpeechError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: TTS_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| SpeechError::Synthesis(format!("private key: {}", e)))?;
        let jwt = encode(&header, &claims, &key)
            .map_err(|e| SpeechError::Synthesis(format!("jwt encode: {}", e)))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
        Ok(token.access_token)
    }
}

impl GoogleTtsClient {
    async fn synthesize_once(&self, input: &SpeechInput) -> Result<Vec<u8>, SpeechError> {
        let token = self.access_token().await?;

        let input_field = match input {
            SpeechInput::Text(text) => json!({ "text": text }),
            SpeechInput::Ssml(ssml) => json!({ "ssml": ssml }),
        };
        let payload = json!({
            "input": input_field,
            "voice": {
                "languageCode": self.language_code,
                "name": self.voice_name,
                "ssmlGender": "MALE",
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": self.speaking_rate,
            },
        });

        let response = self
            .client
            .post(SYNTHESIZE_URL)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "synthesis failed ({}): {}",
                status, text
            )));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
        BASE64
            .decode(body.audio_content.as_bytes())
            .map_err(|e| SpeechError::Synthesis(format!("audio decode: {}", e)))
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(&self, input: &SpeechInput) -> Result<Vec<u8>, SpeechError> {
        let policy = RetryPolicy::new(SYNTHESIS_ATTEMPTS);
        let mut last_error = None;
        for attempt in 0..policy.max_attempts {
            match self.synthesize_once(input).await {
                Ok(audio) => return Ok(audio),
                Err(err) => {
                    if attempt + 1 < policy.max_attempts {
                        let delay = policy.delay_for(attempt);
                        warn!(
                            "Synthesis attempt {} failed ({}), retrying in {:.1}s",
                            attempt,
                            err,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SpeechError::Synthesis("no synthesis attempt ran".to_string())))
    }
}
