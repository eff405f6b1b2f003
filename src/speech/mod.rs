//! Speech output: local synthesis and the Bouyomi-chan relay.
//!
//! Components:
//! - `dispatcher`: voice selection, rate/volume state and routing of utterances
//! - `relay`: binary frame encoding + TCP client for the relay process
//! - `kokoro`: Kokoro ONNX model inference + rodio playback

pub mod dispatcher;
pub mod kokoro;
pub mod relay;

use async_trait::async_trait;
use thiserror::Error;

/// Voice name that routes speech to the relay instead of a local voice.
pub const RELAY_VOICE_NAME: &str = "Bouyomi-chan";

/// Locale local voices are filtered by unless configured otherwise.
pub const DEFAULT_LOCALE: &str = "ja-JP";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("message of {0} bytes is too long for the relay")]
    MessageTooLong(usize),
    #[error("relay unavailable at {addr}: {source}")]
    RelayUnavailable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A local speech synthesis capability.
///
/// Rate, volume and voice are settings of the capability itself, shared by
/// every caller: two utterances configured back to back race on them and
/// the last write wins.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Names of installed voices for a locale tag such as `ja-JP`.
    fn installed_voices(&self, locale: &str) -> Vec<String>;

    fn select_voice(&self, name: &str) -> Result<(), SpeechError>;

    /// Rate in `-100..=100`, 0 being the voice's natural speed.
    fn set_rate(&self, rate: i32);

    /// Volume in `0..=100`.
    fn set_volume(&self, volume: u8);

    /// Synthesize and play `text`, returning when playback ends.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}
