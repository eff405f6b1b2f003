//! Routes utterances to the local synthesizer or to the relay.
//!
//! One dispatcher is built by the composition root and shared by reference.
//! Installed voices are enumerated once, in an explicit `initialize()` call,
//! and never change afterwards.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::relay::RelayClient;
use super::{SpeechError, SpeechSynthesizer, RELAY_VOICE_NAME};

pub const MIN_RATE: i32 = -100;
pub const MAX_RATE: i32 = 100;
pub const MAX_VOLUME: u8 = 100;

/// Where the next utterance goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Local synthesis with the named voice (empty: the engine's current voice).
    Local(String),
    Relay,
}

pub struct SpeechDispatcher {
    synth: Option<Arc<dyn SpeechSynthesizer>>,
    relay: RelayClient,
    locale: String,
    voices: OnceLock<Vec<String>>,
    route: Mutex<Route>,
    rate: AtomicI32,
    volume: AtomicU8,
}

impl SpeechDispatcher {
    pub fn new(synth: Option<Arc<dyn SpeechSynthesizer>>, relay: RelayClient, locale: &str) -> Self {
        Self {
            synth,
            relay,
            locale: locale.to_string(),
            voices: OnceLock::new(),
            route: Mutex::new(Route::Local(String::new())),
            rate: AtomicI32::new(0),
            volume: AtomicU8::new(MAX_VOLUME),
        }
    }

    /// Enumerate installed voices. Only the first call queries the engine.
    pub fn initialize(&self) -> usize {
        let voices = self.voices.get_or_init(|| match &self.synth {
            Some(synth) => synth.installed_voices(&self.locale),
            None => Vec::new(),
        });
        info!(
            "Speech dispatcher ready: {} local voice(s) for {}, relay at {}",
            voices.len(),
            self.locale,
            self.relay.addr()
        );
        voices.len()
    }

    pub fn installed_voices(&self) -> &[String] {
        self.voices.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Installed voice names followed by the relay voice, always last.
    pub fn voice_names(&self) -> impl Iterator<Item = String> + '_ {
        self.installed_voices()
            .iter()
            .cloned()
            .chain(std::iter::once(RELAY_VOICE_NAME.to_string()))
    }

    /// Pick the voice for future utterances. Utterances already started are
    /// not affected.
    pub fn select_voice(&self, name: &str) -> Result<(), SpeechError> {
        let route = if name == RELAY_VOICE_NAME {
            Route::Relay
        } else if self.installed_voices().iter().any(|v| v == name) {
            Route::Local(name.to_string())
        } else {
            return Err(SpeechError::UnknownVoice(name.to_string()));
        };

        info!("Voice changed to: {name}");
        *self.route.lock().unwrap() = route;
        Ok(())
    }

    /// Select the voice to start with: `configured` if it is known, else the
    /// first installed voice, else the relay. Returns the selected name.
    pub fn select_initial_voice(&self, configured: &str) -> String {
        if !configured.is_empty() {
            match self.select_voice(configured) {
                Ok(()) => return configured.to_string(),
                Err(e) => warn!("{e}, falling back to the default voice"),
            }
        }
        let fallback = self
            .installed_voices()
            .first()
            .cloned()
            .unwrap_or_else(|| RELAY_VOICE_NAME.to_string());
        *self.route.lock().unwrap() = if fallback == RELAY_VOICE_NAME {
            Route::Relay
        } else {
            Route::Local(fallback.clone())
        };
        info!("Voice changed to: {fallback}");
        fallback
    }

    pub fn route(&self) -> Route {
        self.route.lock().unwrap().clone()
    }

    pub fn uses_relay(&self) -> bool {
        self.route() == Route::Relay
    }

    pub fn selected_voice(&self) -> String {
        match self.route() {
            Route::Local(voice) => voice,
            Route::Relay => RELAY_VOICE_NAME.to_string(),
        }
    }

    pub fn rate(&self) -> i32 {
        self.rate.load(Ordering::Relaxed)
    }

    pub fn set_rate(&self, rate: i32) {
        self.rate.store(rate.clamp(MIN_RATE, MAX_RATE), Ordering::Relaxed);
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: u8) {
        self.volume.store(volume.min(MAX_VOLUME), Ordering::Relaxed);
    }

    /// Start speaking `sentence` and return immediately.
    ///
    /// Dropping the handle is fine; awaiting it waits for playback (or the
    /// relay hand-off) to finish. Failures are logged, never returned.
    /// Nothing orders concurrent calls: two local utterances race on the
    /// engine's shared rate/volume settings, and relay utterances rely on the
    /// relay's own queue.
    pub fn speak(&self, sentence: &str) -> JoinHandle<()> {
        let sentence = sentence.to_string();
        let synth = self.synth.clone();

        match self.route() {
            Route::Local(voice) => {
                let rate = self.rate();
                let volume = self.volume();
                tokio::spawn(async move {
                    let Some(synth) = synth else {
                        warn!("No local synthesizer, dropping utterance");
                        return;
                    };
                    if !voice.is_empty() {
                        if let Err(e) = synth.select_voice(&voice) {
                            warn!("Failed to select voice {voice}: {e}");
                        }
                    }
                    synth.set_rate(rate);
                    synth.set_volume(volume);
                    if let Err(e) = synth.speak(&sentence).await {
                        warn!("Local speech failed: {e}");
                    }
                })
            }
            Route::Relay => {
                let relay = self.relay.clone();
                let pacing_voice = self.installed_voices().first().cloned();
                tokio::spawn(async move {
                    // A muted local reading of the same text keeps consecutive
                    // relay messages spaced out when callers await the handle.
                    let pacing = async {
                        if let (Some(synth), Some(voice)) = (synth, pacing_voice) {
                            let _ = synth.select_voice(&voice);
                            synth.set_rate(0);
                            synth.set_volume(0);
                            let _ = synth.speak(&sentence).await;
                        }
                    };
                    let send = async {
                        match relay.send(&sentence).await {
                            Ok(()) => debug!("Relayed {} chars", sentence.chars().count()),
                            Err(e) => warn!("Relay speech failed: {e}"),
                        }
                    };
                    tokio::join!(pacing, send);
                })
            }
        }
    }
}
