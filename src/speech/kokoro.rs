//! Kokoro TTS engine: text → phonemes → ONNX inference → audio playback.
//!
//! Pipeline:
//! 1. Text → sentences (split on .!? and their full-width forms)
//! 2. Sentence → phonemes (misaki-rs G2P)
//! 3. Phonemes → token IDs (tokenizer.json vocabulary)
//! 4. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 5. Audio → rodio Sink playback at the configured volume

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use ndarray::{Array2, Array3};
use ndarray_npy::NpzReader;
use ort::value::Tensor;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::{SpeechError, SpeechSynthesizer};
use crate::config::KokoroConfig;

const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension

/// Loaded voice style data: shape (510, 1, 256) f32.
struct VoiceData {
    /// Style vectors indexed by token count. shape: (510, 256)
    styles: Array2<f32>,
}

/// Local speech capability backed by the Kokoro ONNX model.
pub struct KokoroSynthesizer {
    // ONNX model (Mutex because ort 2.0 Session::run needs &mut)
    session: Mutex<Option<ort::session::Session>>,
    phonemizer: Option<misaki_rs::G2P>,
    vocab: HashMap<char, i64>,
    voices: HashMap<String, VoiceData>,

    // Shared engine settings, last write wins
    voice: Mutex<String>,
    speed: Mutex<f32>,
    volume: Mutex<f32>,

    // In rodio 0.21, OutputStream is the handle — kept alive for process lifetime
    output_stream: Option<OutputStream>,
    speak_lock: AsyncMutex<()>,

    model_path: PathBuf,
    voices_path: PathBuf,
    tokenizer_path: PathBuf,
}

impl KokoroSynthesizer {
    pub fn new(config: &KokoroConfig) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_default();
        let resolve = |configured: &str, default: &str| {
            if configured.is_empty() {
                base_dir.join(default)
            } else {
                PathBuf::from(configured)
            }
        };

        Self {
            session: Mutex::new(None),
            phonemizer: None,
            vocab: HashMap::new(),
            voices: HashMap::new(),
            voice: Mutex::new(String::new()),
            speed: Mutex::new(1.0),
            volume: Mutex::new(1.0),
            output_stream: None,
            speak_lock: AsyncMutex::new(()),
            model_path: resolve(&config.model_path, "kokoro-v1.0.onnx"),
            voices_path: resolve(&config.voices_path, "voices-v1.0.bin"),
            tokenizer_path: resolve(&config.tokenizer_path, "tokenizer.json"),
        }
    }

    /// Load the ONNX model, tokenizer, voices, phonemizer and audio output.
    /// This is blocking; call it before handing the engine to the dispatcher.
    pub fn load_model_sync(&mut self) -> Result<(), String> {
        let t0 = Instant::now();

        info!("Loading tokenizer from {}", self.tokenizer_path.display());
        self.vocab = load_tokenizer(&self.tokenizer_path)?;

        info!("Loading voices from {}", self.voices_path.display());
        self.voices = load_voices(&self.voices_path)?;
        info!("Loaded {} Kokoro voices", self.voices.len());

        info!("Loading ONNX model from {}", self.model_path.display());
        let session = ort::session::Session::builder()
            .map_err(|e| format!("Failed to create ONNX session builder: {e}"))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| format!("Failed to set optimization level: {e}"))?
            .with_intra_threads(4)
            .map_err(|e| format!("Failed to set thread count: {e}"))?
            .commit_from_file(&self.model_path)
            .map_err(|e| format!("Failed to load ONNX model: {e}"))?;
        *self.session.lock().unwrap() = Some(session);

        self.phonemizer = Some(misaki_rs::G2P::new(misaki_rs::Language::EnglishUS));

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| format!("Failed to open audio output: {e}"))?;
        self.output_stream = Some(stream);

        info!("Kokoro TTS loaded in {}ms", t0.elapsed().as_millis());
        Ok(())
    }

    fn sorted_voice_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Generate audio samples for a single sentence.
    fn generate_audio(&self, text: &str) -> Result<Vec<f32>, String> {
        let mut session_guard = self.session.lock().unwrap();
        let session = session_guard.as_mut().ok_or("Model not loaded")?;
        let phonemizer = self.phonemizer.as_ref().ok_or("Phonemizer not loaded")?;

        let (phonemes, _tokens) = phonemizer
            .g2p(text)
            .map_err(|e| format!("Phonemization failed: {e}"))?;
        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        // Unknown phoneme characters are dropped
        let mut token_ids: Vec<i64> = Vec::with_capacity(phonemes.len() + 2);
        token_ids.push(0);
        token_ids.extend(phonemes.chars().filter_map(|ch| self.vocab.get(&ch).copied()));
        token_ids.push(0);
        let n_tokens = token_ids.len().min(MAX_TOKENS);
        token_ids.truncate(n_tokens);

        let voice_name = self.voice.lock().unwrap().clone();
        let voice_data = self
            .voices
            .get(&voice_name)
            .ok_or_else(|| format!("Voice not found: {voice_name}"))?;
        let style_idx = n_tokens.saturating_sub(2).min(voice_data.styles.nrows() - 1);
        let style_vec: Vec<f32> = voice_data.styles.row(style_idx).to_vec();
        let speed = *self.speed.lock().unwrap();

        let tokens_tensor = Tensor::from_array(
            Array2::from_shape_vec((1, n_tokens), token_ids)
                .map_err(|e| format!("Failed to create tokens tensor: {e}"))?,
        )
        .map_err(|e| format!("Failed to create tokens ort tensor: {e}"))?;
        let style_tensor = Tensor::from_array(
            Array2::from_shape_vec((1, 256), style_vec)
                .map_err(|e| format!("Failed to create style tensor: {e}"))?,
        )
        .map_err(|e| format!("Failed to create style ort tensor: {e}"))?;
        let speed_tensor = Tensor::from_array(ndarray::Array1::from_vec(vec![speed]))
            .map_err(|e| format!("Failed to create speed ort tensor: {e}"))?;

        let outputs = session
            .run(ort::inputs![
                "tokens" => tokens_tensor,
                "style" => style_tensor,
                "speed" => speed_tensor
            ])
            .map_err(|e| format!("ONNX inference failed: {e}"))?;

        // ort 2.0: try_extract_tensor returns (&Shape, &[T]) tuple
        let first_output = outputs.iter().next().ok_or("No output tensor from model")?;
        let (_shape, audio_slice) = first_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Failed to extract audio tensor: {e}"))?;

        let samples: Vec<f32> = audio_slice.to_vec();
        debug!(
            "Generated {} samples ({:.1}s) at speed {speed:.2}",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        Ok(samples)
    }

    /// Play samples and wait until the sink drains.
    async fn play_audio(&self, samples: Vec<f32>) -> Result<(), String> {
        let stream = self.output_stream.as_ref().ok_or("No audio output stream")?;

        // rodio 0.21: Sink::connect_new takes &Mixer
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(*self.volume.lock().unwrap());
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));

        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| format!("Playback task failed: {e}"))
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSynthesizer {
    fn installed_voices(&self, locale: &str) -> Vec<String> {
        let Some(prefix) = locale_prefix(locale) else {
            warn!("No Kokoro voices for locale {locale}");
            return Vec::new();
        };
        self.sorted_voice_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    fn select_voice(&self, name: &str) -> Result<(), SpeechError> {
        if !self.voices.contains_key(name) {
            return Err(SpeechError::UnknownVoice(name.to_string()));
        }
        *self.voice.lock().unwrap() = name.to_string();
        Ok(())
    }

    fn set_rate(&self, rate: i32) {
        *self.speed.lock().unwrap() = rate_to_speed(rate);
    }

    fn set_volume(&self, volume: u8) {
        *self.volume.lock().unwrap() = f32::from(volume.min(100)) / 100.0;
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let _guard = self.speak_lock.lock().await;

        let sentences = split_sentences(text.trim());
        for (i, sentence) in sentences.iter().enumerate() {
            let t_gen = Instant::now();
            let samples = match self.generate_audio(sentence) {
                Ok(s) => s,
                Err(e) => {
                    warn!("TTS generation failed for sentence {}: {e}", i + 1);
                    continue;
                }
            };
            if samples.is_empty() {
                continue;
            }
            debug!(
                "Sentence {}/{}: gen={}ms",
                i + 1,
                sentences.len(),
                t_gen.elapsed().as_millis()
            );

            self.play_audio(samples).await.map_err(SpeechError::Synthesis)?;
        }
        Ok(())
    }
}

/// Kokoro voice names start with a letter naming their language
/// (`jf_alpha` is a Japanese female voice).
fn locale_prefix(locale: &str) -> Option<char> {
    let lower = locale.to_lowercase().replace('_', "-");
    let prefix = match lower.as_str() {
        "en-us" => 'a',
        "en-gb" => 'b',
        "pt-br" => 'p',
        other => match other.split('-').next().unwrap_or_default() {
            "en" => 'a',
            "ja" => 'j',
            "zh" => 'z',
            "es" => 'e',
            "fr" => 'f',
            "hi" => 'h',
            "it" => 'i',
            "pt" => 'p',
            _ => return None,
        },
    };
    Some(prefix)
}

/// Map a `-100..=100` rate onto Kokoro's speed factor (0.5× to 2×).
fn rate_to_speed(rate: i32) -> f32 {
    2f32.powf(rate.clamp(-100, 100) as f32 / 100.0)
}

/// Split text into sentences after `.!?` followed by whitespace, and after
/// full-width terminators or line breaks.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        let end = i + ch.len_utf8();
        let boundary = match ch {
            '。' | '！' | '？' | '\n' => true,
            '.' | '!' | '?' => chars.peek().is_some_and(|&(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }

    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }
    sentences
}

// --- Model file loading ---

/// Load tokenizer vocabulary from tokenizer.json.
fn load_tokenizer(path: &Path) -> Result<HashMap<char, i64>, String> {
    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read tokenizer: {e}"))?;
    let data: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse tokenizer JSON: {e}"))?;
    let vocab = data["model"]["vocab"]
        .as_object()
        .ok_or("Missing model.vocab in tokenizer.json")?;

    let mut map = HashMap::new();
    for (token, id) in vocab {
        let id = id.as_i64().ok_or("Token ID is not an integer")?;
        if let Some(ch) = token.chars().next() {
            map.insert(ch, id);
        }
    }
    Ok(map)
}

/// Load all voice styles from an NPZ file.
fn load_voices(path: &Path) -> Result<HashMap<String, VoiceData>, String> {
    let file = fs::File::open(path).map_err(|e| format!("Failed to open voices file: {e}"))?;
    let mut npz =
        NpzReader::new(file).map_err(|e| format!("Failed to read NPZ voices file: {e}"))?;
    let names = npz
        .names()
        .map_err(|e| format!("Failed to list NPZ entries: {e}"))?;

    let mut voices = HashMap::new();
    for npy_name in names {
        let name = npy_name.trim_end_matches(".npy").to_string();
        let arr: Array3<f32> = npz
            .by_name(&npy_name)
            .map_err(|e| format!("Failed to read voice '{name}': {e}"))?;

        // (510, 1, 256) → (510, 256)
        let (dim0, dim2) = (arr.shape()[0], arr.shape()[2]);
        let styles = arr
            .into_shape_with_order((dim0, dim2))
            .map_err(|e| format!("Failed to reshape voice '{name}': {e}"))?;
        voices.insert(name, VoiceData { styles });
    }
    Ok(voices)
}
