//! Text-to-speech on top of a platform speech engine.
//!
//! `SpeechSynthesizer` keeps at most one utterance alive: every `speak` cancels
//! whatever is playing, and a cancelled utterance resolves quietly instead of
//! failing its caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch, OnceCell};
use tracing::{debug, info, warn};

/// How long to wait for the platform to publish its voice list.
pub const VOICE_LOAD_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause between cancelling and speaking so the engine can settle.
pub const CANCEL_SETTLE_DELAY: Duration = Duration::from_millis(100);

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
    pub local_service: bool,
}

impl Voice {
    pub fn is_english(&self) -> bool {
        self.lang.to_lowercase().starts_with("en")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Why the platform stopped an utterance early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    Canceled,
    Interrupted,
    AudioBusy,
    SynthesisFailed,
    NotAllowed,
    Other(String),
}

impl std::fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCause::Canceled => write!(f, "canceled"),
            ErrorCause::Interrupted => write!(f, "interrupted"),
            ErrorCause::AudioBusy => write!(f, "audio-busy"),
            ErrorCause::SynthesisFailed => write!(f, "synthesis-failed"),
            ErrorCause::NotAllowed => write!(f, "not-allowed"),
            ErrorCause::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Ended,
    Failed(ErrorCause),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech synthesis is not supported on this platform")]
    Unsupported,
    #[error("speech playback failed: {0}")]
    Playback(ErrorCause),
    #[error("speech platform dropped the utterance without reporting an outcome")]
    Disconnected,
}

/// The platform speech engine (browser, OS service, ...).
///
/// `speak` hands back a receiver that the platform completes once the utterance
/// ends or fails; `cancel` must complete every pending receiver with
/// `Failed(ErrorCause::Canceled)`.
pub trait SpeechPlatform: Send + Sync + 'static {
    fn is_available(&self) -> bool;
    fn voices(&self) -> Vec<Voice>;
    /// Changes whenever the voice list is (re)published.
    fn voice_updates(&self) -> watch::Receiver<()>;
    fn speak(&self, utterance: Utterance) -> oneshot::Receiver<PlaybackOutcome>;
    fn cancel(&self);
    fn is_speaking(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeakOptions {
    pub speed: Option<f32>,
}

/// Local English voice, then any English voice, then whatever comes first.
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    voices
        .iter()
        .find(|v| v.is_english() && v.local_service)
        .or_else(|| voices.iter().find(|v| v.is_english()))
        .or_else(|| voices.first())
}

pub struct SpeechSynthesizer<P: SpeechPlatform> {
    platform: Arc<P>,
    voices: OnceCell<Vec<Voice>>,
    current: Mutex<Option<u64>>,
    next_id: AtomicU64,
}

impl<P: SpeechPlatform> SpeechSynthesizer<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self {
            platform,
            voices: OnceCell::new(),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_available()
    }

    /// Voices known after initialization (empty until the first `speak` or `init`).
    pub fn voices(&self) -> &[Voice] {
        self.voices.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Loads the voice list once, waiting up to `VOICE_LOAD_TIMEOUT` for the
    /// platform to announce it when it is initially empty.
    pub async fn init(&self) -> &[Voice] {
        self.voices
            .get_or_init(|| async {
                let mut updates = self.platform.voice_updates();
                let mut voices = self.platform.voices();
                if voices.is_empty() {
                    debug!("Voice list empty, waiting for voices to load");
                    if tokio::time::timeout(VOICE_LOAD_TIMEOUT, updates.changed())
                        .await
                        .is_err()
                    {
                        warn!("Timed out waiting for speech voices");
                    }
                    voices = self.platform.voices();
                }
                info!(count = voices.len(), "Speech voices loaded");
                voices
            })
            .await
    }

    fn current_lock(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        // A poisoned lock only means another caller panicked mid-update; the id is still usable.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, id: u64) {
        let mut current = self.current_lock();
        if *current == Some(id) {
            *current = None;
        }
    }

    /// Speaks `text`, pre-empting anything already playing. Resolves when the
    /// utterance finishes or is cancelled by a later `speak`/`stop`.
    pub async fn speak(&self, text: &str, options: SpeakOptions) -> Result<(), SpeechError> {
        if !self.platform.is_available() {
            return Err(SpeechError::Unsupported);
        }
        let voice = select_voice(self.init().await).cloned();

        // Cancel and claim under one lock so a racing `speak` cannot slip between them.
        let id = {
            let mut current = self.current_lock();
            self.platform.cancel();
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            *current = Some(id);
            id
        };

        let utterance = Utterance {
            text: text.to_string(),
            voice,
            rate: options.speed.unwrap_or(1.0).clamp(MIN_RATE, MAX_RATE),
            pitch: 1.0,
            volume: 1.0,
        };

        tokio::time::sleep(CANCEL_SETTLE_DELAY).await;

        // The lock stays held until the engine has registered the utterance, so
        // a later `speak` or `stop` always finds it to cancel.
        let playback = {
            let current = self.current_lock();
            if *current != Some(id) {
                debug!(id, "Utterance superseded before playback started");
                return Ok(());
            }
            debug!(id, voice = ?utterance.voice.as_ref().map(|v| &v.name), "Starting utterance");
            self.platform.speak(utterance)
        };
        let outcome = playback.await;
        self.release(id);

        match outcome {
            Ok(PlaybackOutcome::Ended) => Ok(()),
            Ok(PlaybackOutcome::Failed(ErrorCause::Canceled)) => {
                debug!(id, "Utterance cancelled");
                Ok(())
            }
            Ok(PlaybackOutcome::Failed(cause)) => {
                warn!(id, %cause, "Speech playback failed");
                Err(SpeechError::Playback(cause))
            }
            Err(_) => Err(SpeechError::Disconnected),
        }
    }

    /// Cancels playback and drops the active utterance.
    pub fn stop(&self) {
        let mut current = self.current_lock();
        self.platform.cancel();
        *current = None;
    }

    pub fn is_speaking(&self) -> bool {
        self.current_lock().is_some() && self.platform.is_speaking()
    }
}
