//! Speech synthesis.
//!
//! The [`SpeechSynthesizer`] trait is the engine seam; [`EspeakEngine`] is the
//! shipped implementation, shelling out to `espeak-ng` (or `espeak` as a
//! fallback) for rendering and to `lame`/`ffmpeg` for MP3 encoding. Rendering
//! is a single blocking call per conversion run and must never happen on the
//! thread that services interface events.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("no TTS engine found, install espeak-ng or espeak")]
    EngineMissing,

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("TTS engine exited with {status}: {stderr}")]
    EngineFailure { status: String, stderr: String },

    #[error("engine produced no usable audio: {0}")]
    BadAudio(String),

    #[error("no MP3 encoder found, install lame or ffmpeg")]
    EncoderMissing,

    #[error("MP3 encoding failed: {0}")]
    EncodingFailed(String),

    #[error("unsupported output extension '{0}', expected mp3 or wav")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceGender {
    Male,
    Female,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Male => "male",
            VoiceGender::Female => "female",
        }
    }
}

/// An installed text-to-speech voice.
#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: Option<VoiceGender>,
}

/// Interface every synthesis engine must implement.
pub trait SpeechSynthesizer {
    /// Returns the installed voices, in the engine's own order.
    fn list_voices(&self) -> Result<Vec<Voice>, TtsError>;

    /// Renders `text` at `rate_wpm` words per minute to `output_path`,
    /// blocking until the file is written. `voice` of `None` means the
    /// engine default. The output format follows the path extension
    /// (`.wav` or `.mp3`).
    fn synthesize_to_file(
        &self,
        text: &str,
        rate_wpm: u32,
        voice: Option<&str>,
        output_path: &Path,
    ) -> Result<(), TtsError>;
}

/// Picks the voice for a requested gender.
///
/// First installed voice matching the gender wins; when no voice matches,
/// the first installed voice of any gender is used; an empty list means the
/// engine default. A missing gender match is never fatal.
pub fn resolve_voice(voices: &[Voice], requested: VoiceGender) -> Option<Voice> {
    if let Some(voice) = voices.iter().find(|v| v.gender == Some(requested)) {
        return Some(voice.clone());
    }
    match voices.first() {
        Some(fallback) => {
            warn!(
                "no {} voice installed, falling back to '{}'",
                requested.as_str(),
                fallback.id
            );
            Some(fallback.clone())
        }
        None => {
            warn!("no voices installed, using engine default");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Wav,
    Mp3,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Result<Self, TtsError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(TtsError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// espeak-based synthesis engine.
pub struct EspeakEngine {
    binary: &'static str,
}

impl EspeakEngine {
    pub fn new() -> Result<Self, TtsError> {
        let engines = ["espeak-ng", "espeak"];

        for engine in engines {
            if tool_on_path(engine) {
                info!("using TTS engine {engine}");
                return Ok(Self { binary: engine });
            }
        }

        Err(TtsError::EngineMissing)
    }

    fn render_wav(&self, text: &str, rate_wpm: u32, voice: Option<&str>) -> Result<Vec<u8>, TtsError> {
        // Text goes through a temp file; long documents overflow argv.
        let mut text_file = tempfile::NamedTempFile::new()?;
        text_file.write_all(text.as_bytes())?;
        text_file.flush()?;

        let mut cmd = Command::new(self.binary);
        cmd.arg("-s")
            .arg(rate_wpm.to_string())
            .arg("-f")
            .arg(text_file.path())
            .arg("--stdout")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(id) = voice {
            cmd.arg("-v").arg(id);
        }

        debug!("invoking {} at {} wpm, voice {:?}", self.binary, rate_wpm, voice);
        let output = cmd.output().map_err(|source| TtsError::Spawn {
            tool: self.binary,
            source,
        })?;

        if !output.status.success() {
            return Err(TtsError::EngineFailure {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    fn encode_mp3(&self, wav_path: &Path, output_path: &Path) -> Result<(), TtsError> {
        if tool_on_path("lame") {
            return run_encoder(
                Command::new("lame")
                    .arg("--quiet")
                    .arg("-V")
                    .arg("4")
                    .arg(wav_path)
                    .arg(output_path),
                "lame",
            );
        }
        if tool_on_path("ffmpeg") {
            return run_encoder(
                Command::new("ffmpeg")
                    .arg("-i")
                    .arg(wav_path)
                    .arg("-c:a")
                    .arg("libmp3lame")
                    .arg("-q:a")
                    .arg("4")
                    .arg("-y")
                    .arg(output_path),
                "ffmpeg",
            );
        }
        Err(TtsError::EncoderMissing)
    }
}

impl SpeechSynthesizer for EspeakEngine {
    fn list_voices(&self) -> Result<Vec<Voice>, TtsError> {
        let output = Command::new(self.binary)
            .arg("--voices")
            .output()
            .map_err(|source| TtsError::Spawn {
                tool: self.binary,
                source,
            })?;

        if !output.status.success() {
            return Err(TtsError::EngineFailure {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_voice_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn synthesize_to_file(
        &self,
        text: &str,
        rate_wpm: u32,
        voice: Option<&str>,
        output_path: &Path,
    ) -> Result<(), TtsError> {
        let format = OutputFormat::from_path(output_path)?;

        let wav_bytes = self.render_wav(text, rate_wpm, voice)?;

        let scratch = tempfile::tempdir()?;
        let wav_path = scratch.path().join("render.wav");
        fs::write(&wav_path, &wav_bytes)?;
        probe_wav(&wav_path)?;

        match format {
            OutputFormat::Wav => {
                fs::copy(&wav_path, output_path)?;
            }
            OutputFormat::Mp3 => {
                self.encode_mp3(&wav_path, output_path)?;
            }
        }

        info!("audio written to {}", output_path.display());
        Ok(())
    }
}

/// Rejects empty or truncated engine output before it reaches the encoder.
fn probe_wav(path: &Path) -> Result<(), TtsError> {
    let reader = hound::WavReader::open(path).map_err(|e| TtsError::BadAudio(e.to_string()))?;
    if reader.len() == 0 {
        return Err(TtsError::BadAudio("zero audio samples".to_string()));
    }
    Ok(())
}

fn run_encoder(cmd: &mut Command, tool: &'static str) -> Result<(), TtsError> {
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| TtsError::Spawn { tool, source })?;
    if !output.status.success() {
        return Err(TtsError::EncodingFailed(format!(
            "{tool} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

fn tool_on_path(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Parses `espeak-ng --voices` output.
///
/// Lines look like ` 5  en-gb  --/M  English (Great Britain)  gmw/en`; the
/// trailing file column is dropped from the display name when it looks like
/// a path.
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    let mut voices = Vec::new();

    for line in listing.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0].parse::<u32>().is_err() {
            continue;
        }

        let language = fields[1].to_string();
        let gender = fields[2].chars().rev().find_map(|c| match c {
            'M' => Some(VoiceGender::Male),
            'F' => Some(VoiceGender::Female),
            _ => None,
        });

        let mut name_fields = &fields[3..];
        if let Some((last, rest)) = name_fields.split_last() {
            if last.contains('/') && !rest.is_empty() {
                name_fields = rest;
            }
        }

        voices.push(Voice {
            // espeak accepts the language code as a voice identifier
            id: language.clone(),
            name: name_fields.join(" "),
            language,
            gender,
        });
    }

    voices
}
