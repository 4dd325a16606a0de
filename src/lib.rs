//! PDF to audio converter.
//!
//! Extracts text from a page range of a PDF and renders it to an audio file
//! with a CPU-based TTS engine (espeak-ng). The conversion itself lives in
//! [`workflow`] and runs on a background thread, streaming [`ProgressEvent`]s
//! over a channel so a front end can stay responsive; the bundled egui front
//! end is behind the `gui` cargo feature.

pub mod pdf;
pub mod text;
pub mod tts;
pub mod workflow;

pub use pdf::{DocumentSource, PdfDocument, PdfError};
pub use tts::{EspeakEngine, SpeechSynthesizer, TtsError, Voice, VoiceGender};
pub use workflow::{
    ConversionReport, ConversionRequest, ConvertError, Phase, ProgressEvent,
};
