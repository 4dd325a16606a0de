//! The conversion workflow.
//!
//! One run takes an immutable [`ConversionRequest`] snapshot, extracts text
//! from the selected page range, and renders it to the destination audio file
//! in a single blocking synthesis call. The run executes on a worker thread
//! (see [`spawn`]) and streams [`ProgressEvent`]s over an mpsc channel for the
//! front end to drain; the final [`ConversionReport`] or [`ConvertError`]
//! comes back through the thread's join handle.
//!
//! Per-page extraction failures are not fatal: the page is skipped, logged,
//! and recorded in the report. Everything else aborts the run.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::pdf::{DocumentSource, PdfDocument, PdfError};
use crate::text::TextProcessor;
use crate::tts::{resolve_voice, SpeechSynthesizer, TtsError, VoiceGender};

/// Everything one conversion run needs, captured from interface state at the
/// moment the user triggers it. Never retried or persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionRequest {
    pub pdf_path: PathBuf,
    /// First page to read, 1-based.
    pub start_page: u32,
    /// Last page to read, 1-based inclusive.
    pub end_page: u32,
    /// Speech rate in words per minute, 50 to 400.
    pub rate_wpm: u32,
    pub voice_gender: VoiceGender,
    /// Destination audio file, `.mp3` or `.wav`.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Extracting,
    Synthesizing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// 0 to 100. Monotonic within a run; reset to 0 on failure.
    pub percent: f32,
    pub phase: Phase,
    pub message: String,
}

impl ProgressEvent {
    fn new(percent: f32, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            percent,
            phase,
            message: message.into(),
        }
    }
}

/// Success outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    /// Adjusted range actually converted, 1-based inclusive.
    pub first_page: u32,
    pub last_page: u32,
    pub rate_wpm: u32,
    /// Voice identifier actually used, or "default".
    pub voice: String,
    pub pages_converted: u32,
    /// Pages that failed extraction, with reasons. Non-fatal.
    pub skipped_pages: Vec<(u32, String)>,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not read PDF: {0}")]
    InvalidDocument(#[source] PdfError),

    #[error("invalid page range: {start} to {end} of a {total} page document")]
    InvalidRange { start: u32, end: u32, total: u32 },

    #[error("no extractable text in pages {first} to {last}")]
    NoExtractableText { first: u32, last: u32 },

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] TtsError),
}

/// Runs a conversion against an already-open document source.
///
/// Emits every progress event including the terminal `Done`/`Failed` one.
/// This is the entry point for tests; [`run`] adds the PDF open step and
/// [`spawn`] moves the whole thing onto a worker thread.
pub fn run_with_source<S, E>(
    request: &ConversionRequest,
    source: &S,
    engine: &E,
    progress: &Sender<ProgressEvent>,
) -> Result<ConversionReport, ConvertError>
where
    S: DocumentSource,
    E: SpeechSynthesizer,
{
    let outcome = pipeline(request, source, engine, progress);
    if let Err(err) = &outcome {
        warn!("conversion failed: {err}");
        let _ = progress.send(ProgressEvent::new(0.0, Phase::Failed, err.to_string()));
    }
    outcome
}

/// Opens the PDF and runs the conversion.
pub fn run<E>(
    request: &ConversionRequest,
    engine: &E,
    progress: &Sender<ProgressEvent>,
) -> Result<ConversionReport, ConvertError>
where
    E: SpeechSynthesizer,
{
    let source = match PdfDocument::open(&request.pdf_path) {
        Ok(source) => source,
        Err(err) => {
            let err = ConvertError::InvalidDocument(err);
            warn!("conversion failed: {err}");
            let _ = progress.send(ProgressEvent::new(0.0, Phase::Failed, err.to_string()));
            return Err(err);
        }
    };
    run_with_source(request, &source, engine, progress)
}

/// Spawns a conversion on a dedicated worker thread.
///
/// The worker owns the document and engine for the run's lifetime; the caller
/// drains the returned receiver and joins the handle for the outcome. At most
/// one run should be in flight at a time (the front end disables its trigger
/// while the handle is live). There is no cancellation.
pub fn spawn<E>(
    request: ConversionRequest,
    engine: E,
) -> (
    thread::JoinHandle<Result<ConversionReport, ConvertError>>,
    Receiver<ProgressEvent>,
)
where
    E: SpeechSynthesizer + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || run(&request, &engine, &sender));
    (handle, receiver)
}

fn pipeline<S, E>(
    request: &ConversionRequest,
    source: &S,
    engine: &E,
    progress: &Sender<ProgressEvent>,
) -> Result<ConversionReport, ConvertError>
where
    S: DocumentSource,
    E: SpeechSynthesizer,
{
    let total_pages = source.page_count();

    // Clamp to the document: zero-based half-open [start, end).
    let start = request.start_page.max(1) - 1;
    let end = request.end_page.min(total_pages);
    if start >= end {
        return Err(ConvertError::InvalidRange {
            start: request.start_page,
            end: request.end_page,
            total: total_pages,
        });
    }

    info!(
        "converting {} pages {} to {} at {} wpm",
        request.pdf_path.display(),
        start + 1,
        end,
        request.rate_wpm
    );

    let pages_in_range = end - start;
    let mut page_texts: Vec<String> = Vec::new();
    let mut skipped_pages: Vec<(u32, String)> = Vec::new();

    for index in start..end {
        match source.page_text(index) {
            Ok(text) => {
                if !text.trim().is_empty() {
                    page_texts.push(text);
                }
            }
            Err(err) => {
                warn!("skipping page {}: {err}", index + 1);
                skipped_pages.push((index + 1, err.to_string()));
            }
        }

        // Extraction covers the first half of the progress bar.
        let done = index - start + 1;
        let percent = done as f32 / pages_in_range as f32 * 50.0;
        let _ = progress.send(ProgressEvent::new(
            percent,
            Phase::Extracting,
            format!("Extracting text from page {}", index + 1),
        ));
    }

    let full_text = page_texts.join("\n\n");
    if full_text.trim().is_empty() {
        return Err(ConvertError::NoExtractableText {
            first: start + 1,
            last: end,
        });
    }

    let cleaned = TextProcessor::new().clean_text(&full_text);

    let voice = match engine.list_voices() {
        Ok(voices) => resolve_voice(&voices, request.voice_gender),
        Err(err) => {
            // Voice selection is best effort; the engine default still speaks.
            warn!("could not list voices ({err}), using engine default");
            None
        }
    };
    let voice_label = voice
        .as_ref()
        .map(|v| v.id.clone())
        .unwrap_or_else(|| "default".to_string());

    let _ = progress.send(ProgressEvent::new(
        60.0,
        Phase::Synthesizing,
        "Converting text to speech",
    ));

    engine.synthesize_to_file(
        &cleaned,
        request.rate_wpm,
        voice.as_ref().map(|v| v.id.as_str()),
        &request.output_path,
    )?;

    let _ = progress.send(ProgressEvent::new(
        100.0,
        Phase::Done,
        "Conversion completed successfully",
    ));

    Ok(ConversionReport {
        output_path: request.output_path.clone(),
        first_page: start + 1,
        last_page: end,
        rate_wpm: request.rate_wpm,
        voice: voice_label,
        pages_converted: pages_in_range - skipped_pages.len() as u32,
        skipped_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::Voice;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;

    struct FakeSource {
        pages: Vec<Result<String, String>>,
        reads: RefCell<u32>,
    }

    impl FakeSource {
        fn new(pages: Vec<Result<String, String>>) -> Self {
            Self {
                pages,
                reads: RefCell::new(0),
            }
        }

        fn with_texts(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
        }
    }

    impl DocumentSource for FakeSource {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_text(&self, index: u32) -> Result<String, PdfError> {
            *self.reads.borrow_mut() += 1;
            match &self.pages[index as usize] {
                Ok(text) => Ok(text.clone()),
                Err(reason) => Err(PdfError::Extraction {
                    page: index + 1,
                    reason: reason.clone(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        voices: Vec<Voice>,
        voices_unavailable: bool,
        fail_synthesis: bool,
        calls: RefCell<Vec<(String, u32, Option<String>)>>,
    }

    impl SpeechSynthesizer for FakeEngine {
        fn list_voices(&self) -> Result<Vec<Voice>, TtsError> {
            if self.voices_unavailable {
                return Err(TtsError::EngineMissing);
            }
            Ok(self.voices.clone())
        }

        fn synthesize_to_file(
            &self,
            text: &str,
            rate_wpm: u32,
            voice: Option<&str>,
            output_path: &Path,
        ) -> Result<(), TtsError> {
            if self.fail_synthesis {
                return Err(TtsError::EngineFailure {
                    status: "exit code: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            self.calls.borrow_mut().push((
                text.to_string(),
                rate_wpm,
                voice.map(str::to_string),
            ));
            fs::write(output_path, b"fake audio").unwrap();
            Ok(())
        }
    }

    fn voice(id: &str, gender: VoiceGender) -> Voice {
        Voice {
            id: id.to_string(),
            name: id.to_string(),
            language: "en".to_string(),
            gender: Some(gender),
        }
    }

    fn request(start: u32, end: u32, output: &Path) -> ConversionRequest {
        ConversionRequest {
            pdf_path: PathBuf::from("input.pdf"),
            start_page: start,
            end_page: end,
            rate_wpm: 200,
            voice_gender: VoiceGender::Male,
            output_path: output.to_path_buf(),
        }
    }

    fn drain(receiver: &Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        receiver.try_iter().collect()
    }

    #[test]
    fn converts_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.wav");
        let texts: Vec<String> = (1..=10).map(|i| format!("text of page {i}")).collect();
        let source = FakeSource::new(texts.into_iter().map(Ok).collect());
        let engine = FakeEngine {
            voices: vec![
                voice("male-voice", VoiceGender::Male),
                voice("female-voice", VoiceGender::Female),
            ],
            ..Default::default()
        };
        let (sender, receiver) = mpsc::channel();

        let report =
            run_with_source(&request(1, 10, &output), &source, &engine, &sender).unwrap();

        assert_eq!(report.first_page, 1);
        assert_eq!(report.last_page, 10);
        assert_eq!(report.pages_converted, 10);
        assert_eq!(report.rate_wpm, 200);
        assert_eq!(report.voice, "male-voice");
        assert!(report.skipped_pages.is_empty());
        assert!(output.exists());

        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (text, rate, voice) = &calls[0];
        assert!(text.contains("text of page 1"));
        assert!(text.contains("text of page 10"));
        assert_eq!(*rate, 200);
        assert_eq!(voice.as_deref(), Some("male-voice"));

        let events = drain(&receiver);
        assert_eq!(events.last().unwrap().phase, Phase::Done);
        assert_eq!(events.last().unwrap().percent, 100.0);
    }

    #[test]
    fn clamps_range_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["a", "b", "c", "d", "e"]);
        let engine = FakeEngine::default();
        let (sender, _receiver) = mpsc::channel();

        let report =
            run_with_source(&request(3, 99, &output), &source, &engine, &sender).unwrap();

        assert_eq!(report.first_page, 3);
        assert_eq!(report.last_page, 5);
        assert_eq!(report.pages_converted, 3);
        assert_eq!(*source.reads.borrow(), 3);
    }

    #[test]
    fn invalid_range_fails_before_any_read() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["a", "b", "c", "d", "e"]);
        let engine = FakeEngine::default();
        let (sender, receiver) = mpsc::channel();

        let err =
            run_with_source(&request(5, 3, &output), &source, &engine, &sender).unwrap_err();

        assert!(matches!(err, ConvertError::InvalidRange { .. }));
        assert_eq!(*source.reads.borrow(), 0);
        assert!(!output.exists());

        let events = drain(&receiver);
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Failed);
        assert_eq!(last.percent, 0.0);
    }

    #[test]
    fn failing_pages_are_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::new(vec![
            Ok("page one".to_string()),
            Err("damaged stream".to_string()),
            Ok("page three".to_string()),
        ]);
        let engine = FakeEngine::default();
        let (sender, _receiver) = mpsc::channel();

        let report =
            run_with_source(&request(1, 3, &output), &source, &engine, &sender).unwrap();

        assert_eq!(report.pages_converted, 2);
        assert_eq!(report.skipped_pages.len(), 1);
        assert_eq!(report.skipped_pages[0].0, 2);
        assert!(report.skipped_pages[0].1.contains("damaged stream"));

        let calls = engine.calls.borrow();
        assert!(calls[0].0.contains("page one"));
        assert!(calls[0].0.contains("page three"));
    }

    #[test]
    fn all_blank_pages_fail_with_no_extractable_text() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["   ", "\n\n", ""]);
        let engine = FakeEngine::default();
        let (sender, receiver) = mpsc::channel();

        let err =
            run_with_source(&request(1, 3, &output), &source, &engine, &sender).unwrap_err();

        assert!(matches!(err, ConvertError::NoExtractableText { first: 1, last: 3 }));
        assert!(engine.calls.borrow().is_empty());
        assert!(!output.exists());
        assert_eq!(drain(&receiver).last().unwrap().phase, Phase::Failed);
    }

    #[test]
    fn missing_gender_falls_back_to_available_voice() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["some text"]);
        let engine = FakeEngine {
            voices: vec![voice("only-female", VoiceGender::Female)],
            ..Default::default()
        };
        let (sender, _receiver) = mpsc::channel();

        // Requested male, only a female voice installed.
        let report =
            run_with_source(&request(1, 1, &output), &source, &engine, &sender).unwrap();

        assert_eq!(report.voice, "only-female");
        assert_eq!(engine.calls.borrow()[0].2.as_deref(), Some("only-female"));
    }

    #[test]
    fn unavailable_voice_listing_uses_engine_default() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["some text"]);
        let engine = FakeEngine {
            voices_unavailable: true,
            ..Default::default()
        };
        let (sender, _receiver) = mpsc::channel();

        let report =
            run_with_source(&request(1, 1, &output), &source, &engine, &sender).unwrap();

        assert_eq!(report.voice, "default");
        assert_eq!(engine.calls.borrow()[0].2, None);
    }

    #[test]
    fn synthesis_failure_reports_failed_phase() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let source = FakeSource::with_texts(&["some text"]);
        let engine = FakeEngine {
            fail_synthesis: true,
            ..Default::default()
        };
        let (sender, receiver) = mpsc::channel();

        let err =
            run_with_source(&request(1, 1, &output), &source, &engine, &sender).unwrap_err();

        assert!(matches!(err, ConvertError::Synthesis(_)));
        let last = drain(&receiver).into_iter().last().unwrap();
        assert_eq!(last.phase, Phase::Failed);
        assert_eq!(last.percent, 0.0);
        assert!(last.message.contains("speech synthesis failed"));
    }

    #[test]
    fn progress_is_monotonic_until_done() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let texts: Vec<String> = (1..=4).map(|i| format!("page {i}")).collect();
        let source = FakeSource::new(texts.into_iter().map(Ok).collect());
        let engine = FakeEngine::default();
        let (sender, receiver) = mpsc::channel();

        run_with_source(&request(1, 4, &output), &source, &engine, &sender).unwrap();

        let events = drain(&receiver);
        let percents: Vec<f32> = events.iter().map(|e| e.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100.0);
        // Extraction tops out at half, synthesis starts at 60.
        assert_eq!(percents[3], 50.0);
        assert_eq!(events[4].phase, Phase::Synthesizing);
        assert_eq!(events[4].percent, 60.0);
    }

    #[test]
    fn unreadable_document_fails_with_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let mut req = request(1, 10, &output);
        req.pdf_path = dir.path().join("missing.pdf");
        let engine = FakeEngine::default();
        let (sender, receiver) = mpsc::channel();

        let err = run(&req, &engine, &sender).unwrap_err();

        assert!(matches!(err, ConvertError::InvalidDocument(_)));
        assert_eq!(drain(&receiver).last().unwrap().phase, Phase::Failed);
    }

    #[test]
    fn spawn_delivers_events_and_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let mut req = request(1, 10, &output);
        req.pdf_path = dir.path().join("missing.pdf");

        let (handle, receiver) = spawn(req, FakeEngine::default());

        let outcome = handle.join().unwrap();
        assert!(outcome.is_err());
        let events: Vec<ProgressEvent> = receiver.iter().collect();
        assert_eq!(events.last().unwrap().phase, Phase::Failed);
    }
}
