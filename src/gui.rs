use eframe::egui;
use egui::{CentralPanel, Grid, RichText, Slider, TopBottomPanel};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::thread;

use pdf2audio::{
    ConversionReport, ConversionRequest, ConvertError, DocumentSource, EspeakEngine,
    PdfDocument, Phase, ProgressEvent, VoiceGender,
};

#[derive(Debug, Clone)]
enum ConversionStatus {
    Idle,
    Running,
    Completed,
    Error(String),
}

struct ConverterApp {
    // File paths
    pdf_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    total_pages: Option<u32>,

    // Conversion settings
    start_page: u32,
    end_page: u32,
    rate_wpm: u32,
    voice_gender: VoiceGender,

    // UI state
    status: ConversionStatus,
    progress_receiver: Option<Receiver<ProgressEvent>>,
    conversion_handle: Option<thread::JoinHandle<Result<ConversionReport, ConvertError>>>,
    current_progress: Option<ProgressEvent>,
}

impl Default for ConverterApp {
    fn default() -> Self {
        Self {
            pdf_file: None,
            output_file: None,
            total_pages: None,
            start_page: 1,
            end_page: 1,
            rate_wpm: 200,
            voice_gender: VoiceGender::Male,
            status: ConversionStatus::Idle,
            progress_receiver: None,
            conversion_handle: None,
            current_progress: None,
        }
    }
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for progress updates from the worker
        let mut finished = false;
        if let Some(receiver) = &self.progress_receiver {
            while let Ok(progress) = receiver.try_recv() {
                if matches!(progress.phase, Phase::Done | Phase::Failed) {
                    finished = true;
                }
                self.current_progress = Some(progress);
            }
        }
        if matches!(self.status, ConversionStatus::Running) {
            // Keep the progress bar moving while the worker runs
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
        if finished {
            self.finish_conversion();
        }

        TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.heading("🔊 PDF to Audio Converter");
            ui.separator();
        });

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.draw_file_selection(ui);
                ui.separator();
                self.draw_speech_settings(ui);
                ui.separator();
                self.draw_conversion_controls(ui);
                ui.separator();
                self.draw_progress_section(ui);
            });
        });
    }
}

impl ConverterApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Default::default()
    }

    fn draw_file_selection(&mut self, ui: &mut egui::Ui) {
        ui.heading("📂 File Selection");

        Grid::new("file_grid").num_columns(3).show(ui, |ui| {
            ui.label("Input PDF:");
            if ui.button("📄 Select PDF File").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("PDF files", &["pdf"])
                    .pick_file()
                {
                    self.load_pdf(path);
                }
            }
            ui.label(
                self.pdf_file
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy())
                    .unwrap_or("No file selected".into()),
            );
            ui.end_row();

            ui.label("Output Audio:");
            if ui.button("💾 Save Audio As").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("MP3 files", &["mp3"])
                    .add_filter("WAV files", &["wav"])
                    .set_file_name("audiobook.mp3")
                    .save_file()
                {
                    self.output_file = Some(path);
                }
            }
            ui.label(
                self.output_file
                    .as_ref()
                    .map(|p| p.to_string_lossy())
                    .unwrap_or("No file selected".into()),
            );
            ui.end_row();
        });
    }

    fn draw_speech_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("🎵 Speech Settings");

        Grid::new("speech_grid").num_columns(2).show(ui, |ui| {
            let max_page = self.total_pages.unwrap_or(1).max(1);

            ui.label("Page Range:");
            ui.horizontal(|ui| {
                ui.label("From:");
                ui.add(egui::DragValue::new(&mut self.start_page).clamp_range(1..=max_page));
                ui.label("To:");
                ui.add(egui::DragValue::new(&mut self.end_page).clamp_range(1..=max_page));
                if let Some(total) = self.total_pages {
                    ui.label(format!("Total pages: {total}"));
                }
            });
            ui.end_row();

            ui.label("Speech Rate:");
            ui.add(Slider::new(&mut self.rate_wpm, 50..=400).text("words/min"));
            ui.end_row();

            ui.label("Voice Gender:");
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.voice_gender, VoiceGender::Male, "Male");
                ui.radio_value(&mut self.voice_gender, VoiceGender::Female, "Female");
            });
            ui.end_row();
        });
    }

    fn draw_conversion_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("🚀 Conversion");

        let can_convert = self.pdf_file.is_some()
            && self.output_file.is_some()
            && !matches!(self.status, ConversionStatus::Running);

        if ui
            .add_enabled(can_convert, egui::Button::new("▶ Convert to Audio"))
            .clicked()
        {
            self.start_conversion();
        }

        match &self.status {
            ConversionStatus::Idle => {
                ui.label(RichText::new("Ready to convert").color(egui::Color32::GRAY));
            }
            ConversionStatus::Running => {
                ui.label(RichText::new("Conversion in progress...").color(egui::Color32::BLUE));
            }
            ConversionStatus::Completed => {
                ui.label(
                    RichText::new("✅ Conversion completed successfully!")
                        .color(egui::Color32::GREEN),
                );
            }
            ConversionStatus::Error(error) => {
                ui.label(RichText::new(format!("❌ Error: {}", error)).color(egui::Color32::RED));
            }
        }
    }

    fn draw_progress_section(&mut self, ui: &mut egui::Ui) {
        if matches!(self.status, ConversionStatus::Idle) {
            return;
        }
        ui.heading("📊 Progress");

        if let Some(progress) = &self.current_progress {
            let progress_bar = egui::ProgressBar::new(progress.percent / 100.0)
                .text(format!("{:.0}%", progress.percent));
            ui.add(progress_bar);
            ui.label(&progress.message);
        } else {
            ui.spinner();
            ui.label("Starting conversion...");
        }
    }

    fn load_pdf(&mut self, path: PathBuf) {
        match PdfDocument::open(&path) {
            Ok(doc) => {
                let total = doc.page_count();
                self.total_pages = Some(total);
                self.start_page = 1;
                self.end_page = total.max(1);
                self.pdf_file = Some(path);
            }
            Err(err) => {
                rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Error)
                    .set_title("Error")
                    .set_description(&format!("Could not read PDF: {err}"))
                    .show();
            }
        }
    }

    fn start_conversion(&mut self) {
        let (Some(pdf_path), Some(output_path)) =
            (self.pdf_file.clone(), self.output_file.clone())
        else {
            return;
        };

        let engine = match EspeakEngine::new() {
            Ok(engine) => engine,
            Err(err) => {
                self.status = ConversionStatus::Error(err.to_string());
                rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Error)
                    .set_title("Error")
                    .set_description(&err.to_string())
                    .show();
                return;
            }
        };

        // Immutable snapshot of the interface state for this run
        let request = ConversionRequest {
            pdf_path,
            start_page: self.start_page,
            end_page: self.end_page,
            rate_wpm: self.rate_wpm,
            voice_gender: self.voice_gender,
            output_path,
        };

        let (handle, receiver) = pdf2audio::workflow::spawn(request, engine);
        self.conversion_handle = Some(handle);
        self.progress_receiver = Some(receiver);
        self.current_progress = None;
        self.status = ConversionStatus::Running;
    }

    /// Collects the worker's outcome and re-enables the convert button.
    /// Runs on both the success and the failure path.
    fn finish_conversion(&mut self) {
        let outcome = self
            .conversion_handle
            .take()
            .map(|handle| handle.join());
        self.progress_receiver = None;

        match outcome {
            Some(Ok(Ok(report))) => {
                self.status = ConversionStatus::Completed;
                rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Info)
                    .set_title("Success")
                    .set_description(&format!(
                        "Audio file saved successfully!\n\nLocation: {}\n\nPages converted: {} to {}{}\nRate: {} words/min\nVoice: {}",
                        report.output_path.display(),
                        report.first_page,
                        report.last_page,
                        if report.skipped_pages.is_empty() {
                            String::new()
                        } else {
                            format!(" ({} skipped)", report.skipped_pages.len())
                        },
                        report.rate_wpm,
                        report.voice,
                    ))
                    .show();
            }
            Some(Ok(Err(err))) => {
                self.status = ConversionStatus::Error(err.to_string());
                rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Error)
                    .set_title("Error")
                    .set_description(&format!("Conversion failed: {err}"))
                    .show();
            }
            Some(Err(_)) => {
                self.status = ConversionStatus::Error("conversion worker panicked".to_string());
            }
            None => {
                self.status = ConversionStatus::Idle;
            }
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init(); // Log to stderr (if you want to see it).

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 500.0])
            .with_min_inner_size([500.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "PDF to Audio Converter",
        options,
        Box::new(|cc| Box::new(ConverterApp::new(cc))),
    )
}
