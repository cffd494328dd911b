use std::sync::mpsc;

use eframe::egui;

use deepclean::cleaner::{
    progress_percent, CleaningSummary, LogEntry, LogLevel, Reporter, RunState, TaskOutcome,
    TaskStatus, TOTAL_STEPS,
};
use deepclean::config::{Config, Locations};
use deepclean::orchestrator::Orchestrator;
use deepclean::system::HostSystem;
use deepclean::tasks::{self, TaskSpec};
use deepclean::utils;

const GREEN: egui::Color32 = egui::Color32::from_rgb(76, 175, 80);
const ORANGE: egui::Color32 = egui::Color32::from_rgb(255, 152, 0);
const RED: egui::Color32 = egui::Color32::from_rgb(244, 67, 54);
const ACCENT: egui::Color32 = egui::Color32::from_rgb(80, 180, 220);

/// Messages sent from the cleaning thread to the UI thread.
pub enum BgMessage {
    Progress(usize, String),
    Log(String, LogLevel),
    Outcome(TaskOutcome),
    Confirm {
        title: String,
        message: String,
        reply: mpsc::Sender<bool>,
    },
    Finished(Result<CleaningSummary, String>),
}

/// `Reporter` for the worker thread: forwards everything to the UI over a channel.
struct ChannelReporter {
    tx: mpsc::Sender<BgMessage>,
    ctx: egui::Context,
}

impl ChannelReporter {
    fn send(&self, msg: BgMessage) -> bool {
        let sent = self.tx.send(msg).is_ok();
        self.ctx.request_repaint();
        sent
    }
}

impl Reporter for ChannelReporter {
    fn report_progress(&self, step: usize, status: &str) {
        self.send(BgMessage::Progress(step, status.to_string()));
    }

    fn log_message(&self, message: &str, level: LogLevel) {
        self.send(BgMessage::Log(message.to_string(), level));
    }

    /// Blocks the worker until the dialog is answered. A closed window answers no.
    fn confirm(&self, title: &str, message: &str) -> bool {
        let (reply, answer) = mpsc::channel();
        let asked = self.send(BgMessage::Confirm {
            title: title.to_string(),
            message: message.to_string(),
            reply,
        });
        asked && answer.recv().unwrap_or(false)
    }

    fn step_finished(&self, outcome: &TaskOutcome) {
        self.send(BgMessage::Outcome(outcome.clone()));
    }
}

#[derive(PartialEq)]
pub enum AppPhase {
    Idle,
    Cleaning,
    Finished,
}

/// A confirmation the worker is waiting on.
struct PendingConfirm {
    title: String,
    message: String,
    reply: mpsc::Sender<bool>,
}

pub struct DeepCleanApp {
    config: Config,
    tasks: Vec<TaskSpec>,
    state: RunState,
    phase: AppPhase,
    receiver: Option<mpsc::Receiver<BgMessage>>,
    pending_confirm: Option<PendingConfirm>,
    summary: Option<CleaningSummary>,
    failure: Option<String>,
}

impl DeepCleanApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        Self {
            config,
            tasks: tasks::catalog(),
            state: RunState::default(),
            phase: AppPhase::Idle,
            receiver: None,
            pending_confirm: None,
            summary: None,
            failure: None,
        }
    }

    fn start_clean(&mut self, ctx: &egui::Context) {
        self.phase = AppPhase::Cleaning;
        self.state.begin();
        self.summary = None;
        self.failure = None;

        let (tx, rx) = mpsc::channel::<BgMessage>();
        self.receiver = Some(rx);

        let config = self.config.clone();
        let reporter = ChannelReporter {
            tx: tx.clone(),
            ctx: ctx.clone(),
        };
        std::thread::spawn(move || {
            let locations = Locations::from_env(&config);
            let mut orchestrator = Orchestrator::new(config, locations, HostSystem);
            let result = orchestrator.run(&reporter).map_err(|e| e.to_string());
            let _ = tx.send(BgMessage::Finished(result));
            reporter.ctx.request_repaint();
        });
    }

    fn drain_messages(&mut self) {
        let Some(rx) = self.receiver.as_ref() else {
            return;
        };
        while let Ok(msg) = rx.try_recv() {
            match msg {
                BgMessage::Progress(step, status) => self.state.advance(step, &status),
                BgMessage::Log(message, level) => {
                    self.state.push_log(LogEntry::now(message, level));
                }
                BgMessage::Outcome(outcome) => self.state.outcomes.push(outcome),
                BgMessage::Confirm {
                    title,
                    message,
                    reply,
                } => {
                    self.pending_confirm = Some(PendingConfirm {
                        title,
                        message,
                        reply,
                    });
                }
                BgMessage::Finished(result) => {
                    self.phase = AppPhase::Finished;
                    match result {
                        Ok(summary) => {
                            self.state.finish("Cleaning Completed!");
                            self.summary = Some(summary);
                        }
                        Err(e) => {
                            self.state.finish("Cleaning failed");
                            self.failure = Some(e);
                        }
                    }
                }
            }
        }
    }

    fn step_status(&self, step: usize) -> Option<TaskStatus> {
        self.state
            .outcomes
            .iter()
            .find(|o| o.step == step)
            .map(|o| o.status)
    }

    fn count_status(&self, status: TaskStatus) -> usize {
        self.state
            .outcomes
            .iter()
            .filter(|o| o.status == status)
            .count()
    }

    fn render_header(&self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            ui.heading(
                egui::RichText::new("DeepClean")
                    .size(28.0)
                    .strong()
                    .color(ACCENT),
            );
            ui.label(
                egui::RichText::new("Windows Deep Cleanup")
                    .size(14.0)
                    .color(egui::Color32::GRAY),
            );
        });
        ui.add_space(8.0);
    }

    fn render_action_bar(&mut self, ui: &mut egui::Ui) {
        let is_busy = self.phase == AppPhase::Cleaning;

        ui.horizontal(|ui| {
            ui.add_space(4.0);
            let label = egui::RichText::new("Start Cleaning").strong().color(if is_busy {
                egui::Color32::GRAY
            } else {
                RED
            });
            if ui.add_enabled(!is_busy, egui::Button::new(label)).clicked() {
                self.start_clean(ui.ctx());
            }

            if is_busy {
                ui.add_space(8.0);
                ui.spinner();
            }
            ui.label(&self.state.status);
        });

        ui.add_space(4.0);
        let progress = (progress_percent(self.state.current_step) / 100.0) as f32;
        ui.add(
            egui::ProgressBar::new(progress)
                .text(format!("Step {} of {TOTAL_STEPS}", self.state.current_step))
                .animate(is_busy),
        );
        ui.add_space(4.0);
    }

    fn render_steps(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .id_salt("steps")
            .max_height(220.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for task in &self.tasks {
                    let (marker, color) = if self.phase == AppPhase::Cleaning
                        && task.step == self.state.current_step
                    {
                        ("\u{25B6}", ACCENT)
                    } else {
                        match self.step_status(task.step) {
                            Some(TaskStatus::Completed) => ("\u{2713}", GREEN),
                            Some(TaskStatus::Skipped) => ("\u{26A0}", ORANGE),
                            Some(TaskStatus::Failed) => ("\u{2717}", RED),
                            None => ("\u{2022}", egui::Color32::GRAY),
                        }
                    };

                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(marker).color(color));
                        ui.label(egui::RichText::new(format!("{:>2}.", task.step)).monospace());
                        ui.label(egui::RichText::new(task.name).strong())
                            .on_hover_text(task.description);
                        if task.requires_confirmation() {
                            ui.label(
                                egui::RichText::new("asks first")
                                    .small()
                                    .color(ORANGE),
                            );
                        }
                    });
                }
            });
    }

    fn render_log(&self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Log").strong());
        egui::ScrollArea::vertical()
            .id_salt("log")
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for entry in &self.state.log {
                    let color = match entry.level {
                        LogLevel::Info => egui::Color32::from_rgb(220, 220, 220),
                        LogLevel::Success => GREEN,
                        LogLevel::Warning => ORANGE,
                        LogLevel::Error => RED,
                    };
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(entry.formatted_time())
                                .monospace()
                                .color(egui::Color32::GRAY),
                        );
                        ui.label(egui::RichText::new(entry.level.glyph()).color(color));
                        ui.label(egui::RichText::new(&entry.message).color(color));
                    });
                }
            });
    }

    fn render_summary(&self, ui: &mut egui::Ui) {
        if let Some(summary) = &self.summary {
            ui.add_space(4.0);
            egui::Frame::group(ui.style())
                .inner_margin(8.0)
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new("Space freed:").strong());
                        ui.label(
                            egui::RichText::new(summary.space_freed())
                                .strong()
                                .size(16.0)
                                .color(GREEN),
                        );
                        ui.add_space(12.0);
                        ui.label(format!("{} files", summary.total_files_deleted));
                        ui.add_space(12.0);
                        ui.label(format!("took {}", summary.time_taken_formatted()));
                    });
                    ui.label(
                        egui::RichText::new(format!(
                            "({} exactly)",
                            utils::format_size(summary.total_bytes_freed)
                        ))
                        .small()
                        .color(egui::Color32::GRAY),
                    );

                    let skipped = self.count_status(TaskStatus::Skipped);
                    let failed = self.count_status(TaskStatus::Failed);
                    if skipped + failed > 0 {
                        ui.horizontal(|ui| {
                            if skipped > 0 {
                                ui.label(
                                    egui::RichText::new(format!("{skipped} skipped")).color(ORANGE),
                                );
                            }
                            if failed > 0 {
                                ui.label(egui::RichText::new(format!("{failed} failed")).color(RED));
                            }
                        });
                    }
                    if let Some(biggest) = self
                        .state
                        .outcomes
                        .iter()
                        .filter(|o| o.gained.bytes_freed > 0)
                        .max_by_key(|o| o.gained.bytes_freed)
                    {
                        ui.label(
                            egui::RichText::new(format!(
                                "Most space: {} ({})",
                                biggest.name,
                                utils::format_size(biggest.gained.bytes_freed)
                            ))
                            .small(),
                        );
                    }
                });
        }
        if let Some(failure) = &self.failure {
            ui.label(egui::RichText::new(format!("Run stopped: {failure}")).color(RED));
        }
    }

    fn render_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(pending) = self.pending_confirm.as_ref() else {
            return;
        };
        let mut answer = None;

        // Dark overlay behind the dialog to block background interaction
        egui::Area::new(egui::Id::new("confirm_overlay"))
            .fixed_pos(egui::Pos2::ZERO)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let screen = ui.ctx().screen_rect();
                ui.allocate_rect(screen, egui::Sense::click());
                ui.painter()
                    .rect_filled(screen, 0.0, egui::Color32::from_black_alpha(160));
            });

        egui::Window::new("")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .fixed_size([380.0, 0.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new("\u{26A0}").size(36.0).color(ORANGE));
                    ui.add_space(4.0);
                    ui.label(egui::RichText::new(&pending.title).size(18.0).strong());
                });
                ui.add_space(8.0);
                ui.label(&pending.message);
                ui.add_space(12.0);

                ui.columns(2, |cols| {
                    cols[0].vertical_centered(|ui| {
                        if ui.add_sized([140.0, 32.0], egui::Button::new("No")).clicked() {
                            answer = Some(false);
                        }
                    });
                    cols[1].vertical_centered(|ui| {
                        let yes = egui::Button::new(
                            egui::RichText::new("Yes").strong().color(egui::Color32::WHITE),
                        )
                        .fill(egui::Color32::from_rgb(200, 50, 50));
                        if ui.add_sized([140.0, 32.0], yes).clicked() {
                            answer = Some(true);
                        }
                    });
                });
                ui.add_space(8.0);
            });

        if let Some(answer) = answer {
            if let Some(pending) = self.pending_confirm.take() {
                let _ = pending.reply.send(answer);
            }
        }
    }
}

impl eframe::App for DeepCleanApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        if self.phase == AppPhase::Cleaning {
            ctx.request_repaint();
        }

        self.render_confirm_dialog(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_header(ui);
            self.render_action_bar(ui);
            ui.separator();
            self.render_steps(ui);
            ui.separator();
            self.render_summary(ui);
            self.render_log(ui);
        });
    }
}
