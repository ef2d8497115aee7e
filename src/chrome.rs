//! Settings chrome drawn with egui.
//!
//! A thin top bar with the current Kp readout and a settings button. The
//! settings window picks the input source and exposes lock and surge. The
//! chrome never touches the compositor directly; it returns
//! [`ChromeAction`]s for the host to apply.

use crate::palette::ColorRamp;
use crate::tilt::InputMode;

/// What the chrome displays.
#[derive(Debug, Clone, Copy)]
pub struct ChromeStatus {
    pub mode: InputMode,
    pub locked: bool,
    pub intensity: u8,
    pub fps: f32,
}

/// A request from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeAction {
    SetMode(InputMode),
    SetLocked(bool),
    Surge,
}

#[derive(Debug, Default)]
pub struct Chrome {
    settings_open: bool,
}

impl Chrome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings_open(&self) -> bool {
        self.settings_open
    }

    pub fn toggle_settings(&mut self) {
        self.settings_open = !self.settings_open;
    }

    pub fn show(&mut self, ctx: &egui::Context, status: &ChromeStatus) -> Vec<ChromeAction> {
        let mut actions = Vec::new();

        egui::TopBottomPanel::top("borealis_top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Borealis");
                ui.separator();
                ui.label(format!(
                    "Kp {} ({})",
                    status.intensity,
                    ColorRamp::from_intensity(status.intensity).label()
                ));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Settings").clicked() {
                        self.settings_open = !self.settings_open;
                    }
                    ui.label(format!("{:.0} fps", status.fps));
                });
            });
        });

        let mut open = self.settings_open;
        egui::Window::new("Input Source")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("Choose how the scene follows you.");
                ui.add_space(8.0);
                if ui
                    .selectable_label(status.mode == InputMode::Orientation, "Gyroscope")
                    .clicked()
                {
                    actions.push(ChromeAction::SetMode(InputMode::Orientation));
                }
                if ui
                    .selectable_label(status.mode == InputMode::Pointer, "Mouse / Touch")
                    .clicked()
                {
                    actions.push(ChromeAction::SetMode(InputMode::Pointer));
                }
                ui.separator();
                let mut locked = status.locked;
                if ui.checkbox(&mut locked, "Lock view").changed() {
                    actions.push(ChromeAction::SetLocked(locked));
                }
                if ui.button("Surge").clicked() {
                    actions.push(ChromeAction::Surge);
                }
            });
        self.settings_open = open;

        // Picking a source closes the dialog
        if actions
            .iter()
            .any(|a| matches!(a, ChromeAction::SetMode(_)))
        {
            self.settings_open = false;
        }

        actions
    }
}
