use crossbeam::channel::{self, Receiver, Sender};
use raylib::prelude::*;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pinn_studio::config::{Config, DEFAULT_CONFIG_PATH};
use pinn_studio::credentials::Credentials;
use pinn_studio::generator::{GenerationRequest, MAX_SCENES, MIN_SCENES, VISUAL_STYLES};
use pinn_studio::jobs::{JobId, JobStatus, MAX_JOBS, RegistryEvent, VideoJob};
use pinn_studio::queue::GeneratingSignal;
use pinn_studio::scene::{SceneDocument, format_prompt};
use pinn_studio::studio::Studio;
use pinn_studio::{StudioError, init, platform, set_log_hook};

const LOG_MAX_LINES: usize = 300;
const LOG_LINE_MAX: usize = 600;
const FIELD_MAX_CHARS: usize = 400;
const PROMPT_MAX_CHARS: usize = 8_000;

const COLOR_BG: Color = Color::new(17, 24, 39, 255);
const COLOR_PANEL: Color = Color::new(31, 41, 55, 255);
const COLOR_BTN: Color = Color::new(79, 209, 197, 255);
const COLOR_BTN_HOVER: Color = Color::new(56, 178, 172, 255);
const COLOR_BTN_DISABLED: Color = Color::new(60, 60, 60, 255);
const COLOR_ACCENT: Color = Color::new(246, 135, 179, 255);
const COLOR_ERROR: Color = Color::new(248, 113, 113, 255);
const COLOR_MUTED: Color = Color::new(156, 163, 175, 255);
const COLOR_LOG_BG: Color = Color::new(10, 10, 10, 255);
const COLOR_LOG_TEXT: Color = Color::new(210, 210, 210, 255);

const LOADING_MESSAGES: &[&str] = &[
    "Warming up the digital director...",
    "Assembling pixels into a masterpiece...",
    "Choreographing virtual actors...",
    "Rendering cinematic magic...",
    "Finalizing the special effects...",
    "This can take a few minutes, please wait...",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Generator,
    Dashboard,
    Setup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Idea,
    GeminiKey,
    VeoKey,
    /// Prompt of the job open in the full-prompt view.
    Prompt(JobId),
}

/// Requests from the window to the studio worker.
enum UiCommand {
    GenerateScenes(GenerationRequest),
    UseScenes(Vec<String>),
    AddJob,
    RemoveJob(JobId),
    SetPrompt(JobId, String),
    GenerateAll,
    Regenerate(JobId),
    Export(JobId),
    SaveKeys(Credentials),
}

/// Results from the studio worker.
enum UiEvent {
    Ready {
        credentials: Credentials,
        signal: GeneratingSignal,
        registry: Receiver<RegistryEvent>,
    },
    ScenesReady(Vec<String>),
    ScenesFailed(String),
    KeysSaved(Credentials),
    /// A render run started from the window has ended or was refused.
    RunFinished,
    Notice(String),
    Fatal(String),
}

/// What a click asked for; applied after the frame is drawn.
enum Action {
    SwitchTab(Tab),
    Focus(Option<Field>),
    Send(UiCommand),
    ScenesDelta(i32),
    ToggleDialogue,
    NextStyle,
    ResetForm,
    GenerateScenes,
    UseScenes,
    CopyText(String),
    PastePrompt(JobId),
    PasteKey(Field),
    Play(JobId),
    SaveKeys,
    GenerateAll,
    Regenerate(JobId),
    OpenPrompt(JobId),
    ClosePrompt,
    FormatDraft,
    PasteDraft,
}

struct Gui {
    tab: Tab,
    focus: Option<Field>,
    idea: String,
    num_scenes: usize,
    include_dialogue: bool,
    style_index: usize,
    scenes_loading: bool,
    scenes: Vec<String>,
    scenes_error: Option<String>,
    jobs: Vec<VideoJob>,
    prompt_draft: String,
    viewing: Option<JobId>,
    /// Set when a run is requested, cleared when the worker reports back.
    run_pending: bool,
    gemini_key: String,
    veo_key: String,
    saved: Credentials,
    signal: Option<GeneratingSignal>,
    registry: Option<Receiver<RegistryEvent>>,
    notice: Option<String>,
    log_buffer: Arc<Mutex<Vec<String>>>,
}

impl Gui {
    fn new(log_buffer: Arc<Mutex<Vec<String>>>) -> Self {
        let defaults = GenerationRequest::default();
        let style_index = VISUAL_STYLES
            .iter()
            .position(|s| *s == defaults.visual_style)
            .unwrap_or(0);
        Self {
            tab: Tab::Generator,
            focus: None,
            idea: defaults.main_idea,
            num_scenes: defaults.num_scenes,
            include_dialogue: defaults.include_dialogue,
            style_index,
            scenes_loading: false,
            scenes: Vec::new(),
            scenes_error: None,
            jobs: Vec::new(),
            prompt_draft: String::new(),
            viewing: None,
            run_pending: false,
            gemini_key: String::new(),
            veo_key: String::new(),
            saved: Credentials::default(),
            signal: None,
            registry: None,
            notice: None,
            log_buffer,
        }
    }

    fn is_generating(&self) -> bool {
        self.run_pending || self.signal.as_ref().is_some_and(GeneratingSignal::get)
    }

    fn request(&self) -> GenerationRequest {
        GenerationRequest {
            main_idea: self.idea.clone(),
            num_scenes: self.num_scenes,
            include_dialogue: self.include_dialogue,
            visual_style: VISUAL_STYLES[self.style_index].to_string(),
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Idea => &mut self.idea,
            Field::GeminiKey => &mut self.gemini_key,
            Field::VeoKey => &mut self.veo_key,
            Field::Prompt(_) => &mut self.prompt_draft,
        }
    }

    fn apply_registry_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::Added(job) => self.jobs.push(job),
            RegistryEvent::Updated(job) => {
                if let Some(slot) = self.jobs.iter_mut().find(|j| j.id == job.id) {
                    *slot = job;
                }
            }
            RegistryEvent::Removed(id) => self.jobs.retain(|j| j.id != id),
            RegistryEvent::Replaced(jobs) => self.jobs = jobs,
        }
    }

    fn drain_events(&mut self, events: &Receiver<UiEvent>) {
        for event in events.try_iter() {
            match event {
                UiEvent::Ready {
                    credentials,
                    signal,
                    registry,
                } => {
                    self.gemini_key = credentials.gemini_api_key.clone();
                    self.veo_key = credentials.veo_api_key.clone();
                    self.saved = credentials;
                    self.signal = Some(signal);
                    self.registry = Some(registry);
                }
                UiEvent::ScenesReady(scenes) => {
                    self.scenes_loading = false;
                    self.scenes_error = None;
                    self.scenes = scenes;
                }
                UiEvent::ScenesFailed(message) => {
                    self.scenes_loading = false;
                    self.scenes_error = Some(message);
                }
                UiEvent::KeysSaved(credentials) => {
                    self.saved = credentials;
                    self.notice = Some("Saved Successfully!".to_string());
                }
                UiEvent::RunFinished => self.run_pending = false,
                UiEvent::Notice(message) => self.notice = Some(message),
                UiEvent::Fatal(message) => {
                    push_log_line(&self.log_buffer, &format!("[ERROR] {}", message));
                    self.notice = Some(message);
                }
            }
        }

        let pending: Vec<RegistryEvent> = match &self.registry {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        for event in pending {
            self.apply_registry_event(event);
        }
    }
}

fn push_log_line(buffer: &Arc<Mutex<Vec<String>>>, line: &str) {
    let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
    if guard.len() >= LOG_MAX_LINES {
        let excess = guard.len() + 1 - LOG_MAX_LINES;
        guard.drain(0..excess);
    }
    let mut text = line.to_string();
    if text.len() > LOG_LINE_MAX {
        let mut cut = LOG_LINE_MAX;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    guard.push(text);
}

fn snapshot_logs(buffer: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn clip_text(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Splits text into display rows: one per line, long lines broken at
/// `max_chars`.
fn wrap_lines(text: &str, max_chars: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
        }
        for chunk in chars.chunks(max_chars.max(1)) {
            rows.push(chunk.iter().collect());
        }
    }
    rows
}

fn mask(text: &str) -> String {
    "*".repeat(text.chars().count().min(48))
}

/// One-line summary of a scene prompt for cards and lists.
fn scene_summary(prompt: &str) -> String {
    if prompt.trim().is_empty() {
        return "(empty prompt - paste a JSON scene)".to_string();
    }
    match SceneDocument::from_json(prompt) {
        Ok(doc) if !doc.scene.action.is_empty() || !doc.scene.setting.is_empty() => {
            format!("{} | {}", doc.scene.setting, doc.scene.action)
        }
        _ => format_prompt(prompt),
    }
}

fn draw_button(
    d: &mut RaylibDrawHandle,
    rect: Rectangle,
    label: &str,
    enabled: bool,
    font_size: f32,
) -> bool {
    let mouse = d.get_mouse_position();
    let hot = rect.check_collision_point_rec(mouse);

    let bg = if !enabled {
        COLOR_BTN_DISABLED
    } else if hot {
        COLOR_BTN_HOVER
    } else {
        COLOR_BTN
    };

    d.draw_rectangle_rounded(rect, 0.25, 10, bg);
    d.draw_rectangle_rounded_lines(rect, 0.25, 10, Color::new(20, 20, 20, 255));

    let ts = d.measure_text(label, font_size as i32);
    let pos_x = rect.x + (rect.width - ts as f32) * 0.5;
    let pos_y = rect.y + (rect.height - font_size) * 0.5;
    let text_color = if enabled { COLOR_BG } else { COLOR_MUTED };
    d.draw_text(label, pos_x as i32, pos_y as i32, font_size as i32, text_color);

    enabled && hot && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT)
}

/// Draws a single-line input box and reports whether it was clicked.
fn draw_text_field(
    d: &mut RaylibDrawHandle,
    rect: Rectangle,
    shown: &str,
    focused: bool,
) -> bool {
    let border = if focused { COLOR_BTN } else { COLOR_MUTED };
    d.draw_rectangle_rec(rect, COLOR_BG);
    d.draw_rectangle_lines_ex(rect, 2.0, border);

    let max_chars = ((rect.width - 16.0) / 9.0).max(4.0) as usize;
    let mut text = clip_text(shown, max_chars);
    if focused && (d.get_time() * 2.0) as i64 % 2 == 0 {
        text.push('|');
    }
    d.draw_text(&text, rect.x as i32 + 8, rect.y as i32 + 8, 18, Color::RAYWHITE);

    let hot = rect.check_collision_point_rec(d.get_mouse_position());
    hot && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT)
}

fn draw_log_panel(d: &mut RaylibDrawHandle, rect: Rectangle, lines: &[String]) {
    d.draw_rectangle_rec(rect, COLOR_LOG_BG);
    d.draw_rectangle_lines_ex(rect, 2.0, Color::new(40, 40, 40, 255));

    let font_size = 14;
    let pad = 8.0;
    let line_h = 16.0;
    let max_lines = ((rect.height - 2.0 * pad) / line_h).floor().max(1.0) as usize;
    let max_chars = ((rect.width - 2.0 * pad) / 7.0).max(10.0) as usize;

    let start = lines.len().saturating_sub(max_lines);

    let mut y = rect.y + pad;
    for line in lines.iter().skip(start) {
        let pos_x = rect.x + pad;
        d.draw_text(
            &clip_text(line, max_chars),
            pos_x as i32,
            y as i32,
            font_size,
            COLOR_LOG_TEXT,
        );
        y += line_h;
    }
}

fn draw_generator(d: &mut RaylibDrawHandle, gui: &Gui, actions: &mut Vec<Action>) {
    let form = Rectangle::new(20.0, 70.0, 500.0, 480.0);
    d.draw_rectangle_rounded(form, 0.03, 8, COLOR_PANEL);
    d.draw_text("Prompt Generator", 40, 85, 24, Color::RAYWHITE);
    if draw_button(d, Rectangle::new(400.0, 82.0, 100.0, 30.0), "Reset", true, 16.0) {
        actions.push(Action::ResetForm);
    }

    d.draw_text("Main Idea", 40, 130, 16, COLOR_MUTED);
    let focused = gui.focus == Some(Field::Idea);
    if draw_text_field(d, Rectangle::new(40.0, 152.0, 460.0, 36.0), &gui.idea, focused) {
        actions.push(Action::Focus(Some(Field::Idea)));
    }

    d.draw_text("Number of Scenes", 40, 205, 16, COLOR_MUTED);
    if draw_button(d, Rectangle::new(40.0, 228.0, 36.0, 32.0), "-", gui.num_scenes > MIN_SCENES, 20.0) {
        actions.push(Action::ScenesDelta(-1));
    }
    d.draw_text(&gui.num_scenes.to_string(), 92, 234, 20, Color::RAYWHITE);
    if draw_button(d, Rectangle::new(124.0, 228.0, 36.0, 32.0), "+", gui.num_scenes < MAX_SCENES, 20.0) {
        actions.push(Action::ScenesDelta(1));
    }

    d.draw_text("Visual Style", 260, 205, 16, COLOR_MUTED);
    if draw_button(d, Rectangle::new(260.0, 228.0, 240.0, 32.0), VISUAL_STYLES[gui.style_index], true, 16.0) {
        actions.push(Action::NextStyle);
    }

    d.draw_text("Dialogue", 40, 280, 16, COLOR_MUTED);
    let dialogue_label = if gui.include_dialogue {
        "Yes, include dialogue"
    } else {
        "No dialogue (silent)"
    };
    if draw_button(d, Rectangle::new(40.0, 302.0, 460.0, 32.0), dialogue_label, true, 16.0) {
        actions.push(Action::ToggleDialogue);
    }

    let ready = !gui.idea.trim().is_empty() && gui.saved.has_gemini_key() && !gui.scenes_loading;
    let label = if gui.scenes_loading { "Generating..." } else { "Generate Prompts" };
    if draw_button(d, Rectangle::new(40.0, 360.0, 460.0, 48.0), label, ready, 20.0) {
        actions.push(Action::GenerateScenes);
    }
    if !gui.saved.has_gemini_key() {
        d.draw_text("Gemini API Key is not configured in the Setup tab.", 40, 420, 16, COLOR_ERROR);
    }

    let out = Rectangle::new(540.0, 70.0, 540.0, 480.0);
    d.draw_rectangle_rounded(out, 0.03, 8, COLOR_PANEL);
    d.draw_text("Generated Scenes", 560, 85, 24, Color::RAYWHITE);
    if !gui.scenes.is_empty()
        && draw_button(d, Rectangle::new(800.0, 82.0, 260.0, 30.0), "Add JSON Prompts to Video Creation", true, 14.0)
    {
        actions.push(Action::UseScenes);
    }

    if gui.scenes_loading {
        d.draw_text("AI is crafting your story...", 560, 140, 20, COLOR_BTN);
    } else if let Some(error) = &gui.scenes_error {
        d.draw_text("An Error Occurred", 560, 140, 20, COLOR_ERROR);
        d.draw_text(&clip_text(error, 56), 560, 168, 16, COLOR_ERROR);
    } else if gui.scenes.is_empty() {
        d.draw_text("Your generated prompts will appear here.", 560, 140, 18, COLOR_MUTED);
    }

    let mut y = 130.0;
    for (index, scene) in gui.scenes.iter().enumerate() {
        d.draw_text(&format!("Scene {}", index + 1), 560, y as i32 + 6, 18, Color::RAYWHITE);
        d.draw_text(&clip_text(&scene_summary(scene), 44), 660, y as i32 + 8, 14, COLOR_MUTED);
        if draw_button(d, Rectangle::new(1000.0, y, 60.0, 28.0), "Copy", true, 14.0) {
            actions.push(Action::CopyText(format_prompt(scene)));
        }
        y += 40.0;
    }
}

fn draw_prompt_view(d: &mut RaylibDrawHandle, gui: &Gui, id: JobId, actions: &mut Vec<Action>) {
    let Some(index) = gui.jobs.iter().position(|j| j.id == id) else {
        actions.push(Action::ClosePrompt);
        return;
    };

    let panel = Rectangle::new(40.0, 70.0, 1020.0, 500.0);
    d.draw_rectangle_rounded(panel, 0.03, 8, COLOR_PANEL);
    d.draw_text(&format!("Full Prompt for Scene {}", index + 1), 60, 84, 24, Color::RAYWHITE);
    d.draw_text(
        "Type to edit. Enter adds a line, Esc stops editing.",
        60,
        114,
        14,
        COLOR_MUTED,
    );

    let editing = gui.focus == Some(Field::Prompt(id));
    let body = Rectangle::new(60.0, 140.0, 980.0, 370.0);
    d.draw_rectangle_rec(body, COLOR_BG);
    d.draw_rectangle_lines_ex(body, 2.0, if editing { COLOR_BTN } else { COLOR_MUTED });

    let mut lines = wrap_lines(&gui.prompt_draft, ((body.width - 20.0) / 8.0) as usize);
    if editing && (d.get_time() * 2.0) as i64 % 2 == 0 {
        if let Some(last) = lines.last_mut() {
            last.push('|');
        }
    }
    let max_lines = ((body.height - 16.0) / 17.0) as usize;
    let start = lines.len().saturating_sub(max_lines);
    for (row, line) in lines.iter().skip(start).enumerate() {
        d.draw_text(line, 70, 148 + row as i32 * 17, 15, Color::RAYWHITE);
    }
    let hot = body.check_collision_point_rec(d.get_mouse_position());
    if hot && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT) {
        actions.push(Action::Focus(Some(Field::Prompt(id))));
    }

    if draw_button(d, Rectangle::new(60.0, 522.0, 140.0, 32.0), "Format JSON", true, 14.0) {
        actions.push(Action::FormatDraft);
    }
    if draw_button(d, Rectangle::new(210.0, 522.0, 100.0, 32.0), "Paste", true, 14.0) {
        actions.push(Action::PasteDraft);
    }
    if draw_button(d, Rectangle::new(320.0, 522.0, 100.0, 32.0), "Copy", true, 14.0) {
        actions.push(Action::CopyText(format_prompt(&gui.prompt_draft)));
    }
    if draw_button(d, Rectangle::new(940.0, 522.0, 100.0, 32.0), "Close", true, 14.0) {
        actions.push(Action::ClosePrompt);
    }
}

fn draw_dashboard(d: &mut RaylibDrawHandle, gui: &Gui, actions: &mut Vec<Action>) {
    if let Some(id) = gui.viewing {
        draw_prompt_view(d, gui, id, actions);
        return;
    }

    let generating = gui.is_generating();
    d.draw_text("Video Generation Dashboard", 20, 72, 24, Color::RAYWHITE);

    let label = if generating { "Generating..." } else { "Generate All Videos" };
    if draw_button(d, Rectangle::new(860.0, 66.0, 220.0, 34.0), label, !generating && !gui.jobs.is_empty(), 16.0) {
        actions.push(Action::GenerateAll);
    }
    if gui.jobs.len() < MAX_JOBS {
        let add_label = format!("Add New Scene ({} remaining)", MAX_JOBS - gui.jobs.len());
        if draw_button(d, Rectangle::new(580.0, 66.0, 260.0, 34.0), &add_label, !generating, 16.0) {
            actions.push(Action::Send(UiCommand::AddJob));
        }
    }

    if gui.jobs.is_empty() {
        d.draw_text("Your video scenes will appear here.", 20, 140, 20, COLOR_MUTED);
        d.draw_text(
            "Create prompts in the Generator tab, or click \"Add New Scene\" to start manually.",
            20,
            170,
            16,
            COLOR_MUTED,
        );
        return;
    }

    let tick = (d.get_time() / 4.0) as usize;
    for (index, job) in gui.jobs.iter().enumerate() {
        let col = (index % 2) as f32;
        let row = (index / 2) as f32;
        let card = Rectangle::new(20.0 + col * 535.0, 112.0 + row * 90.0, 525.0, 82.0);
        d.draw_rectangle_rounded(card, 0.08, 8, COLOR_PANEL);

        let x = card.x as i32 + 12;
        let y = card.y as i32 + 8;
        d.draw_text(&format!("Scene {}", index + 1), x, y, 18, Color::RAYWHITE);
        let status_color = match job.status() {
            JobStatus::Success => COLOR_BTN,
            JobStatus::Error => COLOR_ERROR,
            JobStatus::Generating => COLOR_ACCENT,
            JobStatus::Idle => COLOR_MUTED,
        };
        d.draw_text(job.status().as_str(), x + 90, y + 2, 16, status_color);
        d.draw_text(&clip_text(&scene_summary(&job.prompt), 60), x, y + 26, 14, COLOR_MUTED);

        let detail = match job.status() {
            JobStatus::Generating => Some((LOADING_MESSAGES[tick % LOADING_MESSAGES.len()].to_string(), COLOR_ACCENT)),
            JobStatus::Error => job.error().map(|e| (e.to_string(), COLOR_ERROR)),
            JobStatus::Success => job
                .video()
                .map(|v| (format!("Ready: {} bytes", v.size()), COLOR_BTN)),
            JobStatus::Idle => None,
        };
        if let Some((text, color)) = detail {
            d.draw_text(&clip_text(&text, 60), x, y + 48, 14, color);
        }

        let busy = job.status() == JobStatus::Generating;
        let bx = card.x + card.width - 250.0;
        let by = card.y + 6.0;
        if draw_button(d, Rectangle::new(bx, by, 58.0, 22.0), "Edit", !busy, 12.0) {
            actions.push(Action::OpenPrompt(job.id));
        }
        if draw_button(d, Rectangle::new(bx + 62.0, by + 28.0, 58.0, 22.0), "Paste", !busy, 12.0) {
            actions.push(Action::PastePrompt(job.id));
        }
        if draw_button(d, Rectangle::new(bx + 62.0, by, 58.0, 22.0), "Copy", true, 12.0) {
            actions.push(Action::CopyText(format_prompt(&job.prompt)));
        }
        if draw_button(d, Rectangle::new(bx + 124.0, by, 58.0, 22.0), "Regen", !generating, 12.0) {
            actions.push(Action::Regenerate(job.id));
        }
        if draw_button(d, Rectangle::new(bx + 186.0, by, 58.0, 22.0), "Remove", !generating, 12.0) {
            actions.push(Action::Send(UiCommand::RemoveJob(job.id)));
        }
        let has_video = job.video().is_some();
        if draw_button(d, Rectangle::new(bx + 124.0, by + 28.0, 58.0, 22.0), "Play", has_video, 12.0) {
            actions.push(Action::Play(job.id));
        }
        if draw_button(d, Rectangle::new(bx + 186.0, by + 28.0, 58.0, 22.0), "Save", has_video, 12.0) {
            actions.push(Action::Send(UiCommand::Export(job.id)));
        }
    }
}

fn draw_setup(d: &mut RaylibDrawHandle, gui: &Gui, actions: &mut Vec<Action>) {
    d.draw_text("API Key Setup", 20, 72, 28, Color::RAYWHITE);

    let sections = [
        (
            Field::GeminiKey,
            "Gemini API Key",
            "Used for generating JSON prompts in the 'Generator' tab.",
            &gui.gemini_key,
            gui.saved.has_gemini_key(),
        ),
        (
            Field::VeoKey,
            "VEO API Key",
            "Used for creating videos from prompts in the 'Dashboard' tab.",
            &gui.veo_key,
            gui.saved.has_veo_key(),
        ),
    ];

    for (i, (field, title, description, value, configured)) in sections.into_iter().enumerate() {
        let x = 20.0 + i as f32 * 535.0;
        let panel = Rectangle::new(x, 120.0, 525.0, 220.0);
        d.draw_rectangle_rounded(panel, 0.05, 8, COLOR_PANEL);
        d.draw_text(title, x as i32 + 20, 138, 22, Color::RAYWHITE);
        d.draw_text(description, x as i32 + 20, 170, 14, COLOR_MUTED);

        let focused = gui.focus == Some(field);
        let input = Rectangle::new(x + 20.0, 200.0, 485.0, 36.0);
        if draw_text_field(d, input, &mask(value), focused) {
            actions.push(Action::Focus(Some(field)));
        }
        if draw_button(d, Rectangle::new(x + 20.0, 246.0, 80.0, 26.0), "Paste", true, 14.0) {
            actions.push(Action::PasteKey(field));
        }

        let (status, color) = if configured {
            ("API Key is configured.", COLOR_BTN)
        } else {
            ("API Key is not configured.", Color::new(253, 224, 71, 255))
        };
        d.draw_text(status, x as i32 + 20, 295, 16, color);
    }

    let label = gui.notice.as_deref().unwrap_or("Save Configuration");
    if draw_button(d, Rectangle::new(860.0, 360.0, 220.0, 40.0), label, true, 16.0) {
        actions.push(Action::SaveKeys);
    }
}

fn spawn_worker(commands: mpsc::UnboundedReceiver<UiCommand>, events: Sender<UiEvent>) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => {
                let _ = events.send(UiEvent::Fatal(format!(
                    "Failed to initialize async runtime: {}",
                    err
                )));
                return;
            }
        };
        if let Err(err) = rt.block_on(run_worker(commands, events.clone())) {
            let _ = events.send(UiEvent::Fatal(format!("{:#}", err)));
        }
    });
}

/// Reports the end of a spawned render run back to the window.
fn forward_run<T: Send + 'static>(
    task: JoinHandle<Result<T, StudioError>>,
    events: Sender<UiEvent>,
) {
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                let _ = events.send(UiEvent::Notice(err.to_string()));
            }
            Err(err) => {
                let _ = events.send(UiEvent::Notice(format!("Render task stopped: {}", err)));
            }
        }
        let _ = events.send(UiEvent::RunFinished);
    });
}

async fn run_worker(
    mut commands: mpsc::UnboundedReceiver<UiCommand>,
    events: Sender<UiEvent>,
) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(DEFAULT_CONFIG_PATH).await?;
    init::ensure_directories(&cfg).await?;
    init::purge_stale_media(&cfg.media_dir);

    let mut studio = Studio::open(cfg)?;
    let registry = studio.registry().subscribe();
    let _ = events.send(UiEvent::Ready {
        credentials: studio.credentials().clone(),
        signal: studio.generating_signal(),
        registry,
    });

    // Long calls run on their own tasks so edits and key changes are
    // applied while they wait on the network.
    while let Some(command) = commands.recv().await {
        match command {
            UiCommand::GenerateScenes(request) => {
                let task = studio.spawn_generate_scenes(request);
                let events = events.clone();
                tokio::spawn(async move {
                    let event = match task.await {
                        Ok(Ok(scenes)) => UiEvent::ScenesReady(scenes),
                        Ok(Err(err)) => UiEvent::ScenesFailed(err.to_string()),
                        Err(err) => UiEvent::ScenesFailed(format!("Scene generation stopped: {}", err)),
                    };
                    let _ = events.send(event);
                });
            }
            UiCommand::UseScenes(scenes) => {
                studio.use_scenes(scenes);
            }
            UiCommand::AddJob => {
                studio.registry().add();
            }
            UiCommand::RemoveJob(id) => {
                studio.registry().remove(id);
            }
            UiCommand::SetPrompt(id, prompt) => {
                studio.registry().set_prompt(id, prompt);
            }
            UiCommand::GenerateAll => match studio.spawn_generate_all() {
                Ok(task) => forward_run(task, events.clone()),
                Err(err) => {
                    let _ = events.send(UiEvent::Notice(err.to_string()));
                    let _ = events.send(UiEvent::RunFinished);
                }
            },
            UiCommand::Regenerate(id) => match studio.spawn_regenerate(id) {
                Ok(task) => forward_run(task, events.clone()),
                Err(err) => {
                    let _ = events.send(UiEvent::Notice(err.to_string()));
                    let _ = events.send(UiEvent::RunFinished);
                }
            },
            UiCommand::Export(id) => {
                let event = match studio.export(id) {
                    Ok(path) => UiEvent::Notice(format!("Saved {}", path.display())),
                    Err(err) => UiEvent::Notice(format!("{:#}", err)),
                };
                let _ = events.send(event);
            }
            UiCommand::SaveKeys(credentials) => match studio.save_credentials(credentials.clone()) {
                Ok(()) => {
                    let _ = events.send(UiEvent::KeysSaved(credentials));
                }
                Err(err) => {
                    let _ = events.send(UiEvent::Notice(format!("{:#}", err)));
                }
            },
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();

    let log_buffer: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::with_capacity(LOG_MAX_LINES)));
    let hook_buffer = Arc::clone(&log_buffer);
    set_log_hook(Some(Arc::new(Mutex::new(move |line: &str| {
        push_log_line(&hook_buffer, line);
    }))));

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = channel::unbounded();
    spawn_worker(command_rx, event_tx);

    let (mut rl, thread) = raylib::init()
        .size(1100, 760)
        .resizable()
        .title("PINN STUDIO")
        .build();
    rl.set_target_fps(60);
    rl.set_exit_key(None);

    let mut gui = Gui::new(Arc::clone(&log_buffer));

    while !rl.window_should_close() {
        gui.drain_events(&event_rx);

        if let Some(field) = gui.focus {
            let multiline = matches!(field, Field::Prompt(_));
            let limit = if multiline { PROMPT_MAX_CHARS } else { FIELD_MAX_CHARS };
            let mut edited = false;
            while let Some(ch) = rl.get_char_pressed() {
                let text = gui.field_mut(field);
                if text.chars().count() < limit {
                    text.push(ch);
                    edited = true;
                }
            }
            if rl.is_key_pressed(KeyboardKey::KEY_BACKSPACE) {
                edited |= gui.field_mut(field).pop().is_some();
            }
            if rl.is_key_pressed(KeyboardKey::KEY_ENTER) {
                if multiline {
                    gui.prompt_draft.push('\n');
                    edited = true;
                } else {
                    gui.focus = None;
                }
            }
            if rl.is_key_pressed(KeyboardKey::KEY_ESCAPE) {
                gui.focus = None;
            }
            if let (true, Field::Prompt(id)) = (edited, field) {
                let _ = command_tx.send(UiCommand::SetPrompt(id, gui.prompt_draft.clone()));
            }
        }

        let mut actions: Vec<Action> = Vec::new();
        {
            let mut d = rl.begin_drawing(&thread);
            d.clear_background(COLOR_BG);
            d.draw_text("PINN STUDIO", 20, 18, 28, Color::RAYWHITE);

            let tabs = [
                (Tab::Generator, "Generator"),
                (Tab::Dashboard, "Dashboard"),
                (Tab::Setup, "Setup"),
            ];
            for (i, (tab, label)) in tabs.into_iter().enumerate() {
                let rect = Rectangle::new(660.0 + i as f32 * 140.0, 14.0, 130.0, 36.0);
                if draw_button(&mut d, rect, label, gui.tab != tab, 18.0) {
                    actions.push(Action::SwitchTab(tab));
                }
            }

            match gui.tab {
                Tab::Generator => draw_generator(&mut d, &gui, &mut actions),
                Tab::Dashboard => draw_dashboard(&mut d, &gui, &mut actions),
                Tab::Setup => draw_setup(&mut d, &gui, &mut actions),
            }

            if let Some(notice) = &gui.notice {
                if gui.tab != Tab::Setup {
                    d.draw_text(&clip_text(notice, 120), 20, 562, 16, COLOR_ACCENT);
                }
            }

            let lines = snapshot_logs(&log_buffer);
            draw_log_panel(&mut d, Rectangle::new(20.0, 585.0, 1060.0, 160.0), &lines);
        }

        for action in actions {
            match action {
                Action::SwitchTab(tab) => {
                    gui.tab = tab;
                    gui.focus = None;
                    gui.viewing = None;
                    gui.notice = None;
                }
                Action::GenerateAll => {
                    gui.run_pending = true;
                    let _ = command_tx.send(UiCommand::GenerateAll);
                }
                Action::Regenerate(id) => {
                    gui.run_pending = true;
                    let _ = command_tx.send(UiCommand::Regenerate(id));
                }
                Action::OpenPrompt(id) => {
                    if let Some(job) = gui.jobs.iter().find(|j| j.id == id) {
                        gui.prompt_draft = job.prompt.clone();
                        gui.viewing = Some(id);
                        gui.focus = Some(Field::Prompt(id));
                    }
                }
                Action::ClosePrompt => {
                    gui.viewing = None;
                    gui.focus = None;
                }
                Action::FormatDraft => {
                    if let Some(id) = gui.viewing {
                        gui.prompt_draft = format_prompt(&gui.prompt_draft);
                        let _ = command_tx.send(UiCommand::SetPrompt(id, gui.prompt_draft.clone()));
                    }
                }
                Action::PasteDraft => {
                    if let (Some(id), Ok(text)) = (gui.viewing, rl.get_clipboard_text()) {
                        gui.prompt_draft = text;
                        let _ = command_tx.send(UiCommand::SetPrompt(id, gui.prompt_draft.clone()));
                    }
                }
                Action::Focus(field) => gui.focus = field,
                Action::Send(command) => {
                    let _ = command_tx.send(command);
                }
                Action::ScenesDelta(delta) => {
                    let next = gui.num_scenes as i32 + delta;
                    gui.num_scenes = next.clamp(MIN_SCENES as i32, MAX_SCENES as i32) as usize;
                }
                Action::ToggleDialogue => gui.include_dialogue = !gui.include_dialogue,
                Action::NextStyle => gui.style_index = (gui.style_index + 1) % VISUAL_STYLES.len(),
                Action::ResetForm => {
                    let defaults = GenerationRequest::default();
                    gui.idea.clear();
                    gui.scenes.clear();
                    gui.scenes_error = None;
                    gui.num_scenes = defaults.num_scenes;
                    gui.include_dialogue = defaults.include_dialogue;
                    gui.style_index = VISUAL_STYLES
                        .iter()
                        .position(|s| *s == defaults.visual_style)
                        .unwrap_or(0);
                }
                Action::GenerateScenes => {
                    gui.scenes_loading = true;
                    gui.scenes_error = None;
                    gui.scenes.clear();
                    let _ = command_tx.send(UiCommand::GenerateScenes(gui.request()));
                }
                Action::UseScenes => {
                    let _ = command_tx.send(UiCommand::UseScenes(gui.scenes.clone()));
                    gui.tab = Tab::Dashboard;
                }
                Action::CopyText(text) => {
                    if rl.set_clipboard_text(&text).is_ok() {
                        gui.notice = Some("Copied!".to_string());
                    }
                }
                Action::PastePrompt(id) => {
                    if let Ok(text) = rl.get_clipboard_text() {
                        let _ = command_tx.send(UiCommand::SetPrompt(id, text));
                    }
                }
                Action::PasteKey(field) => {
                    if let Ok(text) = rl.get_clipboard_text() {
                        *gui.field_mut(field) = text.trim().to_string();
                        gui.focus = Some(field);
                    }
                }
                Action::Play(id) => {
                    let path = gui
                        .jobs
                        .iter()
                        .find(|j| j.id == id)
                        .and_then(|j| j.video())
                        .map(|v| v.path().to_path_buf());
                    if let Some(path) = path {
                        if let Err(err) = platform::open_path(&path) {
                            gui.notice = Some(format!("{:#}", err));
                        }
                    }
                }
                Action::SaveKeys => {
                    let credentials = Credentials::new(gui.gemini_key.trim(), gui.veo_key.trim());
                    let _ = command_tx.send(UiCommand::SaveKeys(credentials));
                }
            }
        }
    }

    set_log_hook(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gui() -> Gui {
        Gui::new(Arc::new(Mutex::new(Vec::new())))
    }

    #[test]
    fn run_buttons_stay_disabled_until_the_worker_reports_back() {
        let mut gui = gui();
        assert!(!gui.is_generating());

        gui.run_pending = true;
        assert!(gui.is_generating());

        let (tx, rx) = channel::unbounded();
        tx.send(UiEvent::Notice("A render run is already in progress.".into()))
            .unwrap();
        tx.send(UiEvent::RunFinished).unwrap();
        gui.drain_events(&rx);
        assert!(!gui.is_generating());
        assert_eq!(gui.notice.as_deref(), Some("A render run is already in progress."));
    }

    #[test]
    fn prompt_field_edits_the_draft() {
        let mut gui = gui();
        let job = VideoJob::new("{}");
        let field = Field::Prompt(job.id);
        gui.prompt_draft = job.prompt.clone();

        gui.field_mut(field).pop();
        gui.field_mut(field).push_str("\"scene\":{}}");
        assert_eq!(gui.prompt_draft, "{\"scene\":{}}");
        assert_eq!(format_prompt(&gui.prompt_draft), "{\n  \"scene\": {}\n}");
    }

    #[test]
    fn wrap_lines_keeps_blank_lines_and_breaks_long_ones() {
        assert_eq!(wrap_lines("ab\n\ncdefg", 3), vec!["ab", "", "cde", "fg"]);
        assert_eq!(wrap_lines("", 10), vec![""]);
    }

    #[test]
    fn mirror_follows_registry_events() {
        let mut gui = gui();
        let job = VideoJob::new("{}");
        let id = job.id;
        gui.apply_registry_event(RegistryEvent::Added(job.clone()));

        let mut edited = job;
        edited.prompt = "{\"scene\":{}}".into();
        gui.apply_registry_event(RegistryEvent::Updated(edited));
        assert_eq!(gui.jobs[0].prompt, "{\"scene\":{}}");

        gui.apply_registry_event(RegistryEvent::Removed(id));
        assert!(gui.jobs.is_empty());
    }
}
