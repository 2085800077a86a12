use egui::{
    Align2, Color32, CornerRadius, FontId, Id, PointerButton, Pos2, Rect, Sense, Stroke,
    StrokeKind, Vec2, pos2, vec2,
};
use egui_form_designer::{
    Designer, DesignerConfig, DesignerObserver, DragKind, DragOutcome, ElementNode, PointerEvent,
    Project, ResizeHandle, WidgetId, WidgetKind,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

const TAB_STRIP_HEIGHT: f32 = 22.0;
const HANDLE_SIZE: f32 = 8.0;

/// Marks the document modified whenever the tree changes.
struct ChangeTracker {
    dirty: Rc<Cell<bool>>,
}

impl DesignerObserver for ChangeTracker {
    fn on_structural_change(&mut self, element: &ElementNode) -> anyhow::Result<()> {
        info!("structure changed around {}", element.name);
        Ok(())
    }

    fn on_tree_changed(&mut self) {
        self.dirty.set(true);
    }
}

/// Something the canvas asked for while it was being painted.
enum CanvasAction {
    Select { id: WidgetId, toggle: bool },
    BeginDrag { id: WidgetId, kind: DragKind, event: PointerEvent },
    SelectTab { id: WidgetId, index: usize },
    Scroll { id: WidgetId, offset: Vec2 },
    ClearSelection,
}

pub(crate) struct FormDesignerApp {
    designer: Designer,
    palette_open: bool,
    // Control being dragged out of the palette
    spawning: Option<WidgetKind>,
    show_grid: bool,
    /// Current project file path (for Save)
    current_file: Option<PathBuf>,
    status_message: Option<(String, Instant)>,
    dirty: Rc<Cell<bool>>,
    /// Name being typed in the inspector, committed on focus loss
    name_edit: Option<(WidgetId, String)>,
    canvas_origin: Pos2,
}

impl FormDesignerApp {
    pub(crate) fn new(config: DesignerConfig) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let mut designer = Designer::new(config);
        designer.add_observer(Box::new(ChangeTracker {
            dirty: dirty.clone(),
        }));
        Self {
            designer,
            palette_open: true,
            spawning: None,
            show_grid: false,
            current_file: None,
            status_message: None,
            dirty,
            name_edit: None,
            canvas_origin: Pos2::ZERO,
        }
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    fn save_project(&mut self, path: PathBuf) {
        match self.designer.project().save(&path) {
            Ok(()) => {
                self.dirty.set(false);
                self.set_status(format!("Saved to {}", path.display()));
                self.current_file = Some(path);
            }
            Err(err) => self.set_status(format!("Save failed: {err}")),
        }
    }

    fn load_project(&mut self, path: PathBuf) {
        match Project::load(&path) {
            Ok(project) => {
                self.designer.load_project(project);
                self.dirty.set(false);
                self.name_edit = None;
                self.set_status(format!("Loaded {}", path.display()));
                self.current_file = Some(path);
            }
            Err(err) => self.set_status(format!("Load failed: {err}")),
        }
    }

    fn save_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Form Project", &["json"])
            .set_file_name("form.json")
            .save_file()
        {
            self.save_project(path);
        }
    }

    fn undo(&mut self) {
        let report = self.designer.undo();
        if report.skipped > 0 {
            self.set_status(format!("Undo skipped {} damaged step(s)", report.skipped));
        }
    }

    fn redo(&mut self) {
        let report = self.designer.redo();
        if report.skipped > 0 {
            self.set_status(format!("Redo skipped {} damaged step(s)", report.skipped));
        }
    }

    fn to_root(&self, screen: Pos2) -> Pos2 {
        (screen - self.canvas_origin).to_pos2()
    }

    // ---- canvas ------------------------------------------------------------

    fn draw_grid(&self, ui: &mut egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        let g = self.designer.config().grid_size.max(8.0);
        let cols = (rect.width() / g) as i32;
        let rows = (rect.height() / g) as i32;
        for c in 0..=cols {
            let x = rect.left() + c as f32 * g;
            painter.line_segment(
                [pos2(x, rect.top()), pos2(x, rect.bottom())],
                Stroke::new(1.0, Color32::from_gray(40)),
            );
        }
        for r in 0..=rows {
            let y = rect.top() + r as f32 * g;
            painter.line_segment(
                [pos2(rect.left(), y), pos2(rect.right(), y)],
                Stroke::new(1.0, Color32::from_gray(40)),
            );
        }
    }

    fn canvas_ui(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let canvas = Rect::from_min_size(ui.min_rect().min, self.designer.canvas_size());
            self.canvas_origin = canvas.min;
            ui.ctx()
                .data_mut(|d| d.insert_temp(Id::new("canvas_origin"), canvas.min));

            let (resp, painter) = ui.allocate_painter(canvas.size(), Sense::click());
            painter.rect_filled(canvas, 0.0, Color32::from_gray(24));
            if self.show_grid {
                self.draw_grid(ui, canvas);
            }

            let mut actions = Vec::new();
            if resp.clicked() {
                actions.push(CanvasAction::ClearSelection);
            }
            let mut handles = Vec::new();
            paint_children(
                ui,
                &self.designer,
                None,
                canvas.min,
                canvas,
                &mut actions,
                &mut handles,
            );
            for (id, rect) in handles {
                resize_handles_ui(ui, id, rect, &mut actions);
            }
            self.highlight_drop_target(ui);
            self.spawn_ui(ui, canvas);
            self.apply_canvas_actions(actions);
        });
    }

    fn highlight_drop_target(&self, ui: &egui::Ui) {
        let Some(session) = self.designer.drag_engine().session() else {
            return;
        };
        if session.kind != DragKind::Move {
            return;
        }
        let Some(pointer) = ui.ctx().pointer_latest_pos() else {
            return;
        };
        if let Some(target) = self.designer.find_container_at(self.to_root(pointer)) {
            let rect = Rect::from_min_size(
                self.canvas_origin + target.screen_pos().to_vec2(),
                target.size,
            );
            let layer = egui::LayerId::new(egui::Order::Foreground, Id::new("drop_target"));
            ui.ctx().layer_painter(layer).rect_stroke(
                rect,
                CornerRadius::same(4),
                Stroke::new(2.0, Color32::from_rgb(120, 200, 120)),
                StrokeKind::Outside,
            );
        }
    }

    fn spawn_ui(&mut self, ui: &egui::Ui, canvas: Rect) {
        let Some(kind) = self.spawning else {
            return;
        };
        if let Some(mouse) = ui.ctx().pointer_interact_pos() {
            let ghost = Rect::from_center_size(mouse, kind.default_size());
            let layer = egui::LayerId::new(egui::Order::Tooltip, Id::new("ghost"));
            let painter = ui.ctx().layer_painter(layer);
            painter.rect_filled(ghost, 4.0, Color32::from_gray(40));
            painter.rect_stroke(
                ghost,
                CornerRadius::same(4),
                Stroke::new(1.0, Color32::LIGHT_BLUE),
                StrokeKind::Outside,
            );
        }
        if ui.input(|i| i.pointer.any_released()) {
            if let Some(pos) = ui.ctx().pointer_interact_pos()
                && canvas.contains(pos)
            {
                let point = self.to_root(pos);
                if let Err(err) = self.designer.drop_new_element(kind, point, Instant::now()) {
                    self.set_status(format!("Could not add {}: {err}", kind.descriptor().display_name));
                }
            }
            self.spawning = None;
        }
    }

    fn apply_canvas_actions(&mut self, actions: Vec<CanvasAction>) {
        let now = Instant::now();
        let mut clear = false;
        let mut handled = false;
        for action in actions {
            match action {
                CanvasAction::ClearSelection => clear = true,
                CanvasAction::Select { id, toggle } => {
                    handled = true;
                    if toggle {
                        self.designer.selection_mut().toggle(id);
                    } else {
                        self.designer.selection_mut().select_single(id);
                    }
                }
                CanvasAction::BeginDrag { id, kind, event } => {
                    handled = true;
                    let outcome = self.designer.begin_drag(event, id, kind);
                    debug!("begin drag on {id}: {outcome:?}");
                }
                CanvasAction::SelectTab { id, index } => {
                    handled = true;
                    let Some(node) = self.designer.tree().get_node(id) else {
                        continue;
                    };
                    let mut props = node.props.clone();
                    props.selected = index;
                    if let Err(err) = self.designer.set_props(id, props, now) {
                        self.set_status(format!("Could not switch tab: {err}"));
                    }
                }
                CanvasAction::Scroll { id, offset } => {
                    if let Err(err) = self.designer.set_scroll(id, offset) {
                        debug!("scroll ignored: {err}");
                    }
                }
            }
        }
        if clear && !handled {
            self.designer.selection_mut().clear();
        }
    }

    /// Feeds pointer motion and release into an active session.
    fn pump_drag(&mut self, ctx: &egui::Context, now: Instant) {
        if !self.designer.drag_engine().is_active() {
            return;
        }
        let (released, escape, focused) = ctx.input(|i| {
            (
                i.pointer.any_released(),
                i.key_pressed(egui::Key::Escape),
                i.focused,
            )
        });
        if escape || !focused {
            self.designer.cancel_drag();
            return;
        }
        let Some(pointer) = ctx.pointer_latest_pos() else {
            return;
        };
        let pointer = self.to_root(pointer);
        if released {
            if let DragOutcome::Committed(committed) = self.designer.end_drag(pointer, now) {
                debug!("committed drag of {} element(s)", committed.elements.len());
            }
        } else {
            self.designer.update_drag(pointer);
        }
    }

    // ---- side panels -------------------------------------------------------

    fn palette_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Palette");
        ui.separator();
        ui.label("Drag any control onto the canvas");
        ui.add_space(4.0);

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::CollapsingHeader::new("Controls")
                    .default_open(true)
                    .show(ui, |ui| {
                        for kind in WidgetKind::ALL.into_iter().filter(|k| !k.is_container()) {
                            self.palette_item(ui, kind);
                        }
                    });
                egui::CollapsingHeader::new("Containers")
                    .default_open(true)
                    .show(ui, |ui| {
                        for kind in WidgetKind::ALL.into_iter().filter(|k| k.is_container()) {
                            self.palette_item(ui, kind);
                        }
                    });

                ui.add_space(8.0);
                ui.separator();
                egui::CollapsingHeader::new("Shortcuts")
                    .default_open(false)
                    .show(ui, |ui| {
                        ui.small("Arrows: nudge selection");
                        ui.small("Delete: remove");
                        ui.small("Ctrl+C/V: copy/paste");
                        ui.small("Ctrl+Z: undo");
                        ui.small("Ctrl+Y / Ctrl+Shift+Z: redo");
                        ui.small("Esc: cancel drag");
                    });
            });
    }

    fn palette_item(&mut self, ui: &mut egui::Ui, kind: WidgetKind) {
        let r = ui.add(egui::Button::new(kind.descriptor().display_name).sense(Sense::drag()));
        if r.drag_started() || r.clicked() {
            self.spawning = Some(kind);
        }
    }

    fn inspector_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Inspector");
        ui.separator();
        let Some(node) = self
            .designer
            .selection()
            .reference()
            .and_then(|id| self.designer.tree().get_node(id))
            .cloned()
        else {
            ui.weak("No selection");
            return;
        };
        let now = Instant::now();
        let id = node.id;

        ui.label(format!("{} (id {id})", node.kind.descriptor().display_name));
        if self.designer.selection().len() > 1 {
            ui.weak(format!("{} selected", self.designer.selection().len()));
        }
        ui.add_space(6.0);

        ui.label("Name");
        let mut name = match &self.name_edit {
            Some((editing, buf)) if *editing == id => buf.clone(),
            _ => node.name.clone(),
        };
        let resp = ui.text_edit_singleline(&mut name);
        if resp.changed() {
            self.name_edit = Some((id, name));
        }
        if resp.lost_focus()
            && let Some((editing, buf)) = self.name_edit.take()
            && editing == id
            && let Err(err) = self.designer.rename(id, &buf, now)
        {
            self.set_status(format!("Rename failed: {err}"));
        }

        let container = match (&node.from_container, &node.from_tab_id) {
            (Some(c), Some(tab)) => format!("{c} / {tab}"),
            (Some(c), None) => c.clone(),
            (None, _) => "form".to_owned(),
        };
        ui.weak(format!("Inside: {container}"));
        ui.separator();

        let mut props = node.props.clone();
        match node.kind {
            WidgetKind::Label
            | WidgetKind::Button
            | WidgetKind::Checkbox
            | WidgetKind::TextEdit
            | WidgetKind::Slider
            | WidgetKind::Group
            | WidgetKind::Panel
            | WidgetKind::ToolBar => {
                ui.label("Text");
                ui.text_edit_singleline(&mut props.text);
            }
            WidgetKind::TextArea | WidgetKind::ScrollBox => {
                ui.label("Content");
                ui.add(
                    egui::TextEdit::multiline(&mut props.text)
                        .desired_rows(4)
                        .desired_width(f32::INFINITY),
                );
            }
            WidgetKind::Image => {
                ui.label("Filename");
                ui.text_edit_singleline(&mut props.text);
            }
            _ => {}
        }
        match node.kind {
            WidgetKind::Checkbox => {
                ui.checkbox(&mut props.checked, "checked");
            }
            WidgetKind::Slider => {
                ui.add(egui::Slider::new(&mut props.value, props.min..=props.max).text("value"));
                ui.add(egui::Slider::new(&mut props.min, -1000.0..=props.max).text("min"));
                ui.add(egui::Slider::new(&mut props.max, props.min..=1000.0).text("max"));
            }
            WidgetKind::ProgressBar => {
                ui.add(egui::Slider::new(&mut props.value, 0.0..=1.0).text("progress"));
            }
            WidgetKind::RadioGroup | WidgetKind::ComboBox | WidgetKind::TabControl => {
                ui.label(if node.kind == WidgetKind::TabControl {
                    "Tabs (one per line)"
                } else {
                    "Items (one per line)"
                });
                let mut buf = props.items.join("\n");
                if ui
                    .add(
                        egui::TextEdit::multiline(&mut buf)
                            .desired_rows(5)
                            .desired_width(f32::INFINITY),
                    )
                    .changed()
                {
                    props.items = buf.lines().map(|s| s.to_string()).collect();
                    if props.selected >= props.items.len() {
                        props.selected = props.items.len().saturating_sub(1);
                    }
                }
                if !props.items.is_empty() {
                    ui.horizontal(|ui| {
                        ui.label(if node.kind == WidgetKind::TabControl {
                            "Active tab"
                        } else {
                            "Selected index"
                        });
                        ui.add(
                            egui::DragValue::new(&mut props.selected)
                                .range(0..=props.items.len().saturating_sub(1)),
                        );
                    });
                }
            }
            _ => {}
        }
        ui.label("Tooltip (optional)");
        ui.text_edit_singleline(&mut props.tooltip);
        ui.checkbox(&mut props.enabled, "enabled");

        if props != node.props
            && let Err(err) = self.designer.set_props(id, props, now)
        {
            self.set_status(format!("Edit rejected: {err}"));
        }

        ui.separator();
        ui.label("Position / Size");
        let mut pos = node.pos;
        let mut size = node.size;
        let min = self.designer.config().min_size;
        ui.horizontal(|ui| {
            ui.label("x");
            ui.add(egui::DragValue::new(&mut pos.x));
            ui.label("y");
            ui.add(egui::DragValue::new(&mut pos.y));
        });
        ui.horizontal(|ui| {
            ui.label("w");
            ui.add(egui::DragValue::new(&mut size.x).range(min..=4000.0));
            ui.label("h");
            ui.add(egui::DragValue::new(&mut size.y).range(min..=4000.0));
        });
        if (pos != node.pos || size != node.size)
            && let Err(err) = self
                .designer
                .set_geometry(id, Rect::from_min_size(pos, size), now)
        {
            self.set_status(format!("Edit rejected: {err}"));
        }

        if node.kind.descriptor().scrollable {
            let mut scroll = node.own_scroll();
            ui.horizontal(|ui| {
                ui.label("scroll");
                ui.add(egui::DragValue::new(&mut scroll.x).range(0.0..=4000.0));
                ui.add(egui::DragValue::new(&mut scroll.y).range(0.0..=4000.0));
            });
            if scroll != node.own_scroll()
                && let Err(err) = self.designer.set_scroll(id, scroll)
            {
                debug!("scroll ignored: {err}");
            }
        }

        ui.add_space(6.0);
        if ui.button("Delete").clicked() {
            self.designer.delete_selected(now);
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed().as_secs() < 3 {
                ui.horizontal(|ui| {
                    ui.label(msg);
                });
            } else {
                self.status_message = None;
            }
        }

        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("New Project").clicked() {
                    self.designer.new_project();
                    self.current_file = None;
                    self.dirty.set(false);
                    self.set_status("New project created".into());
                    ui.close_kind(egui::UiKind::Menu);
                }
                ui.separator();
                if ui.button("Open...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Form Project", &["json"])
                        .pick_file()
                    {
                        self.load_project(path);
                    }
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("Save").on_hover_text("Ctrl+S").clicked() {
                    match self.current_file.clone() {
                        Some(path) => self.save_project(path),
                        None => self.save_dialog(),
                    }
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("Save As...").clicked() {
                    self.save_dialog();
                    ui.close_kind(egui::UiKind::Menu);
                }
            });
            ui.menu_button("Edit", |ui| {
                let stack = self.designer.undo_stack();
                let (can_undo, can_redo) = (stack.can_undo(), stack.can_redo());
                if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                    self.undo();
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                    self.redo();
                    ui.close_kind(egui::UiKind::Menu);
                }
                ui.separator();
                if ui.button("Copy").clicked() {
                    self.designer.copy_selection();
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("Paste").clicked() {
                    if let Err(err) = self.designer.paste(Instant::now()) {
                        self.set_status(format!("Paste failed: {err}"));
                    }
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("Delete").clicked() {
                    self.designer.delete_selected(Instant::now());
                    ui.close_kind(egui::UiKind::Menu);
                }
            });
            ui.menu_button("Arrange", |ui| {
                let now = Instant::now();
                if ui.button("Align Left").clicked() {
                    self.designer.align_left(now);
                }
                if ui.button("Align Right").clicked() {
                    self.designer.align_right(now);
                }
                if ui.button("Align Top").clicked() {
                    self.designer.align_top(now);
                }
                if ui.button("Align Bottom").clicked() {
                    self.designer.align_bottom(now);
                }
                ui.separator();
                if ui.button("Match Width").clicked() {
                    self.designer.match_width(now);
                }
                if ui.button("Match Height").clicked() {
                    self.designer.match_height(now);
                }
            });
            ui.menu_button("View", |ui| {
                ui.checkbox(&mut self.palette_open, "Palette");
                ui.checkbox(&mut self.show_grid, "Grid");
            });
            ui.separator();
            let title = match &self.current_file {
                Some(path) => path.display().to_string(),
                None => "untitled".to_owned(),
            };
            if self.dirty.get() {
                ui.strong(format!("{title} *"));
            } else {
                ui.strong(title);
            }
        });
    }
}

fn paint_children(
    ui: &mut egui::Ui,
    designer: &Designer,
    parent: Option<WidgetId>,
    origin: Pos2,
    clip: Rect,
    actions: &mut Vec<CanvasAction>,
    handles: &mut Vec<(WidgetId, Rect)>,
) {
    let tree = designer.tree();
    let parent_node = parent.and_then(|p| tree.get_node(p));
    let active_tab = parent_node.and_then(ElementNode::active_tab);
    let tabbed = parent_node.is_some_and(ElementNode::is_tabbed);

    for &id in tree.children(parent) {
        let Some(node) = tree.get_node(id) else {
            continue;
        };
        if tabbed && node.from_tab_id.as_deref() != active_tab {
            continue;
        }
        let local = designer
            .drag_engine()
            .preview(id)
            .unwrap_or_else(|| node.rect());
        let rect = local.translate(origin.to_vec2());
        let visible = rect.intersect(clip);
        let selected = designer.selection().contains(id);

        paint_element(ui, node, rect, clip, selected);
        if visible.is_positive() {
            element_interact(ui, node, rect, visible, actions);
        }
        if selected {
            handles.push((id, rect));
        }
        if node.is_container() {
            paint_children(
                ui,
                designer,
                Some(id),
                rect.min - node.own_scroll(),
                visible,
                actions,
                handles,
            );
        }
    }
}

fn paint_element(ui: &egui::Ui, node: &ElementNode, rect: Rect, clip: Rect, selected: bool) {
    let painter = ui.painter().with_clip_rect(clip);
    let font = FontId::proportional(13.0);
    let text_color = if node.props.enabled {
        Color32::from_gray(220)
    } else {
        Color32::from_gray(120)
    };
    let fill = match node.kind {
        WidgetKind::Button => Color32::from_rgb(60, 70, 90),
        WidgetKind::TextEdit | WidgetKind::TextArea | WidgetKind::ComboBox => {
            Color32::from_gray(18)
        }
        WidgetKind::ToolBar => Color32::from_gray(50),
        WidgetKind::Panel | WidgetKind::Group | WidgetKind::ScrollBox | WidgetKind::TabControl => {
            Color32::from_gray(32)
        }
        _ => Color32::TRANSPARENT,
    };
    painter.rect_filled(rect, 4.0, fill);

    match node.kind {
        WidgetKind::Checkbox => {
            let bx = Rect::from_min_size(rect.left_center() - vec2(0.0, 7.0), vec2(14.0, 14.0));
            painter.rect_stroke(bx, 2.0, Stroke::new(1.0, text_color), StrokeKind::Inside);
            if node.props.checked {
                painter.text(bx.center(), Align2::CENTER_CENTER, "✔", font.clone(), text_color);
            }
            painter.text(
                rect.left_center() + vec2(20.0, 0.0),
                Align2::LEFT_CENTER,
                &node.props.text,
                font,
                text_color,
            );
        }
        WidgetKind::Slider | WidgetKind::ProgressBar => {
            let span = (node.props.max - node.props.min).max(f32::EPSILON);
            let t = match node.kind {
                WidgetKind::ProgressBar => node.props.value.clamp(0.0, 1.0),
                _ => ((node.props.value - node.props.min) / span).clamp(0.0, 1.0),
            };
            let track = Rect::from_center_size(rect.center(), vec2(rect.width() - 8.0, 6.0));
            painter.rect_filled(track, 3.0, Color32::from_gray(60));
            let done = Rect::from_min_size(track.min, vec2(track.width() * t, track.height()));
            painter.rect_filled(done, 3.0, Color32::from_rgb(100, 160, 255));
        }
        WidgetKind::Separator => {
            painter.line_segment(
                [rect.left_center(), rect.right_center()],
                Stroke::new(1.0, Color32::from_gray(110)),
            );
        }
        WidgetKind::RadioGroup => {
            for (i, item) in node.props.items.iter().enumerate() {
                let y = rect.top() + 12.0 + i as f32 * 20.0;
                let dot = if i == node.props.selected { "◉" } else { "○" };
                painter.text(
                    pos2(rect.left() + 4.0, y),
                    Align2::LEFT_CENTER,
                    format!("{dot} {item}"),
                    font.clone(),
                    text_color,
                );
            }
        }
        WidgetKind::ComboBox => {
            let current = node
                .props
                .items
                .get(node.props.selected)
                .map(String::as_str)
                .unwrap_or_default();
            painter.text(
                rect.left_center() + vec2(6.0, 0.0),
                Align2::LEFT_CENTER,
                format!("{current} ⏷"),
                font,
                text_color,
            );
        }
        WidgetKind::Image => {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                format!("🖼 {}", node.props.text),
                font,
                text_color,
            );
        }
        WidgetKind::TabControl => {
            let mut x = rect.left();
            for (i, tab) in node.props.items.iter().enumerate() {
                let header = tab_header_rect(rect, x, tab);
                let fill = if i == node.props.selected.min(node.props.items.len() - 1) {
                    Color32::from_gray(70)
                } else {
                    Color32::from_gray(45)
                };
                painter.rect_filled(header, 2.0, fill);
                painter.text(header.center(), Align2::CENTER_CENTER, tab, font.clone(), text_color);
                x = header.right() + 2.0;
            }
        }
        WidgetKind::Group => {
            painter.text(
                rect.left_top() + vec2(6.0, 4.0),
                Align2::LEFT_TOP,
                &node.props.text,
                font,
                text_color,
            );
        }
        WidgetKind::Button => {
            painter.text(rect.center(), Align2::CENTER_CENTER, &node.props.text, font, text_color);
        }
        _ => {
            painter.text(
                rect.left_center() + vec2(4.0, 0.0),
                Align2::LEFT_CENTER,
                &node.props.text,
                font,
                text_color,
            );
        }
    }

    let stroke = if selected {
        Stroke::new(2.0, Color32::LIGHT_BLUE)
    } else {
        Stroke::new(1.0, Color32::from_gray(90))
    };
    painter.rect_stroke(rect, CornerRadius::same(4), stroke, StrokeKind::Inside);
}

fn tab_header_rect(control: Rect, x: f32, tab: &str) -> Rect {
    let width = 16.0 + tab.chars().count() as f32 * 7.0;
    Rect::from_min_size(pos2(x, control.top()), vec2(width, TAB_STRIP_HEIGHT))
}

fn element_interact(
    ui: &mut egui::Ui,
    node: &ElementNode,
    rect: Rect,
    visible: Rect,
    actions: &mut Vec<CanvasAction>,
) {
    let resp = ui.interact(visible, Id::new(("element", node.id)), Sense::click_and_drag());
    if resp.hovered() {
        ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
    }
    if resp.clicked() {
        let toggle = ui.input(|i| i.modifiers.shift);
        actions.push(CanvasAction::Select { id: node.id, toggle });
    }
    if resp.drag_started()
        && let Some(event) = pointer_event(ui, &resp)
    {
        actions.push(CanvasAction::BeginDrag {
            id: node.id,
            kind: DragKind::Move,
            event,
        });
    }

    if node.is_tabbed() {
        let mut x = rect.left();
        for (index, tab) in node.props.items.iter().enumerate() {
            let header = tab_header_rect(rect, x, tab);
            x = header.right() + 2.0;
            let hit = header.intersect(visible);
            if !hit.is_positive() {
                continue;
            }
            let id = Id::new(("tab", node.id, index));
            if ui.interact(hit, id, Sense::click()).clicked() {
                actions.push(CanvasAction::SelectTab { id: node.id, index });
            }
        }
    }

    if node.kind.descriptor().scrollable && ui.rect_contains_pointer(visible) {
        let delta = ui.input(|i| i.smooth_scroll_delta);
        if delta != Vec2::ZERO {
            let offset = (node.own_scroll() - delta).max(Vec2::ZERO);
            actions.push(CanvasAction::Scroll { id: node.id, offset });
        }
    }
}

fn resize_handles_ui(ui: &mut egui::Ui, id: WidgetId, rect: Rect, actions: &mut Vec<CanvasAction>) {
    for handle in ResizeHandle::ALL {
        let square = Rect::from_center_size(handle.anchor(rect), Vec2::splat(HANDLE_SIZE));
        let resp = ui.interact(square, Id::new(("resize", id, handle.signs())), Sense::drag());
        if resp.hovered() || resp.dragged() {
            ui.ctx().set_cursor_icon(match handle.signs() {
                (0, _) => egui::CursorIcon::ResizeVertical,
                (_, 0) => egui::CursorIcon::ResizeHorizontal,
                (sx, sy) if sx == sy => egui::CursorIcon::ResizeNwSe,
                _ => egui::CursorIcon::ResizeNeSw,
            });
        }
        if resp.drag_started()
            && let Some(event) = pointer_event(ui, &resp)
        {
            actions.push(CanvasAction::BeginDrag {
                id,
                kind: DragKind::Resize(handle),
                event,
            });
        }
        ui.painter()
            .rect_filled(square, 1.0, Color32::from_rgb(100, 160, 255));
    }
}

/// Pointer-down that started a drag, in root frame coordinates.
fn pointer_event(ui: &egui::Ui, resp: &egui::Response) -> Option<PointerEvent> {
    let origin = ui.input(|i| i.pointer.press_origin())?;
    let button = if resp.dragged_by(PointerButton::Primary) {
        PointerButton::Primary
    } else {
        PointerButton::Secondary
    };
    let canvas = ui.ctx().data(|d| d.get_temp::<Pos2>(Id::new("canvas_origin")))?;
    Some(PointerEvent {
        pos: (origin - canvas).to_pos2(),
        button,
    })
}

/// Keyboard shortcuts pressed this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Shortcuts {
    undo: bool,
    redo: bool,
    delete: bool,
    copy: bool,
    paste: bool,
    save: bool,
    nudge: Vec2,
}

impl Shortcuts {
    fn read(i: &egui::InputState) -> Self {
        let cmd = i.modifiers.command;
        // Arrow keys for nudging
        let mut nudge = Vec2::ZERO;
        if i.key_pressed(egui::Key::ArrowUp) {
            nudge.y -= 1.0;
        }
        if i.key_pressed(egui::Key::ArrowDown) {
            nudge.y += 1.0;
        }
        if i.key_pressed(egui::Key::ArrowLeft) {
            nudge.x -= 1.0;
        }
        if i.key_pressed(egui::Key::ArrowRight) {
            nudge.x += 1.0;
        }
        Self {
            undo: cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
            redo: cmd
                && (i.key_pressed(egui::Key::Y) || (i.modifiers.shift && i.key_pressed(egui::Key::Z))),
            delete: i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
            copy: cmd && i.key_pressed(egui::Key::C),
            paste: cmd && i.key_pressed(egui::Key::V),
            save: cmd && i.key_pressed(egui::Key::S),
            nudge,
        }
    }

    /// While a text field has focus only Save reaches the designer; the field
    /// keeps its own undo, editing and clipboard keys.
    fn outside_text_fields(self, typing: bool) -> Self {
        if typing {
            Self {
                save: self.save,
                ..Self::default()
            }
        } else {
            self
        }
    }
}

impl eframe::App for FormDesignerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.designer.tick(now);
        self.pump_drag(ctx, now);

        let keys = ctx
            .input(Shortcuts::read)
            .outside_text_fields(ctx.wants_keyboard_input());

        if keys.save {
            match self.current_file.clone() {
                Some(path) => self.save_project(path),
                None => self.save_dialog(),
            }
        }
        if keys.undo {
            self.undo();
        }
        if keys.redo {
            self.redo();
        }
        if keys.delete && !self.designer.selection().is_empty() {
            self.designer.delete_selected(now);
        }
        if keys.nudge != Vec2::ZERO && !self.designer.drag_engine().is_active() {
            let step = self.designer.config().grid_size.max(1.0);
            self.designer.nudge_selected(keys.nudge * step, now);
        }
        if keys.copy {
            self.designer.copy_selection();
        }
        if keys.paste && let Err(err) = self.designer.paste(now) {
            self.set_status(format!("Paste failed: {err}"));
        }

        egui::TopBottomPanel::top("menubar").show(ctx, |ui| self.top_bar(ui));
        if self.palette_open {
            egui::SidePanel::left("palette")
                .resizable(true)
                .default_width(220.0)
                .show(ctx, |ui| self.palette_ui(ui));
        }
        egui::SidePanel::right("inspector")
            .default_width(260.0)
            .show(ctx, |ui| self.inspector_ui(ui));

        self.canvas_ui(ctx);

        if self.spawning.is_some() {
            ctx.set_cursor_icon(egui::CursorIcon::Grabbing);
        }
        if self.designer.drag_engine().is_active() {
            ctx.request_repaint();
        }
        if let Some(deadline) = self.designer.undo_stack().deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_pressed() -> Shortcuts {
        Shortcuts {
            undo: true,
            redo: true,
            delete: true,
            copy: true,
            paste: true,
            save: true,
            nudge: vec2(1.0, 0.0),
        }
    }

    #[test]
    fn test_typing_keeps_history_keys_in_the_text_field() {
        let keys = all_pressed().outside_text_fields(true);
        assert!(!keys.undo);
        assert!(!keys.redo);
        assert!(!keys.delete);
        assert!(!keys.copy);
        assert!(!keys.paste);
        assert_eq!(keys.nudge, Vec2::ZERO);
        assert!(keys.save);
    }

    #[test]
    fn test_shortcuts_pass_through_on_the_canvas() {
        assert_eq!(all_pressed().outside_text_fields(false), all_pressed());
    }
}
