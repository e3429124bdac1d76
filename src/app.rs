//! Dashboard state and the single event-driven transition function
//!
//! Every change to the tree, viewport, menu or logs view happens inside
//! [`App::update`], one event at a time. Work that has to touch the
//! runtime is returned as [`Command`]s for the terminal loop to launch.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::actions::{menu_for, menu_title, Action, MenuCommand, MenuItem, Target};
use crate::error::Result;
use crate::runtime::ContainerRecord;
use crate::tree::Tree;
use crate::viewport::Viewport;

/// Rows the logs view spends on its title and footer.
const LOG_CHROME_ROWS: u16 = 4;

#[derive(Debug)]
pub enum AppEvent {
    Tick,
    Containers(Result<Vec<ContainerRecord>>),
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    ActionCompleted { label: String, failures: Vec<String> },
    LogsLoaded { name: String, result: Result<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    FetchContainers,
    RunAction(Action),
    FetchLogs(Target),
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Tree,
    Menu,
    Logs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MenuState {
    pub title: String,
    pub items: Vec<MenuItem>,
    pub selected: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogView {
    pub name: String,
    pub lines: Vec<String>,
    pub scroll: usize,
}

impl LogView {
    fn new(name: String, text: &str) -> Self {
        Self {
            name,
            lines: text.lines().map(str::to_string).collect(),
            scroll: 0,
        }
    }

    fn max_scroll(&self, height: usize) -> usize {
        self.lines.len().saturating_sub(height)
    }

    fn scroll_by(&mut self, delta: isize, height: usize) {
        let target = self.scroll as isize + delta;
        self.scroll = target.clamp(0, self.max_scroll(height) as isize) as usize;
    }

    /// Line indices visible in a window of `height` rows.
    pub fn visible_range(&self, height: usize) -> std::ops::Range<usize> {
        let start = self.scroll.min(self.lines.len());
        start..(start + height).min(self.lines.len())
    }
}

#[derive(Debug)]
pub struct App {
    pub tree: Tree,
    pub viewport: Viewport,
    /// Last list failure; cleared by the next successful refresh.
    pub error: Option<String>,
    pub menu: Option<MenuState>,
    pub logs: Option<LogView>,
    pub status_note: Option<String>,
    pub terminal_rows: u16,
}

impl App {
    pub fn new(terminal_rows: u16) -> Self {
        Self {
            tree: Tree::default(),
            viewport: Viewport::new(Viewport::for_terminal_rows(terminal_rows)),
            error: None,
            menu: None,
            logs: None,
            status_note: None,
            terminal_rows,
        }
    }

    pub fn mode(&self) -> ViewMode {
        if self.logs.is_some() {
            ViewMode::Logs
        } else if self.menu.is_some() {
            ViewMode::Menu
        } else {
            ViewMode::Tree
        }
    }

    pub fn log_height(&self) -> usize {
        usize::from(self.terminal_rows.saturating_sub(LOG_CHROME_ROWS)).max(1)
    }

    pub fn update(&mut self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::Tick => vec![Command::FetchContainers],
            AppEvent::Containers(Ok(records)) => {
                self.error = None;
                self.tree.rebuild(&records);
                self.adjust_viewport();
                Vec::new()
            }
            AppEvent::Containers(Err(e)) => {
                warn!(error = %e, "refresh failed");
                self.error = Some(e.to_string());
                Vec::new()
            }
            AppEvent::Resize { height, .. } => {
                self.terminal_rows = height;
                self.viewport.set_height(Viewport::for_terminal_rows(height));
                self.adjust_viewport();
                let log_height = self.log_height();
                if let Some(logs) = &mut self.logs {
                    logs.scroll = logs.scroll.min(logs.max_scroll(log_height));
                }
                Vec::new()
            }
            AppEvent::ActionCompleted { label, failures } => {
                if failures.is_empty() {
                    info!(action = %label, "action finished");
                    self.status_note = Some(format!("{label}: done"));
                } else {
                    warn!(action = %label, failed = failures.len(), "action finished with failures");
                    self.status_note = Some(format!("{label}: {} failed ({})", failures.len(), failures.join("; ")));
                }
                Vec::new()
            }
            AppEvent::LogsLoaded { name, result } => {
                match result {
                    Ok(text) => self.logs = Some(LogView::new(name, &text)),
                    Err(e) => self.status_note = Some(e.to_string()),
                }
                Vec::new()
            }
            AppEvent::Key(key) => self.handle_key(key),
        }
    }

    fn adjust_viewport(&mut self) {
        self.viewport.adjust(self.tree.selected_index(), self.tree.len());
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Command::Quit];
        }
        match self.mode() {
            ViewMode::Logs => {
                self.handle_logs_key(key);
                Vec::new()
            }
            ViewMode::Menu => self.handle_menu_key(key),
            ViewMode::Tree => self.handle_tree_key(key),
        }
    }

    fn handle_tree_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let page = self.viewport.height();
        match key.code {
            KeyCode::Char('q') => return vec![Command::Quit],
            KeyCode::Up | KeyCode::Char('k') => self.tree.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.tree.move_down(),
            KeyCode::PageUp => self.tree.page_up(page),
            KeyCode::PageDown => self.tree.page_down(page),
            KeyCode::Home => self.tree.select_first(),
            KeyCode::End => self.tree.select_last(),
            KeyCode::Left | KeyCode::Char('h') => self.tree.collapse_selected(),
            KeyCode::Right | KeyCode::Char('l') => self.tree.expand_selected(),
            KeyCode::Char(' ') => self.tree.toggle_expanded(),
            KeyCode::Enter => self.open_menu(),
            _ => return Vec::new(),
        }
        self.adjust_viewport();
        Vec::new()
    }

    fn open_menu(&mut self) {
        if let Some(id) = self.tree.selected_id() {
            self.menu = Some(MenuState {
                title: menu_title(&self.tree, id),
                items: menu_for(&self.tree, id),
                selected: 0,
            });
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Some(menu) = &mut self.menu else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => menu.selected = menu.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if menu.selected + 1 < menu.items.len() {
                    menu.selected += 1;
                }
            }
            KeyCode::Esc => self.menu = None,
            KeyCode::Enter => {
                let chosen = menu.items.get(menu.selected).cloned();
                self.menu = None;
                if let Some(item) = chosen {
                    let first = match item.command {
                        MenuCommand::Lifecycle(action) => Command::RunAction(action),
                        MenuCommand::ViewLogs(target) => Command::FetchLogs(target),
                    };
                    return vec![first, Command::FetchContainers];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        let height = self.log_height();
        let Some(logs) = &mut self.logs else {
            return;
        };
        let page = height as isize;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.logs = None,
            KeyCode::Up | KeyCode::Char('k') => logs.scroll_by(-1, height),
            KeyCode::Down | KeyCode::Char('j') => logs.scroll_by(1, height),
            KeyCode::PageUp => logs.scroll_by(-page, height),
            KeyCode::PageDown => logs.scroll_by(page, height),
            KeyCode::Char('g') | KeyCode::Home => logs.scroll = 0,
            KeyCode::Char('G') | KeyCode::End => logs.scroll = logs.max_scroll(height),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{LABEL_START, LABEL_STOP, LABEL_VIEW_LOGS};
    use crate::error::{DashboardError, Operation};
    use crate::runtime::fake::record;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn loaded_app(rows: u16) -> App {
        let mut app = App::new(rows);
        app.update(AppEvent::Containers(Ok(vec![
            record("shop_web", "running"),
            record("shop_db", "exited"),
            record("blog_app", "running"),
            record("solo", "running"),
        ])));
        app
    }

    fn selected_name(app: &App) -> Option<String> {
        app.tree.selected_node().map(|n| n.name.clone())
    }

    #[test]
    fn tick_always_requests_a_fetch() {
        let mut app = App::new(24);
        assert_eq!(app.update(AppEvent::Tick), vec![Command::FetchContainers]);
        assert_eq!(app.update(AppEvent::Tick), vec![Command::FetchContainers]);
    }

    #[test]
    fn list_error_is_retained_until_next_success() {
        let mut app = loaded_app(24);
        let before = app.tree.len();

        app.update(AppEvent::Containers(Err(DashboardError::List("socket closed".into()))));
        assert!(app.error.as_deref().is_some_and(|e| e.contains("socket closed")));
        assert_eq!(app.tree.len(), before);

        app.update(AppEvent::Containers(Ok(vec![record("solo", "running")])));
        assert!(app.error.is_none());
        assert_eq!(app.tree.len(), 2);
    }

    #[test]
    fn navigation_keeps_selection_in_viewport() {
        // 7 terminal rows leave 2 for the tree
        let mut app = loaded_app(7);
        assert_eq!(app.viewport.height(), 2);

        for _ in 0..4 {
            app.update(key(KeyCode::Down));
        }
        assert_eq!(app.tree.selected_index(), 4);
        assert_eq!(app.viewport.top(), 3);

        app.update(key(KeyCode::Home));
        assert_eq!(app.viewport.top(), 0);
        app.update(key(KeyCode::End));
        assert_eq!(app.tree.selected_index(), app.tree.len() - 1);
        assert_eq!(app.viewport.top(), app.tree.len() - 2);
        app.update(key(KeyCode::PageUp));
        assert_eq!(app.tree.selected_index(), app.tree.len() - 3);
    }

    #[test]
    fn collapse_expand_and_toggle() {
        let mut app = loaded_app(24);
        app.update(key(KeyCode::Char('j')));
        app.update(key(KeyCode::Char('j')));
        assert_eq!(selected_name(&app).as_deref(), Some("shop"));

        app.update(key(KeyCode::Left));
        assert_eq!(app.tree.len(), 5);
        app.update(key(KeyCode::Char('h')));
        assert_eq!(app.tree.len(), 5);
        app.update(key(KeyCode::Char('l')));
        assert_eq!(app.tree.len(), 7);
        app.update(key(KeyCode::Char(' ')));
        assert_eq!(app.tree.len(), 5);
    }

    #[test]
    fn resize_shrinks_viewport_around_selection() {
        let mut app = loaded_app(24);
        app.update(key(KeyCode::End));
        app.update(AppEvent::Resize { width: 80, height: 6 });
        assert_eq!(app.viewport.height(), 1);
        assert_eq!(app.viewport.top(), app.tree.selected_index());
    }

    #[test]
    fn quit_keys() {
        let mut app = loaded_app(24);
        assert_eq!(app.update(key(KeyCode::Char('q'))), vec![Command::Quit]);
        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        app.update(key(KeyCode::Enter));
        assert_eq!(app.update(ctrl_c), vec![Command::Quit]);
    }

    #[test]
    fn menu_executes_action_then_refreshes() {
        let mut app = loaded_app(24);
        // blog, blog_app, shop, shop_db
        for _ in 0..3 {
            app.update(key(KeyCode::Down));
        }
        app.update(key(KeyCode::Enter));
        assert_eq!(app.mode(), ViewMode::Menu);
        let menu = app.menu.as_ref().unwrap();
        assert_eq!(menu.title, "Actions for container: shop_db");
        assert_eq!(menu.items[0].label, LABEL_START);

        let commands = app.update(key(KeyCode::Enter));

        assert_eq!(app.mode(), ViewMode::Tree);
        assert_eq!(commands.len(), 2);
        match &commands[0] {
            Command::RunAction(action) => {
                assert_eq!(action.op, Operation::Start);
                assert_eq!(action.targets[0].id, "id-shop_db");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(commands[1], Command::FetchContainers);
    }

    #[test]
    fn menu_navigation_is_clamped_and_escape_closes() {
        let mut app = loaded_app(24);
        app.update(key(KeyCode::Down));
        app.update(key(KeyCode::Enter));
        app.update(key(KeyCode::Up));
        assert_eq!(app.menu.as_ref().unwrap().selected, 0);
        app.update(key(KeyCode::Down));
        assert_eq!(app.menu.as_ref().unwrap().items[1].label, LABEL_STOP);
        for _ in 0..10 {
            app.update(key(KeyCode::Down));
        }
        let menu = app.menu.as_ref().unwrap();
        assert_eq!(menu.items[menu.selected].label, LABEL_VIEW_LOGS);

        // q is not a menu key
        assert!(app.update(key(KeyCode::Char('q'))).is_empty());
        app.update(key(KeyCode::Esc));
        assert_eq!(app.mode(), ViewMode::Tree);
        assert_eq!(selected_name(&app).as_deref(), Some("blog_app"));
    }

    #[test]
    fn view_logs_flow() {
        let mut app = loaded_app(8);
        app.update(key(KeyCode::Down));
        app.update(key(KeyCode::Enter));
        for _ in 0..3 {
            app.update(key(KeyCode::Down));
        }
        let commands = app.update(key(KeyCode::Enter));
        assert!(matches!(&commands[0], Command::FetchLogs(t) if t.name == "blog_app"));

        let text: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        app.update(AppEvent::LogsLoaded { name: "blog_app".into(), result: Ok(text) });
        assert_eq!(app.mode(), ViewMode::Logs);
        let height = app.log_height();
        assert_eq!(height, 4);

        app.update(key(KeyCode::Char('G')));
        assert_eq!(app.logs.as_ref().unwrap().scroll, 6);
        assert_eq!(app.logs.as_ref().unwrap().visible_range(height), 6..10);
        app.update(key(KeyCode::Down));
        assert_eq!(app.logs.as_ref().unwrap().scroll, 6);
        app.update(key(KeyCode::PageUp));
        assert_eq!(app.logs.as_ref().unwrap().scroll, 2);
        app.update(key(KeyCode::Char('g')));
        assert_eq!(app.logs.as_ref().unwrap().scroll, 0);

        app.update(key(KeyCode::Char('q')));
        assert_eq!(app.mode(), ViewMode::Tree);
    }

    #[test]
    fn log_failure_becomes_status_note() {
        let mut app = loaded_app(24);
        app.update(AppEvent::LogsLoaded {
            name: "web".into(),
            result: Err(DashboardError::Logs { container: "web".into(), reason: "gone".into() }),
        });
        assert_eq!(app.mode(), ViewMode::Tree);
        assert!(app.status_note.as_deref().is_some_and(|s| s.contains("gone")));
    }

    #[test]
    fn action_completion_sets_status_note() {
        let mut app = App::new(24);
        app.update(AppEvent::ActionCompleted { label: "Stop All".into(), failures: Vec::new() });
        assert_eq!(app.status_note.as_deref(), Some("Stop All: done"));

        app.update(AppEvent::ActionCompleted {
            label: "Stop All".into(),
            failures: vec!["web: failed to stop id-web: simulated failure".into()],
        });
        assert!(app.status_note.as_deref().is_some_and(|s| s.starts_with("Stop All: 1 failed")));
    }

    #[test]
    fn enter_on_empty_tree_opens_nothing() {
        let mut app = App::new(24);
        assert!(app.update(key(KeyCode::Enter)).is_empty());
        assert_eq!(app.mode(), ViewMode::Tree);
    }
}
