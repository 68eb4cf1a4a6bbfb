use std::io;
use std::mem;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, List, ListItem, ListState, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use crate::board::TaskBoard;
use crate::confirm::Confirm;
use crate::content_parser::{DueDateError, parse_due, parse_entry};
use crate::export::{DateFormats, ExportFormat, exporter_for, write_rows};
use crate::storage::KeyValueStore;
use crate::task::{Status, Task, TaskId};

const HELP: &str = " a add  ←/→ column  ↑/↓ select  p pending  s start  c complete  \
                    e edit  space highlight  d delete  v availability  x export  X clear all  q quit";

/// Asks on the bottom row of the terminal. Only `y` accepts.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        let row = terminal::size().map(|(_, h)| h.saturating_sub(1)).unwrap_or(0);
        let mut stdout = io::stdout();
        let shown = execute!(
            stdout,
            MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            Print(format!(" {prompt} [y/N] "))
        );
        if let Err(e) = shown {
            tracing::warn!("couldn't show confirmation: {e}");
            return false;
        }
        loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    return matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("couldn't read confirmation: {e}");
                    return false;
                }
            }
        }
    }
}

pub struct ExportTarget {
    pub format: ExportFormat,
    pub sheet_name: String,
    pub path: PathBuf,
}

enum Mode {
    Normal,
    Adding(AddForm),
    Editing(TaskId),
}

#[derive(Default)]
struct AddForm {
    text: String,
    due: String,
    on_due: bool,
}

impl AddForm {
    fn field_mut(&mut self) -> &mut String {
        if self.on_due { &mut self.due } else { &mut self.text }
    }
}

pub struct App<S> {
    board: TaskBoard<S, TerminalConfirm>,
    formats: DateFormats,
    export: ExportTarget,
    column: Status,
    /// Selected row per column.
    selected: [usize; 3],
    mode: Mode,
    message: Option<String>,
    /// The confirmation prompt draws outside ratatui's buffer.
    redraw: bool,
    exit: bool,
}

pub async fn run<S: KeyValueStore>(
    board: TaskBoard<S, TerminalConfirm>,
    formats: DateFormats,
    export: ExportTarget,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = App::new(board, formats, export).run(&mut terminal).await;
    ratatui::restore();
    result
}

/// Text of the overdue banner, shown only when something is overdue.
pub fn banner_text(overdue: usize) -> Option<String> {
    match overdue {
        0 => None,
        1 => Some("You have 1 overdue task. Don't forget to complete them.".to_string()),
        n => Some(format!(
            "You have {n} overdue tasks. Don't forget to complete them."
        )),
    }
}

impl<S: KeyValueStore> App<S> {
    pub fn new(
        board: TaskBoard<S, TerminalConfirm>,
        formats: DateFormats,
        export: ExportTarget,
    ) -> Self {
        App {
            board,
            formats,
            export,
            column: Status::Pending,
            selected: [0; 3],
            mode: Mode::Normal,
            message: None,
            redraw: false,
            exit: false,
        }
    }

    async fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.exit {
            if mem::take(&mut self.redraw) {
                terminal.clear()?;
            }
            terminal.draw(|frame| self.render(frame))?;
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key).await;
                }
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        self.message = None;
        match mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.handle_normal(key).await,
            Mode::Adding(form) => self.handle_adding(form, key).await,
            Mode::Editing(id) => self.handle_editing(id, key).await,
        }
        self.clamp_selection();
    }

    async fn handle_normal(&mut self, key: KeyEvent) {
        let col = self.column.index();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.exit = true,
            KeyCode::Left | KeyCode::Char('h') => self.column = Status::ALL[col.saturating_sub(1)],
            KeyCode::Right | KeyCode::Char('l') => self.column = Status::ALL[(col + 1).min(2)],
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected[col] = self.selected[col].saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.board.sections().get(self.column).len();
                if self.selected[col] + 1 < len {
                    self.selected[col] += 1;
                }
            }
            KeyCode::Char('a') | KeyCode::Char('n') => self.mode = Mode::Adding(AddForm::default()),
            KeyCode::Char('p') => self.move_selected(Status::Pending).await,
            KeyCode::Char('s') => self.move_selected(Status::InProgress).await,
            KeyCode::Char('c') => self.move_selected(Status::Completed).await,
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(id) = self.selected_task() {
                    if self.board.start_edit(id) {
                        self.mode = Mode::Editing(id);
                    }
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('*') => {
                if let Some(id) = self.selected_task() {
                    self.board.toggle_highlight(id).await;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_task() {
                    self.board.delete_task(id).await;
                }
            }
            KeyCode::Char('X') => {
                self.board.clear_all().await;
                self.message = Some("Cleared all tasks".to_string());
            }
            KeyCode::Char('v') => {
                self.board.toggle_availability().await;
            }
            KeyCode::Char('x') => self.export(),
            _ => {}
        }
    }

    async fn handle_adding(&mut self, mut form: AddForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Tab | KeyCode::BackTab => form.on_due = !form.on_due,
            KeyCode::Backspace => {
                form.field_mut().pop();
            }
            KeyCode::Char(c) => form.field_mut().push(c),
            KeyCode::Enter => match self.submit(&form).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => self.message = Some(e.to_string()),
            },
            _ => {}
        }
        self.mode = Mode::Adding(form);
    }

    /// Adds the task in the form. `Ok(false)` when the text is blank.
    async fn submit(&mut self, form: &AddForm) -> std::result::Result<bool, DueDateError> {
        let entry = parse_entry(&form.text);
        let due = if form.due.trim().is_empty() {
            entry.due
        } else {
            Some(parse_due(&form.due)?)
        };
        match self.board.add_task(&entry.text, due).await {
            Some(_) => {
                self.column = Status::Pending;
                self.selected[Status::Pending.index()] = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn handle_editing(&mut self, id: TaskId, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.board.save_edit(id).await;
            }
            KeyCode::Esc => {
                self.board.cancel_edit(id);
            }
            KeyCode::Backspace => {
                let mut draft = self.board.draft(id).unwrap_or_default().to_string();
                draft.pop();
                self.board.change_draft(id, draft);
            }
            KeyCode::Char(c) => {
                let mut draft = self.board.draft(id).unwrap_or_default().to_string();
                draft.push(c);
                self.board.change_draft(id, draft);
            }
            _ => {}
        }
        if self.board.is_editing(id) {
            self.mode = Mode::Editing(id);
        }
    }

    async fn move_selected(&mut self, status: Status) {
        let Some(id) = self.selected_task() else {
            return;
        };
        let offered = self
            .board
            .task(id)
            .is_some_and(|t| t.status.moves().contains(&status));
        if !offered {
            return;
        }
        if status == Status::Completed {
            self.redraw = true;
        }
        if self.board.set_status(id, status).await {
            self.message = Some(format!("Moved to {status}"));
        }
    }

    fn export(&mut self) {
        let rows = self.board.export_rows(&self.formats);
        let exporter = exporter_for(self.export.format, &self.export.sheet_name);
        self.message = Some(match write_rows(exporter.as_ref(), &rows, &self.export.path) {
            Ok(path) => format!("Exported {} tasks to {}", rows.len(), path.display()),
            Err(e) => {
                tracing::warn!("export failed: {e}");
                format!("Export failed: {e}")
            }
        });
    }

    fn selected_task(&self) -> Option<TaskId> {
        let sections = self.board.sections();
        sections
            .get(self.column)
            .get(self.selected[self.column.index()])
            .map(|t| t.id)
    }

    fn clamp_selection(&mut self) {
        let sections = self.board.sections();
        for (status, tasks) in sections.iter() {
            let i = &mut self.selected[status.index()];
            *i = (*i).min(tasks.len().saturating_sub(1));
        }
    }

    fn render(&self, frame: &mut Frame) {
        let banner = banner_text(self.board.overdue_count());
        let [header, banner_area, columns, bar, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(if banner.is_some() { 1 } else { 0 }),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(self.header_line(), header);
        if let Some(text) = banner {
            frame.render_widget(
                Paragraph::new(format!(" {text}")).style(Style::new().fg(Color::Black).bg(Color::Yellow)),
                banner_area,
            );
        }
        self.render_columns(frame, columns);
        frame.render_widget(self.bar_line(), bar);
        frame.render_widget(self.status_line(), status);
    }

    fn render_columns(&self, frame: &mut Frame, area: Rect) {
        let areas: [Rect; 3] = Layout::horizontal([Constraint::Ratio(1, 3); 3]).areas(area);
        let now = Utc::now();
        let sections = self.board.sections();

        for (status, tasks) in sections.iter() {
            let i = status.index();
            let focused = status == self.column;
            let border = if focused {
                Style::new().fg(Color::Cyan)
            } else {
                Style::new().fg(Color::DarkGray)
            };
            let block = Block::bordered()
                .title(format!(" {} ({}) ", status.label(), tasks.len()))
                .border_style(border);
            let items: Vec<ListItem> = tasks.iter().map(|t| self.card(t, now)).collect();
            let list = List::new(items)
                .block(block)
                .highlight_symbol("> ")
                .highlight_style(Style::new().add_modifier(Modifier::REVERSED));

            let selected = (focused && !tasks.is_empty()).then_some(self.selected[i]);
            let mut state = ListState::default().with_selected(selected);
            frame.render_stateful_widget(list, areas[i], &mut state);
        }
    }

    fn card(&self, task: &Task, now: DateTime<Utc>) -> ListItem<'static> {
        let overdue = task.is_overdue_at(now);
        let style = card_style(overdue, task.highlighted);

        let text = match self.board.draft(task.id) {
            Some(draft) => Line::from(vec!["✎ ".cyan(), Span::raw(draft.to_string()), "▏".cyan()]),
            None => Line::styled(task.text.clone(), style),
        };

        let mut chips = Vec::new();
        if let Some(due) = task.due {
            chips.push(Span::raw(format!("Due: {} ", due.format(&self.formats.date))).dark_gray());
        }
        if overdue {
            chips.push(" Overdue ".white().on_red());
            chips.push(Span::raw(" "));
        }
        if task.highlighted {
            chips.push(" Highlighted ".black().on_cyan());
        }

        ListItem::new(vec![text, Line::from(chips)])
    }

    fn header_line(&self) -> Line<'static> {
        let availability = if self.board.is_available() {
            "You are available".green()
        } else {
            "You are not available".dark_gray()
        };
        Line::from(vec![" Task Manager".bold(), "  ·  ".dark_gray(), availability])
    }

    fn bar_line(&self) -> Line<'static> {
        match &self.mode {
            Mode::Normal => Line::from(HELP).dark_gray(),
            Mode::Editing(_) => Line::from(" Enter save  Esc cancel").dark_gray(),
            Mode::Adding(form) => {
                let focus = Style::new().fg(Color::White).add_modifier(Modifier::UNDERLINED);
                let idle = Style::new().fg(Color::DarkGray);
                let (text_style, due_style) = if form.on_due { (idle, focus) } else { (focus, idle) };
                Line::from(vec![
                    " New task: ".bold(),
                    Span::styled(form.text.clone(), text_style),
                    "   Due (YYYY-MM-DD): ".bold(),
                    Span::styled(form.due.clone(), due_style),
                    "   Tab switch  Enter add  Esc cancel".dark_gray(),
                ])
            }
        }
    }

    fn status_line(&self) -> Line<'static> {
        if let Some(err) = self.board.persist_error() {
            Line::from(format!(" Not saved: {err}")).red()
        } else if let Some(message) = &self.message {
            Line::from(format!(" {message}"))
        } else {
            Line::default()
        }
    }
}

/// Overdue text stays red; a highlight adds weight and a backdrop.
fn card_style(overdue: bool, highlighted: bool) -> Style {
    let mut style = Style::new();
    if highlighted {
        style = style
            .fg(Color::Yellow)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD);
    }
    if overdue {
        style = style.fg(Color::Red);
    }
    style
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::storage::MemoryStore;

    async fn app(dir: &std::path::Path) -> App<MemoryStore> {
        let board = TaskBoard::load(MemoryStore::default(), TerminalConfirm).await;
        let formats = DateFormats::new("%Y-%m-%d", "%Y-%m-%d %H:%M").unwrap();
        let export = ExportTarget {
            format: ExportFormat::Csv,
            sheet_name: "Tasks".to_string(),
            path: dir.join("tasks.csv"),
        };
        App::new(board, formats, export)
    }

    async fn press(app: &mut App<MemoryStore>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).await;
    }

    async fn type_str(app: &mut App<MemoryStore>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c)).await;
        }
    }

    fn screen(app: &App<MemoryStore>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_banner_text() {
        assert_eq!(banner_text(0), None);
        assert_eq!(
            banner_text(1).unwrap(),
            "You have 1 overdue task. Don't forget to complete them."
        );
        assert!(banner_text(3).unwrap().starts_with("You have 3 overdue tasks."));
    }

    #[tokio::test]
    async fn test_add_with_due_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;

        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "Buy milk").await;
        press(&mut app, KeyCode::Tab).await;
        type_str(&mut app, "2024-01-01").await;
        press(&mut app, KeyCode::Enter).await;

        assert!(matches!(app.mode, Mode::Normal));
        let task = &app.board.tasks()[0];
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.due, chrono::NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[tokio::test]
    async fn test_bad_due_date_keeps_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;

        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "Later").await;
        press(&mut app, KeyCode::Tab).await;
        type_str(&mut app, "2024-13-01").await;
        press(&mut app, KeyCode::Enter).await;

        assert!(matches!(app.mode, Mode::Adding(_)));
        assert!(app.board.tasks().is_empty());
        assert!(app.message.as_deref().unwrap().contains("not a date"));
    }

    #[tokio::test]
    async fn test_blank_add_keeps_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;

        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "   ").await;
        press(&mut app, KeyCode::Enter).await;
        assert!(matches!(app.mode, Mode::Adding(_)));
        press(&mut app, KeyCode::Esc).await;
        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.board.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_card_actions() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;

        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "[2024-02-01] Write report").await;
        press(&mut app, KeyCode::Enter).await;
        let id = app.board.tasks()[0].id;
        assert_eq!(app.board.tasks()[0].text, "Write report");

        press(&mut app, KeyCode::Char(' ')).await;
        assert!(app.board.task(id).unwrap().highlighted);

        press(&mut app, KeyCode::Char('s')).await;
        assert_eq!(app.board.task(id).unwrap().status, Status::InProgress);
        // Starting is only offered from Pending.
        press(&mut app, KeyCode::Right).await;
        press(&mut app, KeyCode::Char('s')).await;
        assert_eq!(app.board.task(id).unwrap().status, Status::InProgress);

        press(&mut app, KeyCode::Char('e')).await;
        assert!(matches!(app.mode, Mode::Editing(_)));
        type_str(&mut app, " v2").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.board.task(id).unwrap().text, "Write report v2");
        assert!(!app.board.is_editing(id));

        press(&mut app, KeyCode::Char('p')).await;
        assert_eq!(app.board.task(id).unwrap().status, Status::Pending);

        press(&mut app, KeyCode::Left).await;
        press(&mut app, KeyCode::Char('d')).await;
        assert!(app.board.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_escape_cancels_edit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "Keep me").await;
        press(&mut app, KeyCode::Enter).await;

        press(&mut app, KeyCode::Char('e')).await;
        press(&mut app, KeyCode::Backspace).await;
        press(&mut app, KeyCode::Esc).await;
        assert_eq!(app.board.tasks()[0].text, "Keep me");
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[tokio::test]
    async fn test_export_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "Export me").await;
        press(&mut app, KeyCode::Enter).await;

        press(&mut app, KeyCode::Char('x')).await;
        assert!(app.message.as_deref().unwrap().starts_with("Exported 1 tasks"));
        let csv = std::fs::read_to_string(dir.path().join("tasks.csv")).unwrap();
        assert!(csv.contains("Export me,Pending"));

        press(&mut app, KeyCode::Char('X')).await;
        assert!(app.board.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_render_board() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path()).await;
        press(&mut app, KeyCode::Char('a')).await;
        type_str(&mut app, "[2000-01-01] Renew passport").await;
        press(&mut app, KeyCode::Enter).await;

        let shown = screen(&app);
        assert!(shown.contains("Task Manager"));
        assert!(shown.contains("You are available"));
        assert!(shown.contains("You have 1 overdue task."));
        assert!(shown.contains("Pending (1)"));
        assert!(shown.contains("In Progress (0)"));
        assert!(shown.contains("Renew passport"));
        assert!(shown.contains("Overdue"));

        press(&mut app, KeyCode::Char('v')).await;
        assert!(screen(&app).contains("You are not available"));
    }

    #[test]
    fn test_overdue_highlighted_card_stays_red() {
        let both = card_style(true, true);
        assert_eq!(both.fg, Some(Color::Red));
        assert_eq!(both.bg, Some(Color::DarkGray));
        assert!(both.add_modifier.contains(Modifier::BOLD));

        assert_eq!(card_style(false, true).fg, Some(Color::Yellow));
        assert_eq!(card_style(true, false).fg, Some(Color::Red));
        assert_eq!(card_style(false, false), Style::new());
    }
}
