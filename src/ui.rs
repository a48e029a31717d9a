use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::dialog::{DialogState, SubmitOutcome};
use crate::display::{chips, created_label, detail_lines, milestone_status, preview, progress_bar};
use crate::models::{Draft, EntityId, FieldKind, Notice, PlanDraft, PopupMode, PostDraft, ProgressDraft};
use crate::page::{capitalize, CollectionPage};
use crate::session::{open_login_page, Session};
use crate::settings::ClientConfig;

const TAB_TITLES: [&str; 3] = ["Skill Posts", "Progress", "Plans"];

/// Runs `$body` with the current tab's page and list state bound.
macro_rules! with_tab {
    ($app:expr, |$page:ident, $list:ident| $body:expr) => {
        match $app.current_tab {
            0 => {
                #[allow(unused_variables)]
                let ($page, $list) = (&mut $app.posts, &mut $app.post_list_state);
                $body
            }
            1 => {
                #[allow(unused_variables)]
                let ($page, $list) = (&mut $app.progress, &mut $app.progress_list_state);
                $body
            }
            _ => {
                #[allow(unused_variables)]
                let ($page, $list) = (&mut $app.plans, &mut $app.plan_list_state);
                $body
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogAction {
    Stay,
    Submit,
    Close,
}

pub struct App {
    rt: Runtime,
    api: ApiClient,
    config: ClientConfig,
    session: Session,
    pub current_tab: usize,
    pub posts: CollectionPage<PostDraft>,
    pub progress: CollectionPage<ProgressDraft>,
    pub plans: CollectionPage<PlanDraft>,
    pub post_list_state: ListState,
    pub progress_list_state: ListState,
    pub plan_list_state: ListState,
    pub popup_mode: PopupMode,
    pub field_index: usize,
    pub notice: Option<Notice>,
    pub login_pending: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let rt = Runtime::new().context("failed to start async runtime")?;
        let api = ApiClient::new(&config).context("failed to build HTTP client")?;
        let session = rt.block_on(Session::establish(&api, &CancellationToken::new()));

        let mut app = App {
            rt,
            api,
            config,
            session,
            current_tab: 0,
            posts: CollectionPage::new(),
            progress: CollectionPage::new(),
            plans: CollectionPage::new(),
            post_list_state: ListState::default(),
            progress_list_state: ListState::default(),
            plan_list_state: ListState::default(),
            popup_mode: PopupMode::None,
            field_index: 0,
            notice: None,
            login_pending: false,
            should_quit: false,
        };
        app.progress.unmount();
        app.plans.unmount();
        app.reload();
        Ok(app)
    }

    pub fn reload(&mut self) {
        let (rt, api) = (&self.rt, &self.api);
        with_tab!(self, |page, list| load_page(rt, api, page, list));
    }

    fn switch_tab(&mut self, tab: usize) {
        with_tab!(self, |page, list| page.unmount());
        self.current_tab = tab;
        with_tab!(self, |page, list| page.mount());
        self.reload();
    }

    pub fn next_tab(&mut self) {
        self.switch_tab((self.current_tab + 1) % TAB_TITLES.len());
    }

    pub fn previous_tab(&mut self) {
        let tab = if self.current_tab == 0 {
            TAB_TITLES.len() - 1
        } else {
            self.current_tab - 1
        };
        self.switch_tab(tab);
    }

    pub fn next_item(&mut self) {
        with_tab!(self, |page, list| step_selection(list, page.store.len(), true));
    }

    pub fn previous_item(&mut self) {
        with_tab!(self, |page, list| step_selection(list, page.store.len(), false));
    }

    fn dismiss_notices(&mut self) {
        self.notice = None;
        with_tab!(self, |page, list| {
            page.take_notice();
        });
    }

    fn current_notice(&self) -> Option<&Notice> {
        self.notice.as_ref().or_else(|| match self.current_tab {
            0 => self.posts.notice(),
            1 => self.progress.notice(),
            _ => self.plans.notice(),
        })
    }

    fn require_login(&mut self) -> bool {
        if self.session.is_authenticated() {
            return true;
        }
        self.notice = Some(Notice::error("Please log in to continue. Press l to log in."));
        false
    }

    pub fn open_create(&mut self) {
        if !self.require_login() {
            return;
        }
        with_tab!(self, |page, list| page.open_create());
        self.field_index = 0;
        self.popup_mode = PopupMode::Dialog;
    }

    pub fn open_edit(&mut self) {
        if !self.require_login() {
            return;
        }
        let session = &self.session;
        let opened = with_tab!(self, |page, list| match selected_id(page, list) {
            Some(id) => page.open_edit(&id, session),
            None => false,
        });
        if opened {
            self.field_index = 0;
            self.popup_mode = PopupMode::Dialog;
        }
    }

    pub fn ask_delete(&mut self) {
        if !self.require_login() {
            return;
        }
        let session = &self.session;
        let allowed = with_tab!(self, |page, list| can_modify_selected(page, list, session));
        if allowed {
            self.popup_mode = PopupMode::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        let (rt, api, session) = (&self.rt, &self.api, &self.session);
        with_tab!(self, |page, list| delete_selected(rt, api, session, page, list));
        self.popup_mode = PopupMode::None;
    }

    fn selected_title(&self) -> Option<String> {
        fn title<D: Draft>(page: &CollectionPage<D>, list: &ListState) -> Option<String> {
            list.selected()
                .and_then(|i| page.store.at(i))
                .map(|r| r.fields.title().to_string())
        }
        match self.current_tab {
            0 => title(&self.posts, &self.post_list_state),
            1 => title(&self.progress, &self.progress_list_state),
            _ => title(&self.plans, &self.plan_list_state),
        }
    }

    pub fn submit(&mut self) {
        let (rt, api, session) = (&self.rt, &self.api, &self.session);
        let outcome = with_tab!(self, |page, list| submit_dialog(rt, api, session, page, list));
        if outcome == SubmitOutcome::Unauthenticated {
            self.login_pending = true;
        }
        let open = with_tab!(self, |page, list| page.dialog.is_open());
        if !open {
            self.popup_mode = PopupMode::None;
        }
    }

    pub fn close_dialog(&mut self) {
        let closed = with_tab!(self, |page, list| page.dialog.close());
        if closed {
            self.popup_mode = PopupMode::None;
        }
    }

    pub fn login(&mut self) {
        match self.session.viewer() {
            Some(identity) => {
                self.notice = Some(Notice::success(format!("Logged in as {}.", identity.name)));
            }
            None => {
                self.notice = Some(Notice::error("Please log in to continue. Redirecting to the login page..."));
                self.login_pending = true;
            }
        }
    }

    /// Runs after the "please log in" notice has been drawn.
    pub fn finish_login(&mut self) {
        self.login_pending = false;
        self.rt.block_on(tokio::time::sleep(self.config.login_delay));
        let url = self.config.login_url.as_str();
        let message = if open_login_page(url) {
            "After logging in, run: skillsync set session_cookie <VALUE>".to_string()
        } else {
            format!("Open {} to log in, then run: skillsync set session_cookie <VALUE>", url)
        };
        self.notice = Some(Notice::error(message));
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let field_index = &mut self.field_index;
        let action = with_tab!(self, |page, list| handle_dialog_input(page, field_index, key));
        match action {
            DialogAction::Submit => self.submit(),
            DialogAction::Close => self.close_dialog(),
            DialogAction::Stay => {}
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        self.dismiss_notices();
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab | KeyCode::Right => self.next_tab(),
            KeyCode::BackTab | KeyCode::Left => self.previous_tab(),
            KeyCode::Down | KeyCode::Char('j') => self.next_item(),
            KeyCode::Up | KeyCode::Char('k') => self.previous_item(),
            KeyCode::Char('n') => self.open_create(),
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit(),
            KeyCode::Char('d') | KeyCode::Delete => self.ask_delete(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('l') => self.login(),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.popup_mode {
            PopupMode::Dialog => self.handle_dialog_key(key),
            PopupMode::ConfirmDelete => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.popup_mode = PopupMode::None;
                }
                _ => {}
            },
            PopupMode::None => self.handle_normal_key(key),
        }
    }
}

fn load_page<D: Draft>(rt: &Runtime, api: &ApiClient, page: &mut CollectionPage<D>, list: &mut ListState) {
    rt.block_on(page.load(&api.collection::<D>()));
    clamp_selection(list, page.store.len());
}

fn submit_dialog<D: Draft>(
    rt: &Runtime,
    api: &ApiClient,
    session: &Session,
    page: &mut CollectionPage<D>,
    list: &mut ListState,
) -> SubmitOutcome {
    let creating = !page.dialog.is_editing();
    let outcome = rt.block_on(page.submit(&api.collection::<D>(), session));
    if outcome == SubmitOutcome::Saved && creating && !page.store.is_empty() {
        list.select(Some(page.store.len() - 1));
    }
    outcome
}

fn delete_selected<D: Draft>(
    rt: &Runtime,
    api: &ApiClient,
    session: &Session,
    page: &mut CollectionPage<D>,
    list: &mut ListState,
) {
    if let Some(id) = selected_id(page, list) {
        rt.block_on(page.delete(&api.collection::<D>(), &id, session));
        clamp_selection(list, page.store.len());
    }
}

fn selected_id<D: Draft>(page: &CollectionPage<D>, list: &ListState) -> Option<EntityId> {
    list.selected()
        .and_then(|i| page.store.at(i))
        .map(|record| record.id.clone())
}

fn can_modify_selected<D: Draft>(page: &mut CollectionPage<D>, list: &ListState, session: &Session) -> bool {
    match selected_id(page, list) {
        Some(id) => page.ensure_owner(&id, session, "delete"),
        None => false,
    }
}

fn step_selection(state: &mut ListState, len: usize, forward: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) if forward => {
            if i + 1 >= len {
                0
            } else {
                i + 1
            }
        }
        Some(i) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        None => 0,
    };
    state.select(Some(i));
}

fn clamp_selection(state: &mut ListState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        Some(_) => {}
    }
}

fn handle_dialog_input<D: Draft>(
    page: &mut CollectionPage<D>,
    field_index: &mut usize,
    key: KeyEvent,
) -> DialogAction {
    let fields = D::fields();
    let Some(spec) = fields.get(*field_index).copied() else {
        *field_index = 0;
        return DialogAction::Stay;
    };
    let dialog = &mut page.dialog;

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('s') => DialogAction::Submit,
            _ => DialogAction::Stay,
        };
    }

    match key.code {
        KeyCode::Esc => return DialogAction::Close,
        KeyCode::Tab | KeyCode::Down => *field_index = (*field_index + 1) % fields.len(),
        KeyCode::BackTab | KeyCode::Up => {
            *field_index = (*field_index + fields.len() - 1) % fields.len();
        }
        KeyCode::Left | KeyCode::Right => {
            if matches!(spec.kind, FieldKind::Choice | FieldKind::Percent | FieldKind::Toggle) {
                dialog.draft.cycle_field(spec.key, key.code == KeyCode::Right);
            }
        }
        KeyCode::Enter => match spec.kind {
            FieldKind::Tags if !dialog.tag_input.buffer.trim().is_empty() => {
                dialog.add_tag();
            }
            FieldKind::Multiline => {
                if let Some(text) = dialog.draft.field_text_mut(spec.key) {
                    text.push('\n');
                }
            }
            _ => return DialogAction::Submit,
        },
        KeyCode::Backspace => {
            if spec.kind == FieldKind::Tags {
                if dialog.tag_input.buffer.is_empty() {
                    let last = dialog.draft.tags().and_then(|tags| tags.last()).cloned();
                    if let Some(last) = last {
                        dialog.remove_tag(&last);
                    }
                } else {
                    dialog.tag_input.pop();
                }
            } else if let Some(text) = dialog.draft.field_text_mut(spec.key) {
                text.pop();
            }
        }
        KeyCode::Char(c) => {
            // Editing again clears a failed-save notice.
            dialog.dismiss_notice();
            match spec.kind {
                FieldKind::Text | FieldKind::Multiline => {
                    if let Some(text) = dialog.draft.field_text_mut(spec.key) {
                        text.push(c);
                    }
                }
                FieldKind::Tags => dialog.tag_input.push(c),
                FieldKind::Toggle if c == ' ' => dialog.draft.cycle_field(spec.key, true),
                _ => {}
            }
        }
        _ => {}
    }
    DialogAction::Stay
}

pub fn run_tui(config: ClientConfig) -> Result<()> {
    let mut app = App::new(config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.login_pending {
            app.finish_login();
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let titles: Vec<Line> = TAB_TITLES.iter().cloned().map(Line::from).collect();
    let viewer = match app.session.viewer() {
        Some(identity) => format!("SkillSync - {}", identity.name),
        None => "SkillSync - not logged in".to_string(),
    };
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(viewer))
        .select(app.current_tab)
        .style(Style::default().fg(Color::Cyan))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::Black),
        );
    f.render_widget(tabs, chunks[0]);

    let session = &app.session;
    match app.current_tab {
        0 => render_page(f, &app.posts, &mut app.post_list_state, session, chunks[1]),
        1 => render_page(f, &app.progress, &mut app.progress_list_state, session, chunks[1]),
        _ => render_page(f, &app.plans, &mut app.plan_list_state, session, chunks[1]),
    }

    render_status(f, app.current_notice(), chunks[2]);

    match app.popup_mode {
        PopupMode::Dialog => match app.current_tab {
            0 => render_dialog(f, &app.posts, app.field_index),
            1 => render_dialog(f, &app.progress, app.field_index),
            _ => render_dialog(f, &app.plans, app.field_index),
        },
        PopupMode::ConfirmDelete => {
            let title = app.selected_title().unwrap_or_default();
            let popup_area = centered_rect(50, 20, f.area());
            let block = Block::default()
                .title("Confirm Delete")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::DarkGray));
            let content = Paragraph::new(format!("Delete '{}'?\n\ny: Delete\nn / ESC: Cancel", title))
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: false })
                .style(Style::default().fg(Color::White));
            f.render_widget(Clear, popup_area);
            f.render_widget(content, popup_area);
        }
        PopupMode::None => {}
    }
}

// Helper function to create centered rectangles for popups
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

const CONTROLS: &str = "Controls:\n• ↑/↓: Navigate\n• Tab: Switch tab\n• n: New\n• e: Edit (yours)\n• d: Delete (yours)\n• r: Reload\n• l: Log in\n• q: Quit";

fn render_page<D: Draft>(
    f: &mut Frame,
    page: &CollectionPage<D>,
    list_state: &mut ListState,
    session: &Session,
    area: Rect,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);

    let items: Vec<ListItem> = page
        .store
        .iter()
        .map(|record| {
            let mut spans = vec![Span::styled(
                format!("{} ", preview(record.fields.title(), 48)),
                Style::default().fg(Color::White),
            )];
            if let Some(percent) = record.fields.percent() {
                let color = if percent == 100 { Color::Green } else { Color::Yellow };
                spans.push(Span::styled(format!("[{}%] ", percent), Style::default().fg(color)));
            }
            spans.push(Span::styled(
                format!("{} · {}", record.author.name, created_label(record)),
                Style::default().fg(Color::Gray),
            ));
            if let Some(stats) = record.fields.stats() {
                spans.push(Span::styled(format!(" · {}", stats), Style::default().fg(Color::Cyan)));
            }
            if page.can_modify(record, session) {
                spans.push(Span::styled(" [yours]", Style::default().fg(Color::Green)));
            }
            ListItem::new(vec![Line::from(spans)])
        })
        .collect();

    let title = format!("{}s ({})", capitalize(D::NOUN), page.store.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], list_state);

    let selected = list_state.selected().and_then(|i| page.store.at(i));
    let info_text = match selected {
        Some(record) => {
            let mut text = detail_lines(record, chrono::Utc::now()).join("\n");
            text.push_str("\n\n");
            text.push_str(CONTROLS);
            text
        }
        None if page.store.is_empty() => format!("No {}s yet.\n\n{}", D::NOUN, CONTROLS),
        None => format!("No {} selected\n\n{}", D::NOUN, CONTROLS),
    };
    let info = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn notice_style(notice: &Notice) -> Style {
    if notice.is_error() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    }
}

fn render_status(f: &mut Frame, notice: Option<&Notice>, area: Rect) {
    let line = match notice {
        Some(notice) => Line::from(Span::styled(notice.message.clone(), notice_style(notice))),
        None => Line::from(Span::styled(
            "n: New  e: Edit  d: Delete  r: Reload  l: Log in  Tab: Switch  q: Quit",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let status = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn render_dialog<D: Draft>(f: &mut Frame, page: &CollectionPage<D>, field_index: usize) {
    let dialog = &page.dialog;
    let popup_area = centered_rect(70, 80, f.area());
    let title = if dialog.is_editing() {
        format!("Edit {}", capitalize(D::NOUN))
    } else {
        format!("New {}", capitalize(D::NOUN))
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut lines: Vec<Line> = Vec::new();
    for (i, spec) in D::fields().iter().enumerate() {
        let focused = i == field_index;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let cursor = if focused { "_" } else { "" };
        let value = match spec.kind {
            FieldKind::Text | FieldKind::Multiline => {
                format!("{}{}", dialog.draft.field_text(spec.key).replace('\n', " ⏎ "), cursor)
            }
            FieldKind::Choice | FieldKind::Toggle => {
                format!("< {} >", dialog.draft.field_text(spec.key))
            }
            FieldKind::Percent => {
                let bar = dialog.draft.percent().map(progress_bar).unwrap_or_default();
                format!("< {} >", bar)
            }
            FieldKind::Tags => {
                let tags = dialog.draft.tags().map(chips).unwrap_or_default();
                if focused {
                    format!("{} + {}{}", tags, dialog.tag_input.buffer, cursor)
                } else {
                    tags
                }
            }
        };
        let marker = if focused { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{}: ", marker, spec.label), label_style),
            Span::raw(value),
        ]));
        if let Some(message) = dialog.errors().message_for(spec.key) {
            lines.push(Line::from(Span::styled(
                format!("    {}", message),
                Style::default().fg(Color::Red),
            )));
        }
    }

    if let Some(marker) = milestone_status(&dialog.draft) {
        lines.push(Line::from(Span::styled(marker, Style::default().fg(Color::Green))));
    }
    lines.push(Line::from(""));
    if dialog.state() == DialogState::Submitting {
        lines.push(Line::from("Saving..."));
    }
    if let Some(notice) = dialog.notice() {
        lines.push(Line::from(Span::styled(notice.message.clone(), notice_style(notice))));
    }
    lines.push(Line::from(Span::styled(
        "Tab/↑↓: Field  ←/→: Change  Enter: Add tag / Save  Ctrl+S: Save  ESC: Cancel",
        Style::default().fg(Color::Gray),
    )));

    let content = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, popup_area);
    f.render_widget(content, popup_area);
}
