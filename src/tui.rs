// src/tui.rs
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
    Terminal,
};
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, Focus};
use crate::order::{FormField, OrderForm};
use crate::script::Choice;
use crate::session::{Message, Sender};
use std::io;
use std::time::{Duration, Instant};

const ACCENT: Color = Color::Rgb(0x61, 0x59, 0xd0);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Tui {
    terminal: Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        let stdout = io::stdout();
        let backend = ratatui::backend::CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default().direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]).split(r);
        Layout::default().direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]).split(popup_layout[1])[1]
    }

    fn message_lines(msg: &Message) -> Vec<Line<'static>> {
        let (who, style) = match msg.sender {
            Sender::User => ("You", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Sender::Bot => ("Auto-mate", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        };
        let mut lines = vec![Line::from(vec![
            Span::styled(format!("{} ", who), style),
            Span::styled(format!("{}: ", msg.timestamp.with_timezone(&chrono::Local).format("%H:%M")), Style::default().fg(Color::DarkGray)),
            Span::raw(msg.text.clone()),
        ])];
        for url in &msg.attachment_image_urls {
            lines.push(Line::from(Span::styled(format!("  [image] {}", url), Style::default().fg(Color::Cyan))));
        }
        if msg.is_prompt_with_choices {
            lines.push(Line::from(Span::styled(
                "  [Ctrl+X] No, it's not the right part   [Ctrl+Y] Yes / Submit",
                Style::default().fg(Color::Yellow),
            )));
        }
        lines.push(Line::raw(""));
        lines
    }

    fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default().direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(3)])
            .split(area);

        let search_style = if app.focus == Focus::Search { Style::default().fg(ACCENT) } else { Style::default() };
        let search = Paragraph::new(app.search.as_str())
            .block(Block::default().borders(Borders::ALL).title("Search chats").border_style(search_style));
        f.render_widget(search, chunks[0]);

        let active = app.store.active_session_id();
        let items: Vec<ListItem> = app.visible_sessions().iter().map(|s| {
            let style = if Some(s.id) == active {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default()
            };
            let label = s.first_user_message().map_or("No user message", |m| m.text.as_str());
            let when = s.last_activity_at.with_timezone(&chrono::Local).format("%H:%M");
            ListItem::new(format!("{}  {}", label, when)).style(style)
        }).collect();
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title(format!("Chats ({})", app.store.len())));
        f.render_widget(list, chunks[1]);

        let help = Paragraph::new("^N new  ^D delete\n^↑/^↓ select  Alt+↑/↓ move")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(help, chunks[2]);
    }

    fn draw_chat(f: &mut Frame, app: &App, area: Rect) {
        let chunks = Layout::default().direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(3)])
            .split(area);

        let placeholder = if app.store.is_empty() {
            "No chats yet. Press Ctrl+N to start one."
        } else {
            "No active chat. Press Ctrl+N to start one."
        };
        let lines: Vec<Line> = app.get_active_session().map_or_else(
            || vec![Line::raw(placeholder)],
            |session| session.messages.iter().flat_map(Self::message_lines).collect(),
        );
        let visible_rows = chunks[0].height.saturating_sub(2) as usize;
        let scroll = lines.len().saturating_sub(visible_rows) as u16;
        let title = app.get_active_session().map_or("Auto-mate".to_string(), |s| s.title.clone());
        let transcript = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        f.render_widget(transcript, chunks[0]);

        let status = if app.is_typing() {
            Span::styled("Auto-mate is typing...", Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC))
        } else if app.order_in_flight() {
            Span::styled("Sending your order...", Style::default().fg(Color::Yellow))
        } else if let Some(notice) = &app.notice {
            Span::styled(notice.clone(), Style::default().fg(Color::Yellow))
        } else if app.order_available() {
            Span::styled("Ready to order! Press Ctrl+O to place your order.", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        } else {
            Span::raw("")
        };
        f.render_widget(Paragraph::new(Line::from(status)), chunks[1]);

        let input_style = if app.focus == Focus::Input { Style::default().fg(ACCENT) } else { Style::default() };
        let input = Paragraph::new(app.input.as_str())
            .block(Block::default().borders(Borders::ALL)
                .title("Enter text... (Enter send, /attach <files>, Tab search, Esc quit)")
                .border_style(input_style));
        f.render_widget(input, chunks[2]);
    }

    fn draw_order_form(f: &mut Frame, form: &OrderForm) {
        let area = Self::centered_rect(60, 60, f.area());
        f.render_widget(Clear, area);

        let field = |label: &str, value: &str, which: FormField| {
            let style = if form.focus == which { Style::default().fg(ACCENT).add_modifier(Modifier::BOLD) } else { Style::default() };
            Line::from(vec![Span::styled(format!("{:<9}", label), style), Span::raw(value.to_string())])
        };
        let mut lines = vec![
            Line::raw(format!("Name: {}", form.part.name)),
            Line::raw(format!("License: {}", form.part.license)),
            Line::raw(format!("Code: {}", form.part.code)),
            Line::raw(format!("Image: {}", form.part.image_url)),
            Line::raw(""),
            field("Name", &form.name, FormField::Name),
            field("Email", &form.email, FormField::Email),
            field("Message", &form.message, FormField::Message),
            Line::raw(""),
        ];
        if form.is_sending() {
            lines.push(Line::styled("Sending...", Style::default().fg(Color::Yellow)));
        } else if let Some(err) = form.error() {
            lines.push(Line::styled(err.to_string(), Style::default().fg(Color::Red)));
        } else {
            lines.push(Line::raw("[Tab] next field   [Enter] confirm order   [Esc] close"));
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Confirm your part").style(Style::default().fg(Color::White)))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn draw(f: &mut Frame, app: &App) {
        let main_chunks = Layout::default().direction(Direction::Horizontal).margin(1)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(f.area());
        Self::draw_sidebar(f, app, main_chunks[0]);
        Self::draw_chat(f, app, main_chunks[1]);
        if let Some(form) = &app.order_form {
            Self::draw_order_form(f, form);
        }
    }

    fn handle_order_key(app: &mut App, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return app.close_order_form(),
            KeyCode::Enter => return app.submit_order(),
            _ => {}
        }
        let Some(form) = app.order_form.as_mut() else { return };
        match key.code {
            _ if form.is_sending() => {}
            KeyCode::Tab => form.focus = form.focus.next(),
            KeyCode::Backspace => { form.focused_mut().pop(); }
            KeyCode::Char(c) => form.focused_mut().push(c),
            _ => {}
        }
    }

    /// Returns false when the user asked to quit.
    fn handle_key(app: &mut App, key: KeyEvent) -> bool {
        if app.order_form.is_some() {
            Self::handle_order_key(app, key);
            return true;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('c') if ctrl => return false,
            KeyCode::Char('n') if ctrl => app.new_chat(),
            KeyCode::Char('d') if ctrl => app.delete_active(),
            KeyCode::Char('o') if ctrl => app.open_order_form(),
            KeyCode::Char('y') if ctrl && app.choices_offered() => app.answer_choice(Choice::Confirm),
            KeyCode::Char('x') if ctrl && app.choices_offered() => app.answer_choice(Choice::Reject),
            KeyCode::Up if alt => app.move_active(-1),
            KeyCode::Down if alt => app.move_active(1),
            KeyCode::Up if ctrl => app.select_relative(-1),
            KeyCode::Down if ctrl => app.select_relative(1),
            KeyCode::Tab => {
                app.focus = match app.focus { Focus::Input => Focus::Search, Focus::Search => Focus::Input };
            }
            KeyCode::Enter if app.focus == Focus::Input => app.send_input(Instant::now()),
            KeyCode::Backspace => match app.focus {
                Focus::Input => { app.input.pop(); }
                Focus::Search => { app.search.pop(); }
            },
            KeyCode::Char(c) if !ctrl => match app.focus {
                Focus::Input => app.input.push(c),
                Focus::Search => app.search.push(c),
            },
            _ => {}
        }
        true
    }

    pub async fn run_loop(&mut self, app: &mut App) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
        log::info!("TUI run loop started.");

        let result = self.event_loop(app).await;

        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(self.terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        result
    }

    async fn event_loop(&mut self, app: &mut App) -> io::Result<()> {
        loop {
            app.tick(Instant::now());
            self.terminal.draw(|f| Self::draw(f, app))?;

            let timeout = app
                .director
                .next_due()
                .map_or(POLL_INTERVAL, |due| due.saturating_duration_since(Instant::now()).min(POLL_INTERVAL));
            if event::poll(timeout)? {
                if let CrosstermEvent::Key(key) = event::read()? {
                    if key.kind != event::KeyEventKind::Press {
                        continue;
                    }
                    if !Self::handle_key(app, key) {
                        log::info!("Quit requested, exiting TUI loop.");
                        break;
                    }
                }
            }
            // Let a spawned order send make progress between frames.
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}
