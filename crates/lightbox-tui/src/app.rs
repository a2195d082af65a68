use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lightbox_client::{
    CacheKey, KeyBus, NavKey, Notice, NoticeLevel, Slide, ViewerController, ViewerState,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    None,
    Refresh,
    Quit,
}

/// Full-screen slideshow over one cache key.
pub struct App {
    controller: ViewerController,
    bus: KeyBus,
    notice: Option<Notice>,
}

pub fn nav_key(code: KeyCode) -> NavKey {
    match code {
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => NavKey::Next,
        KeyCode::Left | KeyCode::Char('h') => NavKey::Previous,
        _ => NavKey::Other,
    }
}

impl App {
    /// Attach `controller` to `bus` for the lifetime of the app.
    pub fn new(mut controller: ViewerController, bus: KeyBus) -> Self {
        controller.attach(&bus);
        Self {
            controller,
            bus,
            notice: None,
        }
    }

    pub fn controller(&self) -> &ViewerController {
        &self.controller
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return AppAction::Quit;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => AppAction::Quit,
            KeyCode::Char('r') => AppAction::Refresh,
            code => {
                let nav = nav_key(code);
                if nav != NavKey::Other {
                    self.notice = None;
                    self.bus.send(nav);
                }
                AppAction::None
            }
        }
    }

    /// Pick up listing changes. `force` drops the cached listing first.
    pub async fn refresh(&mut self, force: bool) {
        if force {
            self.controller.cache().invalidate(self.controller.key());
        }
        match self.controller.refresh().await {
            Ok(true) if force => self.notice = Some(Notice::success("Refreshed.")),
            Ok(_) => {}
            Err(e) => self.notice = Some(Notice::error(format!("Failed to load: {e}"))),
        }
    }

    fn noun(&self) -> &'static str {
        match self.controller.key() {
            CacheKey::Images => "images",
            CacheKey::Document => "PDF",
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        let view = self.controller.view();
        self.render_title_bar(frame, layout[0], &view);
        match &view {
            ViewerState::Disabled => self.render_message(frame, layout[1], "Connecting…"),
            ViewerState::Empty => {
                let text = format!("No {} uploaded yet.", self.noun());
                self.render_message(frame, layout[1], &text)
            }
            ViewerState::Showing(slide) => self.render_slide(frame, layout[1], slide),
        }
        self.render_status_bar(frame, layout[2], &view);
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect, view: &ViewerState) {
        let mut spans = vec![
            Span::styled(" lightbox ", Style::default().bold().fg(Color::Cyan)),
            Span::raw(" "),
            Span::styled(self.noun(), Style::default().fg(Color::Yellow)),
        ];
        if let ViewerState::Showing(slide) = view {
            if let Some(counter) = slide.counter() {
                spans.push(Span::styled(
                    format!("  {counter}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_message(&self, frame: &mut Frame, area: Rect, text: &str) {
        let block = Block::default().borders(Borders::ALL);
        let paragraph = Paragraph::new(text.to_string())
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }

    fn render_slide(&self, frame: &mut Frame, area: Rect, slide: &Slide) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", slide.filename))
            .border_style(Style::default().fg(Color::Cyan));

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Uploaded: ", Style::default().bold()),
                Span::raw(slide.uploaded_at.display_local()),
            ]),
            Line::from(vec![
                Span::styled("Type: ", Style::default().bold()),
                Span::raw(slide.mime),
            ]),
        ];

        let resource = slide
            .resource
            .as_deref()
            .and_then(|uri| self.controller.registry().resolve(uri).map(|r| (uri, r)));
        match (resource, &slide.preview_error) {
            (Some((uri, res)), _) => {
                lines.push(Line::from(vec![
                    Span::styled("Size: ", Style::default().bold()),
                    Span::raw(format!("{} bytes", res.bytes.len())),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("Preview: ", Style::default().bold()),
                    Span::styled(uri.to_string(), Style::default().fg(Color::Green)),
                ]));
            }
            (None, Some(err)) => lines.push(Line::from(Span::styled(
                format!("Preview unavailable: {err}"),
                Style::default().fg(Color::Red),
            ))),
            (None, None) => lines.push(Line::from(Span::styled(
                "Loading preview…",
                Style::default().fg(Color::DarkGray),
            ))),
        }

        if slide.show_nav {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                "◀ previous    next ▶",
                Style::default().fg(Color::Yellow),
            )));
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, view: &ViewerState) {
        let line = match &self.notice {
            Some(notice) => {
                let color = match notice.level {
                    NoticeLevel::Success => Color::Green,
                    NoticeLevel::Error => Color::Red,
                };
                Line::from(Span::styled(
                    format!(" {}", notice.message),
                    Style::default().fg(color),
                ))
            }
            None => {
                let nav = matches!(view, ViewerState::Showing(s) if s.show_nav);
                let hints = if nav {
                    " ←/→ navigate  r refresh  q quit"
                } else {
                    " r refresh  q quit"
                };
                Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}
