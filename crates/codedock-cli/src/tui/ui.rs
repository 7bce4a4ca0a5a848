//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use codedock_core::{NoticeLevel, SyncPhase, Theme};

use super::app::App;

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    draw_code_pane(frame, app, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);
    draw_phase_indicator(frame, app);

    if app.show_help {
        draw_help_overlay(frame);
    }
}

/// Draw the header line: language, theme, font size and phase
fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut spans = vec![
        Span::styled(" codedock ", bold),
        Span::styled("│ ", dim),
        Span::raw(app.surface.language.display_name()),
        Span::styled(" │ ", dim),
        Span::raw(app.surface.theme.as_str()),
        Span::styled(" │ ", dim),
        Span::raw(app.surface.font_size.to_string()),
        Span::styled(" │ ", dim),
        Span::styled(app.phase.label(), phase_style(app.phase)),
    ];

    if app.phase == SyncPhase::WaitingForSurface {
        spans.push(Span::styled(format!("  waiting on {}", app.surface_url), dim));
    }

    if app.is_celebrating() {
        spans.push(Span::styled("   ", dim));
        spans.push(Span::styled(
            "🎉 Running! 🎉",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn phase_style(phase: SyncPhase) -> Style {
    match phase {
        SyncPhase::Synced => Style::default().fg(Color::Green),
        SyncPhase::WaitingForSurface | SyncPhase::Reconfiguring => {
            Style::default().fg(Color::Yellow)
        }
        SyncPhase::Uninitialized => Style::default().fg(Color::DarkGray),
    }
}

/// Draw the code pane, mirroring the authoritative code
fn draw_code_pane(frame: &mut Frame, app: &App, area: Rect) {
    let (fg, bg) = match app.surface.theme {
        Theme::Dark => (Color::White, Color::Rgb(0x24, 0x24, 0x2B)),
        Theme::Light => (Color::Black, Color::Rgb(0xF5, 0xF5, 0xF5)),
    };

    let title = format!(" {} ", app.document_name);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    let gutter = app.line_count().max(1).to_string().len();
    let lines: Vec<Line> = if app.code.is_empty() {
        vec![Line::from(Span::styled(
            "(empty)",
            Style::default().add_modifier(Modifier::DIM),
        ))]
    } else {
        app.code
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                Line::from(vec![
                    Span::styled(
                        format!("{:>width$} ", idx + 1, width = gutter),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                    Span::raw(line.replace('\t', "    ")),
                ])
            })
            .collect()
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(fg).bg(bg))
        .scroll((app.code_scroll, 0));

    frame.render_widget(paragraph, area);
}

/// Draw the status bar at the bottom
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (content, style) = if let Some(msg) = &app.status_message {
        let style = match app.status_level {
            NoticeLevel::Success => Style::default().fg(Color::Green),
            NoticeLevel::Info => Style::default(),
            NoticeLevel::Warning => Style::default().fg(Color::Yellow),
            NoticeLevel::Error => Style::default().fg(Color::Red),
        };
        (msg.clone(), style)
    } else if let Some(path) = &app.last_export {
        (
            format!("Last export: {}  (?:help)", path.display()),
            Style::default().add_modifier(Modifier::DIM),
        )
    } else {
        (
            "s:save  r:run  f:format  x:reset  +/-:zoom  t:theme  l/L:language  d/i:download  ?:help  q:quit"
                .to_string(),
            Style::default().add_modifier(Modifier::DIM),
        )
    };

    frame.render_widget(Paragraph::new(content).style(style), area);
}

/// Draw phase indicator in the top-right corner
fn draw_phase_indicator(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if area.width < 5 {
        return;
    }

    let icon = match app.phase {
        SyncPhase::Synced => "✓",
        SyncPhase::WaitingForSurface | SyncPhase::Reconfiguring => "↻",
        SyncPhase::Uninitialized => "○",
    };

    let indicator = Paragraph::new(Span::styled(icon, phase_style(app.phase)));
    let indicator_area = Rect::new(area.width - 2, 0, 1, 1);
    frame.render_widget(indicator, indicator_area);
}

/// Draw help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 24.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("Editor:"),
        Line::from("  s           Save code"),
        Line::from("  r           Run code"),
        Line::from("  f           Format code"),
        Line::from("  x           Reset editor"),
        Line::from(""),
        Line::from("Surface:"),
        Line::from("  +/-         Zoom in/out"),
        Line::from("  t           Toggle theme"),
        Line::from("  l/L         Next/previous language"),
        Line::from("  R           Reload surface"),
        Line::from(""),
        Line::from("Download:"),
        Line::from("  d           As a file"),
        Line::from("  i           As an image"),
        Line::from(""),
        Line::from("  j/k, ↑/↓    Scroll code"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedock_core::{Config, ControllerEvent, Notice};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &App) -> String {
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_draw_shows_code_and_header() {
        let mut app = App::new(&Config::default());
        app.apply_event(ControllerEvent::PhaseChanged(SyncPhase::Synced));
        app.apply_event(ControllerEvent::CodeChanged {
            code: "class Main {}\n".to_string(),
            document_name: "Main.java".to_string(),
        });

        let screen = render(&app);
        assert!(screen.contains("Java"));
        assert!(screen.contains("ready"));
        assert!(screen.contains("Main.java"));
        assert!(screen.contains("class Main {}"));
        assert!(screen.contains("s:save"));
    }

    #[test]
    fn test_draw_status_and_help() {
        let mut app = App::new(&Config::default());
        app.apply_event(ControllerEvent::Notice(Notice::success(
            "Code saved successfully!",
        )));
        app.show_help = true;

        let screen = render(&app);
        assert!(screen.contains("Code saved successfully!"));
        assert!(screen.contains("Keyboard Shortcuts"));
    }

    #[test]
    fn test_status_bar_shows_last_export() {
        let mut app = App::new(&Config::default());
        app.apply_event(ControllerEvent::Exported {
            path: std::path::PathBuf::from("/tmp/main.java.png"),
        });

        let screen = render(&app);
        assert!(screen.contains("Last export: /tmp/main.java.png"));
    }
}
