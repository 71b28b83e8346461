use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};

use playfield::playfield::{CellState, PlayField, Snapshot, Status};
use playfield::shape::{standard_shapes, ColorToken, RandomSelector, Shape};

// ============================================================================
// Visual Constants
// ============================================================================

const GRID_HEIGHT: usize = 20;
const GRID_WIDTH: usize = 10;

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";

/// Poll timeout while no deferred action is outstanding (NEW/PAUSED/GAMEOVER).
const IDLE_POLL: Duration = Duration::from_millis(200);

// ============================================================================
// Color Mapping
// ============================================================================

fn token_color(token: ColorToken) -> Color {
    match token.0 {
        0 => Color::Cyan,
        1 => Color::Yellow,
        2 => Color::Magenta,
        3 => Color::Green,
        4 => Color::Red,
        5 => Color::Blue,
        _ => Color::Rgb(255, 165, 0),
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, snapshot: &Snapshot) {
    let area = frame.size();
    render_game(frame, snapshot, area);

    match snapshot.status {
        Status::New => render_new_overlay(frame, area),
        Status::Paused => render_paused_overlay(frame, area),
        Status::GameOver => render_game_over_overlay(frame, snapshot, area),
        Status::InProgress | Status::Eliminating => {}
    }
}

fn render_game(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let grid_display_width = (GRID_WIDTH as u16 * CELL_WIDTH) + 2;
    let grid_display_height = GRID_HEIGHT as u16 + 2;
    let preview_width = 12;
    let info_width = 16;
    let total_width = grid_display_width + preview_width + info_width + 4;
    let total_height = grid_display_height + 3;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(preview_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_grid(frame, snapshot, horizontal[0]);
    render_preview(frame, &snapshot.next_shape, horizontal[1]);
    render_info(frame, snapshot, horizontal[2]);

    let controls_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if controls_area.y + 1 < area.height {
        let controls = Paragraph::new(vec![Line::from(
            "A/D: Move | W: Rotate | S/Space: Drop | P: Pause | R: Restart | Q: Quit",
        )])
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(controls, controls_area);
    }
}

fn render_grid(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Playfield ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Row 0 is the bottom of the playfield, so draw top-down in reverse.
    let mut lines: Vec<Line> = Vec::new();
    for row in (0..snapshot.grid.len()).rev() {
        let flashing = snapshot.clearing_rows.contains(&row);
        let mut spans: Vec<Span> = Vec::new();

        for cell in &snapshot.grid[row] {
            let (symbol, style) = match cell {
                CellState::Empty => (EMPTY_CHAR, Style::default()),
                CellState::Filled(_) if flashing => (
                    BLOCK_CHAR,
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                CellState::Filled(token) => {
                    (BLOCK_CHAR, Style::default().fg(token_color(*token)))
                }
            };
            spans.push(Span::styled(symbol, style));
        }

        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn render_preview(frame: &mut Frame, shape: &Shape, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let color = token_color(shape.color());
    let mut lines: Vec<Line> = vec![Line::from("")];

    // Shape rows are stored bottom-up as well.
    for row in shape.cells().iter().rev() {
        let mut spans: Vec<Span> = vec![Span::raw(" ")];
        for &filled in row {
            if filled {
                spans.push(Span::styled(BLOCK_CHAR, Style::default().fg(color)));
            } else {
                spans.push(Span::raw(EMPTY_CHAR));
            }
        }
        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn render_info(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let next_goal = match snapshot.level.next_level_score {
        Some(score) => format!("{}", score),
        None => "-".to_string(),
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format!("{}", snapshot.score)),
        Line::from(""),
        Line::from(Span::styled("Level", Style::default().fg(Color::Green))),
        Line::from(snapshot.level.display),
        Line::from(""),
        Line::from(Span::styled("Next at", Style::default().fg(Color::Cyan))),
        Line::from(next_goal),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_new_overlay(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("READY", Style::default().fg(Color::Green))),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to start",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    render_popup(frame, " Playfield ", text, 26, 8, area);
}

fn render_paused_overlay(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("PAUSED", Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled(
            "Press P to continue",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "Press R to restart",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    render_popup(frame, " Paused ", text, 26, 9, area);
}

fn render_game_over_overlay(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", snapshot.score)),
        Line::from(format!("Level: {}", snapshot.level.display)),
        Line::from(""),
        Line::from(Span::styled(
            "Press R to restart",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    render_popup(frame, " Game Over ", text, 26, 11, area);
}

fn render_popup(
    frame: &mut Frame,
    title: &str,
    text: Vec<Line>,
    width: u16,
    height: u16,
    area: Rect,
) {
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(width, height, area);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn main() -> io::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut field = PlayField::new(
        GRID_HEIGHT,
        GRID_WIDTH,
        standard_shapes(),
        Box::new(RandomSelector),
    );
    let mut needs_draw = true;

    loop {
        if needs_draw {
            let snapshot = field.snapshot();
            terminal.draw(|frame| render(frame, &snapshot))?;
            needs_draw = false;
        }

        let timeout = field.time_until_due().unwrap_or(IDLE_POLL);
        let waited = Instant::now();

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => break,
                        KeyCode::Enter => field.start(),
                        KeyCode::Char('r') | KeyCode::Char('R') => field.restart(),
                        KeyCode::Char('p') | KeyCode::Char('P') => {
                            if field.status() == Status::Paused {
                                field.resume();
                            } else {
                                field.pause();
                            }
                        }
                        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => {
                            field.move_left();
                        }
                        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => {
                            field.move_right();
                        }
                        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => {
                            field.rotate();
                        }
                        KeyCode::Down
                        | KeyCode::Char(' ')
                        | KeyCode::Char('s')
                        | KeyCode::Char('S') => {
                            field.hard_drop();
                        }
                        _ => {}
                    }
                }
            }
        }

        field.advance(waited.elapsed());

        if !field.take_events().is_empty() {
            needs_draw = true;
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
