//! Terminal front-end for [`SliceViewer`].
//!
//! Each panel is drawn with upper-half block characters in 24-bit color, two
//! slice rows per terminal line.

use crate::enums::{Interpolation, SliceKey};
use crate::figure::fit_in_cell;
use crate::viewer::{PanelState, SliceViewer};
use crate::volume::Volume;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use image::Rgba;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use std::io::{self, stdout};
use std::time::Duration;

const HELP: &str = " j/\u{2190}: previous slice | k/\u{2192}: next slice | q: quit ";

/// Run the viewer until the user quits. The terminal is restored even when
/// drawing fails.
pub fn run_terminal(viewer: &mut SliceViewer) -> io::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = run_terminal_inner(viewer);

    let _ = disable_raw_mode();
    let _ = stdout().execute(LeaveAlternateScreen);

    result
}

fn run_terminal_inner(viewer: &mut SliceViewer) -> io::Result<()> {
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| draw(f, viewer))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match action(key) {
            Some(Action::Quit) => break,
            Some(Action::Step(slice_key)) => viewer.process_key(slice_key),
            Some(Action::Char(c)) => {
                viewer.process_char(c);
            }
            None => {}
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Quit,
    Step(SliceKey),
    Char(char),
}

/// Map a key event to a viewer action; only presses count.
fn action(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Left | KeyCode::Down => Some(Action::Step(SliceKey::Previous)),
        KeyCode::Right | KeyCode::Up => Some(Action::Step(SliceKey::Next)),
        KeyCode::Char(c) => Some(Action::Char(c)),
        _ => None,
    }
}

fn draw(f: &mut ratatui::Frame<'_>, viewer: &SliceViewer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    let (nrows, ncols) = viewer.layout();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, nrows as u32); nrows])
        .split(chunks[0]);

    for (row, row_area) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, ncols as u32); ncols])
            .split(*row_area);
        for (col, cell) in cells.iter().enumerate() {
            let Some(panel) = viewer.panels().get(row * ncols + col) else {
                continue;
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", panel.current_title()));
            let inner = block.inner(*cell);
            f.render_widget(block, *cell);
            let lines = slice_lines(panel, inner, viewer.style().interpolation);
            f.render_widget(Paragraph::new(lines), inner);
        }
    }

    let status = Paragraph::new(HELP).style(Style::default().fg(Color::White).bg(Color::DarkGray));
    f.render_widget(status, chunks[1]);
}

fn slice_lines(panel: &PanelState, area: Rect, interpolation: Interpolation) -> Vec<Line<'static>> {
    let Some(slice) = panel.volume.get_slice_from_axis(panel.index, panel.orientation) else {
        return Vec::new();
    };
    let (height, width) = slice.dim();
    if area.width == 0 || area.height == 0 || height == 0 || width == 0 {
        return Vec::new();
    }

    let cell = (area.width as u32, area.height as u32 * 2);
    let (pixels_wide, pixels_high) = fit_in_cell((height, width), cell);
    let image = Volume::slice_to_image(
        &slice,
        panel.window,
        panel.colormap,
        interpolation,
        (pixels_wide, pixels_high),
    );

    (0..pixels_high)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..pixels_wide)
                .map(|x| {
                    let top = terminal_color(image.get_pixel(x, y));
                    let bottom = if y + 1 < pixels_high {
                        terminal_color(image.get_pixel(x, y + 1))
                    } else {
                        Color::Reset
                    };
                    Span::styled("\u{2580}", Style::default().fg(top).bg(bottom))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn terminal_color(pixel: &Rgba<u8>) -> Color {
    let [r, g, b, a] = pixel.0;
    if a == 0 { Color::Reset } else { Color::Rgb(r, g, b) }
}
