use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};

use leadgrid_engine::{CellView, CommitOutcome, GridView, SourceKind, UndoOutcome};

use crate::runtime::Runtime;
use crate::util;

const MIN_COL_WIDTH: usize = 4;
const MAX_COL_WIDTH: usize = 28;
/// Source glyph, lock mark (two columns) and saving mark.
const MARKS_WIDTH: usize = 4;
/// Marks plus one space before the cell text.
const GLYPH_WIDTH: usize = MARKS_WIDTH + 1;
const LOCK_MARK: &str = "🔒";
const SAVING_MARK: &str = "…";
/// Longest a write may keep the grid open after quitting.
const QUIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

fn source_glyph(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Ai => "◆",
        SourceKind::Integration => "↯",
        SourceKind::Manual => "·",
    }
}

struct TuiApp {
    runtime: Runtime,
    view: GridView,
    col_widths: Vec<usize>,
    cursor_row: usize,
    cursor_col: usize,
    scroll_row: usize,
    scroll_col: usize,
    /// Caret in the inline editor (byte offset into the buffer).
    caret: usize,
    title: String,
    /// One-shot message for the status line (refusals, undo results).
    notice: Option<String>,
    should_quit: bool,
    show_help: bool,
    lead_width: usize,
}

impl TuiApp {
    fn new(runtime: Runtime, title: String) -> Self {
        let view = GridView::build(runtime.grid());
        let mut app = Self {
            runtime,
            view,
            col_widths: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            scroll_row: 0,
            scroll_col: 0,
            caret: 0,
            title,
            notice: None,
            should_quit: false,
            show_help: false,
            lead_width: 4,
        };
        app.refresh();
        app
    }

    /// Rebuild the view model after any controller event.
    fn refresh(&mut self) {
        self.view = GridView::build(self.runtime.grid());
        let view = &self.view;
        self.col_widths = view
            .columns
            .iter()
            .enumerate()
            .map(|(c, col)| {
                let values = view.rows.iter().filter_map(move |r| r.cells.get(c)).map(|cell| cell.text());
                util::column_width(&col.label, values, MIN_COL_WIDTH, MAX_COL_WIDTH) + GLYPH_WIDTH
            })
            .collect();
        self.lead_width = view
            .rows
            .iter()
            .map(|r| util::display_width(r.lead.as_str()))
            .max()
            .unwrap_or(0)
            .max(4);
        if let Some((_, cursor)) = self.runtime.take_focus() {
            self.caret = cursor;
        }
    }

    fn editing(&self) -> bool {
        self.runtime.grid().session().is_some()
    }

    fn buffer(&self) -> String {
        self.runtime
            .grid()
            .session()
            .map(|s| s.buffer().to_string())
            .unwrap_or_default()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            // Any key dismisses help
            self.show_help = false;
            return;
        }
        self.notice = None;

        if self.editing() {
            self.handle_edit_key(key);
        } else {
            self.handle_nav_key(key);
        }
        self.refresh();
    }

    fn handle_nav_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1, 0),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(0, -1),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => self.move_cursor(0, 1),
            KeyCode::BackTab => self.move_cursor(0, -1),
            KeyCode::Home | KeyCode::Char('g') => self.cursor_row = 0,
            KeyCode::End | KeyCode::Char('G') => {
                self.cursor_row = self.view.rows.len().saturating_sub(1);
            }
            KeyCode::Char('0') => self.cursor_col = 0,
            KeyCode::Char('$') => self.cursor_col = self.view.columns.len().saturating_sub(1),
            KeyCode::Enter | KeyCode::Char('e') => self.start_edit(),
            KeyCode::Char('u') => self.undo(),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.runtime.dispatch(|g| g.confirm());
            }
            KeyCode::Esc => {
                self.runtime.dispatch(|g| g.cancel_edit());
            }
            // Moving away blurs the editor, which commits
            KeyCode::Tab => self.blur_and_move(0, 1),
            KeyCode::BackTab => self.blur_and_move(0, -1),
            KeyCode::Up => self.blur_and_move(-1, 0),
            KeyCode::Down => self.blur_and_move(1, 0),
            KeyCode::Left => {
                let buffer = self.buffer();
                self.caret = prev_boundary(&buffer, self.caret);
            }
            KeyCode::Right => {
                let buffer = self.buffer();
                self.caret = next_boundary(&buffer, self.caret);
            }
            KeyCode::Home => self.caret = 0,
            KeyCode::End => self.caret = self.buffer().len(),
            KeyCode::Backspace => {
                let mut buffer = self.buffer();
                let start = prev_boundary(&buffer, self.caret);
                if start < self.caret {
                    buffer.replace_range(start..self.caret, "");
                    self.caret = start;
                    self.runtime.dispatch(|g| g.update_buffer(buffer));
                }
            }
            KeyCode::Delete => {
                let mut buffer = self.buffer();
                let end = next_boundary(&buffer, self.caret);
                if end > self.caret {
                    buffer.replace_range(self.caret..end, "");
                    self.runtime.dispatch(|g| g.update_buffer(buffer));
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let mut buffer = self.buffer();
                let at = self.caret.min(buffer.len());
                buffer.insert(at, c);
                self.caret = at + c.len_utf8();
                self.runtime.dispatch(|g| g.update_buffer(buffer));
            }
            _ => {}
        }
    }

    fn start_edit(&mut self) {
        let Some(key) = self.view.key_at(self.cursor_row, self.cursor_col) else {
            return;
        };
        if let Err(refusal) = self.runtime.dispatch(|g| g.start_edit(key.clone())) {
            self.notice = Some(format!("{}: {}", key, refusal));
        }
    }

    /// Leave the editor for a neighbouring cell. An invalid draft keeps the
    /// cursor where it is.
    fn blur_and_move(&mut self, drow: i32, dcol: i32) {
        if self.runtime.dispatch(|g| g.leave()) == CommitOutcome::BlockedByValidation {
            self.notice = Some("Fix the value or press Esc to discard it".to_string());
            return;
        }
        self.move_cursor(drow, dcol);
    }

    fn undo(&mut self) {
        let notice = match self.runtime.dispatch(|g| g.undo()) {
            UndoOutcome::NothingToUndo => "Nothing to undo",
            UndoOutcome::AlreadyPending => "Undo already in progress",
            UndoOutcome::Sent(_) | UndoOutcome::Queued => "Undoing last edit",
        };
        self.notice = Some(notice.to_string());
    }

    /// Advance timers and completions. Returns true if a redraw is needed.
    fn tick(&mut self) -> bool {
        if self.runtime.tick(Instant::now()) {
            self.refresh();
            return true;
        }
        false
    }

    fn move_cursor(&mut self, drow: i32, dcol: i32) {
        let num_rows = self.view.rows.len();
        let num_cols = self.view.columns.len();
        if num_rows == 0 || num_cols == 0 {
            return;
        }
        self.cursor_row = (self.cursor_row as i32 + drow)
            .max(0)
            .min(num_rows as i32 - 1) as usize;
        self.cursor_col = (self.cursor_col as i32 + dcol)
            .max(0)
            .min(num_cols as i32 - 1) as usize;
    }

    fn ensure_visible(&mut self, visible_rows: usize, area_width: u16) {
        if self.cursor_row < self.scroll_row {
            self.scroll_row = self.cursor_row;
        }
        if visible_rows > 0 && self.cursor_row >= self.scroll_row + visible_rows {
            self.scroll_row = self.cursor_row - visible_rows + 1;
        }

        let available = (area_width as usize).saturating_sub(self.lead_width + 1);
        if self.cursor_col < self.scroll_col {
            self.scroll_col = self.cursor_col;
        }
        while self.scroll_col < self.cursor_col {
            let cols = self.visible_columns(self.scroll_col, available);
            if cols.last().is_some_and(|&last| last >= self.cursor_col) {
                break;
            }
            self.scroll_col += 1;
        }
    }

    fn visible_columns(&self, start_col: usize, available: usize) -> Vec<usize> {
        let mut cols = Vec::new();
        let mut used = 0usize;
        for c in start_col..self.view.columns.len() {
            let w = self.col_widths.get(c).copied().unwrap_or(MIN_COL_WIDTH) + 1;
            if used + w > available && !cols.is_empty() {
                break;
            }
            used += w;
            cols.push(c);
        }
        cols
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

        self.draw_title(frame, chunks[0]);
        self.draw_banner(frame, chunks[1]);
        self.draw_grid(frame, chunks[2]);
        self.draw_detail(frame, chunks[3]);
        self.draw_status(frame, chunks[4]);

        if self.show_help {
            self.draw_help(frame, area);
        }
    }

    fn draw_title(&self, frame: &mut Frame, area: Rect) {
        let title = format!(
            " leadgrid: {} | {} leads x {} fields ",
            self.title,
            self.view.rows.len(),
            self.view.columns.len()
        );
        let para = Paragraph::new(Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]))
        .style(Style::default().bg(Color::Cyan));
        frame.render_widget(para, area);
    }

    fn draw_banner(&self, frame: &mut Frame, area: Rect) {
        let style = if self.runtime.grid().last_edit().is_some() {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let text = format!(" {}", self.view.banner);
        frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), area);
    }

    fn draw_grid(&self, frame: &mut Frame, area: Rect) {
        if self.view.rows.is_empty() || self.view.columns.is_empty() {
            let msg = Paragraph::new("(no leads)").style(Style::default().fg(Color::DarkGray));
            frame.render_widget(msg, area);
            return;
        }

        let available = (area.width as usize).saturating_sub(self.lead_width + 1);
        let vis_cols = self.visible_columns(self.scroll_col, available);
        let visible_rows = area.height.saturating_sub(1) as usize;
        let end_row = (self.scroll_row + visible_rows).min(self.view.rows.len());

        let mut header_spans = vec![Span::styled(
            format!("{} ", util::pad_right("lead", self.lead_width)),
            Style::default().fg(Color::DarkGray),
        )];
        for &c in &vis_cols {
            let col = &self.view.columns[c];
            let w = self.col_widths[c];
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            style = if c == self.cursor_col {
                style.fg(Color::Yellow)
            } else if col.editable {
                style.fg(Color::Cyan)
            } else {
                style.fg(Color::DarkGray)
            };
            header_spans.push(Span::styled(format!("{} ", util::pad_right(&col.label, w)), style));
        }

        let mut lines: Vec<Line> = Vec::with_capacity(visible_rows + 1);
        lines.push(Line::from(header_spans));

        for r in self.scroll_row..end_row {
            let row = &self.view.rows[r];
            let is_cursor_row = r == self.cursor_row;
            let lead_style = if is_cursor_row {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut spans = vec![Span::styled(
                format!("{:>width$} ", row.lead.as_str(), width = self.lead_width),
                lead_style,
            )];

            for &c in &vis_cols {
                let Some(cell) = row.cells.get(c) else { continue };
                let w = self.col_widths[c];
                let is_cursor = is_cursor_row && c == self.cursor_col;
                spans.push(cell_span(cell, w, is_cursor));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }

    /// Editor line while editing, otherwise the tooltip of the cursor cell.
    fn draw_detail(&self, frame: &mut Frame, area: Rect) {
        let Some(cell) = self.view.cell(self.cursor_row, self.cursor_col) else {
            return;
        };
        let key = self
            .view
            .key_at(self.cursor_row, self.cursor_col)
            .map(|k| k.to_string())
            .unwrap_or_default();

        let line = match cell {
            CellView::Editing { buffer, validation_error, saving, error } => {
                let prefix = format!(" {} > ", key);
                let mut spans = vec![
                    Span::styled(prefix.clone(), Style::default().fg(Color::Cyan)),
                    Span::styled(buffer.clone(), Style::default().fg(Color::White)),
                ];
                if let Some(msg) = validation_error {
                    spans.push(Span::styled(format!("  {}", msg), Style::default().fg(Color::Red)));
                } else if *saving {
                    spans.push(Span::styled("  saving...", Style::default().fg(Color::Yellow)));
                } else if let Some(err) = error {
                    spans.push(Span::styled(format!("  {}", err), Style::default().fg(Color::Red)));
                }
                let caret_x = util::display_width(&prefix)
                    + util::display_width(&buffer[..self.caret.min(buffer.len())]);
                frame.set_cursor_position((area.x + caret_x as u16, area.y));
                Line::from(spans)
            }
            CellView::Display { tooltip, error, saving, .. } => {
                let mut spans = vec![Span::styled(
                    format!(" {}  {}", key, tooltip.join("  ")),
                    Style::default().fg(Color::Gray),
                )];
                if *saving {
                    spans.push(Span::styled("  saving...", Style::default().fg(Color::Yellow)));
                }
                if let Some(err) = error {
                    spans.push(Span::styled(format!("  {}", err), Style::default().fg(Color::Red)));
                }
                Line::from(spans)
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let left = match &self.notice {
            Some(notice) => format!(" {}", notice),
            None if self.editing() => " Enter: save  Esc: cancel  Tab/arrows: save and move".to_string(),
            None => " Enter/e: edit  u: undo  q: quit".to_string(),
        };
        let right = format!(
            "Row {}/{}  ?: help ",
            self.cursor_row + 1,
            self.view.rows.len()
        );
        let padding = (area.width as usize)
            .saturating_sub(left.chars().count() + right.chars().count());
        let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

        let para = Paragraph::new(Line::from(vec![Span::styled(
            status,
            Style::default().fg(Color::Black).bg(Color::DarkGray),
        )]))
        .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(para, area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let help_lines = [
            "",
            "  Navigation",
            "  ----------",
            "  arrows / hjkl     Move cursor",
            "  Tab / Shift+Tab   Next/prev column",
            "  Home / g          First lead",
            "  End  / G          Last lead",
            "  0 / $             First/last field",
            "",
            "  Editing",
            "  -------",
            "  Enter / e         Edit cell",
            "  Enter             Save",
            "  Esc               Cancel edit",
            "  Tab / Up / Down   Save and move",
            "  u                 Undo last edit",
            "",
            "  Sources:  ◆ ai  ↯ integration  · manual",
            "",
            "  q                 Quit",
            "  ?                 Toggle this help",
            "",
        ];
        let help_width: u16 = 46;
        let help_height: u16 = help_lines.len() as u16 + 2;

        let x = area.width.saturating_sub(help_width) / 2;
        let y = area.height.saturating_sub(help_height) / 2;
        let popup = Rect::new(
            area.x + x,
            area.y + y,
            help_width.min(area.width),
            help_height.min(area.height),
        );

        let lines: Vec<Line> = help_lines
            .iter()
            .map(|s| Line::from(Span::styled(*s, Style::default().fg(Color::White))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Keybindings ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// Source glyph followed by the lock and saving marks.
fn cell_marks(cell: &CellView) -> String {
    let (glyph, locked, saving) = match cell {
        CellView::Editing { saving, .. } => ("✎", false, *saving),
        CellView::Display { source_kind, locked, saving, .. } => {
            (source_glyph(*source_kind), *locked, *saving)
        }
    };
    let mut marks = glyph.to_string();
    if locked {
        marks.push_str(LOCK_MARK);
    }
    if saving {
        marks.push_str(SAVING_MARK);
    }
    marks
}

/// Marks column and cell text, `width` columns in total.
fn cell_text(cell: &CellView, width: usize) -> String {
    format!(
        "{} {}",
        util::pad_right(&cell_marks(cell), MARKS_WIDTH),
        util::pad_right(cell.text(), width.saturating_sub(GLYPH_WIDTH))
    )
}

fn cell_span(cell: &CellView, width: usize, is_cursor: bool) -> Span<'static> {
    let style = match cell {
        CellView::Editing { validation_error, .. } => {
            let fg = if validation_error.is_some() { Color::Red } else { Color::White };
            Style::default().fg(fg).bg(Color::Blue)
        }
        CellView::Display { source_kind, locked, editable, saving, error, .. } => {
            let mut style = Style::default().fg(Color::White);
            if *locked || !editable {
                style = style.fg(Color::DarkGray);
            } else if *source_kind == SourceKind::Integration {
                style = style.fg(Color::Gray);
            }
            if *saving {
                style = style.fg(Color::Yellow).add_modifier(Modifier::ITALIC);
            }
            if error.is_some() {
                style = style.fg(Color::Red);
            }
            style
        }
    };
    let style = if is_cursor {
        style.add_modifier(Modifier::REVERSED | Modifier::BOLD)
    } else {
        style
    };
    Span::styled(cell_text(cell, width), style)
}

fn prev_boundary(s: &str, at: usize) -> usize {
    s[..at.min(s.len())]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_boundary(s: &str, at: usize) -> usize {
    let at = at.min(s.len());
    s[at..]
        .chars()
        .next()
        .map(|c| at + c.len_utf8())
        .unwrap_or(at)
}

/// Run the interactive lead grid.
pub fn run(runtime: Runtime, title: String) -> Result<(), String> {
    let app = TuiApp::new(runtime, title);
    run_app(app)
}

fn run_app(mut app: TuiApp) -> Result<(), String> {
    terminal::enable_raw_mode()
        .map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;

    struct Cleanup;
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = stdout().execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
    let _cleanup = Cleanup;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| format!("failed to create terminal: {}", e))?;

    loop {
        let term_size = terminal
            .size()
            .map(|s| Rect::new(0, 0, s.width, s.height))
            .unwrap_or_default();
        // title, banner, header, detail, status
        let visible_rows = term_size.height.saturating_sub(5) as usize;
        app.ensure_visible(visible_rows, term_size.width);

        terminal
            .draw(|frame| app.draw(frame))
            .map_err(|e| format!("draw error: {}", e))?;

        let timeout = app
            .runtime
            .poll_timeout(Instant::now(), Duration::from_millis(100));
        if event::poll(timeout).map_err(|e| format!("event poll error: {}", e))? {
            if let Event::Key(key) =
                event::read().map_err(|e| format!("event read error: {}", e))?
            {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
        app.tick();

        if app.should_quit {
            break;
        }
    }

    if !app.runtime.wait_for_writes(QUIT_FLUSH_TIMEOUT) {
        log::warn!("quit with writes still in flight");
    }
    Ok(())
}

/// Print the grid as a plain text table to stdout (no TUI, no raw mode).
pub fn print_plain(view: &GridView, max_rows: usize) -> Result<(), String> {
    let out = io::stdout();
    let mut w = out.lock();
    write_plain(&mut w, view, max_rows).map_err(|e| e.to_string())
}

fn write_plain(w: &mut impl Write, view: &GridView, max_rows: usize) -> io::Result<()> {
    let num_rows = view.rows.len();
    let limit = if max_rows == 0 { num_rows } else { max_rows.min(num_rows) };
    let lead_width = view
        .rows
        .iter()
        .map(|r| util::display_width(r.lead.as_str()))
        .max()
        .unwrap_or(0)
        .max(4);
    let widths: Vec<usize> = view
        .columns
        .iter()
        .enumerate()
        .map(|(c, col)| {
            let values = view.rows.iter().filter_map(move |r| r.cells.get(c)).map(|cell| cell.text());
            util::column_width(&col.label, values, MIN_COL_WIDTH, MAX_COL_WIDTH) + GLYPH_WIDTH
        })
        .collect();

    // Header
    write!(w, "{} ", util::pad_right("lead", lead_width))?;
    for (col, &cw) in view.columns.iter().zip(&widths) {
        write!(w, "{} ", util::pad_right(&col.label, cw))?;
    }
    writeln!(w)?;

    // Separator
    write!(w, "{}-", "-".repeat(lead_width))?;
    for &cw in &widths {
        write!(w, "{}-", "-".repeat(cw))?;
    }
    writeln!(w)?;

    // Rows
    for row in view.rows.iter().take(limit) {
        write!(w, "{:>width$} ", row.lead.as_str(), width = lead_width)?;
        for (cell, &cw) in row.cells.iter().zip(&widths) {
            write!(w, "{} ", cell_text(cell, cw))?;
        }
        writeln!(w)?;
    }

    if limit < num_rows {
        writeln!(w, "... ({} more leads)", num_rows - limit)?;
    }
    Ok(())
}
