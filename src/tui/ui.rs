//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::display::{screen_lines, COLUMNS, ROWS};
use super::app::DebuggerApp;

/// Words per row in the memory view.
const MEM_ROW_WORDS: u16 = 8;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(ROWS as u16 + 2),
            Constraint::Min(10),
        ])
        .split(frame.area());

    draw_screen(frame, rows[0], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
        ])
        .split(rows[1]);

    draw_disassembly(frame, columns[0], app);

    let middle = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(3),
        ])
        .split(columns[1]);

    draw_registers(frame, middle[0], app);
    draw_status(frame, middle[1], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(columns[2]);

    draw_memory(frame, right[0], app);
    draw_help(frame, right[1]);
}

/// Draw the memory-mapped text display.
fn draw_screen(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let lines: Vec<Line> = screen_lines(&app.cpu.mem)
        .into_iter()
        .map(Line::from)
        .collect();

    let screen = Paragraph::new(lines)
        .block(Block::default()
            .title(format!(" Display {}x{} ", COLUMNS, ROWS))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(screen, area);
}

/// Draw disassembly view starting at PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04x}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;
    let gp = |names: [crate::Register; 4]| {
        let spans: Vec<Span> = names
            .iter()
            .map(|r| Span::raw(format!("{}: {:04x}  ", r, regs.get(*r))))
            .collect();
        Line::from(spans)
    };

    use crate::Register::*;
    let content = vec![
        gp([A, B, C, X]),
        gp([Y, Z, I, J]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:04x}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw(format!("  SP: {:04x}  O: {:04x}", regs.sp, regs.o)),
        ]),
        Line::from(vec![
            Span::raw("Steps: "),
            Span::styled(format!("{}", app.cpu.steps), Style::default().fg(Color::Cyan)),
            Span::raw("  Skip: "),
            Span::styled(
                format!("{}", app.cpu.skip),
                if app.cpu.skip {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                },
            ),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view, eight words per row.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let pc = app.cpu.regs.pc;
    let sp = app.cpu.regs.sp;

    let items: Vec<ListItem> = (0..visible_rows)
        .map(|row| {
            let start = app.mem_scroll.wrapping_add(row as u16 * MEM_ROW_WORDS);
            let words = app.cpu.mem.dump(start, MEM_ROW_WORDS as usize);
            let mut spans = vec![Span::styled(format!("{:04x}:", start), Style::default().fg(Color::DarkGray))];

            for (addr, value) in words {
                let style = if addr == pc {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if addr == sp {
                    Style::default().fg(Color::Magenta)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!(" {:04x}", value), style));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓/PgUp/PgDn: Scroll  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
