//! Memory-mapped text display.
//!
//! Words 0x8000 to 0x8000 + 80*25 hold an 80x25 character grid, one word
//! per cell, row-major. A zero word is a blank cell.

use crate::cpu::Memory;

/// First word of video memory.
pub const VIDEO_BASE: u16 = 0x8000;
pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;

/// Character shown for one cell.
pub fn cell_char(word: u16) -> char {
    if word == 0 {
        return ' ';
    }
    match char::from_u32(word as u32) {
        Some(c) if !c.is_control() => c,
        _ => '?',
    }
}

/// The display as 25 rows of 80 characters.
pub fn screen_lines(mem: &Memory) -> Vec<String> {
    (0..ROWS)
        .map(|row| {
            (0..COLUMNS)
                .map(|col| {
                    let addr = VIDEO_BASE.wrapping_add((row * COLUMNS + col) as u16);
                    cell_char(mem.read(addr))
                })
                .collect()
        })
        .collect()
}

/// The display as a single string, one line per row.
pub fn render_screen(mem: &Memory) -> String {
    let mut out = String::with_capacity((COLUMNS + 1) * ROWS);
    for line in screen_lines(mem) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_screen() {
        let mem = Memory::new();
        let lines = screen_lines(&mem);
        assert_eq!(lines.len(), ROWS);
        assert!(lines.iter().all(|l| l.len() == COLUMNS && l.trim().is_empty()));
    }

    #[test]
    fn test_rows_wrap_every_80_cells() {
        let mut mem = Memory::new();
        mem.write(VIDEO_BASE, 'H' as u16);
        mem.write(VIDEO_BASE + 1, 'i' as u16);
        mem.write(VIDEO_BASE + 80, '!' as u16);

        let lines = screen_lines(&mem);
        assert!(lines[0].starts_with("Hi "));
        assert!(lines[1].starts_with('!'));
    }

    #[test]
    fn test_render_screen() {
        let mut mem = Memory::new();
        mem.write(VIDEO_BASE + 79, 'x' as u16);
        let screen = render_screen(&mem);
        assert_eq!(screen.lines().count(), ROWS);
        assert_eq!(screen.lines().next().unwrap().chars().nth(79), Some('x'));
    }

    #[test]
    fn test_cell_char() {
        assert_eq!(cell_char(0), ' ');
        assert_eq!(cell_char('A' as u16), 'A');
        assert_eq!(cell_char(0x0007), '?');
        assert_eq!(cell_char(0xd800), '?');
    }
}
