//! Debugger application state and logic.

use crate::Cpu;
use crate::asm::disasm::disassemble_lines;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reset.
    pub program: Vec<u16>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Set after a decode error; stepping is refused until reset.
    pub faulted: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// First address shown in the memory view.
    pub mem_scroll: u16,
}

/// Steps executed per UI tick while running.
const STEPS_PER_TICK: usize = 64;

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u16>) -> Self {
        let mut cpu = Cpu::new();
        cpu.load_program(&program);

        Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            running: false,
            faulted: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.faulted {
            self.status = "CPU faulted. Press 'x' to reset.".into();
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        let (disasm, _) = crate::asm::disassemble(&self.cpu.mem, pc);
        match self.cpu.step() {
            Ok(outcome) => {
                self.status = format!("{:04x}: {} ({:?})", pc, disasm, outcome);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.faulted = true;
                self.running = false;
            }
        }
    }

    /// Run until breakpoint or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_TICK {
            if !self.running {
                return;
            }

            let pc = self.cpu.regs.pc;
            if self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC={:04x}", pc);
                return;
            }

            self.step();
            if self.running && self.cpu.regs.pc == pc && !self.cpu.skip {
                self.running = false;
                self.status = format!("Stopped: self-loop at {:04x} after {} steps", pc, self.cpu.steps);
            }
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:04x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:04x}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        self.cpu.load_program(&self.program);
        self.running = false;
        self.faulted = false;
        self.status = "Reset. Ready.".into();
    }

    /// Disassembly starting at the current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.cpu.regs.pc;
        disassemble_lines(&self.cpu.mem, pc, lines)
            .into_iter()
            .map(|line| (line.addr, line.text, line.addr == pc))
            .collect()
    }

    pub fn scroll_memory(&mut self, delta: i32) {
        self.mem_scroll = self.mem_scroll.wrapping_add((delta * 8) as u16);
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u16>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;

    fn app_for(source: &str) -> DebuggerApp {
        DebuggerApp::new(assemble(source).unwrap())
    }

    #[test]
    fn test_step_updates_status() {
        let mut app = app_for("SET A, 5\nSET B, A");
        app.step();
        assert_eq!(app.cpu.regs.gp[0], 5);
        assert!(app.status.contains("SET A, 0x5"));
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app_for("SET A, 1\nADD A, 1\nSET PC, 1");
        app.cpu.regs.pc = 1;
        app.toggle_breakpoint();
        app.cpu.regs.pc = 0;

        app.run();
        app.tick();
        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 1);
        assert!(app.status.contains("Breakpoint"));
    }

    #[test]
    fn test_run_stops_on_self_loop() {
        let mut app = app_for("SET A, 1\nhalt: SET PC, halt");
        app.run();
        app.tick();
        assert!(!app.running);
        assert!(app.status.contains("self-loop"));
    }

    #[test]
    fn test_fault_and_reset() {
        let mut app = DebuggerApp::new(vec![0x0020]);
        app.step();
        assert!(app.faulted);
        assert!(app.status.starts_with("Error"));

        app.step();
        assert_eq!(app.cpu.regs.pc, 0);

        app.reset();
        assert!(!app.faulted);
        assert_eq!(app.cpu.mem.read(0), 0x0020);
    }

    #[test]
    fn test_disassembly_view() {
        let app = app_for("SET A, 0x30\nSET B, 1");
        let lines = app.get_disassembly(2);
        assert_eq!(lines[0], (0, "SET A, 0x30".to_string(), true));
        assert_eq!(lines[1].0, 2);
        assert!(!lines[1].2);
    }
}
