//! Debugger application state and logic.

use crate::{BufferedConsole, Machine};
use crate::asm::Image;
use crate::asm::disasm::{disassemble_instruction, format_instruction};
use std::collections::HashSet;

/// Instructions executed per UI frame while running.
const STEPS_PER_TICK: usize = 1000;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Console the machine talks to; output is shown in its own panel.
    pub console: BufferedConsole,
    /// Images to reload on reset.
    pub images: Vec<Image>,
    /// PC to start from after a reset.
    pub start_pc: u16,
    /// Scripted input to queue after a reset.
    pub input: String,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// First address shown in the memory view.
    pub mem_scroll: u16,
}

impl DebuggerApp {
    /// Create a new debugger with the images loaded.
    pub fn new(images: Vec<Image>, start_pc: u16, input: String) -> Self {
        let mut app = Self {
            machine: Machine::new(),
            console: BufferedConsole::new(),
            images,
            start_pc,
            input,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: start_pc,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.machine.is_running() {
            self.status = format!("Machine stopped: {:?}", self.machine.state);
            self.running = false;
            return;
        }

        let pc = self.machine.regs.pc;
        match self.machine.step(&mut self.console) {
            Ok(instr) => {
                self.status = format!("x{:04X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
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

            if !self.machine.is_running() {
                self.running = false;
                self.status = format!("{:?} after {} cycles", self.machine.state, self.machine.cycles);
                return;
            }

            // Check after stepping so resuming from a breakpoint makes progress.
            self.step();

            let pc = self.machine.regs.pc;
            if self.running && self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at x{:04X}", pc);
                return;
            }
        }
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at x{:04X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at x{:04X}", pc);
        }
    }

    /// Reset the machine, reload images and input.
    pub fn reset(&mut self) {
        self.machine.reset();
        for image in &self.images {
            self.machine.load_image(image);
        }
        self.machine.regs.jump(self.start_pc);
        self.console = BufferedConsole::with_input(&self.input);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.wrapping_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.mem_scroll = self.mem_scroll.wrapping_add(1);
    }

    /// Get disassembly around the current PC.
    ///
    /// Each entry is (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.machine.regs.pc;
        let start = pc.wrapping_sub((lines / 2) as u16);

        self.machine
            .mem
            .dump(start, lines)
            .into_iter()
            .map(|(addr, word)| (addr, disassemble_instruction(word), addr == pc))
            .collect()
    }
}

/// Run the debugger on a set of images.
pub fn run_debugger(images: Vec<Image>, start_pc: u16, input: String) -> std::io::Result<()> {
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

    let mut app = DebuggerApp::new(images, start_pc, input);

    // Main loop
    let result = loop {
        if let Err(e) = terminal.draw(|frame| super::ui::draw(frame, &app)) {
            break Err(e);
        }

        match event::poll(Duration::from_millis(50)) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = event::read() {
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
                            KeyCode::Up => app.scroll_up(),
                            KeyCode::Down => app.scroll_down(),
                            _ => {}
                        }
                    }
                }
            }
            Ok(false) => {}
            Err(e) => break Err(e),
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break Ok(());
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}
