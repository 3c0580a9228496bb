//! DCPU-16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `dcpu16-emu step <image>` - Step through a program one key press at a time
//! - `dcpu16-emu run <image>` - Run a program to a step limit
//! - `dcpu16-emu debug <image>` - Interactive TUI debugger
//! - `dcpu16-emu asm <source>` - Assemble to a binary image
//! - `dcpu16-emu disasm <image>` - Disassemble a binary image

use clap::{Parser, Subcommand};
use dcpu16::{Cpu, OddBytePolicy};
use std::io::{Read, Write};
use std::path::Path;

#[derive(Parser)]
#[command(name = "dcpu16-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the DCPU-16 16-bit computer")]
struct Cli {
    /// How to treat a trailing byte that does not complete a word
    #[arg(long, value_enum, default_value_t = OddBytePolicy::Drop, global = true)]
    odd_byte: OddBytePolicy,
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the display and execute one step per byte read from stdin
    Step {
        /// Path to the binary image (or .asm source)
        program: String,
    },
    /// Run a program until it loops on itself or hits the step limit
    Run {
        /// Path to the binary image (or .asm source)
        program: String,
        /// Maximum number of steps to run
        #[arg(short, long, default_value = "100000")]
        max_steps: u64,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the binary image (or .asm source)
        program: String,
    },
    /// Assemble source to a binary image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the binary image
        image: String,
        /// First address to disassemble
        #[arg(long, default_value = "0", value_parser = parse_address)]
        start: u16,
        /// Number of instructions to list (defaults to the whole image)
        #[arg(long)]
        count: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Step { program } => {
            step_program(&program, cli.odd_byte);
        }
        Commands::Run { program, max_steps, json } => {
            run_program(&program, cli.odd_byte, max_steps, json);
        }
        Commands::Debug { program } => {
            debug_program(&program, cli.odd_byte);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { image, start, count } => {
            disassemble_file(&image, cli.odd_byte, start, count);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}

/// Accepts `0x1f`-style hex or plain decimal.
fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Load a program, assembling it first when the path ends in `.asm`.
fn load_program(path: &str, policy: OddBytePolicy) -> Vec<u16> {
    if path.ends_with(".asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("cannot read {}: {}", path, e)));
        let words = dcpu16::assemble(&source)
            .unwrap_or_else(|e| fail(format!("{}: {}", path, e)));
        log::info!("assembled {} words from {}", words.len(), path);
        words
    } else {
        dcpu16::load_image(path, policy).unwrap_or_else(|e| fail(e))
    }
}

fn boot(path: &str, policy: OddBytePolicy) -> Cpu {
    let program = load_program(path, policy);
    let mut cpu = Cpu::new();
    cpu.load_program(&program);
    cpu
}

fn step_program(path: &str, policy: OddBytePolicy) {
    let mut cpu = boot(path, policy);
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    let mut key = [0u8; 1];

    loop {
        let pc = cpu.regs.pc;
        let (asm, next) = dcpu16::disassemble(&cpu.mem, pc);
        let words = next.wrapping_sub(pc);
        let hex: Vec<String> = cpu
            .mem
            .dump(pc, words as usize)
            .iter()
            .map(|(_, w)| format!("{:04x}", w))
            .collect();

        let frame = writeln!(
            stdout,
            "\x1b[2J\x1b[H{}next: {} ({} words, {})",
            dcpu16::display::render_screen(&cpu.mem),
            asm,
            words,
            hex.join(" ")
        )
        .and_then(|_| stdout.flush());
        if let Err(e) = frame {
            fail(e);
        }

        match stdin.read(&mut key) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => fail(e),
        }

        if let Err(e) = cpu.step() {
            fail(format!("at PC={:04x}: {}", pc, e));
        }
    }
}

fn run_program(path: &str, policy: OddBytePolicy, max_steps: u64, json: bool) {
    let mut cpu = boot(path, policy);

    let stop = match cpu.run_limited(max_steps) {
        Ok(stop) => stop,
        Err(e) => fail(format!("at PC={:04x}: {}", cpu.regs.pc, e)),
    };
    log::info!("run stopped: {:?}", stop);

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(e),
        }
        return;
    }

    print!("{}", dcpu16::display::render_screen(&cpu.mem));
    println!("━━━ Result ━━━");
    println!("Stop:  {:?}", stop);
    println!("Steps: {}", cpu.steps);
    for reg in dcpu16::Register::ALL {
        print!("{}={:04x} ", reg, cpu.regs.get(reg));
    }
    println!();
    println!("PC={:04x} SP={:04x} O={:04x} skip={}", cpu.regs.pc, cpu.regs.sp, cpu.regs.o, cpu.skip);

    if stop == dcpu16::RunStop::StepLimit {
        println!();
        println!("Reached step limit ({}). Use --max-steps to increase.", max_steps);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, policy: OddBytePolicy) {
    let program = load_program(path, policy);
    if let Err(e) = dcpu16::run_debugger(program) {
        fail(format!("debugger: {}", e));
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _policy: OddBytePolicy) {
    fail("built without the `tui` feature");
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        Path::new(source_path).with_extension("bin").to_string_lossy().into_owned()
    });

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("cannot read {}: {}", source_path, e)));

    let words = dcpu16::assemble(&source)
        .unwrap_or_else(|e| fail(format!("{}: {}", source_path, e)));

    if let Err(e) = dcpu16::save_image(&out_path, &words) {
        fail(e);
    }

    println!("Assembled {} words: {} → {}", words.len(), source_path, out_path);
}

fn disassemble_file(path: &str, policy: OddBytePolicy, start: u16, count: Option<usize>) {
    let words = dcpu16::load_image(path, policy).unwrap_or_else(|e| fail(e));

    let mut mem = dcpu16::Memory::new();
    mem.load_program(0, &words);

    let count = count.unwrap_or_else(|| instructions_in(&mem, start, words.len()));

    print!("{}", dcpu16::asm::disassemble_range(&mem, start, count));
}

/// Number of instructions between `start` and the end of an image of `len` words.
fn instructions_in(mem: &dcpu16::Memory, start: u16, len: usize) -> usize {
    let mut count = 0;
    let mut addr = start as usize;
    while addr < len {
        let (_, next) = dcpu16::disassemble(mem, addr as u16);
        count += 1;
        if (next as usize) <= addr {
            break;
        }
        addr = next as usize;
    }
    count
}
