use clap::Parser;
use clap_num::maybe_hex;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use armemu::cpu::Cpu;
use armemu::decode::Instr;
use armemu::elf_utils::load_elf;
use armemu::hexfile::load_hex_file;

/// Simulate an ARMv8 (AArch64) subset processor
///
/// Loads a program into simulated memory and either runs it to the
/// halt instruction or drops into an interactive debug shell.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the program: a flat hex listing, or an ELF image with
    /// --elf
    input: String,

    /// Treat the input as an ELF image instead of a hex listing
    #[arg(long)]
    elf: bool,

    /// Run to the halt instruction instead of opening the shell
    #[arg(short, long)]
    run: bool,

    /// Start execution from this address instead of the program's
    /// own start (use 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u64>)]
    base: Option<u64>,

    /// Stop after this many instructions when running to completion
    #[arg(short, long, default_value_t = 1_000_000)]
    max_steps: u64,

    /// Print each instruction as it executes
    #[arg(short, long)]
    trace: bool,
}

fn main() {
    let args = Args::parse();

    let mut cpu = Cpu::new();
    let start = if args.elf {
        load_elf(&mut cpu.memory, &args.input).map_err(|e| e.to_string())
    } else {
        load_hex_file(&mut cpu.memory, &args.input).map_err(|e| e.to_string())
    };
    let start = match start {
        Ok(start) => start,
        Err(e) => {
            eprintln!("error loading {}: {e}", args.input);
            std::process::exit(1);
        }
    };
    cpu.current.pc = args.base.unwrap_or(start);
    cpu.next = cpu.current.clone();

    if args.run {
        run_instructions(&mut cpu, args.max_steps, args.trace);
        print_registers(&cpu);
    } else if let Err(e) = shell(&mut cpu, args.trace) {
        eprintln!("shell error: {e}");
        std::process::exit(1);
    }
}

/// Step until the halt instruction clears the run flag, or the step
/// bound is reached
fn run_instructions(cpu: &mut Cpu, max_steps: u64, trace: bool) {
    if !cpu.run {
        println!("simulator is halted; nothing to run");
        return;
    }
    let mut steps = 0;
    while cpu.run && steps < max_steps {
        if trace {
            print_disassembly(cpu);
        }
        cpu.cycle();
        steps += 1;
    }
    if cpu.run {
        println!("stopped after {steps} instructions without reaching hlt");
    } else {
        println!("simulator halted after {steps} instructions");
    }
}

fn print_disassembly(cpu: &Cpu) {
    let word = cpu.fetch_current_instruction();
    match Instr::decode(word) {
        Ok(instr) => println!("{:#010x}: {instr}", cpu.current.pc),
        Err(e) => println!("{:#010x}: {e}", cpu.current.pc),
    }
}

fn print_registers(cpu: &Cpu) {
    let state = &cpu.current;
    println!("pc:    {:#018x}", state.pc);
    println!(
        "flags: z={} n={}",
        u8::from(state.flags.z),
        u8::from(state.flags.n)
    );
    for n in 0..31 {
        let value = state
            .regs
            .read(n)
            .expect("register indices below 32 are valid");
        println!("x{n:<4} {value:#018x}");
    }
    println!("xzr   {:#018x}", 0);
}

fn print_memory(cpu: &Cpu, low: u64, high: u64) {
    for addr in (low & !0x3..=high).step_by(4) {
        println!("{addr:#010x}: {:#010x}", cpu.memory.read32(addr));
    }
}

const HELP: &str = "commands:
  go               run until the halt instruction
  run N            execute N instructions
  step             execute one instruction, printing it
  rdump            dump registers, flags and pc
  mdump LO HI      dump memory words from LO to HI
  input REG VAL    set register REG (e.g. x5) to VAL
  pc ADDR          set the program counter
  help, ?          show this help
  quit             leave the simulator";

/// Parse a register operand like x5 (or plain 5)
fn parse_register(operand: &str) -> Result<u8, String> {
    let digits = operand.strip_prefix('x').unwrap_or(operand);
    let which: u8 = digits
        .parse()
        .map_err(|_| format!("bad register name '{operand}'"))?;
    if which > 31 {
        return Err(format!("bad register name '{operand}'"));
    }
    Ok(which)
}

/// Execute a shell command. Returns false when the shell should exit.
fn dispatch(cpu: &mut Cpu, line: &str, trace: bool) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    let result = match *words.as_slice() {
        [] => Ok(()),
        ["go"] => {
            run_instructions(cpu, u64::MAX, trace);
            Ok(())
        }
        ["run", count] => maybe_hex::<u64>(count).map(|count| {
            run_instructions(cpu, count, trace);
        }),
        ["step"] => {
            if cpu.run {
                print_disassembly(cpu);
                cpu.cycle();
            } else {
                println!("simulator is halted");
            }
            Ok(())
        }
        ["rdump"] => {
            print_registers(cpu);
            Ok(())
        }
        ["mdump", low, high] => maybe_hex::<u64>(low).and_then(|low| {
            maybe_hex::<u64>(high).map(|high| {
                print_memory(cpu, low, high);
            })
        }),
        ["input", register, value] => parse_register(register).and_then(|which| {
            maybe_hex::<u64>(value).map(|value| {
                cpu.current
                    .regs
                    .write(which, value)
                    .expect("register number was validated by the parser");
            })
        }),
        ["pc", addr] => maybe_hex::<u64>(addr).map(|addr| {
            cpu.current.pc = addr;
        }),
        ["help"] | ["?"] => {
            println!("{HELP}");
            Ok(())
        }
        ["quit"] | ["exit"] => return false,
        _ => Err(format!("unknown command '{line}' (try help)")),
    };
    if let Err(e) = result {
        println!("{e}");
    }
    true
}

/// Interactive debug shell over the simulator
fn shell(cpu: &mut Cpu, trace: bool) -> rustyline::Result<()> {
    println!("armsim debug shell (help for commands)");
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("armsim> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if !dispatch(cpu, &line, trace) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
