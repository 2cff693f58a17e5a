//! Entry point: parses CLI flags, builds the configured machine's IO
//! drivers and scheduler, then runs the G-code request/reply loop
//! until EOF, M0, M112, or a signal requests shutdown.

mod cli;
mod gcode_source;
mod gpio_reader;
mod machine;
mod state;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use io_drivers::PinRegistry;
use scheduler::Scheduler;

use cli::Cli;
use gcode_source::GcodeFileStack;
use gpio_reader::GpioLevelReader;
use machine::{GenericCartesianMachine, Machine};
use state::{Outcome, State};

/// BCM2835 System Timer peripheral, physical base per the original
/// firmware's `TIMER_BASE`. `HardwareScheduler` reads its free-running
/// 64-bit counter (`CLO` at word offset 1, `CHI` at word offset 2) to
/// establish wall-clock time for the DMA ring.
const SYSTEM_TIMER_PHYSICAL_BASE: usize = 0x2000_3000;
const SYSTEM_TIMER_LEN_WORDS: usize = 4;

/// BCM2835 GPIO peripheral, physical base per the original firmware's
/// `GPIO_BASE`. Mapped separately from the system timer since
/// [`GpioLevelReader`] reads pin levels synchronously rather than
/// through the DMA ring.
const GPIO_PHYSICAL_BASE: usize = 0x2020_0000;
const GPIO_LEN_WORDS: usize = 16;

#[cfg(feature = "raspberry-pi")]
type Mem = hw_scheduler::DevMemMap;
#[cfg(not(feature = "raspberry-pi"))]
type Mem = hw_scheduler::VecMemMap;

/// Maps `len_words` words starting at `physical_base`. On a real
/// Raspberry Pi (the `raspberry-pi` feature) this is a genuine
/// `/dev/mem` mapping; otherwise it's an in-process stand-in, since
/// without real hardware there's nothing for a physical address to
/// mean.
#[cfg(feature = "raspberry-pi")]
fn map_peripheral(physical_base: usize, len_words: usize) -> anyhow::Result<Mem> {
    Ok(hw_scheduler::DevMemMap::new(physical_base, len_words)?)
}
#[cfg(not(feature = "raspberry-pi"))]
fn map_peripheral(physical_base: usize, len_words: usize) -> anyhow::Result<Mem> {
    Ok(hw_scheduler::VecMemMap::new(len_words, physical_base))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(%err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let (root, root_fd): (Box<dyn BufRead + Send>, Option<i32>) = match &cli.input_path {
        Some(path) => {
            let file = File::open(path)?;
            let fd = gcode_source::raw_fd_of(&file);
            (Box::new(BufReader::new(file)), fd)
        }
        None => {
            let stdin = io::stdin();
            let fd = gcode_source::raw_fd_of(&stdin);
            (Box::new(BufReader::new(stdin)), fd)
        }
    };
    let mut mirror: Box<dyn Write + Send> = match &cli.output_path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::sink()),
    };
    let fsroot = match cli.fsroot.clone() {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let files = GcodeFileStack::new_with_fd(root, fsroot, root_fd);

    let pins = PinRegistry::new();
    let gpio_mem = map_peripheral(GPIO_PHYSICAL_BASE, GPIO_LEN_WORDS)?;
    let reader: Arc<dyn io_drivers::PinReader + Send + Sync> = Arc::new(GpioLevelReader::new(gpio_mem));

    let machine = GenericCartesianMachine;
    let io = machine.build_io(&pins, reader)?;

    let timer_mem = map_peripheral(SYSTEM_TIMER_PHYSICAL_BASE, SYSTEM_TIMER_LEN_WORDS)?;
    let scheduler = Scheduler::new(timer_mem, hw_scheduler::constants::SOURCE_BUFFER_FRAMES, pins)?;

    let mut state = State::new(&machine, scheduler, io, files);
    let mut exit_code = ExitCode::SUCCESS;
    let stdout = io::stdout();

    while state.should_continue() {
        let line = match state.next_line()? {
            Some(line) => line,
            None => break,
        };
        let _ = mirror.write_all(line.as_bytes());

        match state.dispatch_line(&line) {
            Outcome::Reply(response) => {
                if let Some(wire) = response.to_wire() {
                    let mut out = stdout.lock();
                    out.write_all(wire.as_bytes())?;
                    out.flush()?;
                }
            }
            Outcome::Exit(code) => {
                exit_code = code;
                break;
            }
        }
    }

    state.shutdown();
    Ok(exit_code)
}
