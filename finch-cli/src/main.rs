use std::io::Write;
use std::path::PathBuf;

use uxn::{Device, DeviceBus, DeviceType, PortLog, Stack, Uxn};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

/// Console port which receives `stdout` characters
const CONSOLE_WRITE: u8 = 0x8;

/// Console port which receives `stderr` characters
const CONSOLE_ERROR: u8 = 0x9;

/// Finch program runner
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Program image to load and execute
    rom: PathBuf,

    /// Print the working and return stacks once the program stops
    #[clap(long)]
    stacks: bool,
}

/// Writes a console port log to the given stream, oldest byte first
fn flush_port(dev: &dyn Device, port: u8, out: &mut dyn Write) -> Result<()> {
    let mut data = dev.get(port).to_vec();
    if !data.is_empty() {
        data.reverse();
        out.write_all(&data)?;
        out.flush()?;
    }
    Ok(())
}

fn print_stack(name: &str, s: &Stack) {
    print!("{name}:");
    for b in s.as_slice() {
        print!(" {b:02x}");
    }
    println!();
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("FINCH_LOG", "info")
        .write_style_or("FINCH_LOG", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let rom = std::fs::read(&args.rom)
        .with_context(|| format!("failed to read {:?}", args.rom))?;

    let mut bus = DeviceBus::new();
    bus.bind(DeviceType::Console.index(), PortLog::new());
    let mut vm = Uxn::new(bus);

    let start = std::time::Instant::now();
    let r = vm.run(&rom);
    info!("program stopped in {:?}", start.elapsed());

    if let Some(console) = vm.bus().device(DeviceType::Console.index()) {
        flush_port(console, CONSOLE_WRITE, &mut std::io::stdout().lock())
            .context("failed to write stdout")?;
        flush_port(console, CONSOLE_ERROR, &mut std::io::stderr().lock())
            .context("failed to write stderr")?;
    }
    if args.stacks {
        print_stack("wst", vm.stack());
        print_stack("rst", vm.ret());
    }

    r.with_context(|| format!("program faulted at {:#06x}", vm.pc()))
}
