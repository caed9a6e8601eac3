use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use cinder::bytecode::disasm::disassemble;
use cinder::bytecode::{CodeImage, CompileContext, CompilerOptions, FixKind, Ident, ResolveMode, TypeClass};
use cinder::config;

#[derive(Debug, Parser)]
#[command(name = "cinder", version, about = "Script bytecode backend tools")]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with compiler options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a compiled image
    Dump { file: PathBuf },

    /// Compile a built-in loop and print or write it
    Demo {
        /// Leave identifier references for the loader
        #[arg(long)]
        deferred: bool,

        /// Treat the first warning as fatal
        #[arg(long)]
        warnings_as_errors: bool,

        /// Write the image here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let mut options = config::load_options(args.config.as_deref()).context("loading compiler options")?;
    debug!(?options, "options loaded");

    match args.command {
        Command::Dump { file } => dump(&file),
        Command::Demo {
            deferred,
            warnings_as_errors,
            output,
        } => {
            if deferred {
                options.mode = ResolveMode::Deferred;
            }
            options.warnings_as_errors |= warnings_as_errors;
            demo(options, output)
        }
    }
}

fn dump(file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("failed to read '{}'", file.display()))?;
    let image = CodeImage::read(&bytes).with_context(|| format!("failed to decode '{}'", file.display()))?;
    print!("{}", disassemble(&image)?);
    Ok(())
}

/// Word values for the demo listing only; the VM owns the real opcode table.
mod demo_op {
    pub const LOAD_UINT: u32 = 0x10;
    pub const LOAD_FLOAT: u32 = 0x11;
    pub const STORE_LOCAL: u32 = 0x12;
    pub const CMP_LT: u32 = 0x20;
    pub const JUMP_IF_NOT: u32 = 0x30;
    pub const JUMP: u32 = 0x31;
    pub const CALL: u32 = 0x40;
    pub const INC_LOCAL: u32 = 0x50;
    pub const RETURN: u32 = 0x60;
}

/// `function Demo::main() { for (%i = 0; %i < "3"; %i++) echo(%i); }`
fn demo(options: CompilerOptions, output: Option<PathBuf>) -> Result<()> {
    let mut ctx = CompileContext::new(options);
    ctx.begin_unit(Some("<demo>"));
    ctx.begin_function();

    let i = ctx.assign_var("%i", TypeClass::UInt, false, 1)?;
    let limit = ctx.string_to_number("3", Some(1))?;
    let limit = ctx.intern_float(limit);

    let cs = ctx.stream_mut();
    let start = cs.tell();
    cs.add_break_line(1, start);
    cs.emit_words(&[demo_op::LOAD_UINT, 0, demo_op::STORE_LOCAL, i]);

    cs.mark_loop_fixup_scope();
    let loop_start = cs.tell();
    cs.emit_words(&[demo_op::LOAD_FLOAT, limit, demo_op::CMP_LT, i, demo_op::JUMP_IF_NOT]);
    cs.emit_fix(FixKind::Break);

    let call = cs.emit(demo_op::CALL);
    ctx.stream_mut().add_break_line(2, call);
    ctx.emit_ident(Some(&Ident::new("echo", 0xec40)));
    let reg = ctx.lookup_var("%i", 2)?;
    let cs = ctx.stream_mut();
    cs.emit(reg);

    let continue_point = cs.emit_words(&[demo_op::INC_LOCAL, i]);
    cs.emit(demo_op::JUMP);
    cs.emit_fix(FixKind::LoopBlockStart);
    let break_point = cs.tell();
    cs.resolve_loop_fixups(loop_start, break_point, continue_point)?;
    cs.emit(demo_op::RETURN);

    ctx.end_function("Demo", "main");

    match output {
        Some(path) => {
            let mut bytes = Vec::new();
            ctx.write_image(&mut bytes)?;
            fs::write(&path, &bytes).with_context(|| format!("failed to write '{}'", path.display()))?;
            info!(bytes = bytes.len(), path = %path.display(), "wrote compiled image");
        }
        None => print!("{}", disassemble(&ctx.finish()?)?),
    }
    Ok(())
}
