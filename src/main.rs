use std::net::TcpListener;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use riscv_gdbserver::conn::StdioConnection;
use riscv_gdbserver::stub::KillBehaviour;
use riscv_gdbserver::target::Target;
use riscv_gdbserver::targets;
use riscv_gdbserver::trace::TraceFlags;
use riscv_gdbserver::GdbServer;
use riscv_gdbserver::GdbServerError;

#[derive(Parser)]
#[command(name = "riscv-gdbserver", version, about = "GDB RSP server for RISC-V cores")]
struct Args {
    /// Core to serve (matched case-insensitively)
    #[arg(short, long)]
    core: String,

    /// Trace flag: rsp, conn, break, vcd or silent (may be repeated)
    #[arg(short, long = "trace", value_name = "FLAG")]
    trace: Vec<String>,

    /// Minimise informative messages (synonym for --trace silent)
    #[arg(short = 'q', long)]
    silent: bool,

    /// Serve one session over stdin/stdout instead of listening on TCP
    #[arg(short = 's', long)]
    stdin: bool,

    /// TCP port to listen on
    #[arg(value_name = "rsp-port", required_unless_present = "stdin")]
    port: Option<u16>,
}

fn parse_trace_flags(args: &Args) -> Result<TraceFlags, String> {
    let mut flags = TraceFlags::empty();
    for name in &args.trace {
        match TraceFlags::from_flag_name(name) {
            Some(flag) => flags |= flag,
            None => return Err(format!("Bad trace flag {name}")),
        }
    }
    if args.silent {
        flags |= TraceFlags::SILENT;
    }
    Ok(flags)
}

fn init_logging(flags: TraceFlags) {
    let base = if flags.contains(TraceFlags::SILENT) {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(base);
    if flags.contains(TraceFlags::RSP) {
        builder.filter_module("rsp", LevelFilter::Trace);
    }
    if flags.contains(TraceFlags::CONN) {
        builder.filter_module("conn", LevelFilter::Trace);
    }
    if flags.contains(TraceFlags::BREAK) {
        builder.filter_module("break", LevelFilter::Trace);
    }
    builder.init();
}

/// Accept one debugger at a time, forever; resume accepting on disconnect.
fn serve_tcp(port: u16, target: &mut dyn Target) -> ExitCode {
    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("cannot listen on port {port}: {e}");
            return ExitCode::FAILURE;
        }
    };

    loop {
        let (stream, peer) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!(target: "conn", "accept failed: {e}");
                continue;
            }
        };
        log::info!(target: "conn", "debugger connected from {peer}");

        let mut server = GdbServer::new(stream, target, KillBehaviour::ResetOnKill);
        match server.serve() {
            Ok(reason) => log::info!(target: "conn", "debugger gone ({reason:?}); listening again"),
            Err(GdbServerError::Connection(e)) => {
                log::warn!(target: "conn", "connection lost: {e}; listening again")
            }
            Err(e @ GdbServerError::Target(_)) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }
}

/// One session on the standard streams; exit follows disconnect.
fn serve_stdin(target: &mut dyn Target) -> ExitCode {
    let mut server = GdbServer::new(StdioConnection::new(), target, KillBehaviour::ExitOnKill);
    match server.serve() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let flags = match parse_trace_flags(&args) {
        Ok(flags) => flags,
        Err(msg) => {
            eprintln!("ERROR: {msg}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(flags);

    let mut target = match targets::create(&args.core, &flags) {
        Some(target) => target,
        None => {
            eprintln!("ERROR: Unrecognized core: {}: exiting", args.core);
            return ExitCode::FAILURE;
        }
    };

    let code = if args.stdin {
        serve_stdin(target.as_mut())
    } else if let Some(port) = args.port {
        serve_tcp(port, target.as_mut())
    } else {
        // Unreachable: clap requires the positional when --stdin is absent.
        eprintln!("ERROR: missing <rsp-port>");
        ExitCode::FAILURE
    };

    drop(target);
    targets::timestamp::clear();
    code
}
