//! Digest server.
//!
//! This binary runs the TCP digest server and maps Unix signals onto its
//! control operations.

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use digest_cache::error::{EXIT_LOGIC_ERROR, EXIT_UNKNOWN_ERROR};
use digest_cache::{logging, Server, ServerArgs, ServerHandle};

fn main() {
    let args = ServerArgs::parse();

    if let Err(err) = logging::init(args.log_level) {
        eprintln!("Failed to initialize logging: {}", err);
        std::process::exit(EXIT_LOGIC_ERROR);
    }

    info!("[MAIN] Started!");
    info!("[MAIN]---- Execution parameters ---------------------------------------------------");
    info!("[MAIN] Trace level   : {}", args.log_level);
    info!("[MAIN] Port number   : {}", args.port);
    info!("[MAIN] Cache capacity: {} entries", args.cache_capacity);
    info!("[MAIN] Cache timeout : {} seconds", args.cache_timeout);
    info!("[MAIN]-----------------------------------------------------------------------------");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("[MAIN] Unable to start the runtime: {}", err);
            std::process::exit(EXIT_UNKNOWN_ERROR);
        }
    };

    let rc = runtime.block_on(serve(args));
    info!("[MAIN] {}!", decode_return_code(rc));
    drop(runtime);
    std::process::exit(rc);
}

async fn serve(args: ServerArgs) -> i32 {
    let server = Server::new(args.into_config());

    if let Err(err) = watch_signals(server.handle()) {
        error!("[MAIN] Unable to register signal handlers: {}", err);
        return EXIT_LOGIC_ERROR;
    }

    // A panic in the control loop surfaces as a JoinError here.
    match tokio::spawn(server.run()).await {
        Ok(Ok(summary)) => summary.exit_code(),
        Ok(Err(err)) => {
            error!("[MAIN] {} [ec:{:?}]", err, err.os_code());
            err.exit_code()
        }
        Err(err) => {
            error!("[MAIN] Unknown error: {}", err);
            EXIT_UNKNOWN_ERROR
        }
    }
}

/// Forward SIGUSR1, SIGUSR2, SIGTERM and SIGINT to the server.
fn watch_signals(handle: ServerHandle) -> std::io::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = usr1.recv() => {
                    info!("[MAIN] Received SIGUSR1");
                    handle.clear_cache();
                }
                Some(()) = usr2.recv() => {
                    info!("[MAIN] Received SIGUSR2");
                    handle.print_cache();
                }
                Some(()) = term.recv() => {
                    info!("[MAIN] Received SIGTERM");
                    handle.finish();
                }
                Some(()) = int.recv() => {
                    info!("[MAIN] Received SIGINT");
                    handle.cancel();
                }
                else => break,
            }
        }
    });
    Ok(())
}

fn decode_return_code(rc: i32) -> &'static str {
    match rc {
        0 => "Finished",
        1 => "Cancelled",
        _ => "Aborted",
    }
}
