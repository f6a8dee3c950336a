//! RAX Chat Server - Entry Point
//!
//! A multi-client TCP chat relay: every line a client sends is acknowledged
//! and rebroadcast to all connected clients.

use env_logger::Env;
use log::{error, info, warn};
use tokio::io::BufReader;

use rax_chat_server::error::{ChatServerError, handle_error};
use rax_chat_server::server::{ConsoleOutcome, run_console};
use rax_chat_server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // RUST_LOG still wins; INFO otherwise
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            handle_error(&ChatServerError::from(e));
            std::process::exit(1);
        }
    };

    info!("Launching chat server...");

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&ChatServerError::from(e));
            std::process::exit(1);
        }
    };

    let handle = server.handle();
    let mut acceptor = tokio::spawn(server.start());

    let console = run_console(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        &handle,
    );

    tokio::select! {
        biased;

        outcome = console => {
            match outcome {
                Ok(ConsoleOutcome::Exit) => {}
                Ok(ConsoleOutcome::InputClosed) => {
                    info!("Console input closed; press Ctrl-C to stop the server");
                    wait_for_ctrl_c().await;
                }
                Err(e) => {
                    handle_error(&ChatServerError::from(e));
                    wait_for_ctrl_c().await;
                }
            }
            handle.stop().await;
        }
        _ = wait_for_ctrl_c() => {
            handle.stop().await;
        }
        finished = &mut acceptor => {
            // Only a failed listener ends the acceptor before a stop request
            if let Err(e) = finished {
                error!("Acceptor task failed: {}", e);
            }
            std::process::exit(1);
        }
    }

    match tokio::time::timeout(config.shutdown_grace(), acceptor).await {
        Ok(Ok(())) => info!("Server stopped"),
        Ok(Err(e)) => error!("Acceptor task failed: {}", e),
        Err(_) => warn!(
            "Acceptor still running after {:?}; exiting anyway",
            config.shutdown_grace()
        ),
    }

    // The stdin reader may still be parked on a blocking read
    std::process::exit(0);
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
