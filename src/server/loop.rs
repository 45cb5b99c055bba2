// Server loop module
// Accepts connections until shutdown, then drains in-flight connections

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept loop
///
/// Every connection runs on its own task, so filesystem work for one request
/// never holds up accepting or serving another. When `shutdown` resolves the
/// listener is dropped, every connection is told to close once its current
/// response is written, and the loop waits for them.
pub async fn start_server_loop<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown is checked first so queued connections do not delay it
            biased;

            () = &mut shutdown => {
                logger::log_shutdown(tasks.len());
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &stop_rx,
                            &mut tasks,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            // Reap finished connection tasks
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = result {
                    logger::log_error(&format!("Connection task failed: {e}"));
                }
            }
        }
    }

    drop(listener);
    stop_tx.send_replace(true);
    while tasks.join_next().await.is_some() {}

    logger::log_stopped();
    Ok(())
}
