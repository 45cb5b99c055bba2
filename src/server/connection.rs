// Connection handling module
// Accepts a single TCP connection and serves it on its own task,
// closing it gracefully when the server shuts down

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing the connection limit, and spawn its task
/// into `tasks`. Rejected connections are closed without a response.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: &watch::Receiver<bool>,
    tasks: &mut JoinSet<()>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    tasks.spawn(serve_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        shutdown.clone(),
    ));
}

/// Serve HTTP/1.1 on one connection until it closes or shutdown starts
///
/// On shutdown an idle connection is closed at once; a busy one finishes its
/// current response, bounded by `write_timeout`.
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);

    let performance = &state.config.performance;
    let drain_timeout = Duration::from_secs(performance.write_timeout);

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .keep_alive(performance.keep_alive_timeout > 0);
    if performance.read_timeout > 0 {
        builder.header_read_timeout(Duration::from_secs(performance.read_timeout));
    }

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer_addr)),
    );
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            match tokio::time::timeout(drain_timeout, conn.as_mut()).await {
                Ok(result) => result,
                Err(_) => {
                    logger::log_debug(&format!(
                        "Connection from {peer_addr} dropped after {} seconds of draining",
                        drain_timeout.as_secs()
                    ));
                    Ok(())
                }
            }
        }
    };

    if let Err(err) = result {
        logger::log_connection_error(&err);
    }

    conn_counter.fetch_sub(1, Ordering::SeqCst);
}
