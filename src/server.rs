//! HTTP serving with graceful shutdown

use std::{future::Future, time::Duration};

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// How long canceled requests get to write their response before the
/// server task is aborted
pub const CANCEL_DRAIN: Duration = Duration::from_secs(1);

/// Serve `app` until `signal` resolves, then drain.
///
/// In-flight requests get `grace` to finish normally. Past that, `shutdown`
/// is canceled so every outstanding request context reports `Canceled`, and
/// the server gets [`CANCEL_DRAIN`] to deliver those responses before it is
/// aborted.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = signal => {}
    }

    let _ = stop_tx.send(());

    if let Ok(result) = tokio::time::timeout(grace, &mut server).await {
        result??;
        tracing::info!("Server stopped");
        return Ok(());
    }

    tracing::warn!(
        "In-flight requests did not drain within {:?}, canceling them",
        grace
    );
    shutdown.cancel();

    match tokio::time::timeout(CANCEL_DRAIN, &mut server).await {
        Ok(result) => {
            result??;
            tracing::info!("Server stopped after canceling in-flight requests");
        }
        Err(_) => {
            tracing::warn!("Server did not stop within {:?}, aborting", CANCEL_DRAIN);
            server.abort();
        }
    }

    Ok(())
}
