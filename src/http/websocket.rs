//! WebSocket (protocol upgrade) relay.
//!
//! # Responsibilities
//! - Wait for both sides of a 101 Switching Protocols exchange to upgrade
//! - Copy bytes in both directions until either side closes
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded stream ────→ Proxy ←──── upgraded stream ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Byte-level relay: frames are never parsed, so ping/pong and close
//!   pass through untouched
//! - One spawned task per upgraded pair; it ends when either side closes

use axum::http::Uri;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

/// Join the client and upstream upgraded connections.
pub async fn relay(client: OnUpgrade, upstream: OnUpgrade, target: Uri) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(target_uri = %target, error = %e, "Upgrade handshake failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);

    tracing::debug!(target_uri = %target, "Upgraded connection established");

    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_upstream, to_client)) => {
            tracing::debug!(
                target_uri = %target,
                bytes_to_upstream = to_upstream,
                bytes_to_client = to_client,
                "Upgraded connection closed"
            );
        }
        Err(e) => {
            tracing::debug!(target_uri = %target, error = %e, "Upgraded connection aborted");
        }
    }
}
