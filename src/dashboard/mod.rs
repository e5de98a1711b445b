//! Local web dashboard
//!
//! Serves a launch form, a live log feed over server-sent events and a
//! health snapshot. One plan runs at a time; a launched plan executes in a
//! background task and its events are replayed to late subscribers.

mod page;
mod routes;
mod run;
mod sse;
pub mod state;

use std::net::SocketAddr;

use axum::Router;

use crate::common::Result;
pub use state::{DashboardState, RunDefaults};

/// Router with all dashboard routes bound to `state`
pub fn router(state: DashboardState) -> Router {
    routes::router().with_state(state)
}

/// Serve the dashboard on localhost until the process ends
pub async fn serve(port: u16, state: DashboardState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(root = %state.root.display(), "Serving plans");
    println!("Dashboard listening on http://localhost:{port}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
