//! HTTP surface of the Tilecast dispatch server.
//!
//! Three endpoints wrap the [`DispatchCoordinator`](tilecast_core::DispatchCoordinator):
//! `POST /work/trigger` starts an encode, `POST /work/jobs` long-polls for
//! the next tile and `POST /work/result` stores an encoded tile.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_router;
