//! restcheck E2E suites
//!
//! The booking API suites live under `suites/` as YAML. They run either against
//! a live deployment or against [`FakeBooker`], an in-process axum server that
//! implements the part of the booking API the suites touch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  tests/e2e.rs (harness)                                     │
//! │    ├── ServerHandle::spawn(FakeBooker) -> base_url          │
//! │    │     (skipped when --base-url points at a live API)     │
//! │    └── SuiteRunner::run_suites(suites/*.yaml)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FakeBooker routes                                          │
//! │    GET  /ping                      201 Created              │
//! │    POST /auth                      token | Bad credentials  │
//! │    GET  /booking?firstname&lastname                         │
//! │    POST /booking                                            │
//! │    GET|PUT|PATCH|DELETE /booking/:id  (writes need cookie)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

pub mod booker;
pub mod error;
pub mod server;

pub use booker::{Booking, BookingDates, FakeBooker};
pub use error::{E2eError, E2eResult};
pub use server::{ServerConfig, ServerHandle};

/// Directory holding the bundled suites
pub fn suites_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("suites")
}
