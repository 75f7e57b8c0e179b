//! Rate gate for remote operations
//!
//! Composes a concurrency semaphore with a sliding admission window and
//! starts submitted work in FIFO order once both allow it.

mod config;
mod limiter;
mod window;

pub use config::GateConfig;
pub use limiter::RateGate;
pub use window::RateWindow;
