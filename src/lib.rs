// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app;
pub mod app_dirs;
pub mod batches;
pub mod config;
pub mod editor;
pub mod export;
pub mod filter;
pub mod grid;
pub mod local;
pub mod remote;
pub mod runtime;
pub mod sample;
pub mod session;
pub mod ui;

/// Event-loop cadence; notices and other timers count in these ticks.
pub const TICK_RATE_MS: u64 = 100;
