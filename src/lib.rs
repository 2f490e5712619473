//! Fixed-timestep EV charging dispatch simulator.
//!
//! A [`sim::dispatcher::Dispatcher`] walks a datetime clock and, on every
//! tick, shares the locally metered energy plus a grid allowance between the
//! cars that are charging, scaling all requests by one common factor when
//! demand exceeds supply.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io {
    pub mod export;
}
pub mod logging;
pub mod runner;
/// Clock, smart meter, trigger, hub, optimizer, logger, and dispatcher.
pub mod sim;
