/// Simulation clock for fixed-step datetime ticks.
pub mod clock;
/// Tick loop sequencing trigger, optimizer, hub, and logger.
pub mod dispatcher;
pub mod hub;
pub mod kpi;
pub mod logger;
pub mod optimizer;
/// Windowed query over metered local energy.
pub mod smart_meter;
pub mod trigger;
pub mod types;
