//! Observability setup for Forkline: structured `tracing` output with an
//! optional OpenTelemetry bridge, plus GenAI span attribute names.

pub mod genai_attrs;
pub mod tracing_setup;
