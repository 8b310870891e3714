// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer (queueing and delivery policy)
pub mod dedup;
pub mod message;
pub mod queue;
pub mod ratelimit;
pub mod routing;
pub mod stats;

// Application layer
pub mod relay;
pub mod transport;
