// Domain layer: job models and ports. Concrete process and file system access lives in adapters.

pub mod model;
pub mod ports;
