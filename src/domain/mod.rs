// Domain layer: models and ports shared by the core and the adapters.

pub mod model;
pub mod ports;
