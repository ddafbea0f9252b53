//! Cross-cutting concerns: constants, state paths, logging, shutdown

pub mod constants;
pub mod logging;
pub mod paths;
pub mod shutdown;
