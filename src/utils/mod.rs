pub mod logging;
pub mod plot;
