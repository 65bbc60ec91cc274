pub mod error;
pub mod geo;
pub mod network;
pub mod report;
pub mod session;
pub mod settings;
pub mod speedtest;

pub use error::{Result, SpeedTestError};
pub use session::{ClientContext, SpeedTest};
pub use settings::Settings;
