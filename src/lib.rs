pub mod error;
pub mod firmware;
pub mod host;
pub mod phy;
pub mod ui;
pub mod utils;
