pub mod monitor;
pub mod readings;
pub mod record;
pub mod serial;
pub mod series;

pub use monitor::{Monitor, SeriesResult};
pub use readings::{SensorGrid, SensorReadings};
pub use record::{LogFormat, MeasurementLog};
pub use serial::{CommandSink, LoopbackWriter, SerialLink};
pub use series::{ErrorMetric, MeasurementSeries};
