pub mod buffer;
pub mod device;
pub mod parser;
pub mod session;
pub mod sim;

pub use buffer::{RollingBuffer, SharedBuffer};
pub use device::{list_devices, DataSource, SerialSource};
pub use parser::{parse_sample_line, ParseError};
pub use session::{AcquisitionSession, SessionError, SessionHandle, SessionState};
pub use sim::SimulatedSource;
