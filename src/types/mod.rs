pub mod results;
pub mod sample;
pub mod snapshot;

pub use results::ExportResult;
pub use sample::Sample;
pub use snapshot::BufferSnapshot;
