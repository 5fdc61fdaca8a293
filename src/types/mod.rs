pub mod record;
pub mod trend;

pub use record::*;
pub use trend::*;
