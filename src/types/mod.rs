pub mod assessment;
pub mod indicator;
pub mod position;
pub mod signal;
pub mod summary;

pub use assessment::*;
pub use indicator::*;
pub use position::*;
pub use signal::*;
pub use summary::*;
