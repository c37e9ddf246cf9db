pub mod cancel;
pub mod event_bus;
pub mod frame;
pub mod ticker;

pub use cancel::*;
pub use event_bus::*;
pub use frame::*;
pub use ticker::*;
