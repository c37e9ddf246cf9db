//! User-facing flows of the farm mapper: drawing a boundary, saving it,
//! the cinematic analysis sequence, results, chat and geolocation.

pub mod capture;
pub mod chat;
pub mod dashboard;
pub mod locate;
pub mod orchestrator;
pub mod results;
pub mod ring;
pub mod submission;

pub use capture::*;
pub use chat::*;
pub use dashboard::*;
pub use locate::*;
pub use orchestrator::*;
pub use results::*;
pub use ring::*;
pub use submission::*;
