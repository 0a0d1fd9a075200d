// crates/core/src/lib.rs
pub mod admission;
pub mod error;
pub mod lifecycle;
pub mod paths;
pub mod progress;
pub mod reward;
pub mod session;
pub mod time;
pub mod types;
pub mod window;

pub use admission::*;
pub use error::*;
pub use lifecycle::*;
pub use progress::*;
pub use reward::*;
pub use session::*;
pub use types::*;
pub use window::*;
