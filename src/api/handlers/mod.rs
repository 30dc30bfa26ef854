pub mod functions;
pub mod odds;
pub mod patterns;
pub mod system;
pub mod trends;

pub use functions::*;
pub use odds::*;
pub use patterns::*;
pub use system::*;
pub use trends::*;
