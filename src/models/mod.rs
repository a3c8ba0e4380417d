pub mod bid;
pub mod participant;
pub mod result;
pub mod session;
pub mod user;

pub use bid::*;
pub use participant::*;
pub use result::*;
pub use session::*;
pub use user::*;
