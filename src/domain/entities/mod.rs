pub mod business_hours;
pub mod conversation;
pub mod sla;
pub mod team;

pub use business_hours::*;
pub use conversation::*;
pub use sla::*;
pub use team::*;
