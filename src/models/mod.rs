pub mod admission;
pub mod appointment;
pub mod bed;
pub mod enums;
pub mod pharmacy;
pub mod reference;
pub mod staff;

pub use admission::*;
pub use appointment::*;
pub use bed::*;
pub use pharmacy::*;
pub use reference::*;
pub use staff::*;
