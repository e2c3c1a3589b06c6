// Entry/exit decision rules
pub mod policy;

pub use policy::{decide, Decision};
