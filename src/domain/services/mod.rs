pub mod deadline_calculator;

pub use deadline_calculator::*;
