pub mod preview;
pub mod reports;
pub mod scenarios;
pub mod simulation;
pub mod tester;

pub use scenarios::{list_scenarios, select_scenarios};
pub use tester::*;
