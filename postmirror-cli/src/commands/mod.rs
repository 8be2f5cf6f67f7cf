pub mod mirror;
pub mod report;
