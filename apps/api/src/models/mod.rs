pub mod cost;
pub mod fields;
pub mod report;
pub mod resume;
