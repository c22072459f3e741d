pub mod fields;
pub mod time;
