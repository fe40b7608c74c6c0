pub mod records;
pub mod search;
pub mod system;
