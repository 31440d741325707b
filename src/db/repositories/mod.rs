pub mod export;
pub mod pointers;
pub mod records;
