pub mod builtup;
pub mod builtup_map;
pub mod region;
pub mod vector_dataset;
