pub mod disk;
pub mod engine;
pub mod memory;
