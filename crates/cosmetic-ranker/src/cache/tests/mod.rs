mod common;
mod memory;
mod multi_level;
