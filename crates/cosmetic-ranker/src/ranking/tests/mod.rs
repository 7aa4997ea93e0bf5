mod common;
mod statistics;
