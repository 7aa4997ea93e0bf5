mod common;
mod weights;
