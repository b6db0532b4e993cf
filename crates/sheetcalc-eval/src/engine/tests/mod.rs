mod common;
mod cycle_detection;
mod sheets;
