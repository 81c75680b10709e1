//! Side-effecting services kept apart from the pipeline logic

pub mod io;

pub use io::ImageIOService;
