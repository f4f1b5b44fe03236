pub mod client;
pub mod grid;
pub mod renderer;
pub mod surface;
