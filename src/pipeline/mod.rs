pub mod demo;
pub mod grid;
pub mod persistence;
pub mod project;
pub mod render;
pub mod selection;
pub mod timing;
pub mod transport;
pub mod wav;
