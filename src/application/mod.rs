pub mod gate;
pub mod locks;
pub mod settlement;
pub mod tracker;
