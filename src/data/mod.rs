pub mod map;
pub mod simulation;
