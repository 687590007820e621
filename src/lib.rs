//! Vehicle relay network simulator
//!
//! A grid of moving vehicles that pass packets to their neighbors, with
//! flood and destination-search routing. Runs headless or from a small
//! interactive console.

pub mod console;
pub mod simulation;
