// src-tauri/src/services/mod.rs
pub mod agent_bridge;
pub mod animation;
pub mod auto_walk;
pub mod config;
pub mod drag;
pub mod mascot;
pub mod observers;
pub mod physics;
