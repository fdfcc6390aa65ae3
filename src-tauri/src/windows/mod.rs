pub mod bounds;
#[cfg(feature = "desktop")]
pub(crate) mod chat_window;
pub mod companion;
pub mod geometry;
pub mod host;
#[cfg(feature = "desktop")]
pub mod tauri_host;
