use tauri::{AppHandle, Manager, WebviewWindow};

use super::geometry::LogicalPoint;
use super::host::COMPANION_WINDOW_LABEL;
use crate::services::config::CompanionConfig;

/// Show the chat window at `position`, creating it on first use.
pub(crate) fn show_chat_window(
    app: &AppHandle,
    config: &CompanionConfig,
    position: LogicalPoint,
) -> tauri::Result<WebviewWindow> {
    let window = match app.get_webview_window(COMPANION_WINDOW_LABEL) {
        Some(window) => window,
        None => tauri::WebviewWindowBuilder::new(
            app,
            COMPANION_WINDOW_LABEL,
            tauri::WebviewUrl::App("index.html?window=chat".into()),
        )
        .title("mascot-chat")
        .inner_size(config.width, config.height)
        .position(position.x, position.y)
        .resizable(true)
        .decorations(false)
        .transparent(true)
        .shadow(true)
        .always_on_top(true)
        .skip_taskbar(true)
        .visible(false)
        .build()?,
    };

    window.set_position(tauri::Position::Logical(tauri::LogicalPosition {
        x: position.x,
        y: position.y,
    }))?;
    window.show()?;
    let _ = window.set_focus();
    Ok(window)
}

pub(crate) fn hide_chat_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(COMPANION_WINDOW_LABEL) {
        let _ = window.hide();
    }
}
