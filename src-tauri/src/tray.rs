use tauri::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    tray::{MouseButton, TrayIconBuilder, TrayIconEvent},
    AppHandle, Manager,
};

use crate::windows::host::MASCOT_WINDOW_LABEL;
use crate::DesktopMascot;

fn show_mascot(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MASCOT_WINDOW_LABEL) {
        let _ = window.show();
        let _ = window.set_always_on_top(true);
    }
}

pub(crate) fn setup_tray(app: &tauri::App) -> tauri::Result<()> {
    let show_i = MenuItem::with_id(app, "show", "Show", true, None::<&str>)?;
    let hide_i = MenuItem::with_id(app, "hide", "Hide", true, None::<&str>)?;
    let quit_i = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let sep = PredefinedMenuItem::separator(app)?;
    let menu = Menu::with_items(app, &[&show_i, &hide_i, &sep, &quit_i])?;
    let icon = app.default_window_icon().cloned();

    let mut builder = TrayIconBuilder::new()
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(move |app, event| match event.id().as_ref() {
            "show" => show_mascot(app),
            "hide" => {
                if let Some(window) = app.get_webview_window(MASCOT_WINDOW_LABEL) {
                    let _ = window.hide();
                }
            }
            "quit" => {
                if let Some(mascot) = app.try_state::<DesktopMascot>() {
                    mascot.shutdown();
                }
                app.exit(0);
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                ..
            } = event
            {
                show_mascot(tray.app_handle());
            }
        });

    if let Some(i) = icon {
        builder = builder.icon(i);
    }

    builder.build(app)?;
    Ok(())
}
