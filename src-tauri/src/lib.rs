pub mod error;
pub mod services;
pub mod windows;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod tray;

pub use error::{HostError, MascotError};
pub use services::config::{MascotConfig, MascotKind};
pub use services::mascot::{ControlMode, MascotController, ShellSignal};

pub const EVT_AVATAR_STATE: &str = "mascot-avatar-state";
pub const EVT_CONTEXT_MENU: &str = "mascot-context-menu";

#[cfg(feature = "desktop")]
pub(crate) type DesktopMascot = MascotController<windows::tauri_host::TauriHost>;

#[cfg(feature = "desktop")]
fn log_level() -> log::LevelFilter {
    std::env::var("MASCOT_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(log::LevelFilter::Info)
}

#[cfg(feature = "desktop")]
fn forward_to_shell(app: &tauri::AppHandle, mascot: &DesktopMascot) {
    use tauri::Emitter;

    use crate::windows::chat_window::{hide_chat_window, show_chat_window};

    let handle = app.clone();
    mascot
        .subscribe_avatar(move |snapshot| {
            let _ = handle.emit(EVT_AVATAR_STATE, snapshot);
        })
        .detach();

    let handle = app.clone();
    let companion = mascot.config().companion;
    mascot
        .subscribe_shell(move |signal| match signal {
            ShellSignal::ContextMenu => {
                let _ = handle.emit(EVT_CONTEXT_MENU, ());
            }
            ShellSignal::ChatOpened { position } => {
                if let Err(err) = show_chat_window(&handle, &companion, *position) {
                    log::warn!("shell: failed to show chat window: {err}");
                }
            }
            ShellSignal::ChatClosed => hide_chat_window(&handle),
        })
        .detach();
}

#[cfg(feature = "desktop")]
fn listen_agent_events(app: &tauri::AppHandle, mascot: &DesktopMascot) {
    use tauri::Listener;

    use crate::services::agent_bridge::{
        dispatch_agent_command, AgentCommand, EVT_AGENT_EMOTION, EVT_AGENT_MOVE, EVT_WALK_TO_WINDOW,
    };

    for name in [EVT_AGENT_EMOTION, EVT_WALK_TO_WINDOW, EVT_AGENT_MOVE] {
        let mascot = mascot.clone();
        app.listen(name, move |event| {
            let command = match AgentCommand::from_event(name, event.payload()) {
                Ok(command) => command,
                Err(err) => {
                    log::warn!("agent: bad {name} payload: {err}");
                    return;
                }
            };
            let mascot = mascot.clone();
            tauri::async_runtime::spawn(async move {
                if let Err(err) = dispatch_agent_command(&mascot, command) {
                    log::warn!("agent: {name} rejected: {err}");
                }
            });
        });
    }
}

#[cfg(feature = "desktop")]
fn on_window_event(window: &tauri::Window, event: &tauri::WindowEvent) {
    use tauri::{Manager, WindowEvent};

    use crate::windows::geometry::PhysicalPoint;
    use crate::windows::host::WindowRole;

    let Some(role) = WindowRole::from_label(window.label()) else {
        return;
    };
    let Some(mascot) = window.try_state::<DesktopMascot>() else {
        return;
    };
    let mascot = mascot.inner().clone();

    match (role, event) {
        (WindowRole::Mascot, WindowEvent::CloseRequested { api, .. }) => {
            api.prevent_close();
            let _ = window.hide();
        }
        (WindowRole::Companion, WindowEvent::Moved(position)) => {
            let position = PhysicalPoint::new(position.x, position.y);
            tauri::async_runtime::spawn(async move {
                mascot.companion_moved(position).await;
            });
        }
        (WindowRole::Companion, WindowEvent::Destroyed) => {
            tauri::async_runtime::spawn(async move {
                mascot.companion_closed();
            });
        }
        _ => {}
    }
}

#[cfg(feature = "desktop")]
pub fn run() {
    use std::sync::Arc;

    use tauri::Manager;
    use tauri_plugin_log::{Target, TargetKind};

    use crate::windows::tauri_host::TauriHost;

    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .targets([
                    Target::new(TargetKind::Stdout),
                    Target::new(TargetKind::LogDir { file_name: None }),
                ])
                .level(log_level())
                .build(),
        )
        .invoke_handler(tauri::generate_handler![
            commands::mascot_commands::mascot_mouse_down,
            commands::mascot_commands::mascot_mouse_move,
            commands::mascot_commands::mascot_mouse_up,
            commands::mascot_commands::mascot_click,
            commands::mascot_commands::mascot_double_click,
            commands::mascot_commands::mascot_context_menu,
            commands::mascot_commands::mascot_snapshot,
            commands::mascot_commands::mascot_walk_to_x,
            commands::mascot_commands::mascot_stop_walking,
            commands::mascot_commands::mascot_set_emotion,
            commands::mascot_commands::mascot_set_talking,
            commands::mascot_commands::mascot_open_chat,
            commands::mascot_commands::mascot_close_chat,
            commands::mascot_commands::mascot_agent_command
        ])
        .setup(|app| {
            let config = MascotConfig::from_env();
            let host = Arc::new(TauriHost::new(app.handle().clone()));
            let mascot: DesktopMascot = MascotController::new(host, config);

            forward_to_shell(app.handle(), &mascot);
            listen_agent_events(app.handle(), &mascot);
            app.manage(mascot.clone());
            tray::setup_tray(app)?;

            tauri::async_runtime::spawn(async move {
                mascot.start();
            });
            Ok(())
        })
        .on_window_event(on_window_event)
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
