use std::time::Duration;

use serde::Deserialize;
use tauri::State;

use crate::services::agent_bridge::{dispatch_agent_command, AgentCommand};
use crate::services::animation::{AvatarSnapshot, Emotion};
use crate::services::drag::DragRelease;
use crate::services::physics::Direction;
use crate::windows::geometry::{LogicalPoint, PhysicalPoint};
use crate::DesktopMascot;

/// Pointer position in physical screen pixels (`screenX * devicePixelRatio`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerArgs {
    pub screen_x: i32,
    pub screen_y: i32,
    #[serde(default)]
    pub on_character: bool,
}

impl PointerArgs {
    fn point(&self) -> PhysicalPoint {
        PhysicalPoint::new(self.screen_x, self.screen_y)
    }
}

#[tauri::command]
pub async fn mascot_mouse_down(
    mascot: State<'_, DesktopMascot>,
    args: PointerArgs,
) -> Result<(), String> {
    mascot
        .handle_mouse_down(args.point(), args.on_character)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_mouse_move(
    mascot: State<'_, DesktopMascot>,
    args: PointerArgs,
) -> Result<Option<LogicalPoint>, String> {
    mascot
        .handle_mouse_move(args.point())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_mouse_up(mascot: State<'_, DesktopMascot>) -> Result<DragRelease, String> {
    mascot.handle_mouse_up().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_click(mascot: State<'_, DesktopMascot>) -> Result<bool, String> {
    mascot.handle_click().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_double_click(mascot: State<'_, DesktopMascot>) -> Result<bool, String> {
    mascot.handle_double_click().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_context_menu(mascot: State<'_, DesktopMascot>) -> Result<(), String> {
    mascot.handle_context_menu();
    Ok(())
}

#[tauri::command]
pub async fn mascot_snapshot(mascot: State<'_, DesktopMascot>) -> Result<AvatarSnapshot, String> {
    Ok(mascot.snapshot())
}

#[tauri::command]
pub async fn mascot_walk_to_x(
    mascot: State<'_, DesktopMascot>,
    target_x: f64,
) -> Result<Direction, String> {
    if !target_x.is_finite() {
        return Err(format!("invalid target x: {target_x}"));
    }
    mascot.walk_to_x(target_x, None).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_stop_walking(mascot: State<'_, DesktopMascot>) -> Result<bool, String> {
    Ok(mascot.stop_walking())
}

#[tauri::command]
pub async fn mascot_set_emotion(
    mascot: State<'_, DesktopMascot>,
    emotion: String,
    duration_ms: Option<u64>,
) -> Result<Emotion, String> {
    let emotion = Emotion::parse(&emotion).ok_or_else(|| format!("unknown emotion: {emotion}"))?;
    mascot.set_emotion(emotion, duration_ms.map(Duration::from_millis));
    Ok(emotion)
}

#[tauri::command]
pub async fn mascot_set_talking(
    mascot: State<'_, DesktopMascot>,
    talking: bool,
    timeout_ms: Option<u64>,
) -> Result<(), String> {
    if talking {
        mascot.talk(timeout_ms.map(Duration::from_millis));
    } else {
        mascot.stop_talking();
    }
    Ok(())
}

#[tauri::command]
pub async fn mascot_open_chat(mascot: State<'_, DesktopMascot>) -> Result<bool, String> {
    mascot.open_chat().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mascot_close_chat(mascot: State<'_, DesktopMascot>) -> Result<bool, String> {
    Ok(mascot.close_chat())
}

#[tauri::command]
pub async fn mascot_agent_command(
    mascot: State<'_, DesktopMascot>,
    command: AgentCommand,
) -> Result<(), String> {
    dispatch_agent_command(mascot.inner(), command).map_err(|e| e.to_string())
}
