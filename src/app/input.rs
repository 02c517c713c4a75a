use winit::keyboard::{KeyCode, PhysicalKey};

/// Which movement keys are held.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementIntent {
    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

/// One-shot actions triggered on key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    CycleModel,
    ReloadOverlay,
    ClearOverlay,
    PlayClip(usize),
}

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    intent: MovementIntent,
}

impl InputState {
    pub fn intent(&self) -> MovementIntent {
        self.intent
    }

    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> InputAction {
        let PhysicalKey::Code(code) = key else {
            return InputAction::None;
        };
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => self.intent.forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.intent.backward = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.intent.left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.intent.right = pressed,
            _ if pressed => return action_for(code),
            _ => {}
        }
        InputAction::None
    }

    /// Drops held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.intent = MovementIntent::default();
    }
}

fn action_for(code: KeyCode) -> InputAction {
    match code {
        KeyCode::KeyO => InputAction::CycleModel,
        KeyCode::KeyT => InputAction::ReloadOverlay,
        KeyCode::KeyC => InputAction::ClearOverlay,
        KeyCode::Digit1 => InputAction::PlayClip(0),
        KeyCode::Digit2 => InputAction::PlayClip(1),
        KeyCode::Digit3 => InputAction::PlayClip(2),
        KeyCode::Digit4 => InputAction::PlayClip(3),
        KeyCode::Digit5 => InputAction::PlayClip(4),
        KeyCode::Digit6 => InputAction::PlayClip(5),
        KeyCode::Digit7 => InputAction::PlayClip(6),
        KeyCode::Digit8 => InputAction::PlayClip(7),
        KeyCode::Digit9 => InputAction::PlayClip(8),
        _ => InputAction::None,
    }
}
