/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Move (up also jumps)
///   A                     →  Jump
///   B                     →  Integrate
///   X / Y / L1 / R1       →  Dissolve Self / Mirror Sight / Calm Breath / Fractal Leap
///   Start                 →  Confirm / Pause
///   Select                →  Back to title

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use mindbloom::config::GamepadConfig;
use mindbloom::domain::ability::AbilityId;
use mindbloom::domain::entity::FrameInput;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    L2,      // LeftTrigger2
    R2,      // RightTrigger2
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.trim().to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Per-button state: held (continuous) and just_pressed (edge).
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

/// Action-to-button mapping (loaded from config).
/// `abilities` is indexed by `AbilityId::index()`.
#[derive(Debug, PartialEq)]
struct ActionMap {
    jump: Vec<Btn>,
    integrate: Vec<Btn>,
    abilities: [Vec<Btn>; 4],
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            jump:      vec![Btn::A],
            integrate: vec![Btn::B],
            abilities: [vec![Btn::X], vec![Btn::Y], vec![Btn::L1], vec![Btn::R1]],
            confirm:   vec![Btn::Start],
            cancel:    vec![Btn::Select],
        }
    }
}

impl ActionMap {
    /// Unknown names are skipped; a list with no known names keeps the default.
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse_into(slot: &mut Vec<Btn>, names: &[String]) {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if !parsed.is_empty() { *slot = parsed; }
        }
        let mut map = ActionMap::default();
        parse_into(&mut map.jump, &cfg.jump);
        parse_into(&mut map.integrate, &cfg.integrate);
        parse_into(&mut map.abilities[AbilityId::DissolveSelf.index()], &cfg.dissolve_self);
        parse_into(&mut map.abilities[AbilityId::MirrorSight.index()], &cfg.mirror_sight);
        parse_into(&mut map.abilities[AbilityId::CalmBreath.index()], &cfg.calm_breath);
        parse_into(&mut map.abilities[AbilityId::FractalLeap.index()], &cfg.fractal_leap);
        parse_into(&mut map.confirm, &cfg.confirm);
        parse_into(&mut map.cancel, &cfg.cancel);
        map
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    // All tracked buttons (indexed by Btn)
    buttons: [BtnState; 10],

    // D-pad
    dpad_up: BtnState,
    dpad_left: BtnState,
    dpad_right: BtnState,

    // Stick
    stick_up: BtnState,
    stick_left: BtnState,
    stick_right: BtnState,
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    pub connected: bool,
}

fn btn_index(btn: Btn) -> usize {
    btn as usize
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    log::info!("gamepad support unavailable: {e}");
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            buttons: [BtnState::default(); 10],
            dpad_up: BtnState::default(),
            dpad_left: BtnState::default(),
            dpad_right: BtnState::default(),
            stick_up: BtnState::default(),
            stick_left: BtnState::default(),
            stick_right: BtnState::default(),
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button mapping from config.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.action_map = ActionMap::from_config(cfg);
    }

    pub fn update(&mut self) {
        self.clear_just_pressed();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false, false);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    self.update_axis(axis, value);
                }
                EventType::Connected => { self.connected = true; }
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }

        // Derive stick digital states
        let prev_left = self.stick_left.held;
        let prev_right = self.stick_right.held;
        let prev_up = self.stick_up.held;

        self.stick_left.held = self.stick_x < -STICK_DEADZONE;
        self.stick_right.held = self.stick_x > STICK_DEADZONE;
        self.stick_up.held = self.stick_y > STICK_DEADZONE;

        if self.stick_left.held && !prev_left { self.stick_left.just_pressed = true; }
        if self.stick_right.held && !prev_right { self.stick_right.just_pressed = true; }
        if self.stick_up.held && !prev_up { self.stick_up.just_pressed = true; }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool, just_pressed: bool) {
        // D-pad handled separately (not in Btn enum)
        let dpad = match gilrs_btn {
            Button::DPadUp    => Some(&mut self.dpad_up),
            Button::DPadLeft  => Some(&mut self.dpad_left),
            Button::DPadRight => Some(&mut self.dpad_right),
            _ => None,
        };
        if let Some(state) = dpad {
            state.held = held;
            if just_pressed { state.just_pressed = true; }
            return;
        }

        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.press(btn, held, just_pressed);
        }
    }

    #[cfg(feature = "gamepad")]
    fn update_axis(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::LeftStickX => self.stick_x = value,
            Axis::LeftStickY => self.stick_y = value,
            _ => {}
        }
    }

    // ── Action queries (config-driven) ──

    fn any_held(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[btn_index(b)].held)
    }

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[btn_index(b)].just_pressed)
    }

    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.confirm)
    }
    pub fn cancel_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.cancel)
    }

    // Movement (continuous, held)
    pub fn left_held(&self) -> bool {
        self.dpad_left.held || self.stick_left.held
    }
    pub fn right_held(&self) -> bool {
        self.dpad_right.held || self.stick_right.held
    }
    pub fn jump_held(&self) -> bool {
        self.any_held(&self.action_map.jump) || self.dpad_up.held || self.stick_up.held
    }

    /// OR this frame's pad state into the keyboard-built input.
    pub fn merge_into(&self, input: &mut FrameInput) {
        input.left |= self.left_held();
        input.right |= self.right_held();
        input.jump |= self.jump_held();
        input.interact |= self.any_just_pressed(&self.action_map.integrate);
        for id in AbilityId::ALL {
            if self.any_just_pressed(&self.action_map.abilities[id.index()]) {
                input.press(id);
            }
        }
    }

    // ── Internal ──

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn press(&mut self, btn: Btn, held: bool, just_pressed: bool) {
        let state = &mut self.buttons[btn_index(btn)];
        state.held = held;
        if just_pressed {
            state.just_pressed = true;
        }
    }

    fn clear_just_pressed(&mut self) {
        for b in &mut self.buttons { b.just_pressed = false; }
        self.dpad_up.just_pressed = false;
        self.dpad_left.just_pressed = false;
        self.dpad_right.just_pressed = false;
        self.stick_up.just_pressed = false;
        self.stick_left.just_pressed = false;
        self.stick_right.just_pressed = false;
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        for b in &mut self.buttons { *b = BtnState::default(); }
        self.dpad_up = BtnState::default();
        self.dpad_left = BtnState::default();
        self.dpad_right = BtnState::default();
        self.stick_up = BtnState::default();
        self.stick_left = BtnState::default();
        self.stick_right = BtnState::default();
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn button_names_are_case_insensitive() {
        assert_eq!(Btn::from_name("south"), Some(Btn::A));
        assert_eq!(Btn::from_name(" rb "), Some(Btn::R1));
        assert_eq!(Btn::from_name("Back"), Some(Btn::Select));
        assert_eq!(Btn::from_name("Z"), None);
    }

    #[test]
    fn default_config_matches_default_map() {
        let cfg = mindbloom::config::GameConfig::from_toml_str("").unwrap();
        assert_eq!(ActionMap::from_config(&cfg.gamepad), ActionMap::default());
    }

    #[test]
    fn config_overrides_and_ignores_unknown_names() {
        let mut cfg = mindbloom::config::GameConfig::from_toml_str("").unwrap().gamepad;
        cfg.jump = names(&["B", "nonsense"]);
        cfg.fractal_leap = names(&["R2"]);
        cfg.cancel = names(&["nonsense"]);
        let map = ActionMap::from_config(&cfg);
        assert_eq!(map.jump, vec![Btn::B]);
        assert_eq!(map.abilities[AbilityId::FractalLeap.index()], vec![Btn::R2]);
        assert_eq!(map.cancel, vec![Btn::Select]);
    }

    #[test]
    fn merge_presses_abilities_and_holds_jump() {
        let mut pad = GamepadState::new();
        pad.release_all();
        pad.press(Btn::Y, true, true);
        pad.press(Btn::A, true, false);
        let mut input = FrameInput::default();
        pad.merge_into(&mut input);
        assert!(input.pressed(AbilityId::MirrorSight));
        assert!(!input.pressed(AbilityId::DissolveSelf));
        assert!(input.jump);
        assert!(!input.interact);

        pad.clear_just_pressed();
        let mut input = FrameInput::default();
        pad.merge_into(&mut input);
        assert!(!input.pressed(AbilityId::MirrorSight));
        assert!(input.jump);
    }

    #[cfg(not(feature = "gamepad"))]
    #[test]
    fn without_gamepad_support_input_is_untouched() {
        let mut pad = GamepadState::new();
        pad.update();
        assert!(!pad.connected);
        let mut input = FrameInput { left: true, ..FrameInput::default() };
        pad.merge_into(&mut input);
        assert_eq!(input, FrameInput { left: true, ..FrameInput::default() });
    }
}
