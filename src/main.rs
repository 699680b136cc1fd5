/// Entry point and game loop of the terminal front-end.
///
/// Each tick:
///   1. Drain keyboard and gamepad, latch fresh presses since the last tick
///   2. Move bodies with `physics::integrate` (the engine collaborator)
///   3. Hand the contacts it reported to the core through `on_tick`
///   4. Fold the returned events into the renderer's `View`
///
/// Meta keys (handled here, never seen by the core):
///   Title      ENTER start, F9-F12 load, Q / ESC quit
///   In game    F1 pause, F2 restart level, F5-F8 save, F9-F12 load, ESC title
///   Outcome    ENTER new run, ESC title

mod ui;

use std::fs::File;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    KeyCode, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use log::{info, warn};
use thiserror::Error;

use mindbloom::config::GameConfig;
use mindbloom::domain::entity::{Contacts, FrameInput};
use mindbloom::domain::physics;
use mindbloom::sim::level;
use mindbloom::sim::save::{self, SLOT_COUNT};
use mindbloom::sim::step::GameCore;
use mindbloom::sim::world::{GameSession, Phase};

use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::{Renderer, Screen, View};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
/// Longest real-time step handed to the core after a stall (e.g. a slow load).
const MAX_TICK_MS: u128 = 100;

#[derive(Debug, Error)]
enum AppError {
    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] io::Error),
}

enum Flow {
    Continue,
    Quit,
}

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let catalog = level::load_catalog(config.levels_file.as_deref());
    let mut session = GameSession::new(config.tuning.clone(), catalog);
    info!("{} levels, tick {}ms", session.level_count(), config.tick_rate_ms);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = run(&mut session, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Mind Bloom: Descent!");
    println!(
        "Enlightenment: {}  Shadows integrated: {}",
        session.run.enlightenment,
        session.run.integrated.len(),
    );
}

/// `RUST_LOG` overrides the default `warn` filter. Stderr shares the
/// terminal with the renderer, so `general.log_file` redirects output.
fn init_logging(config: &GameConfig) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = &config.log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
        }
    }
    builder.init();
}

fn run(session: &mut GameSession, renderer: &mut Renderer, config: &GameConfig) -> Result<(), AppError> {
    let mut kb = InputState::new();

    // Release events make held movement exact; without them the tracker
    // falls back to its hold timeout.
    let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
    if enhanced {
        execute!(
            io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    kb.honor_release = enhanced;

    let result = game_loop(session, renderer, &mut kb, config);

    if enhanced {
        execute!(io::stdout(), PopKeyboardEnhancementFlags)?;
    }
    result
}

fn game_loop(
    session: &mut GameSession,
    renderer: &mut Renderer,
    kb: &mut InputState,
    config: &GameConfig,
) -> Result<(), AppError> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        info!("gamepad connected");
    }
    let tick_rate = Duration::from_millis(config.tick_rate_ms);

    let mut view = View::new();
    let mut screen = title_screen();
    let mut pending = FrameInput::default();
    let mut last_tick = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        if let Flow::Quit = handle_meta(session, &mut screen, &mut view, kb, &gp) {
            break;
        }

        if screen == Screen::Playing {
            let mut frame = kb.frame_input(Contacts::default());
            gp.merge_into(&mut frame);
            latch(&mut pending, frame);
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            last_tick = Instant::now();
            let dt_ms = elapsed.as_millis().min(MAX_TICK_MS) as u32;
            view.advance(dt_ms as u64);

            if screen == Screen::Playing && session.phase == Phase::Playing {
                let mut input = std::mem::take(&mut pending);
                input.contacts = physics_step(session, dt_ms);
                let events = session.on_tick(&input, dt_ms);
                view.apply_all(&events);
            }
        }

        renderer.render(screen, session, &view)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Move every body of the current level and report what they touched.
fn physics_step(session: &mut GameSession, dt_ms: u32) -> Contacts {
    let scale = session.time_scale;
    physics::integrate(session.bodies(), dt_ms, scale)
}

/// Keep the latest held state; keep every edge press until a tick consumes it.
fn latch(pending: &mut FrameInput, frame: FrameInput) {
    pending.left = frame.left;
    pending.right = frame.right;
    pending.jump = frame.jump;
    pending.interact |= frame.interact;
    for (p, f) in pending.abilities.iter_mut().zip(frame.abilities) {
        *p |= f;
    }
}

fn title_screen() -> Screen {
    Screen::Title { has_save: (1..=SLOT_COUNT).any(save::has_slot) }
}

/// F-key offset → slot: `F(base + 1)` is slot 1.
fn slot_key(kb: &InputState, base: u8) -> Option<u8> {
    (1..=SLOT_COUNT).find(|&slot| kb.was_pressed(KeyCode::F(base + slot)))
}

fn load_into(session: &mut GameSession, view: &mut View, slot: u8) -> bool {
    match save::load_slot(session, slot) {
        Ok(events) => {
            *view = View::new();
            view.apply_all(&events);
            view.notify(format!("Loaded slot {slot}"));
            true
        }
        Err(e) => {
            warn!("load slot {slot}: {e}");
            view.notify(format!("Load failed: {e}"));
            false
        }
    }
}

fn handle_meta(
    session: &mut GameSession,
    screen: &mut Screen,
    view: &mut View,
    kb: &InputState,
    gp: &GamepadState,
) -> Flow {
    let confirm = kb.was_pressed(KeyCode::Enter) || gp.confirm_pressed();
    let esc = kb.was_pressed(KeyCode::Esc) || gp.cancel_pressed();

    if let Some(slot) = slot_key(kb, 8) {
        if load_into(session, view, slot) {
            *screen = Screen::Playing;
        }
        return Flow::Continue;
    }

    match *screen {
        // ── Title ──
        Screen::Title { .. } => {
            if confirm {
                *view = View::new();
                view.apply_all(&session.new_run());
                *screen = Screen::Playing;
            } else if esc || kb.any_pressed(&[KeyCode::Char('q'), KeyCode::Char('Q')]) {
                return Flow::Quit;
            }
        }

        // ── Victory / Defeat ──
        Screen::Playing | Screen::Paused if session.phase != Phase::Playing => {
            if confirm {
                *view = View::new();
                view.apply_all(&session.new_run());
                *screen = Screen::Playing;
            } else if esc {
                *screen = title_screen();
            }
        }

        // ── In game ──
        Screen::Playing | Screen::Paused => {
            if esc {
                *screen = title_screen();
            } else if kb.was_pressed(KeyCode::F(1)) || gp.confirm_pressed() {
                *screen = if *screen == Screen::Paused { Screen::Playing } else { Screen::Paused };
            } else if kb.was_pressed(KeyCode::F(2)) {
                view.apply_all(&session.restart_level());
                *screen = Screen::Playing;
            } else if let Some(slot) = slot_key(kb, 4) {
                match save::save_slot(session, slot) {
                    Ok(_) => view.notify(format!("Saved to slot {slot}")),
                    Err(e) => {
                        warn!("save slot {slot}: {e}");
                        view.notify(format!("Save failed: {e}"));
                    }
                }
            }
        }
    }

    Flow::Continue
}
