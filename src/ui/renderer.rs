/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Fold the tick's `PresentationEvent`s into a `View` (HUD, dialogue, outcome)
///   2. Build the next frame into `front` buffer (array of Cell) from the
///      `View` plus the session's bodies, scaled from world units to cells
///   3. Compare each cell with `back` buffer (previous frame)
///   4. Only emit terminal commands for cells that changed
///   5. All commands are batched with `queue!`, flushed once at the end
///   6. Swap front/back
///
/// Screen layout:
///   row 0        level name and fear
///   row 1        fear / enlightenment bars, ability slots
///   rows 2..     arena (1200 × 700 world scaled to the terminal)
///   last 4 rows  dialogue box, message / help line

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use mindbloom::domain::ability::{AbilitySlot, ABILITY_DEFS};
use mindbloom::domain::catalog::{BackgroundSpec, WORLD_HEIGHT, WORLD_WIDTH};
use mindbloom::domain::entity::{Aabb, VillainState};
use mindbloom::sim::event::PresentationEvent;
use mindbloom::sim::world::{GameSession, Phase};

// ── View: what the events told us ──

#[derive(Clone, Debug, PartialEq)]
pub struct Dialogue {
    pub text: String,
    pub speaker: String,
    pub accent: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Victory { enlightenment: i32 },
    Defeat { enlightenment: i32 },
}

const MESSAGE_MS: u64 = 3_000;
const HIT_FLASH_MS: u64 = 250;
const SLOT_FLASH_MS: u64 = 400;

/// Front-end state built only from presentation events.
#[derive(Clone, Debug)]
pub struct View {
    pub level_index: usize,
    pub level_name: String,
    pub fear_label: String,
    pub background: BackgroundSpec,
    pub fear: u8,
    pub enlightenment: u8,
    pub slots: [AbilitySlot; 4],
    pub dialogue: Option<Dialogue>,
    pub slowed: bool,
    pub outcome: Option<Outcome>,
    message: String,
    message_ms: u64,
    /// Free-running clock for blink and title colour cycling.
    anim_ms: u64,
    hit_flash_ms: u64,
    slot_flash_ms: [u64; 4],
}

impl View {
    pub fn new() -> Self {
        View {
            level_index: 0,
            level_name: String::new(),
            fear_label: String::new(),
            background: BackgroundSpec::default(),
            fear: 0,
            enlightenment: 0,
            slots: [AbilitySlot::Locked; 4],
            dialogue: None,
            slowed: false,
            outcome: None,
            message: String::new(),
            message_ms: 0,
            anim_ms: 0,
            hit_flash_ms: 0,
            slot_flash_ms: [0; 4],
        }
    }

    pub fn apply_all(&mut self, events: &[PresentationEvent]) {
        for ev in events {
            self.apply(ev);
        }
    }

    pub fn apply(&mut self, ev: &PresentationEvent) {
        use PresentationEvent as E;
        match ev {
            E::LevelStarted { index, name, fear_label, background } => {
                self.level_index = *index;
                self.level_name = name.clone();
                self.fear_label = fear_label.clone();
                self.background = background.clone();
                self.outcome = None;
            }
            E::ShowDialogue { text, speaker, accent, .. } => {
                self.dialogue = Some(Dialogue {
                    text: text.clone(),
                    speaker: speaker.clone(),
                    accent: *accent,
                });
            }
            E::DialogueCleared => self.dialogue = None,
            E::HudChanged { fear, enlightenment } => {
                self.fear = *fear;
                self.enlightenment = *enlightenment;
            }
            E::AbilitySlots(slots) => self.slots = *slots,
            E::AbilityActivated(id) | E::AbilityUnlocked(id) => {
                self.slot_flash_ms[id.index()] = SLOT_FLASH_MS;
            }
            E::PlayerHit { .. } => self.hit_flash_ms = HIT_FLASH_MS,
            E::TimeScaleChanged(scale) => self.slowed = *scale < 1.0,
            E::Victory { enlightenment } => {
                self.outcome = Some(Outcome::Victory { enlightenment: *enlightenment });
            }
            E::Defeat { enlightenment } => {
                self.outcome = Some(Outcome::Defeat { enlightenment: *enlightenment });
            }
            E::PickupCollected { .. }
            | E::Jumped
            | E::VillainDamaged { .. }
            | E::VillainDefeated { .. }
            | E::VillainIntegrated { .. }
            | E::VillainRemoved { .. } => {}
        }
    }

    /// Count down the purely visual timers.
    pub fn advance(&mut self, dt_ms: u64) {
        self.anim_ms = self.anim_ms.wrapping_add(dt_ms);
        self.message_ms = self.message_ms.saturating_sub(dt_ms);
        if self.message_ms == 0 {
            self.message.clear();
        }
        self.hit_flash_ms = self.hit_flash_ms.saturating_sub(dt_ms);
        for t in &mut self.slot_flash_ms {
            *t = t.saturating_sub(dt_ms);
        }
    }

    /// Front-end notice (save/load results) shown on the bottom line.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.message = text.into();
        self.message_ms = MESSAGE_MS;
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which top-level screen the front-end is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Title { has_save: bool },
    Playing,
    Paused,
}

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// inter-row gap colour of VTE terminals matches every cell.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
    };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
    };

    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Returns the column after the last char.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) -> usize {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width { break; }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
        cx
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', Color::White, bg));
        }
    }
}

// ── Colour helpers ──

fn rgb(hex: u32) -> Color {
    Color::Rgb {
        r: (hex >> 16 & 0xff) as u8,
        g: (hex >> 8 & 0xff) as u8,
        b: (hex & 0xff) as u8,
    }
}

/// Scale a hex colour's channels by `f` (0..=1).
fn shade(hex: u32, f: f32) -> Color {
    let f = f.clamp(0.0, 1.0);
    let ch = |shift: u32| (((hex >> shift) & 0xff) as f32 * f) as u8;
    Color::Rgb { r: ch(16), g: ch(8), b: ch(0) }
}

/// HSV (all 0..=1) to RGB.
fn hsv(h: f32, s: f32, v: f32) -> Color {
    let h = h.rem_euclid(1.0) * 6.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to = |f: f32| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::Rgb { r: to(r), g: to(g), b: to(b) }
}

/// Background colour cycling through the level palette at its speed.
fn background_color(bg: &BackgroundSpec, clock_ms: u64) -> u32 {
    if bg.colors.is_empty() {
        return 0x000000;
    }
    let step = (clock_ms as f32 / 1000.0 * bg.speed.max(0.0)) as usize;
    bg.colors[step % bg.colors.len()]
}

/// Split text into lines no wider than `width` chars, breaking at spaces.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = vec![];
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() { line.push(' '); }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn bar(percent: u8, cells: usize) -> (String, String) {
    let filled = (percent.min(100) as usize * cells + 50) / 100;
    ("█".repeat(filled), "░".repeat(cells - filled))
}

// ── Arena projection ──

/// Maps world units onto the arena's cell rectangle.
#[derive(Clone, Copy, Debug)]
struct Arena {
    col0: usize,
    row0: usize,
    cols: usize,
    rows: usize,
}

impl Arena {
    fn col(&self, x: f32) -> usize {
        let c = (x / WORLD_WIDTH * self.cols as f32).floor().max(0.0) as usize;
        self.col0 + c.min(self.cols.saturating_sub(1))
    }

    fn row(&self, y: f32) -> usize {
        let r = (y / WORLD_HEIGHT * self.rows as f32).floor().max(0.0) as usize;
        self.row0 + r.min(self.rows.saturating_sub(1))
    }

    /// Cell span covered by a box; always at least one cell.
    fn span(&self, b: &Aabb) -> (usize, usize, usize, usize) {
        let (x0, y0) = (self.col(b.left()), self.row(b.top()));
        let (x1, y1) = (self.col(b.right() - 0.01), self.row(b.bottom() - 0.01));
        (x0, y0, x1.max(x0), y1.max(y0))
    }
}

// ── Renderer ──

const HUD_ROW: usize = 0;
const BAR_ROW: usize = 1;
const MAP_ROW: usize = 2;
/// Dialogue box (3) + message line (1).
const FOOTER_ROWS: usize = 4;
const BAR_CELLS: usize = 16;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const PLATFORM_FG: Color = Color::Rgb { r: 150, g: 110, b: 200 };
const PICKUP_FG: Color = Color::Rgb { r: 255, g: 120, b: 230 };
const FROZEN_FG: Color = Color::Rgb { r: 140, g: 220, b: 255 };
const DEFEATED_HEX: u32 = 0x777777;
const INTEGRATED_HEX: u32 = 0x00ff00;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<(Screen, Phase)>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, screen: Screen, session: &GameSession, view: &View) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Screen change → clear for clean transition
        let key = (screen, session.phase);
        if self.last_screen != Some(key) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(key);
        }

        self.front.clear();

        match (screen, view.outcome) {
            (Screen::Title { has_save }, _) => self.compose_title(session, view, has_save),
            (_, Some(outcome)) => self.compose_outcome(session, view, outcome),
            (Screen::Playing, None) => self.compose_game(session, view),
            (Screen::Paused, None) => {
                self.compose_game(session, view);
                self.compose_pause_overlay(view);
            }
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors; ResetColor would fall back to the terminal default.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn arena(&self) -> Option<Arena> {
        let rows = self.front.height.checked_sub(MAP_ROW + FOOTER_ROWS)?;
        if rows < 4 || self.front.width < 20 {
            return None;
        }
        Some(Arena { col0: 0, row0: MAP_ROW, cols: self.front.width, rows })
    }

    fn compose_game(&mut self, s: &GameSession, view: &View) {
        self.compose_hud(s, view);

        let Some(arena) = self.arena() else {
            self.front.put_str(0, MAP_ROW, "Terminal too small", Color::Red, Color::Reset);
            return;
        };

        // ── Background ──
        let bg_hex = background_color(&view.background, s.clock_ms);
        let bg = shade(bg_hex, 0.25);
        for row in arena.row0..arena.row0 + arena.rows {
            for col in arena.col0..arena.col0 + arena.cols {
                self.front.set(col, row, Cell::from_char(' ', Color::White, bg));
            }
        }

        // ── Platforms ──
        for p in &s.platforms {
            let (x0, y0, x1, y1) = arena.span(&p.rect);
            for row in y0..=y1 {
                for col in x0..=x1 {
                    self.front.set(col, row, Cell::from_char('▀', PLATFORM_FG, bg));
                }
            }
        }

        // ── Pickups ──
        for p in &s.pickups {
            let b = p.body();
            self.front.set(arena.col(b.center.x), arena.row(b.center.y), Cell::from_char('✿', PICKUP_FG, bg));
        }

        // ── Villains ──
        for v in &s.villains {
            let fg = match v.state {
                VillainState::Active if v.is_frozen(s.clock_ms) => FROZEN_FG,
                VillainState::Active => rgb(v.color),
                VillainState::Defeated => rgb(DEFEATED_HEX),
                VillainState::Integrated => shade(INTEGRATED_HEX, 0.6 + 0.4 * v.animation_phase.sin().abs()),
            };
            let glyph = match v.state {
                VillainState::Active => '▓',
                VillainState::Defeated => '▒',
                VillainState::Integrated => '░',
            };
            let (x0, y0, x1, y1) = arena.span(&v.body());
            for row in y0..=y1 {
                for col in x0..=x1 {
                    self.front.set(col, row, Cell::from_char(glyph, fg, bg));
                }
            }
            // Health pips above an active shadow
            if v.state == VillainState::Active && y0 > arena.row0 {
                let pips = ((v.health.max(0) as usize) * (x1 - x0 + 1) + 99) / 100;
                for col in x0..x0 + pips {
                    self.front.set(col, y0 - 1, Cell::from_char('▁', Color::Red, bg));
                }
            }
        }

        // ── Player ──
        let fg = if view.hit_flash_ms > 0 {
            Color::Red
        } else {
            hsv(s.player_hue(), 0.7, s.player_alpha())
        };
        let (x0, y0, x1, y1) = arena.span(&s.player.body());
        for row in y0..=y1 {
            for col in x0..=x1 {
                self.front.set(col, row, Cell::from_char('█', fg, bg));
            }
        }

        self.compose_dialogue(view);
        self.compose_message_line(view, " ←→/AD Move  ↑/W/Space Jump  1-4 Powers  E Integrate  F1 Pause  F2 Restart  ESC Title");
    }

    fn compose_hud(&mut self, s: &GameSession, view: &View) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.fill_row(BAR_ROW, HUD_BG);

        let title = format!(
            " Level {}/{}  {}  ·  {} ",
            view.level_index + 1, s.level_count(), view.level_name, view.fear_label,
        );
        let end = self.front.put_str(0, HUD_ROW, &title, Color::White, HUD_BG);
        if view.slowed {
            self.front.put_str(end + 1, HUD_ROW, "◷ time slowed", FROZEN_FG, HUD_BG);
        }

        // ── Bars ──
        let mut x = self.front.put_str(0, BAR_ROW, " Fear ", Color::White, HUD_BG);
        let (on, off) = bar(view.fear, BAR_CELLS);
        x = self.front.put_str(x, BAR_ROW, &on, Color::Rgb { r: 220, g: 50, b: 50 }, HUD_BG);
        x = self.front.put_str(x, BAR_ROW, &off, Color::DarkGrey, HUD_BG);
        x = self.front.put_str(x, BAR_ROW, &format!(" {:>3}  Bloom ", view.fear), Color::White, HUD_BG);
        let (on, off) = bar(view.enlightenment, BAR_CELLS);
        x = self.front.put_str(x, BAR_ROW, &on, Color::Rgb { r: 255, g: 215, b: 0 }, HUD_BG);
        x = self.front.put_str(x, BAR_ROW, &off, Color::DarkGrey, HUD_BG);
        x = self.front.put_str(x, BAR_ROW, &format!(" {:>3}  ", view.enlightenment), Color::White, HUD_BG);

        // ── Ability slots ──
        for (i, def) in ABILITY_DEFS.iter().enumerate() {
            let short = def.name.split(' ').next().unwrap_or(def.name);
            let (label, fg) = match view.slots[i] {
                AbilitySlot::Locked => (format!("[{} {} ·]", def.key, short), Color::DarkGrey),
                AbilitySlot::Ready => (format!("[{} {} ✓]", def.key, short), Color::Rgb { r: 80, g: 255, b: 80 }),
                AbilitySlot::Cooling { percent_remaining } => (
                    format!("[{} {} {:>2}%]", def.key, short, percent_remaining),
                    Color::Rgb { r: 255, g: 200, b: 50 },
                ),
            };
            let bg = if view.slot_flash_ms[i] > 0 { Color::Rgb { r: 90, g: 60, b: 140 } } else { HUD_BG };
            x = self.front.put_str(x, BAR_ROW, &label, fg, bg) + 1;
        }
    }

    fn compose_dialogue(&mut self, view: &View) {
        let Some(d) = &view.dialogue else { return };
        let top = self.front.height.saturating_sub(FOOTER_ROWS);
        let width = self.front.width;
        let accent = d.accent.map(rgb).unwrap_or(Color::White);
        let box_bg = Color::Rgb { r: 10, g: 10, b: 18 };

        for row in top..top + 3 {
            self.front.fill_row(row, box_bg);
        }
        let header = format!("── {} ", d.speaker);
        let end = self.front.put_str(1, top, &header, accent, box_bg);
        for col in end..width.saturating_sub(1) {
            self.front.set(col, top, Cell::from_char('─', accent, box_bg));
        }
        for (i, line) in wrap(&d.text, width.saturating_sub(4)).iter().take(2).enumerate() {
            self.front.put_str(2, top + 1 + i, line, Color::White, box_bg);
        }
    }

    fn compose_message_line(&mut self, view: &View, help: &str) {
        let row = self.front.height.saturating_sub(1);
        if !view.message().is_empty() {
            self.front.fill_row(row, MSG_BG);
            self.front.put_str(0, row, &format!(" ◈ {} ", view.message()), Color::Black, MSG_BG);
        } else {
            self.front.put_str(0, row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_title(&mut self, s: &GameSession, view: &View, has_save: bool) {
        let title = [
            r"  __  __  _           _   ___  _                   ",
            r" |  \/  |(_) _ _   __| | | _ )| | ___  ___  _ __   ",
            r" | |\/| || || ' \ / _` | | _ \| |/ _ \/ _ \| '  \  ",
            r" |_|  |_||_||_||_|\__,_| |___/|_|\___/\___/|_|_|_| ",
        ];
        let t = (view.anim_ms as f32 / 4000.0).fract();
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 2 + i, line, hsv(t + i as f32 * 0.08, 0.6, 1.0), Color::Reset);
        }
        let subtitle = "◈◈  Descent  ◈◈";
        let sx = 2 + title[1].len().saturating_sub(subtitle.chars().count()) / 2;
        self.front.put_str(sx, 7, subtitle, Color::Rgb { r: 200, g: 120, b: 255 }, Color::Reset);

        let hi = Color::Rgb { r: 80, g: 255, b: 80 };
        let menu = 10;
        self.front.put_str(8, menu, "ENTER   Begin the descent", hi, Color::Reset);
        if has_save {
            self.front.put_str(8, menu + 1, " F9     Continue from slot 1", Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset);
        } else {
            self.front.put_str(8, menu + 1, " F9     Continue  (no save)", Color::DarkGrey, Color::Reset);
        }
        self.front.put_str(8, menu + 2, "  Q     Quit", Color::White, Color::Reset);
        let info = format!("        {} levels", s.level_count());
        self.front.put_str(8, menu + 4, &info, Color::DarkGrey, Color::Reset);

        let help_base = menu + 6;
        self.front.put_str(8, help_base, "Powers", Color::Rgb { r: 255, g: 200, b: 50 }, Color::Reset);
        for (i, def) in ABILITY_DEFS.iter().enumerate() {
            let line = format!("  {}  {:<14} {}", def.key, def.name, def.summary);
            self.front.put_str(8, help_base + 1 + i, &line, Color::White, Color::Reset);
        }
        let controls = [
            "  ←→ / AD Move   ↑ / W / Space Jump   E Integrate a defeated shadow",
            "  F1 Pause   F2 Restart   F5-F8 Save   F9-F12 Load   ESC Title",
        ];
        for (i, line) in controls.iter().enumerate() {
            self.front.put_str(8, help_base + 6 + i, line, Color::White, Color::Reset);
        }

        if self.front.height > help_base + 9 {
            self.compose_message_line(view, "");
        }
    }

    fn compose_outcome(&mut self, s: &GameSession, view: &View, outcome: Outcome) {
        let (art, color, lines) = match outcome {
            Outcome::Victory { enlightenment } => (
                [
                    "╔══════════════════════════════════════╗",
                    "║   ✿  THE MIND HAS BLOOMED  ✿         ║",
                    "╚══════════════════════════════════════╝",
                ],
                Color::Rgb { r: 255, g: 220, b: 50 },
                vec![
                    format!("◈ Enlightenment: {enlightenment}"),
                    format!("◈ Shadows integrated: {}", s.run.integrated.len()),
                ],
            ),
            Outcome::Defeat { enlightenment } => (
                [
                    "╔══════════════════════════════════════╗",
                    "║   ✕  FEAR HAS TAKEN HOLD  ✕          ║",
                    "╚══════════════════════════════════════╝",
                ],
                Color::Rgb { r: 255, g: 60, b: 60 },
                vec![
                    format!("◈ Enlightenment: {enlightenment}"),
                    format!("◈ Fell in: {}", view.level_name),
                ],
            ),
        };
        for (i, l) in art.iter().enumerate() {
            self.front.put_str(6, 4 + i, l, color, Color::Reset);
        }
        for (i, l) in lines.iter().enumerate() {
            self.front.put_str(8, 9 + i, l, Color::White, Color::Reset);
        }
        for (i, name) in s.run.integrated.iter().enumerate() {
            self.front.put_str(10, 12 + i, &format!("· {name}"), Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        }
        let row = 13 + s.run.integrated.len();
        self.front.put_str(8, row, "▸ ENTER: Begin a new descent", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        self.front.put_str(8, row + 1, "▸ ESC:   Back to Title", Color::DarkGrey, Color::Reset);
    }

    fn compose_pause_overlay(&mut self, view: &View) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let blink = (view.anim_ms / 500) % 2 == 0;

        let box_w = 34_usize.min(self.front.width);
        let box_h = 14_usize.min(self.front.height.saturating_sub(MAP_ROW));
        let box_x = self.front.width.saturating_sub(box_w) / 2;
        let box_y = MAP_ROW + self.front.height.saturating_sub(MAP_ROW + box_h) / 2;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::from_char(' ', Color::Reset, dim));
            }
        }

        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };
        let desc_c = Color::Rgb { r: 180, g: 180, b: 180 };
        let sep_c = Color::Rgb { r: 80, g: 80, b: 80 };

        let label = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
        self.front.put_str(box_x + 11, box_y + 1, label, hdr, dim);

        let y0 = box_y + 3;
        let rows: [(&str, Color); 10] = [
            ("F1  Resume", key_c),
            ("F2  Restart Level", key_c),
            ("────────────────────────", sep_c),
            ("F5 Save 1  F6 Save 2", desc_c),
            ("F7 Save 3  F8 Save 4", desc_c),
            ("────────────────────────", sep_c),
            ("F9 Load 1  F10 Load 2", desc_c),
            ("F11 Load 3 F12 Load 4", desc_c),
            ("────────────────────────", sep_c),
            ("ESC Back to Title", key_c),
        ];
        for (i, (text, fg)) in rows.iter().enumerate() {
            self.front.put_str(box_x + 2, y0 + i, text, *fg, dim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindbloom::domain::ability::AbilityId;
    use mindbloom::domain::entity::Vec2;

    fn started(index: usize) -> PresentationEvent {
        PresentationEvent::LevelStarted {
            index,
            name: "The Hall of Mirrors".into(),
            fear_label: "Fear of Rejection".into(),
            background: BackgroundSpec { colors: vec![0xff1493, 0x000000], speed: 0.5 },
        }
    }

    #[test]
    fn view_follows_event_stream() {
        let mut v = View::new();
        v.apply_all(&[
            started(0),
            PresentationEvent::HudChanged { fear: 42, enlightenment: 7 },
            PresentationEvent::ShowDialogue {
                text: "Welcome.".into(),
                speaker: "The Fool".into(),
                accent: Some(0xffff00),
                duration_ms: 5000,
            },
            PresentationEvent::TimeScaleChanged(0.5),
        ]);
        assert_eq!(v.level_name, "The Hall of Mirrors");
        assert_eq!((v.fear, v.enlightenment), (42, 7));
        assert_eq!(v.dialogue.as_ref().map(|d| d.speaker.as_str()), Some("The Fool"));
        assert!(v.slowed);

        v.apply_all(&[PresentationEvent::DialogueCleared, PresentationEvent::TimeScaleChanged(1.0)]);
        assert!(v.dialogue.is_none());
        assert!(!v.slowed);
    }

    #[test]
    fn outcome_cleared_by_next_level_start() {
        let mut v = View::new();
        v.apply(&PresentationEvent::Defeat { enlightenment: 30 });
        assert_eq!(v.outcome, Some(Outcome::Defeat { enlightenment: 30 }));
        v.apply(&started(0));
        assert_eq!(v.outcome, None);
    }

    #[test]
    fn visual_timers_expire() {
        let mut v = View::new();
        v.notify("Saved to slot 1");
        v.apply(&PresentationEvent::AbilityActivated(AbilityId::CalmBreath));
        v.apply(&PresentationEvent::PlayerHit { villain: 0 });
        v.advance(300);
        assert_eq!(v.message(), "Saved to slot 1");
        assert_eq!(v.hit_flash_ms, 0);
        assert_eq!(v.slot_flash_ms[AbilityId::CalmBreath.index()], 100);
        v.advance(MESSAGE_MS);
        assert_eq!(v.message(), "");
    }

    #[test]
    fn wrap_breaks_on_spaces() {
        let lines = wrap("You seek my approval... but why? Without me, you are nothing.", 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.join(" "), "You seek my approval... but why? Without me, you are nothing.");
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn colours() {
        assert_eq!(rgb(0xff1493), Color::Rgb { r: 255, g: 20, b: 147 });
        assert_eq!(shade(0xff8000, 0.5), Color::Rgb { r: 127, g: 64, b: 0 });
        assert_eq!(hsv(0.0, 1.0, 1.0), Color::Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(hsv(1.0 / 3.0, 1.0, 1.0), Color::Rgb { r: 0, g: 255, b: 0 });
        let bg = BackgroundSpec { colors: vec![1, 2, 3], speed: 1.0 };
        assert_eq!(background_color(&bg, 0), 1);
        assert_eq!(background_color(&bg, 1500), 2);
        assert_eq!(background_color(&bg, 3000), 1);
    }

    #[test]
    fn arena_projection_stays_inside() {
        let a = Arena { col0: 0, row0: MAP_ROW, cols: 120, rows: 35 };
        assert_eq!(a.col(0.0), 0);
        assert_eq!(a.col(WORLD_WIDTH), 119);
        assert_eq!(a.col(-50.0), 0);
        assert_eq!(a.row(WORLD_HEIGHT), MAP_ROW + 34);
        let (x0, y0, x1, y1) = a.span(&Aabb::new(Vec2::new(100.0, 300.0), Vec2::new(32.0, 32.0)));
        assert!(x0 <= x1 && y0 <= y1);
        assert_eq!(x0, 8);
    }

    #[test]
    fn bars_fill_proportionally() {
        let (on, off) = bar(50, 16);
        assert_eq!(on.chars().count(), 8);
        assert_eq!(off.chars().count(), 8);
        assert_eq!(bar(100, 16).0.chars().count(), 16);
        assert_eq!(bar(0, 16).0.chars().count(), 0);
    }
}
