//! Three-command cursor over a symbol grid.
//!
//! `left`/`right` move along the active axis, `flip` swaps the axis, `select`
//! locks the cell for [`SELECT_HOLD`] and then resets the cursor.

use crate::config::GridConfig;
use crate::Context;
use cadence_core::{Element, Highlight, Result, Surface};
use cadence_timing::Timer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Confirmation window of a selection
pub const SELECT_HOLD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Reset,
    Flip,
    Left,
    Right,
    Toggle,
    Select,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "flip" => Ok(Self::Flip),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "toggle" => Ok(Self::Toggle),
            "select" => Ok(Self::Select),
            other => Err(format!("unknown grid command: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub x: usize,
    pub y: usize,
    /// Navigation runs along the column instead of the row
    pub flip: bool,
    /// Commands are accepted
    pub active: bool,
    /// A selection is being confirmed
    pub action: bool,
}

struct Inner<T: Timer> {
    config: GridConfig,
    symbols: Vec<char>,
    cols: usize,
    rows: usize,
    cursor: Mutex<Cursor>,
    ctx: Context<T>,
}

/// Shared handle to a grid; clones drive the same cursor
pub struct Grid<T: Timer> {
    inner: Arc<Inner<T>>,
}

impl<T: Timer> Clone for Grid<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Timer> Grid<T> {
    pub fn new(config: GridConfig, ctx: Context<T>) -> Result<Self> {
        config.validate()?;
        let symbols: Vec<char> = config.symbols.chars().collect();
        let cols = config.shape.columns;
        let rows = symbols.len().div_ceil(cols);
        let grid = Self {
            inner: Arc::new(Inner {
                symbols,
                cols,
                rows,
                cursor: Mutex::new(Cursor {
                    x: 0,
                    y: 0,
                    flip: false,
                    active: true,
                    action: false,
                }),
                ctx,
                config,
            }),
        };
        {
            let mut surface = grid.inner.ctx.surface.lock();
            for y in 0..rows {
                for x in 0..cols {
                    if let Some(symbol) = grid.symbol_at(x, y) {
                        surface.set_text(Element::Cell { x, y }, &symbol.to_string());
                    }
                }
            }
        }
        grid.command(Command::Reset);
        grid.inner
            .ctx
            .emit("grid_begins", Some(serde_json::to_value(&grid.inner.config)?));
        Ok(grid)
    }

    pub fn context(&self) -> &Context<T> {
        &self.inner.ctx
    }

    pub fn cursor(&self) -> Cursor {
        *self.inner.cursor.lock()
    }

    /// `(columns, rows)`
    pub fn shape(&self) -> (usize, usize) {
        (self.inner.cols, self.inner.rows)
    }

    pub fn symbol_at(&self, x: usize, y: usize) -> Option<char> {
        if x >= self.inner.cols {
            return None;
        }
        self.inner.symbols.get(y * self.inner.cols + x).copied()
    }

    /// Applies `command`; returns false when it was ignored.
    ///
    /// `select` arms its release timer on the current tokio runtime; called
    /// outside one it is refused and the cursor stays unlocked.
    pub fn command(&self, command: Command) -> bool {
        let inner = &self.inner;
        let mut surface = inner.ctx.surface.lock();
        surface.clear_highlights();
        let mut c = inner.cursor.lock();
        if c.action {
            tracing::debug!(?command, "grid busy, command ignored");
            return false;
        }

        if command == Command::Toggle {
            c.active = !c.active;
            surface.announce(if c.active {
                "Ready for command."
            } else {
                "Neural interface disabled."
            });
        }
        if !c.active {
            return command == Command::Toggle;
        }

        let (cols, rows, wrap) = (inner.cols, inner.rows, inner.config.wrap);
        match command {
            Command::Select => {
                let Ok(runtime) = Handle::try_current() else {
                    tracing::warn!("select needs a tokio runtime for its hold timer, ignored");
                    self.redraw(&c, &mut *surface);
                    return false;
                };
                surface.highlight(Element::Cell { x: c.x, y: c.y }, Highlight::Active);
                c.action = true;
                let symbol = self.symbol_at(c.x, c.y);
                let text = symbol.map(String::from).unwrap_or_default();
                surface.announce(&text);
                inner.ctx.emit(
                    "select",
                    Some(json!({ "symbol": symbol.map(String::from), "x": c.x, "y": c.y })),
                );
                tracing::info!(symbol = %text, x = c.x, y = c.y, "grid selection");
                self.schedule_release(&runtime);
                return true;
            }
            Command::Reset => {
                c.flip = false;
                c.x = cols / 2;
                c.y = rows / 2;
            }
            Command::Flip => c.flip = !c.flip,
            Command::Left if c.flip => {
                c.y = step_up(c.y, rows, wrap);
            }
            Command::Left => {
                c.x = step_down(c.x, cols, wrap);
            }
            Command::Right if c.flip => {
                c.y = step_down(c.y, rows, wrap);
            }
            Command::Right => {
                c.x = step_up(c.x, cols, wrap);
            }
            Command::Toggle => {}
        }
        self.redraw(&c, &mut *surface);
        true
    }

    /// Classifier confidence for the left and right neighbours
    pub fn feedback(&self, scores: [f32; 2]) {
        let c = self.cursor();
        let mut surface = self.inner.ctx.surface.lock();
        let (left, right) = self.neighbours(&c);
        for (cell, score) in [(left, scores[0]), (right, scores[1])] {
            if let Some(cell) = cell {
                surface.opacity(cell, score);
            }
        }
    }

    fn redraw(&self, c: &Cursor, surface: &mut dyn Surface) {
        surface.highlight(Element::Cell { x: c.x, y: c.y }, Highlight::Center);
        let (left, right) = self.neighbours(c);
        if let Some(cell) = left {
            surface.highlight(cell, Highlight::Left);
        }
        if let Some(cell) = right {
            surface.highlight(cell, Highlight::Right);
        }
    }

    /// Cells a `left` and a `right` command would move to
    fn neighbours(&self, c: &Cursor) -> (Option<Element>, Option<Element>) {
        let (cols, rows, wrap) = (self.inner.cols, self.inner.rows, self.inner.config.wrap);
        let cell = |x: usize, y: usize| Element::Cell { x, y };
        if c.flip {
            (
                peek_up(c.y, rows, wrap).map(|y| cell(c.x, y)),
                peek_down(c.y, rows, wrap).map(|y| cell(c.x, y)),
            )
        } else {
            (
                peek_down(c.x, cols, wrap).map(|x| cell(x, c.y)),
                peek_up(c.x, cols, wrap).map(|x| cell(x, c.y)),
            )
        }
    }

    fn schedule_release(&self, runtime: &Handle) {
        let grid = self.clone();
        runtime.spawn(async move {
            grid.inner.ctx.timer.sleep(SELECT_HOLD).await;
            grid.inner.cursor.lock().action = false;
            grid.command(Command::Reset);
        });
    }
}

fn peek_up(pos: usize, len: usize, wrap: bool) -> Option<usize> {
    if pos + 1 < len {
        Some(pos + 1)
    } else if wrap {
        Some(0)
    } else {
        None
    }
}

fn peek_down(pos: usize, len: usize, wrap: bool) -> Option<usize> {
    if pos > 0 {
        Some(pos - 1)
    } else if wrap {
        Some(len - 1)
    } else {
        None
    }
}

fn step_up(pos: usize, len: usize, wrap: bool) -> usize {
    peek_up(pos, len, wrap).unwrap_or(pos)
}

fn step_down(pos: usize, len: usize, wrap: bool) -> usize {
    peek_down(pos, len, wrap).unwrap_or(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Recorder, Recording};
    use cadence_timing::{InputSource, MonotonicTimer};

    fn grid(wrap: bool) -> (Grid<MonotonicTimer>, Arc<Recorder>, Arc<Mutex<Recording>>) {
        let recorder = Arc::new(Recorder::new());
        let surface = Arc::new(Mutex::new(Recording::new()));
        let ctx = Context::new(
            recorder.clone(),
            surface.clone(),
            InputSource::new(),
            MonotonicTimer::new(),
        );
        let config = GridConfig {
            wrap,
            ..GridConfig::default()
        };
        (Grid::new(config, ctx).unwrap(), recorder, surface)
    }

    fn position(grid: &Grid<MonotonicTimer>) -> (usize, usize) {
        let c = grid.cursor();
        (c.x, c.y)
    }

    #[test]
    fn starts_centered_and_announces_itself() {
        let (grid, recorder, surface) = grid(false);
        assert_eq!(grid.shape(), (3, 3));
        assert_eq!(position(&grid), (1, 1));
        assert_eq!(recorder.count("grid_begins"), 1);
        assert_eq!(
            surface.lock().highlights(),
            vec![
                (Element::Cell { x: 1, y: 1 }, Highlight::Center),
                (Element::Cell { x: 0, y: 1 }, Highlight::Left),
                (Element::Cell { x: 2, y: 1 }, Highlight::Right),
            ]
        );
    }

    #[test]
    fn boundary_moves_are_noops_without_wrap() {
        let (grid, _, _) = grid(false);
        let xs: Vec<_> = (0..3)
            .map(|_| {
                grid.command(Command::Right);
                grid.cursor().x
            })
            .collect();
        assert_eq!(xs, vec![2, 2, 2]);
        for _ in 0..3 {
            grid.command(Command::Left);
        }
        assert_eq!(position(&grid), (0, 1));
    }

    #[test]
    fn wrap_jumps_to_the_opposite_column() {
        let (grid, _, _) = grid(true);
        let xs: Vec<_> = (0..3)
            .map(|_| {
                grid.command(Command::Right);
                grid.cursor().x
            })
            .collect();
        assert_eq!(xs, vec![2, 0, 1]);
        grid.command(Command::Left);
        grid.command(Command::Left);
        assert_eq!(grid.cursor().x, 2);
    }

    #[test]
    fn flip_moves_along_the_column() {
        let (grid, _, _) = grid(false);
        grid.command(Command::Flip);
        grid.command(Command::Left);
        assert_eq!(position(&grid), (1, 2));
        grid.command(Command::Left);
        assert_eq!(position(&grid), (1, 2));
        grid.command(Command::Right);
        grid.command(Command::Right);
        assert_eq!(position(&grid), (1, 0));
        grid.command(Command::Reset);
        assert!(!grid.cursor().flip);
        assert_eq!(position(&grid), (1, 1));
    }

    #[test]
    fn toggle_disables_everything_but_toggle() {
        let (grid, _, surface) = grid(false);
        assert!(grid.command(Command::Toggle));
        assert!(!grid.cursor().active);
        assert!(!grid.command(Command::Right));
        assert!(!grid.command(Command::Select));
        assert_eq!(position(&grid), (1, 1));
        assert!(grid.command(Command::Toggle));
        assert!(grid.command(Command::Right));
        assert_eq!(
            surface.lock().announcements(),
            vec!["Neural interface disabled.", "Ready for command."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn select_locks_then_resets() {
        let (grid, recorder, _) = grid(false);
        grid.command(Command::Right);
        grid.command(Command::Flip);
        assert!(grid.command(Command::Select));
        assert_eq!(
            recorder.payloads("select"),
            vec![json!({"symbol": "6", "x": 2, "y": 1})]
        );

        tokio::time::sleep(Duration::from_millis(1400)).await;
        for command in [Command::Left, Command::Right, Command::Flip, Command::Toggle] {
            assert!(!grid.command(command));
        }
        let c = grid.cursor();
        assert!(c.action && c.flip && c.active);
        assert_eq!((c.x, c.y), (2, 1));

        tokio::time::sleep(Duration::from_millis(101)).await;
        let c = grid.cursor();
        assert!(!c.action && !c.flip);
        assert_eq!((c.x, c.y), (1, 1));
        assert!(grid.command(Command::Left));
    }

    #[test]
    fn select_without_runtime_is_refused() {
        let (grid, recorder, surface) = grid(false);
        assert!(!grid.command(Command::Select));
        let c = grid.cursor();
        assert!(!c.action);
        assert_eq!(recorder.count("select"), 0);
        assert_eq!(
            surface.lock().highlights()[0],
            (Element::Cell { x: 1, y: 1 }, Highlight::Center)
        );
        assert!(grid.command(Command::Right));
    }

    #[test]
    fn ragged_grids_round_rows_up() {
        let recorder = Arc::new(Recorder::new());
        let surface = Arc::new(Mutex::new(Recording::new()));
        let ctx = Context::new(recorder, surface, InputSource::new(), MonotonicTimer::new());
        let config = GridConfig {
            symbols: "ABCDE".to_owned(),
            ..GridConfig::default()
        };
        let grid = Grid::new(config, ctx).unwrap();
        assert_eq!(grid.shape(), (3, 2));
        assert_eq!(grid.symbol_at(1, 1), Some('E'));
        assert_eq!(grid.symbol_at(2, 1), None);
        assert_eq!(position(&grid), (1, 1));
    }
}
