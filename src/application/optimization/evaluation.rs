use crate::domain::ports::ObjectiveFunction;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::debug;

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Optimization direction of a search, which decides the worst-case sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    pub fn worst(self) -> f64 {
        match self {
            Direction::Minimize => f64::INFINITY,
            Direction::Maximize => f64::NEG_INFINITY,
        }
    }

    /// True when `candidate` strictly beats `incumbent`
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }
}

fn in_guarded_evaluation() -> bool {
    GUARDED.with(Cell::get)
}

/// Routes panics raised inside [`guarded_evaluate`] to `debug` logs.
///
/// Without it the default hook prints every caught objective panic to stderr.
/// Panics anywhere else still reach the previously installed hook.
pub fn install_quiet_panic_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if in_guarded_evaluation() {
                debug!("Objective panicked: {}", info);
            } else {
                previous(info);
            }
        }));
    });
}

/// Calls the objective, converting panics and NaN results into the worst score.
///
/// The search loops rely on this never failing. Panic messages still go through
/// the process panic hook; see [`install_quiet_panic_hook`].
pub fn guarded_evaluate(
    objective: &dyn ObjectiveFunction,
    parameters: &[f64],
    direction: Direction,
) -> f64 {
    let outer = GUARDED.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(|| objective.evaluate(parameters)));
    GUARDED.with(|flag| flag.set(outer));

    match result {
        Ok(score) if score.is_nan() => {
            debug!("Objective returned NaN, using worst-case score");
            direction.worst()
        }
        Ok(score) => score,
        Err(_) => {
            debug!("Objective panicked, using worst-case score");
            direction.worst()
        }
    }
}
