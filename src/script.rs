//! Scripted input for the headless runner
//!
//! | Form | Meaning |
//! |------|---------|
//! | `x1,y1,x2,y2` | swap the tiles at (x1, y1) and (x2, y2) |
//! | `kind@x,y` | arm booster `kind` (`single`, `row`, `column`, `shuffle`) and fire it at (x, y) |

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};

use crate::engine::{Session, TurnReport};
use crate::types::{BoardEvent, BoosterKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Swap { from: (i32, i32), to: (i32, i32) },
    Booster { kind: BoosterKind, x: i32, y: i32 },
}

fn parse_ints(s: &str) -> Result<Vec<i32>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<i32>()
                .with_context(|| format!("'{}' is not a number", part.trim()))
        })
        .collect()
}

impl Step {
    pub fn parse_swap(s: &str) -> Result<Self> {
        match parse_ints(s)?.as_slice() {
            &[x1, y1, x2, y2] => Ok(Step::Swap {
                from: (x1, y1),
                to: (x2, y2),
            }),
            other => bail!("swap needs 4 numbers, got {}", other.len()),
        }
    }

    pub fn parse_booster(s: &str) -> Result<Self> {
        let (kind, cell) = s
            .split_once('@')
            .ok_or_else(|| anyhow!("booster must look like kind@x,y"))?;
        let kind = BoosterKind::from_str(kind.trim())
            .ok_or_else(|| anyhow!("unknown booster '{}'", kind.trim()))?;
        match parse_ints(cell)?.as_slice() {
            &[x, y] => Ok(Step::Booster { kind, x, y }),
            other => bail!("booster target needs 2 numbers, got {}", other.len()),
        }
    }
}

/// Play `steps` in order. Refused inputs are logged and skipped; the idle
/// gate is ticked after every turn.
pub fn play(session: &mut Session, steps: &[Step]) -> Vec<TurnReport> {
    let mut reports = Vec::new();
    for step in steps {
        let result = match *step {
            Step::Swap { from, to } => {
                let cells = (
                    session.grid().index(from.0, from.1),
                    session.grid().index(to.0, to.1),
                );
                let (Some(a), Some(b)) = cells else {
                    warn!("swap {:?} -> {:?} is off the board", from, to);
                    continue;
                };
                session
                    .request_swap(a, b)
                    .map_err(|e| format!("{} ({})", e.message(), e.code()))
            }
            Step::Booster { kind, x, y } => session
                .activate_booster(kind)
                .and_then(|_| session.apply_booster_at_cell(x, y))
                .map_err(|e| format!("{} ({})", e.message(), e.code())),
        };
        match result {
            Ok(report) => {
                info!(
                    "{:?}: {} cleared, {} passes, {} moves left{}",
                    step,
                    report.cleared_total(),
                    report.passes,
                    report.moves_left,
                    if report.reverted { ", reverted" } else { "" }
                );
                reports.push(report);
            }
            Err(reason) => warn!("{:?} refused: {}", step, reason),
        }
        if session.tick().contains(&BoardEvent::BoardIdle) {
            debug!("board idle");
        }
    }
    reports
}
