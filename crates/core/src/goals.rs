//! Level goal progress

use crate::special::GoalView;
use crate::types::{BoardEvent, GemKind, Goal, GoalKind};

/// Remaining amount per level goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalProgress {
    pub goal: Goal,
    pub remaining: u32,
}

impl GoalProgress {
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Tracks goals by replaying board events
#[derive(Debug, Clone, Default)]
pub struct GoalTracker {
    progress: Vec<GoalProgress>,
}

impl GoalTracker {
    pub fn new(goals: &[Goal]) -> Self {
        Self {
            progress: goals
                .iter()
                .map(|&goal| GoalProgress {
                    goal,
                    remaining: goal.amount,
                })
                .collect(),
        }
    }

    pub fn progress(&self) -> &[GoalProgress] {
        &self.progress
    }

    /// A level without goals is never complete
    pub fn all_complete(&self) -> bool {
        !self.progress.is_empty() && self.progress.iter().all(GoalProgress::is_complete)
    }

    pub fn observe(&mut self, event: &BoardEvent) {
        match *event {
            BoardEvent::TilesCleared { gem, count } => {
                self.credit(GoalKind::Tile, gem.id(), count)
            }
            BoardEvent::ObstacleDestroyed { obstacle_id, .. } => {
                self.credit(GoalKind::Obstacle, obstacle_id, 1)
            }
            _ => {}
        }
    }

    pub fn observe_all<'a>(&mut self, events: impl IntoIterator<Item = &'a BoardEvent>) {
        for event in events {
            self.observe(event);
        }
    }

    fn credit(&mut self, kind: GoalKind, target_id: u32, amount: u32) {
        for p in self
            .progress
            .iter_mut()
            .filter(|p| p.goal.kind == kind && p.goal.target_id == target_id)
        {
            p.remaining = p.remaining.saturating_sub(amount);
        }
    }

    fn is_active(&self, kind: GoalKind, target_id: u32) -> bool {
        self.progress
            .iter()
            .any(|p| p.goal.kind == kind && p.goal.target_id == target_id && p.remaining > 0)
    }
}

impl GoalView for GoalTracker {
    fn is_tile_goal_active(&self, gem: GemKind) -> bool {
        self.is_active(GoalKind::Tile, gem.id())
    }

    fn is_obstacle_goal_active(&self, obstacle_id: u32) -> bool {
        self.is_active(GoalKind::Obstacle, obstacle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goals() -> Vec<Goal> {
        vec![
            Goal {
                kind: GoalKind::Tile,
                target_id: GemKind::Red.id(),
                amount: 5,
            },
            Goal {
                kind: GoalKind::Obstacle,
                target_id: 7,
                amount: 1,
            },
        ]
    }

    #[test]
    fn test_tile_goal_counts_down() {
        let mut tracker = GoalTracker::new(&goals());
        tracker.observe(&BoardEvent::TilesCleared {
            gem: GemKind::Red,
            count: 3,
        });
        tracker.observe(&BoardEvent::TilesCleared {
            gem: GemKind::Blue,
            count: 9,
        });
        assert_eq!(tracker.progress()[0].remaining, 2);
        assert!(tracker.is_tile_goal_active(GemKind::Red));
        assert!(!tracker.is_tile_goal_active(GemKind::Blue));
    }

    #[test]
    fn test_goals_complete_and_saturate() {
        let mut tracker = GoalTracker::new(&goals());
        tracker.observe_all(&[
            BoardEvent::TilesCleared {
                gem: GemKind::Red,
                count: 8,
            },
            BoardEvent::ObstacleDestroyed {
                origin: 0,
                obstacle_id: 7,
            },
        ]);
        assert_eq!(tracker.progress()[0].remaining, 0);
        assert!(!tracker.is_obstacle_goal_active(7));
        assert!(tracker.all_complete());
    }

    #[test]
    fn test_no_goals_never_complete() {
        assert!(!GoalTracker::new(&[]).all_complete());
    }
}
