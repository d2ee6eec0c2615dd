//! Replay-based undo/redo history.
//!
//! The history is a linear log of [`StrokeGroup`]s plus a pointer to the last
//! applied group. Undo and redo only move the pointer; the compositor
//! reconstructs pixels by replaying `active_groups()` onto a blank layer.
//! Nothing here stores raster snapshots.

use crate::stroke::{BrushSettings, Stroke, StrokeGroup};
use kurbo::Point;
use thiserror::Error;

/// Maximum number of stroke groups kept in the log.
pub const MAX_HISTORY: usize = 100;

/// History errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("a stroke group is already being recorded")]
    GroupAlreadyOpen,
    #[error("no stroke group is being recorded")]
    NoOpenGroup,
    #[error("history index {index} out of range for {len} groups")]
    IndexOutOfRange { index: usize, len: usize },
}

/// What `end_group` did with the recorded group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    /// The group was appended; the value is its index.
    Committed(usize),
    /// The group had no strokes and was dropped.
    Discarded,
    /// No group was open.
    NothingOpen,
}

/// Ordered, capped log of stroke groups.
#[derive(Debug, Clone, Default)]
pub struct History {
    groups: Vec<StrokeGroup>,
    /// Index of the last applied group; `None` when nothing is applied.
    current_index: Option<usize>,
    /// Group being recorded between pointer-down and pointer-up.
    open_group: Option<StrokeGroup>,
    /// Whether a stroke in the open group is accepting points.
    recording_stroke: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from persisted groups.
    pub fn from_parts(
        mut groups: Vec<StrokeGroup>,
        current_index: Option<usize>,
    ) -> Result<Self, HistoryError> {
        if let Some(index) = current_index {
            if index >= groups.len() {
                return Err(HistoryError::IndexOutOfRange {
                    index,
                    len: groups.len(),
                });
            }
        }
        // Index among the groups that survive dropping the empty ones.
        let current_index = current_index.and_then(|i| {
            groups[..=i]
                .iter()
                .filter(|g| !g.is_empty())
                .count()
                .checked_sub(1)
        });
        groups.retain(|g| !g.is_empty());
        let mut history = Self {
            current_index,
            groups,
            ..Self::default()
        };
        history.evict_overflow();
        Ok(history)
    }

    /// Open a new empty group.
    pub fn start_group(&mut self) -> Result<(), HistoryError> {
        if self.open_group.is_some() {
            return Err(HistoryError::GroupAlreadyOpen);
        }
        self.open_group = Some(StrokeGroup::new());
        self.recording_stroke = false;
        Ok(())
    }

    /// Append a new stroke with one initial point to the open group.
    ///
    /// The brush is taken by value: the stroke owns its own snapshot.
    pub fn start_stroke(&mut self, brush: BrushSettings, point: Point) -> Result<(), HistoryError> {
        let group = self.open_group.as_mut().ok_or(HistoryError::NoOpenGroup)?;
        group.strokes.push(Stroke::new(brush, point));
        self.recording_stroke = true;
        Ok(())
    }

    /// Append a point to the stroke being recorded. No-op otherwise.
    pub fn add_point(&mut self, point: Point) {
        if !self.recording_stroke {
            return;
        }
        if let Some(stroke) = self.open_group.as_mut().and_then(|g| g.strokes.last_mut()) {
            stroke.add_point(point);
        }
    }

    /// Close the open group, committing it unless it is empty.
    pub fn end_group(&mut self) -> GroupOutcome {
        self.recording_stroke = false;
        let Some(group) = self.open_group.take() else {
            return GroupOutcome::NothingOpen;
        };
        if group.is_empty() {
            log::debug!("Discarding empty stroke group {}", group.id);
            return GroupOutcome::Discarded;
        }

        // Committing drops any undone future.
        let keep = self.current_index.map_or(0, |i| i + 1);
        self.groups.truncate(keep);
        self.groups.push(group);
        self.evict_overflow();

        let index = self.groups.len() - 1;
        self.current_index = Some(index);
        GroupOutcome::Committed(index)
    }

    fn evict_overflow(&mut self) {
        if self.groups.len() <= MAX_HISTORY {
            return;
        }
        let excess = self.groups.len() - MAX_HISTORY;
        self.groups.drain(..excess);
        self.current_index = self.current_index.and_then(|i| i.checked_sub(excess));
        log::debug!("Evicted {} oldest stroke group(s)", excess);
    }

    /// Step back one group. Returns the new index; clamped at "nothing applied".
    pub fn undo(&mut self) -> Option<usize> {
        self.current_index = match self.current_index {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
        self.current_index
    }

    /// Step forward one group. Returns the new index; clamped at the newest group.
    pub fn redo(&mut self) -> Option<usize> {
        let next = self.current_index.map_or(0, |i| i + 1);
        if next < self.groups.len() {
            self.current_index = Some(next);
        }
        self.current_index
    }

    /// Drop every group, including an unfinished one.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.current_index = None;
        self.open_group = None;
        self.recording_stroke = false;
    }

    pub fn can_undo(&self) -> bool {
        self.current_index.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.current_index.map_or(0, |i| i + 1) < self.groups.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// All committed groups, including undone ones.
    pub fn groups(&self) -> &[StrokeGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups that are currently applied, oldest first.
    pub fn active_groups(&self) -> &[StrokeGroup] {
        match self.current_index {
            Some(i) => &self.groups[..=i],
            None => &[],
        }
    }

    /// Total points in the applied groups (replay cost).
    pub fn active_point_count(&self) -> usize {
        self.active_groups().iter().map(StrokeGroup::point_count).sum()
    }

    pub fn is_recording(&self) -> bool {
        self.open_group.is_some()
    }

    /// The stroke currently accepting points.
    pub fn open_stroke(&self) -> Option<&Stroke> {
        if !self.recording_stroke {
            return None;
        }
        self.open_group.as_ref().and_then(|g| g.strokes.last())
    }
}
