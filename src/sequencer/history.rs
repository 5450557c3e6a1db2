// UndoHistory - bounded, truncatable log of pattern edits
//
// Actions with an index below `position` are applied to the live pattern,
// the rest form the redo tail. Any new edit discards the redo tail; there
// is no branching history.

use super::pattern::Pattern;

/// Soft bound on history length. Applied actions are never evicted, the
/// history only logs a warning once it grows past this.
pub const MAX_UNDO: usize = 1000;

/// A single undoable pattern edit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoAction {
    /// Nothing was applied (history boundary)
    None,
    /// One trigger set to `value`. The prior value is `!value`.
    TrigEdit {
        track: usize,
        step: usize,
        value: bool,
    },
    /// The whole pattern cleared; `snapshot` is the pattern before clearing
    ClearAll { snapshot: Box<Pattern> },
}

impl UndoAction {
    pub fn is_none(&self) -> bool {
        matches!(self, UndoAction::None)
    }

    /// Human-readable description of the action
    pub fn description(&self) -> String {
        match self {
            UndoAction::None => "Nothing".to_string(),
            UndoAction::TrigEdit { track, step, value } => format!(
                "Set track {} step {} {}",
                track,
                step,
                if *value { "on" } else { "off" }
            ),
            UndoAction::ClearAll { snapshot } => {
                format!("Clear pattern ({} triggers)", snapshot.active_count())
            }
        }
    }

    fn apply(&self, pattern: &mut Pattern) {
        match self {
            UndoAction::None => {}
            UndoAction::TrigEdit { track, step, value } => pattern.set(*track, *step, *value),
            UndoAction::ClearAll { .. } => pattern.clear_all(),
        }
    }

    fn revert(&self, pattern: &mut Pattern) {
        match self {
            UndoAction::None => {}
            UndoAction::TrigEdit { track, step, value } => pattern.set(*track, *step, !*value),
            UndoAction::ClearAll { snapshot } => *pattern = (**snapshot).clone(),
        }
    }
}

pub struct UndoHistory {
    actions: Vec<UndoAction>,
    position: usize,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            position: 0,
        }
    }

    /// Record an already-applied action, dropping the redo tail
    pub fn push(&mut self, action: UndoAction) {
        if action.is_none() {
            return;
        }
        self.actions.truncate(self.position);
        self.actions.push(action);
        self.position += 1;

        if self.actions.len() == MAX_UNDO + 1 {
            log::warn!(
                "Undo history grew past {} entries, older edits are kept",
                MAX_UNDO
            );
        }
    }

    /// Step back one action and revert it on `pattern`
    pub fn undo(&mut self, pattern: &mut Pattern) -> UndoAction {
        if self.position == 0 {
            return UndoAction::None;
        }
        self.position -= 1;
        let action = &self.actions[self.position];
        action.revert(pattern);
        action.clone()
    }

    /// Step forward one action and re-apply it on `pattern`
    pub fn redo(&mut self, pattern: &mut Pattern) -> UndoAction {
        if self.position >= self.actions.len() {
            return UndoAction::None;
        }
        let action = &self.actions[self.position];
        action.apply(pattern);
        self.position += 1;
        action.clone()
    }

    /// The most recently applied action, if any
    pub fn last_applied(&self) -> Option<&UndoAction> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.actions.get(index))
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.actions.len()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new()
    }
}
