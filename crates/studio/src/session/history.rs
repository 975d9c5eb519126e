use super::SessionState;

/// Ordered snapshots plus a cursor.
///
/// The snapshot under the cursor is the current value. Pushing truncates
/// everything after the cursor first, so a new edit discards the redo future.
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    snapshots: Vec<T>,
    index: usize,
    limit: Option<usize>,
}

impl<T: Clone> HistoryStack<T> {
    pub fn new(initial: T) -> Self {
        Self {
            snapshots: vec![initial],
            index: 0,
            limit: None,
        }
    }

    /// Keep at most `limit` snapshots (minimum 1), dropping the oldest.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.map(|l| l.max(1));
        self.enforce_limit();
        self
    }

    pub fn current(&self) -> &T {
        &self.snapshots[self.index]
    }

    pub fn push(&mut self, value: T) {
        self.snapshots.truncate(self.index + 1);
        self.snapshots.push(value);
        self.index = self.snapshots.len() - 1;
        self.enforce_limit();
    }

    /// Step back. Returns false at the start of history.
    pub fn undo(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Step forward. Returns false at the end of history.
    pub fn redo(&mut self) -> bool {
        if self.index + 1 >= self.snapshots.len() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn snapshots(&self) -> &[T] {
        &self.snapshots
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.snapshots.len() > limit {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
            self.index = self.index.saturating_sub(excess);
        }
    }
}

/// Something [`SessionStore::apply`] can turn into the next state: either a
/// replacement value or a function of the current state.
pub trait SessionUpdate {
    fn into_next(self, current: &SessionState) -> SessionState;
}

impl SessionUpdate for SessionState {
    fn into_next(self, _current: &SessionState) -> SessionState {
        self
    }
}

impl<F> SessionUpdate for F
where
    F: FnOnce(&SessionState) -> SessionState,
{
    fn into_next(self, current: &SessionState) -> SessionState {
        self(current)
    }
}

/// Owns the authoritative session state and its undo/redo history.
///
/// Every `apply` records a new entry, even when the result equals the
/// previous state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    history: HistoryStack<SessionState>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl SessionStore {
    pub fn new(initial: SessionState) -> Self {
        Self {
            history: HistoryStack::new(initial),
        }
    }

    /// Store whose history keeps at most `limit` snapshots. `None` is unbounded.
    pub fn with_limit(initial: SessionState, limit: Option<usize>) -> Self {
        Self {
            history: HistoryStack::new(initial).with_limit(limit),
        }
    }

    pub fn current(&self) -> &SessionState {
        self.history.current()
    }

    pub fn apply(&mut self, update: impl SessionUpdate) {
        let next = update.into_next(self.history.current());
        self.history.push(next);
        tracing::trace!(
            history.index = self.history.index(),
            history.len = self.history.len(),
            "Session state applied"
        );
    }

    /// `apply` for closures, letting the argument type be inferred.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&SessionState) -> SessionState,
    {
        self.apply(f);
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryStack<SessionState> {
        &self.history
    }
}
