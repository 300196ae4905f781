//! Mutation outcomes.

use crate::command::CommandId;
use crate::snapshot::{TagSnapshot, TodoSnapshot};
use uuid::Uuid;

/// The result of performing a mutation.
///
/// A closed union so callers can handle every case exhaustively. The
/// first three variants carry server-confirmed data; `Queued` means the
/// mutation was accepted locally while offline and will be replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The server confirmed a todo update and returned its state.
    Todo(TodoSnapshot),
    /// The server confirmed a tag update and returned its state.
    Tag(TagSnapshot),
    /// The server confirmed a deletion of the given entity.
    Deleted(Uuid),
    /// Accepted locally; the command is queued for replay.
    Queued(CommandId),
}

impl MutationOutcome {
    /// Returns true if the server confirmed this mutation.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Self::Queued(_))
    }

    /// Returns the queued command id, if this outcome is deferred.
    #[must_use]
    pub fn queued_id(&self) -> Option<CommandId> {
        match self {
            Self::Queued(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_vs_queued() {
        let id = Uuid::new_v4();
        assert!(MutationOutcome::Deleted(id).is_confirmed());
        assert!(MutationOutcome::Deleted(id).queued_id().is_none());

        let command_id = CommandId::new();
        let queued = MutationOutcome::Queued(command_id);
        assert!(!queued.is_confirmed());
        assert_eq!(queued.queued_id(), Some(command_id));
    }
}
