use crate::event_type::EventType;

/// Rule evaluation, as seen by the discarder logic.
///
/// Implemented by the active rule set. It's the only authority on whether a
/// discarder may be widened from a file to its parent directory: the answer
/// is never second-guessed here.
pub trait ParentDiscarderCheck {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns true when no active rule on `field` could match a sibling of
    /// `filename` in the same directory, for events of type `event_type`.
    fn is_parent_path_discarder(
        &self,
        event_type: EventType,
        field: &str,
        filename: &str,
    ) -> Result<bool, Self::Error>;
}
