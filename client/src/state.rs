//! Immutable view state and the single function allowed to advance it.

use kernel::{Identity, StoredFile, UsageStats};

/// Tags an asynchronous response with the session epoch and request number
/// it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub request: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub identity: Option<Identity>,
    pub files: Vec<StoredFile>,
    pub stats: UsageStats,
    /// Bumped whenever the signed in identity changes
    pub epoch: u64,
    /// Message of the last failed action, shown next to it
    pub last_error: Option<String>,
    /// Informational message such as a pending email confirmation
    pub notice: Option<String>,
    files_request: u64,
    stats_request: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SessionChanged(Option<Identity>),
    SignedOut,
    FilesLoaded { ticket: Ticket, files: Vec<StoredFile> },
    StatsComputed { ticket: Ticket, stats: UsageStats },
    FileRemoved { epoch: u64, id: String },
    Failed { epoch: u64, message: String },
    Notice(String),
}

impl AppState {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

/// Computes the next snapshot. Responses from an older epoch, or older than
/// the last applied response of the same kind, leave the state unchanged.
#[must_use]
pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::SessionChanged(identity) => {
            let same_user = match (&state.identity, &identity) {
                (Some(current), Some(new)) => current.id == new.id,
                (None, None) => true,
                _ => false,
            };
            next.identity = identity;
            if !same_user {
                clear_user_data(&mut next);
            }
        }
        Action::SignedOut => {
            next.identity = None;
            clear_user_data(&mut next);
        }
        Action::FilesLoaded { ticket, files } => {
            if ticket.epoch == state.epoch && ticket.request > state.files_request {
                next.files = files;
                next.files_request = ticket.request;
            } else {
                tracing::debug!("stale listing {ticket:?} discarded");
            }
        }
        Action::StatsComputed { ticket, stats } => {
            if ticket.epoch == state.epoch && ticket.request > state.stats_request {
                next.stats = stats;
                next.stats_request = ticket.request;
            } else {
                tracing::debug!("stale stats {ticket:?} discarded");
            }
        }
        Action::FileRemoved { epoch, id } => {
            if epoch == state.epoch {
                next.files.retain(|f| f.id != id);
            }
        }
        Action::Failed { epoch, message } => {
            if epoch == state.epoch {
                next.last_error = Some(message);
            }
        }
        Action::Notice(message) => next.notice = Some(message),
    }
    next
}

fn clear_user_data(state: &mut AppState) {
    state.epoch += 1;
    state.files.clear();
    state.stats = UsageStats::default();
    state.last_error = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            id: "alice".into(),
            email: "alice@example.com".into(),
        }
    }

    fn bob() -> Identity {
        Identity {
            id: "bob".into(),
            email: "bob@example.com".into(),
        }
    }

    fn file(name: &str, size: u64) -> StoredFile {
        StoredFile {
            id: name.into(),
            name: name.into(),
            url: format!("https://storage.test/{name}"),
            size_bytes: size,
            created_at: None,
        }
    }

    fn loaded(state: &AppState, request: u64, files: Vec<StoredFile>) -> AppState {
        reduce(
            state,
            Action::FilesLoaded {
                ticket: Ticket {
                    epoch: state.epoch,
                    request,
                },
                files,
            },
        )
    }

    #[test]
    fn sign_out_clears_everything() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let state = loaded(&state, 1, vec![file("a.pdf", 1), file("b.pdf", 2)]);
        let state = reduce(
            &state,
            Action::StatsComputed {
                ticket: Ticket {
                    epoch: state.epoch,
                    request: 1,
                },
                stats: UsageStats {
                    total_files: 2,
                    total_storage: 3,
                    avg_file_size: 1.5,
                    last_upload: None,
                },
            },
        );

        // Act
        let state = reduce(&state, Action::SignedOut);

        // Assert
        assert!(state.identity.is_none());
        assert!(state.files.is_empty());
        assert_eq!(state.stats, UsageStats::default());
    }

    #[test]
    fn account_switch_clears_previous_user_data() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let state = loaded(&state, 1, vec![file("a.pdf", 1)]);

        // Act
        let state = reduce(&state, Action::SessionChanged(Some(bob())));

        // Assert
        assert_eq!(state.identity, Some(bob()));
        assert!(state.files.is_empty());
    }

    #[test]
    fn token_refresh_keeps_files() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let state = loaded(&state, 1, vec![file("a.pdf", 1)]);
        let epoch = state.epoch;

        // Act
        let state = reduce(&state, Action::SessionChanged(Some(alice())));

        // Assert
        assert_eq!(state.files.len(), 1);
        assert_eq!(state.epoch, epoch);
    }

    #[test]
    fn listing_from_previous_session_is_discarded() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let stale = Ticket {
            epoch: state.epoch,
            request: 1,
        };
        let state = reduce(&state, Action::SessionChanged(Some(bob())));

        // Act
        let state = reduce(
            &state,
            Action::FilesLoaded {
                ticket: stale,
                files: vec![file("alice-secret.pdf", 1)],
            },
        );

        // Assert
        assert!(state.files.is_empty());
    }

    #[test]
    fn older_listing_does_not_replace_newer() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let state = loaded(&state, 2, vec![file("new.pdf", 1)]);

        // Act
        let state = loaded(&state, 1, vec![file("old.pdf", 1)]);

        // Assert
        assert_eq!(state.files, vec![file("new.pdf", 1)]);
    }

    #[test]
    fn file_removed_drops_only_that_entry() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let state = loaded(&state, 1, vec![file("a.pdf", 1), file("b.pdf", 2)]);

        // Act
        let state = reduce(
            &state,
            Action::FileRemoved {
                epoch: state.epoch,
                id: "a.pdf".into(),
            },
        );

        // Assert
        assert_eq!(state.files, vec![file("b.pdf", 2)]);
    }

    #[test]
    fn failure_from_old_epoch_is_ignored() {
        // Arrange
        let state = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let old_epoch = state.epoch;
        let state = reduce(&state, Action::SignedOut);

        // Act
        let state = reduce(
            &state,
            Action::Failed {
                epoch: old_epoch,
                message: "boom".into(),
            },
        );

        // Assert
        assert!(state.last_error.is_none());
    }

    #[test]
    fn reduce_leaves_input_untouched() {
        // Arrange
        let before = reduce(&AppState::default(), Action::SessionChanged(Some(alice())));
        let copy = before.clone();

        // Act
        let _after = reduce(&before, Action::SignedOut);

        // Assert
        assert_eq!(before, copy);
    }
}
