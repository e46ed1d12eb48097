//! Update ingestion: classify incoming push events.
//!
//! Classification is a pure function of event shape, applied in arrival
//! order. Only the resulting network calls are batched, never the
//! classification itself.

use uniboard_core::{ColumnId, PushEvent, UniversityId, UniversityStatus, UserUpdateKind};

/// What an incoming push event asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Event belongs to another user or carries nothing actionable.
    Discard(DiscardReason),
    /// A computed value arrived inline: commit it directly.
    DirectApply {
        university_id: UniversityId,
        column_id: ColumnId,
        value: String,
    },
    /// Computation finished for this cycle; no further value is coming.
    Terminal {
        university_id: UniversityId,
        status: UniversityStatus,
    },
    /// Progress note with no payload.
    StatusOnly {
        university_id: UniversityId,
        status: UniversityStatus,
    },
    /// "Something changed" without the new value: coalesce a refetch.
    NeedsRefetch { university_id: UniversityId },
    /// Backend started computing for these universities.
    ProcessingStarted { university_ids: Vec<UniversityId> },
    /// Subscription came back: recompute visibility and backfill reveals.
    SubscriptionReactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The multi-tenant channel delivered another user's event.
    CrossUser,
}

/// Classify one push event for the given session user.
pub fn classify(event: &PushEvent, session_email: &str) -> Classification {
    if event.user_email() != session_email {
        return Classification::Discard(DiscardReason::CrossUser);
    }

    match event {
        PushEvent::UniversityUpdate(update) => {
            let university_id = update.university_id.clone();
            match update.status {
                Some(UniversityStatus::ColumnProcessed) => {
                    match (update.column_id.clone(), update.value.clone()) {
                        (Some(column_id), Some(value)) => Classification::DirectApply {
                            university_id,
                            column_id,
                            value,
                        },
                        // Change notified without its payload: fall back to
                        // the coalesced fetch path.
                        _ => Classification::NeedsRefetch { university_id },
                    }
                }
                Some(status) if status.is_terminal() => Classification::Terminal {
                    university_id,
                    status,
                },
                Some(status) => Classification::StatusOnly {
                    university_id,
                    status,
                },
                None => Classification::NeedsRefetch { university_id },
            }
        }
        PushEvent::UserUpdate(update) => match update.kind {
            UserUpdateKind::ProcessingStarted => Classification::ProcessingStarted {
                university_ids: update.university_ids.clone().unwrap_or_default(),
            },
            UserUpdateKind::SubscriptionReactivated => Classification::SubscriptionReactivated,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniboard_core::{UniversityUpdate, UserUpdate};

    const ME: &str = "me@example.com";

    fn university_update(
        status: Option<UniversityStatus>,
        column_id: Option<&str>,
        value: Option<&str>,
    ) -> PushEvent {
        PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new("u1"),
            status,
            column_id: column_id.map(ColumnId::new),
            value: value.map(str::to_string),
            user_email: ME.to_string(),
        })
    }

    #[test]
    fn test_column_processed_with_value_direct_applies() {
        let event = university_update(
            Some(UniversityStatus::ColumnProcessed),
            Some("c1"),
            Some("MS CS"),
        );
        assert_eq!(
            classify(&event, ME),
            Classification::DirectApply {
                university_id: UniversityId::new("u1"),
                column_id: ColumnId::new("c1"),
                value: "MS CS".to_string(),
            }
        );
    }

    #[test]
    fn test_column_processed_without_value_refetches() {
        let event = university_update(Some(UniversityStatus::ColumnProcessed), Some("c1"), None);
        assert_eq!(
            classify(&event, ME),
            Classification::NeedsRefetch {
                university_id: UniversityId::new("u1")
            }
        );
    }

    #[test]
    fn test_terminal_statuses_classify_as_terminal() {
        for status in [UniversityStatus::Completed, UniversityStatus::Failed] {
            let event = university_update(Some(status), None, None);
            assert_eq!(
                classify(&event, ME),
                Classification::Terminal {
                    university_id: UniversityId::new("u1"),
                    status,
                }
            );
        }
    }

    #[test]
    fn test_bare_id_enqueues_refetch() {
        let event = university_update(None, None, None);
        assert_eq!(
            classify(&event, ME),
            Classification::NeedsRefetch {
                university_id: UniversityId::new("u1")
            }
        );
    }

    #[test]
    fn test_progress_status_is_status_only() {
        let event = university_update(Some(UniversityStatus::Processing), None, None);
        assert_eq!(
            classify(&event, ME),
            Classification::StatusOnly {
                university_id: UniversityId::new("u1"),
                status: UniversityStatus::Processing,
            }
        );
    }

    #[test]
    fn test_cross_user_event_discarded_before_classification() {
        let event = PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new("u1"),
            status: Some(UniversityStatus::ColumnProcessed),
            column_id: Some(ColumnId::new("c1")),
            value: Some("MS CS".to_string()),
            user_email: "other@x.com".to_string(),
        });
        assert_eq!(
            classify(&event, ME),
            Classification::Discard(DiscardReason::CrossUser)
        );
    }

    #[test]
    fn test_user_update_kinds() {
        let event = PushEvent::UserUpdate(UserUpdate {
            kind: UserUpdateKind::ProcessingStarted,
            university_ids: Some(vec![UniversityId::new("u1"), UniversityId::new("u2")]),
            hidden_universities_count: None,
            user_email: ME.to_string(),
        });
        assert_eq!(
            classify(&event, ME),
            Classification::ProcessingStarted {
                university_ids: vec![UniversityId::new("u1"), UniversityId::new("u2")]
            }
        );

        let event = PushEvent::UserUpdate(UserUpdate {
            kind: UserUpdateKind::SubscriptionReactivated,
            university_ids: None,
            hidden_universities_count: Some(2),
            user_email: ME.to_string(),
        });
        assert_eq!(classify(&event, ME), Classification::SubscriptionReactivated);
    }
}
