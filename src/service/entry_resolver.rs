use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::models::{EntryLink, EntryResolution, ManualEntryForm, PayloadSource, PlayerSession};
use crate::scan_error::ScanError;
use crate::service::tournament_api::TournamentApi;

/// Turns a decoded payload into a navigation target.
pub struct EntryResolver {
    api: Arc<dyn TournamentApi>,
    path_marker: String,
}

impl EntryResolver {
    pub fn new(api: Arc<dyn TournamentApi>, path_marker: impl Into<String>) -> Self {
        Self {
            api,
            path_marker: path_marker.into(),
        }
    }

    /// Check the payload carries the tournament entry path marker.
    pub fn validate(&self, payload: &str, source: PayloadSource) -> Result<EntryLink, ScanError> {
        EntryLink::parse(payload, &self.path_marker, source).ok_or_else(|| {
            warn!(payload = payload, source = ?source, "Payload is not a tournament entry link");
            ScanError::UnrecognizedPayload(payload.to_string())
        })
    }

    /// Validate a hand-typed URL, then check it like any other payload.
    pub fn validate_manual(&self, input: &str) -> Result<EntryLink, ScanError> {
        let form = ManualEntryForm::new(input);
        Validate::validate(&form).map_err(|e| ScanError::InvalidManualEntry(e.to_string()))?;
        self.validate(&form.url, PayloadSource::ManualEntry)
    }

    /// Fire the mark-active request when a player is logged in, then hand
    /// back the destination. The request is made at most once.
    pub async fn resolve(
        &self,
        link: &EntryLink,
        session: Option<&PlayerSession>,
    ) -> Result<EntryResolution, ScanError> {
        let Some(session) = session else {
            info!(destination = %link.url, "No player session, navigating without entry request");
            return Ok(EntryResolution {
                destination: link.url.clone(),
                marked_active: false,
            });
        };

        self.api
            .mark_tournament_active(session)
            .await
            .map_err(|e| {
                warn!(player_id = %session.player_id, error = %e, "Tournament entry request failed");
                ScanError::NetworkSideEffect(e.to_string())
            })?;

        info!(
            player_id = %session.player_id,
            destination = %link.url,
            source = ?link.source,
            "Tournament entry resolved"
        );

        Ok(EntryResolution {
            destination: link.url.clone(),
            marked_active: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::FakeApi;

    fn session() -> PlayerSession {
        PlayerSession {
            player_id: "p-1".to_string(),
            access_token: Some("t".to_string()),
        }
    }

    #[tokio::test]
    async fn test_valid_payload_marks_active() {
        let api = Arc::new(FakeApi::default());
        let resolver = EntryResolver::new(api.clone(), "/tournament/");

        let link = resolver
            .validate(
                "https://host/tournament/2025-08-15/FooCup?from_qr=true",
                PayloadSource::Camera,
            )
            .unwrap();
        let resolution = resolver.resolve(&link, Some(&session())).await.unwrap();

        assert_eq!(
            resolution.destination,
            "https://host/tournament/2025-08-15/FooCup?from_qr=true"
        );
        assert!(resolution.marked_active);
        assert_eq!(api.calls(), vec!["p-1".to_string()]);
    }

    #[test]
    fn test_invalid_payload_is_rejected() {
        let api = Arc::new(FakeApi::default());
        let resolver = EntryResolver::new(api.clone(), "/tournament/");

        let err = resolver
            .validate("https://host/other/path", PayloadSource::Camera)
            .unwrap_err();
        assert_eq!(err, ScanError::UnrecognizedPayload("https://host/other/path".to_string()));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_session_skips_request() {
        let api = Arc::new(FakeApi::default());
        let resolver = EntryResolver::new(api.clone(), "/tournament/");
        let link = resolver
            .validate("https://host/tournament/2025-08-15/1", PayloadSource::Camera)
            .unwrap();

        let resolution = resolver.resolve(&link, None).await.unwrap();
        assert!(!resolution.marked_active);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_request_is_not_retried() {
        let api = Arc::new(FakeApi::failing());
        let resolver = EntryResolver::new(api.clone(), "/tournament/");
        let link = resolver
            .validate("https://host/tournament/2025-08-15/1", PayloadSource::Camera)
            .unwrap();

        let err = resolver.resolve(&link, Some(&session())).await.unwrap_err();
        assert!(matches!(err, ScanError::NetworkSideEffect(_)));
        assert_eq!(api.calls().len(), 1);
    }

    #[test]
    fn test_manual_entry_validation() {
        let resolver = EntryResolver::new(Arc::new(FakeApi::default()), "/tournament/");

        let link = resolver
            .validate_manual(" https://host/tournament/2025-08-15/FooCup ")
            .unwrap();
        assert_eq!(link.source, PayloadSource::ManualEntry);

        assert!(matches!(
            resolver.validate_manual("tournament please"),
            Err(ScanError::InvalidManualEntry(_))
        ));
        assert!(matches!(
            resolver.validate_manual("https://host/ranking"),
            Err(ScanError::UnrecognizedPayload(_))
        ));
    }
}
