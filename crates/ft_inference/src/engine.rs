use std::sync::Arc;

use tracing::warn;

use ft_core::{ExtractionModel, ExtractionOutcome, ExtractionResponse, ProviderTag};

/// Drives the primary→secondary provider fallback for one article.
///
/// Exactly one fallback hop per article: primary error tries the secondary,
/// a secondary error is final. The outcome always carries the provider that
/// serviced the request so the run logger can report fallback health.
pub struct ExtractionEngine {
    primary: Arc<dyn ExtractionModel>,
    secondary: Option<Arc<dyn ExtractionModel>>,
}

impl ExtractionEngine {
    pub fn new(
        primary: Arc<dyn ExtractionModel>,
        secondary: Option<Arc<dyn ExtractionModel>>,
    ) -> Self {
        Self { primary, secondary }
    }

    pub async fn analyze(&self, title: &str, body: &str) -> ExtractionOutcome {
        match self.primary.extract(title, body).await {
            Ok(response) => outcome_from(response, ProviderTag::Primary),
            Err(primary_err) => {
                warn!(
                    provider = self.primary.name(),
                    error = %primary_err,
                    "Primary provider failed, trying fallback"
                );
                let Some(secondary) = &self.secondary else {
                    return ExtractionOutcome::Failed(format!(
                        "{}: {}",
                        self.primary.name(),
                        primary_err
                    ));
                };
                match secondary.extract(title, body).await {
                    Ok(response) => outcome_from(response, ProviderTag::Secondary),
                    Err(secondary_err) => {
                        warn!(
                            provider = secondary.name(),
                            error = %secondary_err,
                            "Fallback provider failed"
                        );
                        ExtractionOutcome::Failed(format!(
                            "{}: {}; {}: {}",
                            self.primary.name(),
                            primary_err,
                            secondary.name(),
                            secondary_err
                        ))
                    }
                }
            }
        }
    }
}

fn outcome_from(response: ExtractionResponse, tag: ProviderTag) -> ExtractionOutcome {
    if !response.is_funding_news {
        return ExtractionOutcome::NoMatch(tag);
    }
    // A missing company name forces the candidate out; an announcement with
    // no valid candidates left is a NoMatch, not a failure.
    let valid: Vec<_> = response
        .companies
        .into_iter()
        .filter(|c| c.is_valid())
        .collect();
    if valid.is_empty() {
        ExtractionOutcome::NoMatch(tag)
    } else {
        ExtractionOutcome::Funding(valid, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ft_core::{Error, Result, StartupCandidate};

    struct MockModel {
        fail: bool,
        response: ExtractionResponse,
    }

    impl MockModel {
        fn failing() -> Self {
            Self {
                fail: true,
                response: ExtractionResponse::default(),
            }
        }

        fn returning(response: ExtractionResponse) -> Self {
            Self {
                fail: false,
                response,
            }
        }
    }

    #[async_trait]
    impl ExtractionModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn extract(&self, _title: &str, _body: &str) -> Result<ExtractionResponse> {
            if self.fail {
                Err(Error::Inference("budget exceeded".to_string()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn funding_response(name: &str) -> ExtractionResponse {
        ExtractionResponse {
            is_funding_news: true,
            companies: vec![StartupCandidate {
                name: name.to_string(),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn primary_success_tags_primary() {
        let engine = ExtractionEngine::new(
            Arc::new(MockModel::returning(funding_response("Acme"))),
            Some(Arc::new(MockModel::failing())),
        );
        match engine.analyze("t", "b").await {
            ExtractionOutcome::Funding(companies, ProviderTag::Primary) => {
                assert_eq!(companies[0].name, "Acme")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_secondary() {
        let engine = ExtractionEngine::new(
            Arc::new(MockModel::failing()),
            Some(Arc::new(MockModel::returning(funding_response("Acme")))),
        );
        match engine.analyze("t", "b").await {
            ExtractionOutcome::Funding(_, ProviderTag::Secondary) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn both_providers_failing_is_failed() {
        let engine = ExtractionEngine::new(
            Arc::new(MockModel::failing()),
            Some(Arc::new(MockModel::failing())),
        );
        assert!(matches!(
            engine.analyze("t", "b").await,
            ExtractionOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn no_secondary_means_primary_failure_is_final() {
        let engine = ExtractionEngine::new(Arc::new(MockModel::failing()), None);
        assert!(matches!(
            engine.analyze("t", "b").await,
            ExtractionOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn nameless_candidates_become_no_match() {
        let response = ExtractionResponse {
            is_funding_news: true,
            companies: vec![StartupCandidate {
                name: "  ".to_string(),
                ..Default::default()
            }],
        };
        let engine = ExtractionEngine::new(Arc::new(MockModel::returning(response)), None);
        assert!(matches!(
            engine.analyze("t", "b").await,
            ExtractionOutcome::NoMatch(ProviderTag::Primary)
        ));
    }

    #[tokio::test]
    async fn non_funding_article_is_no_match() {
        let engine = ExtractionEngine::new(
            Arc::new(MockModel::returning(ExtractionResponse::default())),
            None,
        );
        assert!(matches!(
            engine.analyze("t", "b").await,
            ExtractionOutcome::NoMatch(ProviderTag::Primary)
        ));
    }
}
