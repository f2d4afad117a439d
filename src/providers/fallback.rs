//! Fallback orchestrator
//!
//! One executor shared by every external call site (extraction, embedding,
//! generation): invoke candidates in priority order, treat a timeout as a
//! provider failure, return the first success together with the provider
//! that produced it. Zero candidates fails fast as a configuration error;
//! exhausting all candidates yields an aggregate error carrying every
//! per-provider failure reason.

use crate::error::{Error, ProviderAttempt, Result};
use crate::providers::ProviderSpec;
use std::future::Future;
use tracing::{debug, warn};

/// A successful fallback run
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    /// Id of the provider that produced the value
    pub provider: String,
    /// Failures that preceded the success, if any
    pub attempts: Vec<ProviderAttempt>,
}

/// Run `call` against each candidate until one succeeds.
///
/// Each invocation is bounded by the candidate's own timeout. The closure
/// receives an owned copy of the spec so call sites can build the right
/// client per provider.
pub async fn run_with_fallback<T, Fut>(
    operation: &str,
    candidates: &[&ProviderSpec],
    mut call: impl FnMut(ProviderSpec) -> Fut,
) -> Result<FallbackOutcome<T>>
where
    Fut: Future<Output = Result<T>>,
{
    if candidates.is_empty() {
        return Err(Error::Config(format!(
            "No provider available for {} with this input",
            operation
        )));
    }

    let mut attempts: Vec<ProviderAttempt> = Vec::new();

    for spec in candidates {
        debug!(provider = spec.id, operation, "Trying provider");

        let reason = match tokio::time::timeout(spec.timeout, call((*spec).clone())).await {
            Ok(Ok(value)) => {
                if !attempts.is_empty() {
                    warn!(
                        provider = spec.id,
                        operation,
                        failed = attempts.len(),
                        "Provider succeeded after fallback"
                    );
                }
                return Ok(FallbackOutcome {
                    value,
                    provider: spec.id.to_string(),
                    attempts,
                });
            }
            Ok(Err(e)) => sanitize(&e.to_string()),
            Err(_) => format!("timed out after {}s", spec.timeout.as_secs()),
        };

        warn!(provider = spec.id, operation, %reason, "Provider failed, trying next");
        attempts.push(ProviderAttempt {
            provider: spec.id.to_string(),
            reason,
        });
    }

    Err(Error::ProvidersExhausted {
        operation: operation.to_string(),
        attempts,
    })
}

/// Strip credential material from failure reasons before they are recorded.
fn sanitize(message: &str) -> String {
    let mut msg = message.to_string();
    for marker in ["Bearer ", "api-key=", "api_key="] {
        while let Some(idx) = msg.find(marker) {
            let start = idx + marker.len();
            let end = msg[start..]
                .find(|c: char| c.is_whitespace() || c == '&' || c == '"')
                .map(|e| start + e)
                .unwrap_or(msg.len());
            if &msg[start..end] == "***" {
                break;
            }
            msg.replace_range(start..end, "***");
        }
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DocumentFormat, ProviderKind, ProviderSpec, Tier};
    use std::time::Duration;

    fn spec(id: &'static str, timeout_ms: u64) -> ProviderSpec {
        ProviderSpec {
            id,
            kind: ProviderKind::Extraction,
            tier: Tier::Free,
            supported_formats: &[DocumentFormat::Pdf],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: Duration::from_millis(timeout_ms),
            model: None,
            dimension: None,
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = spec("a", 1000);
        let b = spec("b", 1000);
        let candidates = vec![&a, &b];

        let outcome = run_with_fallback("extraction", &candidates, |s| {
            let id = s.id;
            async move { Ok::<_, crate::error::Error>(id.to_string()) }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, "a");
        assert_eq!(outcome.provider, "a");
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_after_failure() {
        let a = spec("a", 1000);
        let b = spec("b", 1000);
        let candidates = vec![&a, &b];

        let outcome = run_with_fallback("extraction", &candidates, |s| {
            let id = s.id;
            async move {
                if id == "a" {
                    Err(crate::error::Error::Extraction("boom".to_string()))
                } else {
                    Ok(id.to_string())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.provider, "b");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].provider, "a");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let slow = spec("slow", 20);
        let fast = spec("fast", 1000);
        let candidates = vec![&slow, &fast];

        let outcome = run_with_fallback("extraction", &candidates, |s| {
            let id = s.id;
            async move {
                if id == "slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok::<_, crate::error::Error>(id.to_string())
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.provider, "fast");
        assert!(outcome.attempts[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_attempt_history() {
        let a = spec("a", 1000);
        let b = spec("b", 1000);
        let candidates = vec![&a, &b];

        let err = run_with_fallback("extraction", &candidates, |s| {
            let id = s.id;
            async move { Err::<String, _>(crate::error::Error::Extraction(format!("{} down", id))) }
        })
        .await
        .unwrap_err();

        match err {
            Error::ProvidersExhausted { operation, attempts } => {
                assert_eq!(operation, "extraction");
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].provider, "a");
                assert!(attempts[1].reason.contains("b down"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_config_error() {
        let err = run_with_fallback("extraction", &[], |_| async move { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_sanitize_strips_bearer_tokens() {
        let msg = "401 from https://api.example.com with Bearer sk-secret123 rejected";
        let clean = sanitize(msg);
        assert!(!clean.contains("sk-secret123"));
        assert!(clean.contains("***"));
    }
}
