//! Persona profile builder.
//!
//! Expands a seed description into the four persona facets with one
//! concurrent oracle request per facet. The fan-in waits for all four under
//! a bounded deadline; a facet that fails (after the gateway's retry) or is
//! still outstanding at the deadline falls back to its neutral default and
//! is recorded on the profile.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{Degradation, PersonaConfig, PersonaFacet, PersonaProfile};
use crate::services::oracle_gateway::OracleGateway;
use crate::services::prompts;

pub struct PersonaBuilder {
    gateway: OracleGateway,
    build_deadline: Duration,
}

impl PersonaBuilder {
    pub const fn new(gateway: OracleGateway, build_deadline: Duration) -> Self {
        Self {
            gateway,
            build_deadline,
        }
    }

    pub fn from_config(gateway: OracleGateway, config: &PersonaConfig) -> Self {
        Self::new(gateway, Duration::from_secs(config.build_deadline_secs))
    }

    /// Build a complete profile from `seed`.
    ///
    /// Only cancellation and an empty seed are errors; every other failure
    /// degrades the affected facet.
    #[instrument(skip(self, cancel), fields(oracle = self.gateway.oracle_name()))]
    pub async fn build(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> SimulationResult<PersonaProfile> {
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(SimulationError::ValidationFailed(
                "persona seed must not be empty".to_string(),
            ));
        }

        let mut tasks = JoinSet::new();
        for facet in PersonaFacet::ALL {
            let gateway = self.gateway.clone();
            let request = prompts::persona_facet(facet, seed);
            let cancel = cancel.clone();
            tasks.spawn(async move { (facet, gateway.generate_text(request, &cancel).await) });
        }

        let mut outcomes: BTreeMap<PersonaFacet, SimulationResult<String>> = BTreeMap::new();
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((facet, outcome)) => {
                        outcomes.insert(facet, outcome);
                    }
                    Err(e) => warn!(error = %e, "persona facet task did not complete"),
                }
            }
        };
        let timed_out = tokio::time::timeout(self.build_deadline, collect)
            .await
            .is_err();
        if timed_out {
            warn!(
                deadline = ?self.build_deadline,
                completed = outcomes.len(),
                "persona build deadline elapsed"
            );
        }
        tasks.abort_all();

        if cancel.is_cancelled()
            || outcomes
                .values()
                .any(|o| matches!(o, Err(SimulationError::Cancelled)))
        {
            return Err(SimulationError::Cancelled);
        }

        let profile = merge(seed, outcomes);
        info!(
            degraded_facets = profile.degradations.len(),
            "persona profile built"
        );
        Ok(profile)
    }
}

/// Assign facet outcomes by name. Order of completion has no effect.
fn merge(
    seed: &str,
    mut outcomes: BTreeMap<PersonaFacet, SimulationResult<String>>,
) -> PersonaProfile {
    let mut profile = PersonaProfile::neutral(seed);
    for facet in PersonaFacet::ALL {
        let error = match outcomes.remove(&facet) {
            Some(Ok(text)) => {
                profile.set_facet(facet, text);
                continue;
            }
            Some(Err(err)) => err.to_string(),
            None => "not generated before the build deadline".to_string(),
        };
        warn!(%facet, %error, "persona facet defaulted");
        profile
            .degradations
            .push(Degradation::FacetDefaulted { facet, error });
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{Oracle, OracleError, OraclePurpose, OracleRequest, OracleResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FacetOracle {
        failing: Option<PersonaFacet>,
        delay: Option<Duration>,
        calls: AtomicU32,
    }

    impl FacetOracle {
        fn new() -> Self {
            Self {
                failing: None,
                delay: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for FacetOracle {
        fn name(&self) -> &str {
            "facet-test"
        }

        async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match request.purpose {
                OraclePurpose::PersonaFacet(facet) if Some(facet) == self.failing => {
                    Err(OracleError::Network("connection reset".to_string()))
                }
                OraclePurpose::PersonaFacet(facet) => {
                    Ok(OracleResponse::new(format!("generated {facet}")))
                }
                _ => Err(OracleError::Malformed("unexpected purpose".to_string())),
            }
        }
    }

    fn builder(oracle: Arc<FacetOracle>, deadline: Duration) -> PersonaBuilder {
        PersonaBuilder::new(
            OracleGateway::new(oracle, Duration::from_secs(30), 2),
            deadline,
        )
    }

    #[tokio::test]
    async fn test_builds_all_facets() {
        let oracle = Arc::new(FacetOracle::new());
        let profile = builder(oracle.clone(), Duration::from_secs(5))
            .build("budget shopper, SUV, $30k cap, Colorado", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.seed, "budget shopper, SUV, $30k cap, Colorado");
        assert_eq!(profile.family_background, "generated family_background");
        assert_eq!(profile.intent, "generated intent");
        assert!(!profile.is_degraded());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failing_facet_is_retried_then_defaulted() {
        let oracle = Arc::new(FacetOracle {
            failing: Some(PersonaFacet::WritingStyle),
            ..FacetOracle::new()
        });
        let profile = builder(oracle.clone(), Duration::from_secs(5))
            .build("seed", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            profile.writing_style,
            PersonaFacet::WritingStyle.neutral_default()
        );
        assert_eq!(profile.intent, "generated intent");
        assert_eq!(profile.degradations.len(), 1);
        assert!(matches!(
            profile.degradations[0],
            Degradation::FacetDefaulted { facet: PersonaFacet::WritingStyle, .. }
        ));
        // three facets once, the failing one twice
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_defaults_outstanding_facets() {
        let oracle = Arc::new(FacetOracle {
            delay: Some(Duration::from_secs(20)),
            ..FacetOracle::new()
        });
        let profile = builder(oracle, Duration::from_secs(10))
            .build("seed", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.degradations.len(), 4);
        for facet in PersonaFacet::ALL {
            assert!(!profile.facet(facet).is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_seed_is_rejected() {
        let result = builder(Arc::new(FacetOracle::new()), Duration::from_secs(5))
            .build("   ", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SimulationError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_build() {
        let token = CancellationToken::new();
        token.cancel();
        let result = builder(Arc::new(FacetOracle::new()), Duration::from_secs(5))
            .build("seed", &token)
            .await;
        assert!(matches!(result, Err(SimulationError::Cancelled)));
    }
}
