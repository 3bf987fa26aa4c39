//! Runtime settings compiled from [`Config`].
//!
//! Everything the decision path reads is compiled here once per load or
//! reload: globs, deny signatures, lowercased keyword tables, thresholds.
//! The engine swaps whole [`EngineSettings`] values, so a decision always
//! sees one consistent generation.

use tollgate_config::Config;

use crate::batch::BatchCoordinator;
use crate::error::ApprovalResult;
use crate::pattern::PatternMatcher;
use crate::policy::DecisionPolicy;
use crate::risk::RiskWeights;
use crate::session::SessionLimits;

/// One generation of compiled engine settings.
#[derive(Debug)]
pub struct EngineSettings {
    matcher: PatternMatcher,
    weights: RiskWeights,
    policy: DecisionPolicy,
    batch: BatchCoordinator,
    session: SessionLimits,
}

impl EngineSettings {
    /// Validate and compile a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`](crate::ApprovalError::InvalidConfig)
    /// if validation fails or any pattern does not compile.
    pub fn from_config(config: &Config) -> ApprovalResult<Self> {
        tollgate_config::validate::validate(config)?;

        Ok(Self {
            matcher: PatternMatcher::from_config(&config.patterns)?,
            weights: RiskWeights::from_config(&config.risk)?,
            policy: DecisionPolicy::from_config(
                &config.thresholds,
                &config.patterns.contextual_rules,
            )?,
            batch: BatchCoordinator::from_config(&config.batch)?,
            session: SessionLimits::from_config(&config.session),
        })
    }

    /// Pattern matcher.
    #[must_use]
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Risk weights.
    #[must_use]
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Decision policy.
    #[must_use]
    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Batch coordinator.
    #[must_use]
    pub fn batch(&self) -> &BatchCoordinator {
        &self.batch
    }

    /// Session limits.
    #[must_use]
    pub fn session_limits(&self) -> SessionLimits {
        self.session
    }
}
