//! Behavioral contracts: assertions and policies evaluated over a run.

pub mod assertion;
pub mod config;
pub mod evaluator;
pub mod policy;
pub mod target;
pub mod verdict;

use serde::{Deserialize, Serialize};

pub use assertion::{Assertion, AssertionSpec, Expected, Schema};
pub use config::{ConfigError, ContractConfig, CONFIG_FILE, STARTER_CONFIG};
pub use evaluator::evaluate;
pub use policy::{Policy, PolicySpec, Violation};
pub use target::{resolve, Resolved, Target, TargetError, ToolField};
pub use verdict::{CheckKind, CheckResult, Verdict};

/// Configuration errors, raised before any evaluation happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// An assertion spec that cannot be compiled.
    #[error("invalid assertion spec: {0}")]
    InvalidAssertionSpec(String),
    /// A policy spec that cannot be compiled.
    #[error("invalid policy spec: {0}")]
    InvalidPolicySpec(String),
}

/// Declared contract: the assertions and policies for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Assertions, in evaluation order.
    #[serde(default)]
    pub assertions: Vec<AssertionSpec>,
    /// Policies, in evaluation order.
    #[serde(default)]
    pub policies: Vec<PolicySpec>,
}

/// A compiled contract, ready to evaluate.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    /// Compiled assertions.
    pub assertions: Vec<Assertion>,
    /// Compiled policies.
    pub policies: Vec<Policy>,
}

impl Contract {
    /// Compile every assertion and policy in `spec`.
    ///
    /// # Errors
    ///
    /// The first [`SpecError`] encountered.
    pub fn compile(spec: &ContractSpec) -> Result<Self, SpecError> {
        let assertions = spec.assertions.iter().map(Assertion::compile);
        let policies = spec.policies.iter().map(Policy::compile);
        Ok(Self {
            assertions: assertions.collect::<Result<_, _>>()?,
            policies: policies.collect::<Result<_, _>>()?,
        })
    }

    /// Add an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Add a policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Number of declared checks before policy expansion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assertions.len() + self.policies.len()
    }

    /// Whether the contract declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
