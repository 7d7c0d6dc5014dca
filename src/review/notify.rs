//! Outbound hooks: non-delivery reports and curator notifications.
//!
//! Both currently log only. Delivering them (e-mail back to the reviewer or
//! the curators) is left to the integrating application, which can supply
//! its own implementations to the pipeline.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::contract::ContractDraft;

/// A review message that could not be applied.
#[derive(Debug, Clone)]
pub struct NonDelivery {
    pub sender: String,
    pub subject: String,
    /// Contract id extracted from the subject.
    pub contract: String,
    pub reason: String,
    /// Plain-text body of the review.
    pub body: String,
}

/// Receives messages whose review could not be delivered to a draft.
#[async_trait]
pub trait NonDeliveryReporter: Send + Sync {
    async fn report(&self, report: &NonDelivery);
}

/// Logs non-delivery reports at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

#[async_trait]
impl NonDeliveryReporter for LogReporter {
    async fn report(&self, report: &NonDelivery) {
        warn!(
            sender = %report.sender,
            contract = %report.contract,
            reason = %report.reason,
            "Review not delivered: {} with review: {}",
            report.contract,
            report.body.trim()
        );
    }
}

/// How a curator is attached to a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuratorRole {
    /// Owns the contract (`contracts`).
    Primary,
    /// Secondary curator (`contracts_featured`).
    Featured,
}

/// Told about each curator once a contract goes live.
#[async_trait]
pub trait CuratorNotifier: Send + Sync {
    async fn contract_approved(&self, contract: &ContractDraft, curator: &str, role: CuratorRole);
}

/// Logs approvals at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl CuratorNotifier for LogNotifier {
    async fn contract_approved(&self, contract: &ContractDraft, curator: &str, role: CuratorRole) {
        info!(
            contract = %contract.key,
            curator = curator,
            role = ?role,
            "Contract approved; curator notification pending"
        );
    }
}
