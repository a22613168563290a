use common::domain::{DomainError, DomainResult, EventMetadata};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Header holding the bill computed at submit_sm_resp time
pub const RESPONSE_BILL_HEADER: &str = "submit_sm_resp_bill";

/// Header holding the bill computed at submit_sm time, used as fallback
pub const REQUEST_BILL_HEADER: &str = "submit_sm_bill";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BillingUser {
    pub uid: String,
}

/// Bill attached to a submission by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BillingRecord {
    #[serde(default)]
    pub bill_id: Option<String>,
    pub user: BillingUser,
    #[serde(default)]
    pub amounts: BTreeMap<String, f64>,
}

impl BillingRecord {
    /// Sum of every amount charged per segment
    pub fn total_amount(&self) -> f64 {
        self.amounts.values().sum()
    }
}

/// Cost of a whole submission and who pays for it
#[derive(Debug, Clone, PartialEq)]
pub struct BilledCost {
    pub billed_amount: f64,
    pub billed_user_id: String,
}

/// Resolve the billed amount for a submission of `segment_count` segments.
///
/// The response bill wins over the request bill; an empty header counts as absent.
pub fn resolve_billing(metadata: &EventMetadata, segment_count: usize) -> DomainResult<BilledCost> {
    let (header, raw) = [RESPONSE_BILL_HEADER, REQUEST_BILL_HEADER]
        .into_iter()
        .find_map(|key| {
            metadata
                .get(key)
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        })
        .ok_or_else(|| {
            DomainError::MalformedBillingData(format!(
                "neither {RESPONSE_BILL_HEADER} nor {REQUEST_BILL_HEADER} present"
            ))
        })?;

    let record: BillingRecord = serde_json::from_str(raw)
        .map_err(|e| DomainError::MalformedBillingData(format!("invalid {header}: {e}")))?;

    Ok(BilledCost {
        billed_amount: record.total_amount() * segment_count as f64,
        billed_user_id: record.user.uid,
    })
}
