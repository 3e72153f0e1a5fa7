use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::transport::{OutboundMessage, VenueRequest};

/// An outbound request still waiting for its reply
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request: VenueRequest,
    pub sent_at: DateTime<Utc>,
}

/// Assigns request ids and correlates replies by id, never by send order
#[derive(Debug, Default)]
pub struct RequestTracker {
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag `request` with the next id and remember it
    pub fn register(&mut self, request: VenueRequest, now: DateTime<Utc>) -> OutboundMessage {
        self.next_id += 1;
        let req_id = self.next_id;
        self.pending.insert(
            req_id,
            PendingRequest {
                request: request.clone(),
                sent_at: now,
            },
        );
        OutboundMessage { req_id, request }
    }

    /// Take the request a reply belongs to
    ///
    /// Subscription requests stay registered, since the venue keeps
    /// streaming under the same id.
    pub fn resolve(&mut self, req_id: u64) -> Option<PendingRequest> {
        let pending = self.pending.get(&req_id)?;
        if is_subscription(&pending.request) {
            return Some(pending.clone());
        }
        self.pending.remove(&req_id)
    }

    /// Drop a request regardless of kind (error replies end subscriptions too)
    pub fn forget(&mut self, req_id: u64) -> Option<PendingRequest> {
        self.pending.remove(&req_id)
    }

    pub fn is_pending(&self, req_id: u64) -> bool {
        self.pending.contains_key(&req_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Connection closed: every in-flight request is implicitly cancelled
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("Cancelling {} in-flight requests", self.pending.len());
        }
        self.pending.clear();
    }
}

fn is_subscription(request: &VenueRequest) -> bool {
    matches!(
        request,
        VenueRequest::BalanceSubscribe
            | VenueRequest::TicksSubscribe { .. }
            | VenueRequest::ContractSubscribe { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sell(id: &str) -> VenueRequest {
        VenueRequest::Sell {
            contract_id: id.to_string(),
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut tracker = RequestTracker::new();
        let a = tracker.register(sell("1"), Utc::now());
        let b = tracker.register(sell("2"), Utc::now());
        assert!(b.req_id > a.req_id);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_out_of_order_replies_correlate_by_id() {
        let mut tracker = RequestTracker::new();
        let first = tracker.register(sell("1"), Utc::now());
        let second = tracker.register(sell("2"), Utc::now());

        assert_eq!(tracker.resolve(second.req_id).unwrap().request, sell("2"));
        assert_eq!(tracker.resolve(first.req_id).unwrap().request, sell("1"));
        assert!(tracker.resolve(first.req_id).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_subscriptions_stay_registered() {
        let mut tracker = RequestTracker::new();
        let ticks = tracker.register(
            VenueRequest::TicksSubscribe {
                symbol: "R_100".to_string(),
            },
            Utc::now(),
        );

        assert!(tracker.resolve(ticks.req_id).is_some());
        assert!(tracker.resolve(ticks.req_id).is_some());
        assert!(tracker.forget(ticks.req_id).is_some());
        assert!(!tracker.is_pending(ticks.req_id));
    }

    #[test]
    fn test_clear_keeps_ids_increasing() {
        let mut tracker = RequestTracker::new();
        let before = tracker.register(sell("1"), Utc::now());
        tracker.clear();
        let after = tracker.register(sell("1"), Utc::now());
        assert!(tracker.resolve(before.req_id).is_none());
        assert!(after.req_id > before.req_id);
    }
}
