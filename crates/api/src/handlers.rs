//! HTTP handlers.
//!
//! - **health** - store reachability for load balancers
//! - **eligibility** - what is capped for a viewer, read before selection
//! - **impressions** - record a served campaign against every cap it carries
//! - **campaigns** - campaign counter metadata

pub mod campaigns;
pub mod eligibility;
pub mod health;
pub mod impressions;

use capping::UserId;

/// Viewer identity from a request. Players send an empty `uid` for
/// anonymous viewers as often as they omit it.
fn viewer(uid: Option<String>) -> Option<UserId> {
    uid.filter(|uid| !uid.is_empty()).map(UserId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uid_is_anonymous() {
        assert_eq!(viewer(None), None);
        assert_eq!(viewer(Some(String::new())), None);
        assert_eq!(viewer(Some("u1".into())), Some(UserId::new("u1")));
    }
}
