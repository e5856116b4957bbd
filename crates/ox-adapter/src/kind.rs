//! Record-kind descriptors and key layout.

/// Kinds whose records belong to a grant and are removed when the grant
/// is revoked.
const GRANTABLE: &[&str] = &[
    "AccessToken",
    "AuthorizationCode",
    "RefreshToken",
    "DeviceCode",
    "BackchannelAuthenticationRequest",
];

/// Kinds that transition to a terminal consumed state in place. Stored
/// as hashes so `consume` can write a single field.
const CONSUMABLE: &[&str] = &[
    "AuthorizationCode",
    "RefreshToken",
    "DeviceCode",
    "BackchannelAuthenticationRequest",
];

/// Capabilities of one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKind {
    /// Kind name as used by the engine, e.g. `"AuthorizationCode"`.
    pub name: String,
    /// Stored as a hash so a `consumed` field can be set in place.
    pub consumable: bool,
    /// Indexed under its grant for cascading revocation.
    pub grantable: bool,
}

impl RecordKind {
    /// Classifies a kind by its engine-facing name.
    ///
    /// Unknown names get the plain blob shape with no grant indexing,
    /// which is what the engine expects for kinds like `Grant` or
    /// `Session`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            consumable: CONSUMABLE.contains(&name.as_str()),
            grantable: GRANTABLE.contains(&name.as_str()),
            name,
        }
    }

    /// Primary key for a record of this kind.
    #[must_use]
    pub fn record_key(&self, id: &str) -> String {
        format!("{}:{}", self.name, id)
    }
}

/// Key of the grant index list for `grant_id`.
#[must_use]
pub fn grant_key(grant_id: &str) -> String {
    format!("grant:{grant_id}")
}

/// Key of the `userCode -> id` index entry.
#[must_use]
pub fn user_code_key(user_code: &str) -> String {
    format!("userCode:{user_code}")
}

/// Key of the `uid -> id` index entry.
#[must_use]
pub fn uid_key(uid: &str) -> String {
    format!("uid:{uid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let access_token = RecordKind::named("AccessToken");
        assert!(access_token.grantable);
        assert!(!access_token.consumable);

        let code = RecordKind::named("AuthorizationCode");
        assert!(code.grantable);
        assert!(code.consumable);

        let session = RecordKind::named("Session");
        assert!(!session.grantable);
        assert!(!session.consumable);

        let grant = RecordKind::named("Grant");
        assert!(!grant.grantable);
        assert!(!grant.consumable);
    }

    #[test]
    fn key_layout() {
        let kind = RecordKind::named("DeviceCode");
        assert_eq!(kind.record_key("abc"), "DeviceCode:abc");
        assert_eq!(grant_key("g1"), "grant:g1");
        assert_eq!(user_code_key("WDJB-MJHT"), "userCode:WDJB-MJHT");
        assert_eq!(uid_key("u1"), "uid:u1");
    }
}
