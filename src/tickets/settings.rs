//! Typed view over the `ticket_settings` key/value table.
//!
//! Settings are resolved once at the start of an operation and passed down by
//! reference; nothing below this layer re-reads the table mid-operation.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::HelpdeskResult;
use super::models::StatusId;
use super::permissions::ActorRole;
use super::store::TicketStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    DefaultStatusId,
    DefaultCloseStatusId,
    DefaultReopenStatusId,
    CloseTicketPerm,
    ReopenTicketPerm,
    PaginateItems,
    AgentRestrict,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::DefaultStatusId,
        SettingKey::DefaultCloseStatusId,
        SettingKey::DefaultReopenStatusId,
        SettingKey::CloseTicketPerm,
        SettingKey::ReopenTicketPerm,
        SettingKey::PaginateItems,
        SettingKey::AgentRestrict,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefaultStatusId => "default_status_id",
            Self::DefaultCloseStatusId => "default_close_status_id",
            Self::DefaultReopenStatusId => "default_reopen_status_id",
            Self::CloseTicketPerm => "close_ticket_perm",
            Self::ReopenTicketPerm => "reopen_ticket_perm",
            Self::PaginateItems => "paginate_items",
            Self::AgentRestrict => "agent_restrict",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == slug)
    }
}

/// Which roles may perform one transition (close or reopen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub admin: bool,
    pub agent: bool,
    pub owner: bool,
}

impl PermissionConfig {
    pub const fn allow_all() -> Self {
        Self {
            admin: true,
            agent: true,
            owner: true,
        }
    }

    pub const fn deny_all() -> Self {
        Self {
            admin: false,
            agent: false,
            owner: false,
        }
    }

    pub fn allows(&self, role: ActorRole) -> bool {
        match role {
            ActorRole::Admin => self.admin,
            ActorRole::Agent => self.agent,
            ActorRole::Owner => self.owner,
        }
    }

    /// Accepts `{"admin":"yes","agent":"no","owner":"yes"}` as stored by the
    /// settings screen, or plain booleans. A role missing from the object is
    /// not allowed.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;
        let flag = |key: &str| match object.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("yes") || s == "1" || s == "true",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        };
        Some(Self {
            admin: flag("admin"),
            agent: flag("agent"),
            owner: flag("owner"),
        })
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self::allow_all()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub default_status_id: StatusId,
    pub default_close_status_id: Option<StatusId>,
    pub default_reopen_status_id: Option<StatusId>,
    pub close_ticket_perm: PermissionConfig,
    pub reopen_ticket_perm: PermissionConfig,
    pub paginate_items: i64,
    pub agent_restrict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_status_id: 1,
            default_close_status_id: None,
            default_reopen_status_id: None,
            close_ticket_perm: PermissionConfig::allow_all(),
            reopen_ticket_perm: PermissionConfig::allow_all(),
            paginate_items: 10,
            agent_restrict: false,
        }
    }
}

impl Settings {
    pub fn load<S: TicketStore>(store: &mut S) -> HelpdeskResult<Self> {
        let pairs = store.setting_pairs()?;
        Ok(Self::from_pairs(pairs))
    }

    /// Builds settings from raw rows. Unknown slugs are ignored and
    /// unparsable values fall back to their default.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        for (slug, value) in pairs {
            let (slug, value) = (slug.as_ref(), value.as_ref().trim());
            let Some(key) = SettingKey::from_slug(slug) else {
                debug!("Ignoring unknown ticket setting '{}'", slug);
                continue;
            };
            if !settings.apply(key, value) {
                warn!(
                    "Ticket setting '{}' has unusable value '{}', keeping default",
                    slug, value
                );
            }
        }
        settings
    }

    fn apply(&mut self, key: SettingKey, value: &str) -> bool {
        match key {
            SettingKey::DefaultStatusId => match value.parse() {
                Ok(id) => self.default_status_id = id,
                Err(_) => return false,
            },
            SettingKey::DefaultCloseStatusId => match parse_optional_id(value) {
                Some(id) => self.default_close_status_id = id,
                None => return false,
            },
            SettingKey::DefaultReopenStatusId => match parse_optional_id(value) {
                Some(id) => self.default_reopen_status_id = id,
                None => return false,
            },
            SettingKey::CloseTicketPerm => match PermissionConfig::parse(value) {
                Some(perm) => self.close_ticket_perm = perm,
                None => return false,
            },
            SettingKey::ReopenTicketPerm => match PermissionConfig::parse(value) {
                Some(perm) => self.reopen_ticket_perm = perm,
                None => return false,
            },
            SettingKey::PaginateItems => match value.parse::<i64>() {
                Ok(n) if n > 0 => self.paginate_items = n,
                _ => return false,
            },
            SettingKey::AgentRestrict => match value {
                "1" | "true" | "yes" => self.agent_restrict = true,
                "0" | "false" | "no" | "" => self.agent_restrict = false,
                _ => return false,
            },
        }
        true
    }
}

/// `Some(None)` for the "not configured" spellings, `Some(Some(id))` for an
/// id, `None` when the value is garbage.
fn parse_optional_id(value: &str) -> Option<Option<StatusId>> {
    match value {
        "" | "0" | "false" | "null" => Some(None),
        other => other.parse::<StatusId>().ok().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_table_is_empty() {
        let settings = Settings::from_pairs(Vec::<(String, String)>::new());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.paginate_items, 10);
        assert!(settings.default_close_status_id.is_none());
    }

    #[test]
    fn test_parses_known_keys() {
        let settings = Settings::from_pairs([
            ("default_status_id", "4"),
            ("default_close_status_id", "2"),
            ("default_reopen_status_id", "false"),
            ("close_ticket_perm", r#"{"owner":"no","agent":"yes","admin":"yes"}"#),
            ("reopen_ticket_perm", r#"{"owner":true,"agent":false}"#),
            ("paginate_items", "25"),
            ("agent_restrict", "1"),
        ]);
        assert_eq!(settings.default_status_id, 4);
        assert_eq!(settings.default_close_status_id, Some(2));
        assert_eq!(settings.default_reopen_status_id, None);
        assert_eq!(
            settings.close_ticket_perm,
            PermissionConfig {
                admin: true,
                agent: true,
                owner: false
            }
        );
        assert_eq!(
            settings.reopen_ticket_perm,
            PermissionConfig {
                admin: false,
                agent: false,
                owner: true
            }
        );
        assert_eq!(settings.paginate_items, 25);
        assert!(settings.agent_restrict);
    }

    #[test]
    fn test_garbage_values_keep_defaults() {
        let settings = Settings::from_pairs([
            ("paginate_items", "-3"),
            ("close_ticket_perm", "yes please"),
            ("default_close_status_id", "closed"),
            ("unknown_key", "x"),
        ]);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_permission_config_allows() {
        let perm = PermissionConfig {
            admin: false,
            agent: true,
            owner: false,
        };
        assert!(!perm.allows(ActorRole::Admin));
        assert!(perm.allows(ActorRole::Agent));
        assert!(!perm.allows(ActorRole::Owner));
    }

    #[test]
    fn test_route_prefix_slug_is_not_a_setting() {
        assert_eq!(SettingKey::from_slug("main_route"), None);
        assert_eq!(Settings::from_pairs([("main_route", "support")]), Settings::default());
    }

    #[test]
    fn test_setting_key_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_slug(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::from_slug("nope"), None);
    }
}
