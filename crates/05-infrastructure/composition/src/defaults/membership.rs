//! 用户、角色和资料提供者（阶段 6）

use crate::forum::{ForumUser, MembershipProvider, ProfileProvider, RoleProvider};
use di_abstractions::{capability, ComponentBatch};
use infrastructure_common::{BoxError, LifetimeScope};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// 内存中的用户、角色和资料
#[derive(Debug)]
pub struct InMemoryMembership {
    users: RwLock<BTreeMap<i64, ForumUser>>,
    online: RwLock<BTreeSet<String>>,
    roles: RwLock<HashMap<String, BTreeSet<String>>>,
    profiles: RwLock<HashMap<(String, String), String>>,
    next_id: AtomicI64,
}

impl InMemoryMembership {
    /// 创建空提供者
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            online: RwLock::new(BTreeSet::new()),
            roles: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryMembership {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipProvider for InMemoryMembership {
    fn create_user(&self, name: &str, email: &str) -> Result<ForumUser, BoxError> {
        let mut users = self.users.write();
        if users.values().any(|user| user.name.eq_ignore_ascii_case(name)) {
            return Err(format!("用户名已存在: {name}").into());
        }
        let user = ForumUser {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            email: email.to_string(),
        };
        users.insert(user.id, user.clone());
        debug!("创建用户: {} (#{})", user.name, user.id);
        Ok(user)
    }

    fn find_user(&self, id: i64) -> Option<ForumUser> {
        self.users.read().get(&id).cloned()
    }

    fn find_by_name(&self, name: &str) -> Option<ForumUser> {
        self.users
            .read()
            .values()
            .find(|user| user.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn set_online(&self, name: &str, online: bool) {
        let mut set = self.online.write();
        if online {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    fn online_users(&self) -> Vec<String> {
        self.online.read().iter().cloned().collect()
    }
}

impl RoleProvider for InMemoryMembership {
    fn add_to_role(&self, user_name: &str, role: &str) {
        self.roles
            .write()
            .entry(user_name.to_string())
            .or_default()
            .insert(role.to_string());
    }

    fn roles_for(&self, user_name: &str) -> Vec<String> {
        self.roles
            .read()
            .get(user_name)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl ProfileProvider for InMemoryMembership {
    fn set_value(&self, user_name: &str, key: &str, value: &str) {
        self.profiles
            .write()
            .insert((user_name.to_string(), key.to_string()), value.to_string());
    }

    fn value(&self, user_name: &str, key: &str) -> Option<String> {
        self.profiles
            .read()
            .get(&(user_name.to_string(), key.to_string()))
            .cloned()
    }
}

/// 注册成员提供者，三个能力共享同一个单例
pub fn register_membership(batch: &mut ComponentBatch) {
    batch
        .register::<InMemoryMembership, _>(|_| Ok(InMemoryMembership::new()))
        .as_service(capability!(InMemoryMembership => dyn MembershipProvider))
        .as_service(capability!(InMemoryMembership => dyn RoleProvider))
        .as_service(capability!(InMemoryMembership => dyn ProfileProvider))
        .with_lifetime(LifetimeScope::Singleton);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_lifecycle() {
        let membership = InMemoryMembership::new();
        let alice = membership.create_user("alice", "alice@example.org").unwrap();
        assert!(membership.create_user("Alice", "other@example.org").is_err());
        assert_eq!(membership.find_user(alice.id), Some(alice.clone()));
        assert_eq!(membership.find_by_name("ALICE").map(|u| u.id), Some(alice.id));

        membership.set_online("alice", true);
        assert_eq!(membership.online_users(), vec!["alice".to_string()]);
        membership.set_online("alice", false);
        assert!(membership.online_users().is_empty());
    }

    #[test]
    fn test_roles_and_profiles() {
        let membership = InMemoryMembership::new();
        membership.add_to_role("alice", "Administrators");
        membership.add_to_role("alice", "Administrators");
        membership.set_value("alice", "UseMobileTheme", "true");

        assert_eq!(membership.roles_for("alice"), vec!["Administrators".to_string()]);
        assert!(membership.roles_for("bob").is_empty());
        assert_eq!(membership.value("alice", "UseMobileTheme").as_deref(), Some("true"));
    }
}
