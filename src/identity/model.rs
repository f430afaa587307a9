use serde::{Deserialize, Serialize};

/// Ordered set of role tags. Insertion order is kept, duplicates are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Roles(Vec<String>);

impl Roles {
    pub fn new() -> Self { Self(Vec::new()) }

    /// Parse a comma separated list ("admin, user"); blanks are skipped.
    pub fn parse_csv(text: &str) -> Self {
        text.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }

    pub fn insert<S: Into<String>>(&mut self, role: S) -> bool {
        let role = role.into();
        if self.0.iter().any(|r| r == &role) { return false; }
        self.0.push(role);
        true
    }

    pub fn contains(&self, role: &str) -> bool { self.0.iter().any(|r| r == role) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
    pub fn as_slice(&self) -> &[String] { &self.0 }
    pub fn to_csv(&self) -> String { self.0.join(",") }
}

impl<S: Into<String>> FromIterator<S> for Roles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut roles = Roles::new();
        for r in iter { roles.insert(r); }
        roles
    }
}

impl From<Vec<String>> for Roles {
    fn from(v: Vec<String>) -> Self { v.into_iter().collect() }
}

impl From<Roles> for Vec<String> {
    fn from(r: Roles) -> Self { r.0 }
}

/// A managed user record. `display_name` travels as `username` on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    #[serde(rename = "username")]
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Roles,
}

impl Identity {
    /// Case-insensitive substring match on display name or email.
    /// `needle` must already be lowercase.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.display_name.to_lowercase().contains(needle) || self.email.to_lowercase().contains(needle)
    }

    pub fn is_admin(&self) -> bool { self.roles.contains("admin") }
}

/// Input to a directory "add": everything but the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityDraft {
    #[serde(rename = "username")]
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Roles,
}

impl IdentityDraft {
    pub fn new<S: Into<String>>(display_name: S, email: S, roles: Roles) -> Self {
        Self { display_name: display_name.into(), email: email.into(), avatar: None, roles }
    }

    pub fn into_identity(self, id: String) -> Identity {
        Identity { id, display_name: self.display_name, email: self.email, avatar: self.avatar, roles: self.roles }
    }
}

/// Partial update; only present fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityPatch {
    #[serde(default, rename = "username", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Roles>,
}

impl IdentityPatch {
    pub fn roles(roles: Roles) -> Self { Self { roles: Some(roles), ..Default::default() } }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.avatar.is_none() && self.roles.is_none()
    }

    pub fn apply(&self, target: &mut Identity) {
        if let Some(v) = &self.display_name { target.display_name = v.clone(); }
        if let Some(v) = &self.email { target.email = v.clone(); }
        if let Some(v) = &self.avatar { target.avatar = Some(v.clone()); }
        if let Some(v) = &self.roles { target.roles = v.clone(); }
    }

    pub fn merged(&self, base: &Identity) -> Identity {
        let mut out = base.clone();
        self.apply(&mut out);
        out
    }
}
