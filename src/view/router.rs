//! Entry points and the authentication guard.

use tracing::debug;

use crate::store::events::Escalation;

pub const DEFAULT_LANDING: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `redirect` is where to go after a successful sign-in.
    Login { redirect: Option<String> },
    Register,
    Dashboard,
    Profile,
    UserManagement,
    NotFound(String),
}

/// Only same-site absolute paths are accepted as redirect targets.
fn safe_redirect(target: &str) -> Option<String> {
    let t = target.trim();
    if t.starts_with('/') && !t.starts_with("//") { Some(t.to_string()) } else { None }
}

impl Route {
    /// Parse a location such as `/login?redirect=%2Fprofile`. `/` maps to the
    /// dashboard; unknown paths become `NotFound`.
    pub fn parse(location: &str) -> Route {
        let location = location.trim();
        let (path, query) = match location.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (location, None),
        };
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match path {
            "/" | "/dashboard" => Route::Dashboard,
            "/login" => {
                let redirect = query.and_then(|q| {
                    q.split('&').find_map(|kv| {
                        let (k, v) = kv.split_once('=')?;
                        if k != "redirect" { return None; }
                        let decoded = urlencoding::decode(v).ok()?;
                        safe_redirect(&decoded)
                    })
                });
                Route::Login { redirect }
            }
            "/register" => Route::Register,
            "/profile" => Route::Profile,
            "/user-management" => Route::UserManagement,
            other => Route::NotFound(other.to_string()),
        }
    }

    /// Canonical location, including the encoded redirect for login.
    pub fn path(&self) -> String {
        match self {
            Route::Login { redirect: Some(r) } => format!("/login?redirect={}", urlencoding::encode(r)),
            Route::Login { redirect: None } => "/login".into(),
            Route::Register => "/register".into(),
            Route::Dashboard => "/dashboard".into(),
            Route::Profile => "/profile".into(),
            Route::UserManagement => "/user-management".into(),
            Route::NotFound(p) => p.clone(),
        }
    }

    /// Reachable without signing in.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login { .. } | Route::Register | Route::NotFound(_))
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login { .. } => "Sign in",
            Route::Register => "Create account",
            Route::Dashboard => "Dashboard",
            Route::Profile => "Profile",
            Route::UserManagement => "User management",
            Route::NotFound(_) => "Not found",
        }
    }
}

/// Apply the guard: anonymous visitors to private pages land on `/login`;
/// signed-in visitors to login/register are forwarded to the redirect target.
pub fn resolve(requested: Route, authenticated: bool) -> Route {
    match requested {
        Route::Login { redirect } if authenticated => {
            match redirect.as_deref().map(Route::parse) {
                Some(Route::Login { .. }) | Some(Route::Register) | None => Route::Dashboard,
                Some(target) => target,
            }
        }
        Route::Register if authenticated => Route::Dashboard,
        r if !authenticated && !r.is_public() => Route::Login { redirect: None },
        r => r,
    }
}

/// Current location of the console.
#[derive(Debug, Clone)]
pub struct Router {
    current: Route,
}

impl Default for Router {
    fn default() -> Self { Self { current: Route::Login { redirect: None } } }
}

impl Router {
    pub fn new() -> Self { Self::default() }
    pub fn current(&self) -> &Route { &self.current }

    pub fn navigate(&mut self, location: &str, authenticated: bool) -> &Route {
        let resolved = resolve(Route::parse(location), authenticated);
        debug!(target: "view", from = %self.current.path(), to = %resolved.path(), "navigate");
        self.current = resolved;
        &self.current
    }

    /// Re-run the guard in place, e.g. after sign-in or sign-out.
    pub fn refresh(&mut self, authenticated: bool) -> &Route {
        self.current = resolve(self.current.clone(), authenticated);
        &self.current
    }

    /// React to an escalation from the client adapter. Returns true when the
    /// location changed.
    pub fn on_escalation(&mut self, escalation: Escalation) -> bool {
        match escalation {
            Escalation::Unauthorized => {
                if matches!(self.current, Route::Login { .. }) { return false; }
                let origin = self.current.path();
                self.current = Route::Login { redirect: Some(origin) };
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_paths() {
        assert_eq!(Route::parse("/"), Route::Dashboard);
        assert_eq!(Route::parse("/user-management/"), Route::UserManagement);
        assert_eq!(Route::parse("/nope"), Route::NotFound("/nope".into()));
        assert_eq!(
            Route::parse("/login?redirect=%2Fprofile"),
            Route::Login { redirect: Some("/profile".into()) }
        );
        assert_eq!(Route::parse("/login?redirect=https%3A%2F%2Fevil"), Route::Login { redirect: None });
    }

    #[test]
    fn redirect_round_trips_through_path() {
        let r = Route::Login { redirect: Some("/user-management".into()) };
        assert_eq!(r.path(), "/login?redirect=%2Fuser-management");
        assert_eq!(Route::parse(&r.path()), r);
    }

    #[test]
    fn guard_rules() {
        assert_eq!(resolve(Route::Profile, false), Route::Login { redirect: None });
        assert_eq!(resolve(Route::NotFound("/x".into()), false), Route::NotFound("/x".into()));
        assert_eq!(resolve(Route::Register, true), Route::Dashboard);
        assert_eq!(resolve(Route::Login { redirect: Some("/profile".into()) }, true), Route::Profile);
        assert_eq!(resolve(Route::Login { redirect: None }, true), Route::Dashboard);
    }

    #[test]
    fn escalation_preserves_origin_once() {
        let mut router = Router::new();
        router.navigate("/user-management", true);
        assert!(router.on_escalation(Escalation::Unauthorized));
        assert_eq!(router.current().path(), "/login?redirect=%2Fuser-management");
        assert!(!router.on_escalation(Escalation::Unauthorized));
        assert_eq!(router.refresh(true), &Route::UserManagement);
    }
}
