//! Line-oriented front end. Each command is one user intent; the output is
//! the notices it produced followed by the page it leaves the user on.

use tokio::sync::broadcast::Receiver;
use tracing::debug;

use super::forms::{LoginForm, PasswordForm, RegisterForm, UserForm};
use super::roster::RosterPage;
use super::router::{Route, Router};
use super::{auth, dashboard, profile};
use crate::store::events::{drain, Event, Notice, NoticeLevel};
use crate::store::AppStore;

pub const HELP: &str = "\
Commands:
  open <path>                               go to /login, /register, /dashboard, /profile, /user-management
  login <username> <password>               sign in (demo account: admin / admin)
  register <username> <email> <password> [confirm]
  logout                                    sign out
  show                                      render the current page again
  refresh                                   reload the user list
  search [text]                             filter users by username or email (empty clears)
  add username=<u> email=<e> roles=<r1,r2>  add a user
  edit <id> [username=<u>] [email=<e>] [roles=<r1,r2>]
  delete <id>                               ask to delete a user; answer with confirm or cancel
  profile [username=<u>] [email=<e>]        update your profile
  password <current> <new> <confirm>        change your password
  status                                    show location, identity and backend
  help                                      show this help
  quit | exit                               leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

pub struct Console {
    app: AppStore,
    router: Router,
    events: Receiver<Event>,
    roster: RosterPage,
}

fn level_tag(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "error",
    }
}

/// Collect `key=value` tokens.
fn fields<'a>(tokens: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    tokens.iter().filter_map(|t| t.split_once('=')).collect()
}

impl Console {
    pub fn new(app: AppStore) -> Self {
        let events = app.subscribe();
        Self { app, router: Router::new(), events, roster: RosterPage::new() }
    }

    pub fn route(&self) -> &Route { self.router.current() }
    pub fn app(&self) -> &AppStore { &self.app }

    fn authed(&self) -> bool { self.app.session().is_authenticated() }

    /// Land on the first page and render it.
    pub async fn start(&mut self, location: &str) -> String {
        let mut notes = Vec::new();
        self.go(location, &mut notes).await;
        self.finish(notes)
    }

    pub async fn execute(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = tokens.first().map(|c| c.to_ascii_lowercase()) else {
            return Outcome::Continue(String::new());
        };
        let args = &tokens[1..];
        let mut notes: Vec<Notice> = Vec::new();
        debug!(target: "view", %cmd, "command");
        match cmd.as_str() {
            "quit" | "exit" => return Outcome::Quit,
            "help" => return Outcome::Continue(HELP.to_string()),
            "status" => return Outcome::Continue(self.status()),
            "open" | "goto" => match args.first() {
                Some(path) => self.go(path, &mut notes).await,
                None => notes.push(warn("usage: open <path>")),
            },
            "show" => {}
            "login" => self.login(args, &mut notes).await,
            "register" => self.register(args, &mut notes).await,
            "logout" => {
                self.app.session().logout();
                self.router.refresh(false);
                notes.push(Notice { level: NoticeLevel::Success, message: "Signed out".into() });
            }
            "refresh" => {
                if self.require_authed(&mut notes) { self.load_roster(&mut notes).await; }
            }
            "search" => {
                if self.require_page(Route::UserManagement, &mut notes) { self.roster.set_search(&args.join(" ")); }
            }
            "add" => self.add(args, &mut notes).await,
            "edit" => self.edit(args, &mut notes).await,
            "delete" => {
                if self.require_page(Route::UserManagement, &mut notes) {
                    match args.first() {
                        Some(id) if self.app.directory().get(id).is_some() => self.roster.request_delete(id),
                        Some(id) => notes.push(warn(format!("no user with id {}", id))),
                        None => notes.push(warn("usage: delete <id>")),
                    }
                }
            }
            "confirm" => {
                if self.roster.pending_delete().is_some() {
                    notes.push(self.roster.confirm_delete(self.app.directory()).await);
                } else {
                    notes.push(warn("nothing to confirm"));
                }
            }
            "cancel" => {
                self.roster.cancel_delete();
                self.roster.close_modal();
            }
            "profile" => self.save_profile(args, &mut notes).await,
            "password" => self.change_password(args, &mut notes).await,
            other => notes.push(warn(format!("unknown command '{}', try help", other))),
        }
        Outcome::Continue(self.finish(notes))
    }

    async fn go(&mut self, location: &str, notes: &mut Vec<Notice>) {
        let authed = self.authed();
        let route = self.router.navigate(location, authed).clone();
        // both pages show the user count and fetch on entry
        if matches!(route, Route::Dashboard | Route::UserManagement) {
            self.load_roster(notes).await;
        }
    }

    async fn load_roster(&mut self, notes: &mut Vec<Notice>) {
        if self.app.directory().list().await.is_err() {
            let msg = self
                .app
                .directory()
                .snapshot()
                .error
                .unwrap_or_else(|| crate::store::directory::LIST_FAILED.to_string());
            notes.push(Notice { level: NoticeLevel::Error, message: msg });
        }
    }

    fn require_authed(&self, notes: &mut Vec<Notice>) -> bool {
        if !self.authed() {
            notes.push(warn("sign in first"));
            return false;
        }
        true
    }

    fn require_page(&self, page: Route, notes: &mut Vec<Notice>) -> bool {
        if self.router.current() != &page {
            notes.push(warn(format!("open {} first", page.path())));
            return false;
        }
        true
    }

    async fn login(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if self.authed() {
            notes.push(warn("already signed in; logout first"));
            return;
        }
        let form = LoginForm {
            username: args.first().copied().unwrap_or_default().to_string(),
            password: args.get(1).copied().unwrap_or_default().to_string(),
        };
        let n = auth::submit_login(self.app.session(), &form).await;
        let ok = n.level == NoticeLevel::Success;
        notes.push(n);
        if ok { self.after_sign_in(notes).await; }
    }

    async fn register(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if self.authed() {
            notes.push(warn("already signed in; logout first"));
            return;
        }
        let arg = |i: usize| args.get(i).copied().unwrap_or_default().to_string();
        let form = RegisterForm {
            username: arg(0),
            email: arg(1),
            password: arg(2),
            confirm: args.get(3).map(|s| s.to_string()).unwrap_or_else(|| arg(2)),
        };
        let n = auth::submit_register(self.app.session(), &form).await;
        let ok = n.level == NoticeLevel::Success;
        notes.push(n);
        if ok {
            self.router.navigate("/dashboard", true);
            self.load_roster(notes).await;
        }
    }

    /// Leave the sign-in page for the remembered target.
    async fn after_sign_in(&mut self, notes: &mut Vec<Notice>) {
        let on_auth_page = matches!(self.router.current(), Route::Login { .. } | Route::Register);
        let route = if on_auth_page {
            self.router.refresh(true).clone()
        } else {
            self.router.navigate("/dashboard", true).clone()
        };
        if matches!(route, Route::Dashboard | Route::UserManagement) {
            self.load_roster(notes).await;
        }
    }

    async fn add(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if !self.require_page(Route::UserManagement, notes) { return; }
        let mut form = self.roster.open_add();
        apply_user_fields(&mut form, args);
        let n = self.roster.submit(self.app.directory(), &form).await;
        if n.level != NoticeLevel::Success { self.roster.close_modal(); }
        notes.push(n);
    }

    async fn edit(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if !self.require_page(Route::UserManagement, notes) { return; }
        let Some(id) = args.first() else {
            notes.push(warn("usage: edit <id> [username=..] [email=..] [roles=..]"));
            return;
        };
        let Some(mut form) = self.roster.open_edit(self.app.directory(), id) else {
            notes.push(warn(format!("no user with id {}", id)));
            return;
        };
        apply_user_fields(&mut form, &args[1..]);
        let n = self.roster.submit(self.app.directory(), &form).await;
        if n.level != NoticeLevel::Success { self.roster.close_modal(); }
        notes.push(n);
    }

    async fn save_profile(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if !self.require_page(Route::Profile, notes) { return; }
        let Some(identity) = self.app.session().snapshot().identity else { return; };
        let mut form = profile::prefill(&identity);
        for (k, v) in fields(args) {
            match k {
                "username" => form.username = v.to_string(),
                "email" => form.email = v.to_string(),
                _ => notes.push(warn(format!("unknown field {}", k))),
            }
        }
        notes.push(profile::save_profile(self.app.session(), &form).await);
    }

    async fn change_password(&mut self, args: &[&str], notes: &mut Vec<Notice>) {
        if !self.require_page(Route::Profile, notes) { return; }
        let arg = |i: usize| args.get(i).copied().unwrap_or_default().to_string();
        let form = PasswordForm { current: arg(0), new: arg(1), confirm: arg(2) };
        notes.push(profile::change_password(self.app.session(), &form).await);
    }

    fn status(&self) -> String {
        let s = self.app.session().snapshot();
        let who = match &s.identity {
            Some(i) if s.authenticated => format!("{} ({})", i.display_name, i.roles.to_csv()),
            _ => "anonymous".to_string(),
        };
        format!("location: {}\nidentity: {}\nbackend:  {}", self.router.current().path(), who, self.app.backend_desc())
    }

    /// Merge notices from the bus, follow escalations, then render the page.
    fn finish(&mut self, page_notes: Vec<Notice>) -> String {
        let mut seen: Vec<String> = Vec::new();
        let mut lines: Vec<String> = Vec::new();
        let mut push = |n: &Notice, lines: &mut Vec<String>| {
            if seen.contains(&n.message) { return; }
            seen.push(n.message.clone());
            lines.push(format!("[{}] {}", level_tag(n.level), n.message));
        };
        for ev in drain(&mut self.events) {
            match ev {
                Event::Notice(n) => push(&n, &mut lines),
                Event::Escalation { escalation } => {
                    if self.router.on_escalation(escalation) {
                        lines.push(format!("-> {}", self.router.current().path()));
                    }
                }
                _ => {}
            }
        }
        for n in &page_notes { push(n, &mut lines); }
        // a sign-out elsewhere (eviction) must not leave a private page open
        self.router.refresh(self.authed());
        lines.push(self.render_page());
        lines.join("\n")
    }

    pub fn render_page(&self) -> String {
        let route = self.router.current();
        let mut out = vec![format!("== {} ({}) ==", route.title(), route.path())];
        match route {
            Route::Login { redirect } => {
                out.push("login <username> <password>   (demo account: admin / admin)".into());
                if let Some(r) = redirect { out.push(format!("after sign-in you will return to {}", r)); }
                out.push("no account? open /register".into());
            }
            Route::Register => {
                out.push("register <username> <email> <password> [confirm]".into());
                out.push("have an account? open /login".into());
            }
            Route::Dashboard => out.push(dashboard::render(self.app.directory().roster().len())),
            Route::Profile => match self.app.session().snapshot().identity {
                Some(i) => out.push(profile::render(&i)),
                None => out.push("not signed in".into()),
            },
            Route::UserManagement => out.push(self.roster.render(self.app.directory())),
            Route::NotFound(p) => out.push(format!("404: nothing at {}. open /dashboard to go back", p)),
        }
        out.join("\n")
    }
}

fn warn(message: impl Into<String>) -> Notice { Notice { level: NoticeLevel::Warning, message: message.into() } }

fn apply_user_fields(form: &mut UserForm, args: &[&str]) {
    for (k, v) in fields(args) {
        match k {
            "username" => form.username = v.to_string(),
            "email" => form.email = v.to_string(),
            "roles" => form.roles = v.to_string(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryStorage;

    fn console() -> Console { Console::new(AppStore::mock(Duration::ZERO, Arc::new(MemoryStorage::new()))) }

    async fn run(c: &mut Console, line: &str) -> String {
        match c.execute(line).await {
            Outcome::Continue(s) => s,
            Outcome::Quit => panic!("unexpected quit on {line}"),
        }
    }

    #[tokio::test]
    async fn guarded_start_then_login_returns_to_dashboard() {
        let mut c = console();
        let first = c.start("/").await;
        assert!(first.contains("== Sign in (/login) =="));
        let out = run(&mut c, "login admin admin").await;
        assert!(out.contains("[ok] Signed in as admin"));
        assert!(out.contains("Total users: 3"));
        assert_eq!(c.route(), &Route::Dashboard);
    }

    #[tokio::test]
    async fn bad_login_stays_put() {
        let mut c = console();
        c.start("/login").await;
        let out = run(&mut c, "login admin wrong").await;
        assert!(out.contains("[error] Invalid username or password"));
        assert!(matches!(c.route(), Route::Login { .. }));
    }

    #[tokio::test]
    async fn user_management_flow() {
        let mut c = console();
        c.start("/login").await;
        run(&mut c, "login admin admin").await;
        assert!(run(&mut c, "add username=eve email=eve@x.com roles=user").await.contains("open /user-management first"));
        run(&mut c, "open /user-management").await;
        let out = run(&mut c, "add username=eve email=eve@x.com roles=user").await;
        assert!(out.contains("[ok] User eve added"));
        let eve = c.app().directory().filter("eve").pop().unwrap();
        run(&mut c, &format!("edit {} roles=admin,user", eve.id)).await;
        assert!(c.app().directory().get(&eve.id).unwrap().is_admin());
        let out = run(&mut c, &format!("delete {}", eve.id)).await;
        assert!(out.contains("confirm / cancel"));
        let out = run(&mut c, "confirm").await;
        assert!(out.contains("[ok] User deleted"));
        assert_eq!(c.app().directory().roster().len(), 3);
        let out = run(&mut c, "search user1").await;
        assert!(out.contains("(1 of 3)"));
    }

    #[tokio::test]
    async fn logout_returns_to_login_and_quit_ends() {
        let mut c = console();
        c.start("/login").await;
        run(&mut c, "login admin admin").await;
        run(&mut c, "open /profile").await;
        let out = run(&mut c, "logout").await;
        assert!(out.contains("== Sign in (/login) =="));
        assert_eq!(c.execute("quit").await, Outcome::Quit);
        assert!(run(&mut c, "frobnicate").await.contains("unknown command"));
    }
}
