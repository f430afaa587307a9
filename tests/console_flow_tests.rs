use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use adminboard::directory::MockDirectory;
use adminboard::server::{serve, ServerState};
use adminboard::store::{AppStore, FileStorage, MemoryStorage};
use adminboard::view::{Console, Outcome, Route};

struct Guard(JoinHandle<()>);
impl Drop for Guard { fn drop(&mut self) { self.0.abort(); } }

async fn start_server() -> (Guard, ServerState, String) {
    let state = ServerState::new(Arc::new(MockDirectory::seeded(Duration::ZERO)), Duration::ZERO);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let srv_state = state.clone();
    let handle = tokio::spawn(async move {
        let _ = serve(listener, srv_state).await;
    });
    (Guard(handle), state, format!("http://{}", addr))
}

async fn run(c: &mut Console, line: &str) -> String {
    match c.execute(line).await {
        Outcome::Continue(s) => s,
        Outcome::Quit => panic!("unexpected quit on {line}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_session_returns_to_login_with_redirect() {
    let (_g, state, base) = start_server().await;
    let app = AppStore::remote(&base, Duration::from_secs(5), Arc::new(MemoryStorage::new())).unwrap();
    let mut c = Console::new(app);

    let out = c.start("/user-management").await;
    assert!(out.contains("== Sign in (/login) =="), "{out}");

    run(&mut c, "login admin admin").await;
    let out = run(&mut c, "open /user-management").await;
    assert!(out.contains("user1@example.com"), "{out}");

    state.revoke_all().await;
    let out = run(&mut c, "refresh").await;
    assert!(out.contains("[error] Session expired, please sign in again"), "{out}");
    assert!(out.contains("-> /login?redirect=%2Fuser-management"), "{out}");
    assert_eq!(out.matches("Session expired").count(), 1);
    assert_eq!(c.route(), &Route::Login { redirect: Some("/user-management".into()) });
    assert!(!c.app().session().is_authenticated());

    // signing back in returns to the page that was open
    let out = run(&mut c, "login admin admin").await;
    assert!(out.contains("[ok] Signed in as admin"), "{out}");
    assert_eq!(c.route(), &Route::UserManagement);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_bad_login_shows_message_once() {
    let (_g, _state, base) = start_server().await;
    let app = AppStore::remote(&base, Duration::from_secs(5), Arc::new(MemoryStorage::new())).unwrap();
    let mut c = Console::new(app);
    c.start("/login").await;
    let out = run(&mut c, "login admin nope").await;
    assert!(out.contains("[error]"), "{out}");
    assert!(!out.contains("-> "), "{out}");
    assert!(matches!(c.route(), Route::Login { .. }));
}

#[tokio::test]
async fn restored_session_opens_private_page_directly() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let app = AppStore::mock(Duration::ZERO, Arc::new(FileStorage::new(tmp.path())));
        app.session().login("admin", "admin").await.unwrap();
    }
    let app = AppStore::mock(Duration::ZERO, Arc::new(FileStorage::new(tmp.path())));
    assert!(app.session().restore().unwrap());
    let mut c = Console::new(app);
    let out = c.start("/profile").await;
    assert!(out.contains("admin@example.com"), "{out}");
    assert_eq!(c.route(), &Route::Profile);

    let out = run(&mut c, "logout").await;
    assert!(out.contains("== Sign in (/login) =="), "{out}");
    let out = run(&mut c, "open /dashboard").await;
    assert!(out.contains("== Sign in (/login) =="), "{out}");
}

#[tokio::test]
async fn register_then_profile_edit() {
    let mut c = Console::new(AppStore::mock(Duration::ZERO, Arc::new(MemoryStorage::new())));
    c.start("/register").await;
    let out = run(&mut c, "register carol carol@example.com secret1").await;
    assert!(out.contains("[ok] Account carol created"), "{out}");
    assert!(out.contains("Total users: 4"), "{out}");
    assert_eq!(c.route(), &Route::Dashboard);

    run(&mut c, "open /profile").await;
    let out = run(&mut c, "profile email=carol@corp.example").await;
    assert!(out.contains("[ok] Profile updated"), "{out}");
    assert!(out.contains("carol@corp.example"), "{out}");

    let out = run(&mut c, "password secret1 short short").await;
    assert!(!out.contains("[ok] Password updated"), "{out}");
    let out = run(&mut c, "password secret1 secret22 secret22").await;
    assert!(out.contains("[ok] Password updated"), "{out}");

    assert_eq!(c.execute("quit").await, Outcome::Quit);
}
