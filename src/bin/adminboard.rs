//!
//! adminboard console
//! ------------------
//! Interactive front end for the admin dashboard. Runs against the in-process
//! mock backends by default, or against an adminboard API server with `--api`.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use adminboard::config::Config;
use adminboard::store::AppStore;
use adminboard::view::{Console, Outcome};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--state-dir <path>] [--latency-ms <ms>] [--open <path>]\n\nFlags:\n  --api <url>              Use the HTTP API at <url> instead of the in-process mock (env ADMINBOARD_API_BASE)\n  --state-dir <path>       Where the signed-in session is kept between runs (env ADMINBOARD_STATE_DIR, default .adminboard)\n  --latency-ms <ms>        Simulated latency of the in-process mock (env ADMINBOARD_LATENCY_MS, default 1000)\n  --open <path>            First page to open (default /)\n  -h, --help               Show this help\n\nType 'help' inside the console for its commands.\n\nExamples:\n  {program} --latency-ms 0\n    > login admin admin\n    > open /user-management\n  {program} --api http://127.0.0.1:7878"
    );
}

fn main() -> Result<()> {
    // Quiet by default so log lines do not interleave with pages
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    let mut cfg = Config::from_env();
    let mut open = String::from("/");

    let mut i = 0;
    while i < args.len() {
        let need_value = |i: usize, flag: &str| -> String {
            if i + 1 >= args.len() {
                eprintln!("{} requires a value", flag);
                print_usage(&program);
                std::process::exit(2);
            }
            args[i + 1].clone()
        };
        match args[i].as_str() {
            "--api" => { cfg.api_base = Some(need_value(i, "--api")); i += 2; }
            "--state-dir" => { cfg.state_dir = PathBuf::from(need_value(i, "--state-dir")); i += 2; }
            "--latency-ms" => {
                let v = need_value(i, "--latency-ms");
                let ms: u64 = v.parse().with_context(|| format!("invalid --latency-ms value: {}", v))?;
                cfg.latency = Duration::from_millis(ms);
                i += 2;
            }
            "--open" => { open = need_value(i, "--open"); i += 2; }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            unk => {
                eprintln!("Unrecognized argument: {}", unk);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let app = AppStore::from_config(&cfg)?;
    match app.session().restore() {
        Ok(true) => tracing::info!(target: "startup", "restored previous session"),
        Ok(false) => {}
        Err(e) => tracing::warn!(target: "startup", error = %e, "could not read saved session"),
    }

    let mut console = Console::new(app);
    println!("adminboard console ({}). Type 'help' for commands.", console.app().backend_desc());
    println!("{}", rt.block_on(console.start(&open)));

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    loop {
        input.clear();
        print!("> "); let _ = stdout.flush();
        match stdin.read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match rt.block_on(console.execute(&input)) {
            Outcome::Quit => break,
            Outcome::Continue(text) => { if !text.is_empty() { println!("{}", text); } }
        }
    }
    Ok(())
}
