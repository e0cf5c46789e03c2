//! Line-oriented run log. Workers write concurrently, so every line must
//! be self-contained; ordering across workers is not guaranteed.

use chrono::Local;

fn is_quiet() -> bool {
    std::env::var("GEPPETTO_QUIET")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

pub fn log(message: &str) {
    if is_quiet() {
        return;
    }
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    println!("[{}] {}", timestamp, message);
}

pub fn log_error(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    eprintln!("[{}] {}", timestamp, message);
}
