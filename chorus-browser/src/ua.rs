//! Session user-agent selection.

use rand::seq::SliceRandom;

/// Desktop Chrome user agents the platforms are known to accept.
const DESKTOP_POOL: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
];

/// Pick a user agent for the run.
pub fn pick_desktop() -> &'static str {
    DESKTOP_POOL
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DESKTOP_POOL[0])
}
