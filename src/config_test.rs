use super::*;

// =============================================================================
// from_env — env manipulation requires unsafe in edition 2024.
// We wrap in unsafe blocks; these tests run serially (single test thread).
// =============================================================================

/// # Safety
/// Tests must run with `--test-threads=1` to avoid env races.
unsafe fn clear_clika_env() {
    unsafe {
        std::env::remove_var("CLIKA_BACKEND_URL");
        std::env::remove_var("CLIKA_API_KEY");
        std::env::remove_var("CLIKA_OAUTH_REDIRECT_URL");
        std::env::remove_var("CLIKA_SESSION_FILE");
        std::env::remove_var("CLIKA_INIT_TIMEOUT_SECS");
        std::env::remove_var("CLIKA_GUARD_STALL_SECS");
        std::env::remove_var("CLIKA_REFRESH_LEEWAY_SECS");
    }
}

unsafe fn set_required_env() {
    unsafe {
        std::env::set_var("CLIKA_BACKEND_URL", "https://proj.clika.dev");
        std::env::set_var("CLIKA_API_KEY", "anon-key");
        std::env::set_var("CLIKA_OAUTH_REDIRECT_URL", "https://console.clika.dev/auth/callback");
    }
}

#[test]
fn from_env_all_set_returns_some() {
    unsafe {
        clear_clika_env();
        set_required_env();
    }
    let config = ConsoleConfig::from_env();
    assert!(config.is_some());
    let config = config.unwrap();
    assert_eq!(config.backend_url, "https://proj.clika.dev");
    assert_eq!(config.api_key, "anon-key");
    assert_eq!(config.oauth_redirect_url, "https://console.clika.dev/auth/callback");
    unsafe { clear_clika_env() };
}

#[test]
fn from_env_missing_backend_url_returns_none() {
    unsafe {
        clear_clika_env();
        std::env::set_var("CLIKA_API_KEY", "anon-key");
        std::env::set_var("CLIKA_OAUTH_REDIRECT_URL", "https://console.clika.dev/cb");
    }
    assert!(ConsoleConfig::from_env().is_none());
    unsafe { clear_clika_env() };
}

#[test]
fn from_env_missing_api_key_returns_none() {
    unsafe {
        clear_clika_env();
        std::env::set_var("CLIKA_BACKEND_URL", "https://proj.clika.dev");
        std::env::set_var("CLIKA_OAUTH_REDIRECT_URL", "https://console.clika.dev/cb");
    }
    assert!(ConsoleConfig::from_env().is_none());
    unsafe { clear_clika_env() };
}

#[test]
fn from_env_defaults_apply() {
    unsafe {
        clear_clika_env();
        set_required_env();
    }
    let config = ConsoleConfig::from_env().unwrap();
    assert_eq!(config.init_timeout, Duration::from_secs(10));
    assert_eq!(config.guard_stall, Duration::from_secs(5));
    assert_eq!(config.refresh_leeway, Duration::from_secs(60));
    assert_eq!(config.session_file, PathBuf::from("clika-session.json"));
    unsafe { clear_clika_env() };
}

#[test]
fn from_env_tuning_overrides_apply() {
    unsafe {
        clear_clika_env();
        set_required_env();
        std::env::set_var("CLIKA_INIT_TIMEOUT_SECS", "3");
        std::env::set_var("CLIKA_SESSION_FILE", "/tmp/clika-test.json");
    }
    let config = ConsoleConfig::from_env().unwrap();
    assert_eq!(config.init_timeout, Duration::from_secs(3));
    assert_eq!(config.session_file, PathBuf::from("/tmp/clika-test.json"));
    unsafe { clear_clika_env() };
}

#[test]
fn from_env_unparseable_tuning_falls_back_to_default() {
    unsafe {
        clear_clika_env();
        set_required_env();
        std::env::set_var("CLIKA_INIT_TIMEOUT_SECS", "soon");
    }
    let config = ConsoleConfig::from_env().unwrap();
    assert_eq!(config.init_timeout, Duration::from_secs(10));
    unsafe { clear_clika_env() };
}

// =============================================================================
// new
// =============================================================================

#[test]
fn new_uses_library_defaults() {
    let config = ConsoleConfig::new("https://proj.clika.dev", "key", "https://console.clika.dev/cb");
    assert_eq!(config.backend_url, "https://proj.clika.dev");
    assert_eq!(config.init_timeout, Duration::from_secs(10));
    assert_eq!(config.refresh_leeway, Duration::from_secs(60));
}

#[test]
fn config_debug_does_not_panic() {
    let config = ConsoleConfig::new("https://proj.clika.dev", "key", "https://console.clika.dev/cb");
    let debug = format!("{config:?}");
    assert!(debug.contains("proj.clika.dev"));
}
