//! System keychain storage for the completion endpoint API key
//!
//! Reads are never cached here: the suggestion service keeps its own
//! snapshot and asks again only when configuration is refreshed.

use keyring::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

const KEYRING_SERVICE: &str = "code-mentor";
const KEYRING_USERNAME: &str = "openai_api_key";

static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

type KeyringResult<T> = Result<T, String>;

fn keyring_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("MENTOR_DISABLE_KEYRING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

/// Warn about keychain errors only once per process
pub fn warn_keychain_error_once(err: &str) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    warn!(
        error = %err,
        "couldn't access the system keychain; set OPENAI_API_KEY to bypass it"
    );
}

/// Get the API key from the keychain
pub fn get_api_key() -> KeyringResult<Option<String>> {
    if keyring_disabled() {
        return Ok(None);
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(key) if key.trim().is_empty() => Ok(None),
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.to_string()),
    }
}

/// Store the API key in the keychain, verifying it reads back
pub fn set_api_key(key: &str) -> KeyringResult<()> {
    if keyring_disabled() {
        return Err("System keychain is disabled (MENTOR_DISABLE_KEYRING)".to_string());
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    entry.set_password(key).map_err(|e| e.to_string())?;

    match entry.get_password() {
        Ok(stored) if stored == key => Ok(()),
        Ok(_) => Err("API key verification failed: stored key doesn't match".to_string()),
        Err(err) => Err(format!(
            "API key verification failed: couldn't read back from keychain ({})",
            err
        )),
    }
}
