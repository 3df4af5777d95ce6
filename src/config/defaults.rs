//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [content] Section Defaults
// ============================================================================

pub mod content {
    use std::path::PathBuf;

    pub fn root() -> PathBuf {
        "content".into()
    }
}

// ============================================================================
// [database] Section Defaults
// ============================================================================

pub mod database {
    use std::path::PathBuf;

    pub fn path() -> PathBuf {
        "db/mdpress.sqlite3".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3001
    }
}

// ============================================================================
// [watch] Section Defaults
// ============================================================================

pub mod watch {
    use std::path::PathBuf;

    pub fn interval_secs() -> u64 {
        5
    }

    pub fn dirs() -> Vec<PathBuf> {
        Vec::new()
    }
}

// ============================================================================
// [deploy] Section Defaults
// ============================================================================

pub mod deploy {
    pub fn hook_url() -> Option<String> {
        None
    }
}
