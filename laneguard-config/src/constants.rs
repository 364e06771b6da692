//! Compiled-in defaults. Every table here can be overridden from
//! `laneguard.toml`, but only at startup.

pub const CONFIG_FILE_NAME: &str = "laneguard.toml";
pub const CONFIG_PATH_ENV: &str = "LANEGUARD_CONFIG_PATH";
pub const ROOT_ENV: &str = "LANEGUARD_ROOT";
pub const DEFAULT_STATE_DIR: &str = ".laneguard";

pub mod actors {
    pub const PRIVILEGED_WRITER: &str = "CLS";
    pub const BACKGROUND_EXECUTOR: &str = "CLC";
    pub const ROUTER_ONLY: &str = "MARY";
    pub const WRITERS: &[&str] = &["CLS", "CODEX", "GEMINI", "BOSS"];
    pub const PLANNERS: &[&str] = &["GG", "GC", "LIAM"];
}

pub mod triggers {
    pub const CLI: &[&str] = &["cli", "cursor", "terminal", "interactive", "manual", "vscode"];
    pub const BACKGROUND: &[&str] = &[
        "background",
        "scheduled",
        "cron",
        "launchd",
        "daemon",
        "work_order",
        "bridge",
    ];
}

pub mod zones {
    pub const LOCKED_PREFIXES: &[&str] = &[
        "core/",
        "governance/",
        "bridge/core/",
        "launchd/",
        ".laneguard/",
    ];

    /// Absolute system prefixes. Paths under these are DANGER unless the
    /// installation root itself lives beneath the prefix.
    pub const DANGER_PREFIXES: &[&str] = &[
        "/etc",
        "/usr",
        "/bin",
        "/sbin",
        "/boot",
        "/dev",
        "/proc",
        "/sys",
        "/root",
        "/var",
        "/System",
        "/Library",
    ];

    /// Home-relative credential directories.
    pub const CREDENTIAL_DIRS: &[&str] = &[
        "~/.ssh",
        "~/.aws",
        "~/.gnupg",
        "~/.kube",
        "~/.docker",
        "~/.config/gcloud",
        "~/.netrc",
    ];
}

pub mod mission_scope {
    pub const WHITELIST: &[&str] = &["core/config/", "core/config.yaml", "governance/docs/"];
    pub const BLACKLIST: &[&str] = &[
        "core/secrets/",
        "governance/policy/",
        "launchd/",
        ".laneguard/",
    ];
}

pub mod limits {
    pub const DAILY_AUTO_APPROVALS: u32 = 25;
    pub const LIFETIME_AUTO_APPROVALS: u64 = 5_000;
    pub const LOCK_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
    pub const LOCK_RETRY_INTERVAL_MS: u64 = 10;
    pub const LOCK_STALE_AFTER_SECS: u64 = 300;
}

pub mod storage {
    pub const AUDIT_DIR: &str = ".laneguard/audit";
    pub const INBOX_DIR: &str = "bridge/inbox/processor";
    pub const PROCESSED_DIR: &str = "bridge/processed";
    pub const ERROR_DIR: &str = "bridge/error";
    pub const CLC_INBOX_DIR: &str = "bridge/inbox/clc";
    pub const BACKUP_DIR: &str = ".laneguard/backups";
}
