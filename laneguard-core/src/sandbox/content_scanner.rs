//! Signature scan over proposed file content.
//!
//! Content-type agnostic and purely lexical. Encoded or obfuscated payloads
//! (base64 blobs, string concatenation, variable indirection) can evade it;
//! the path checks and lane routing do not depend on it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

/// A signature that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFinding {
    pub pattern: String,
    pub description: String,
}

struct ContentSignature {
    name: &'static str,
    description: &'static str,
    regex: Regex,
}

/// (name, description, pattern), checked in order.
const SIGNATURE_TABLE: &[(&str, &str, &str)] = &[
    (
        "recursive_delete",
        "recursive file deletion",
        r"(?i)\brm\s+(?:-[a-z]*r[a-z]*|--recursive)\b|\bshutil\.rmtree\s*\(",
    ),
    (
        "privilege_escalation",
        "privilege escalation via sudo, doas or su",
        r"\b(?:sudo|doas)\s+\S|\bsu\s+(?:-|root\b)",
    ),
    (
        "remote_code_execution",
        "remote script piped into a shell",
        r"(?i)\b(?:curl|wget)\b[^\n|]*\|\s*(?:sudo\s+)?(?:ba|z|da|k)?sh\b",
    ),
    (
        "permission_widening",
        "world-writable or setuid permission change",
        r"\bchmod\s+(?:-R\s+)?(?:0?777|a\+rwx|[ugoa]*\+[rwx]*s)\b",
    ),
    (
        "process_kill",
        "forced process termination",
        r"\bkill\s+-(?:9|KILL|SIGKILL)\b|\b(?:pkill|killall)\b",
    ),
    (
        "dynamic_evaluation",
        "eval or exec of dynamic code",
        r"\b(?:eval|exec)\s*\(",
    ),
    (
        "python_shell",
        "os.system or subprocess with shell=True",
        r"\bos\.system\s*\(|\bsubprocess\.\w+\s*\([^)]*shell\s*=\s*True",
    ),
    (
        "shell_injection",
        "shell invocation with command substitution",
        r#"\b(?:ba|z|da)?sh\s+-c\s+["'][^"'\n]*(?:\$\(|`)"#,
    ),
    (
        "disk_destruction",
        "filesystem creation or raw device write",
        r"\bmkfs(?:\.\w+)?\b|\bdd\s+[^\n]*\bof=/dev/",
    ),
    (
        "fork_bomb",
        "shell fork bomb",
        r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    ),
];

static SIGNATURES: Lazy<Vec<ContentSignature>> = Lazy::new(compile_signatures);

fn compile_signatures() -> Vec<ContentSignature> {
    SIGNATURE_TABLE
        .iter()
        .filter_map(|&(name, description, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some(ContentSignature {
                name,
                description,
                regex,
            }),
            Err(err) => {
                error!(signature = name, error = %err, "Dropping content signature that failed to compile");
                None
            }
        })
        .collect()
}

/// Every signature that matches `text`, in table order.
pub fn scan_content_for_forbidden_patterns(text: &str) -> Vec<ContentFinding> {
    SIGNATURES
        .iter()
        .filter(|signature| signature.regex.is_match(text))
        .map(|signature| ContentFinding {
            pattern: signature.name.to_string(),
            description: signature.description.to_string(),
        })
        .collect()
}

/// Names of the active signatures.
pub fn signature_names() -> Vec<&'static str> {
    SIGNATURES.iter().map(|signature| signature.name).collect()
}
