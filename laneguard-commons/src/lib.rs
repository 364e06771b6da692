//! Shared helpers reused across the laneguard crates. Kept free of policy so
//! that the configuration crate and the core engine can agree on how paths
//! are normalized and how file contents are fingerprinted.

pub mod digest;
pub mod paths;

pub use digest::{GENESIS_CHECKSUM, sha256_file, sha256_hex};
pub use paths::{
    InstallationPaths, canonicalize_allow_missing, canonicalize_root, expand_home, matches_prefix,
    normalize_path, to_slash_string,
};
