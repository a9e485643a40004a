//! Subdomain generation.
//!
//! A server's subdomain is derived from its name: lower-cased, every run of
//! characters outside `[a-z0-9]` collapsed to one hyphen, edge hyphens
//! stripped. On a clash the first free suffix `-1`, `-2`, ... is appended.

use fleet_core::ServerId;
use fleet_store::StoreTxn;

use crate::error::Result;

/// Base used when a name contains no ASCII alphanumerics.
pub const FALLBACK_BASE: &str = "server";

/// Derive the base slug for a name, without uniqueness checks.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        slug
    }
}

/// Generate a unique subdomain for `name` inside `txn`.
///
/// `exclude` is the server being renamed, whose own subdomain does not count
/// as a clash. Subdomains owned by other servers are skipped without taking
/// a lock; the free one returned stays locked until the transaction ends, so
/// a concurrent creator cannot claim it first.
///
/// # Errors
///
/// Returns `StoreError::Conflict` (wrapped) if the free subdomain is locked
/// by another transaction.
pub fn generate<T: StoreTxn>(txn: &T, name: &str, exclude: Option<&ServerId>) -> Result<String> {
    let base = slugify(name);

    let mut candidate = base.clone();
    let mut suffix: u64 = 0;
    loop {
        let owner = match txn.subdomain_owner(&candidate)? {
            Some(owner) => Some(owner),
            None => txn.lock_subdomain(&candidate)?,
        };

        match owner {
            None => return Ok(candidate),
            Some(owner) if Some(&owner) == exclude => return Ok(candidate),
            Some(_) => {
                suffix += 1;
                candidate = format!("{base}-{suffix}");
            }
        }
    }
}
