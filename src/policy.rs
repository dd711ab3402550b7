//! Stored access policies: permission sets, validity windows, and the
//! `SignedIdentifiers` wire body.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::time::{format_rfc3339, now, DateTime};
use crate::{Error, Result};

/// Longest policy identifier the backend accepts.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Container-level permission set.
///
/// Rendered in the service's canonical order (`racwdl`); the backend
/// rejects permission strings in any other order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    /// Read blob content and properties.
    pub read: bool,
    /// Append blocks to append blobs.
    pub add: bool,
    /// Write new blobs (create only).
    pub create: bool,
    /// Write blob content and metadata.
    pub write: bool,
    /// Delete blobs.
    pub delete: bool,
    /// List blobs in the container.
    pub list: bool,
}

impl Permissions {
    /// The full grant: read, add, create, write, delete, list.
    ///
    /// This is deliberately wide; every token minted under a policy with
    /// this set has full container access for the policy's lifetime.
    pub fn all() -> Self {
        Self {
            read: true,
            add: true,
            create: true,
            write: true,
            delete: true,
            list: true,
        }
    }

    /// Read and write only.
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// True if no permission is granted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (granted, c) in [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
        ] {
            if granted {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Permissions {
    type Err = Error;

    /// Accepts permission characters in any order; rendering normalizes.
    fn from_str(s: &str) -> Result<Self> {
        let mut perms = Self::default();
        for c in s.chars() {
            match c {
                'r' => perms.read = true,
                'a' => perms.add = true,
                'c' => perms.create = true,
                'w' => perms.write = true,
                'd' => perms.delete = true,
                'l' => perms.list = true,
                _ => {
                    return Err(Error::validation(format!(
                        "unknown permission character: {c}"
                    )))
                }
            }
        }
        Ok(perms)
    }
}

/// A named, time-bounded stored access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Identifier, unique within the container.
    pub id: String,
    /// Start of the validity window, inclusive.
    pub starts_on: DateTime,
    /// End of the validity window, exclusive.
    pub expires_on: DateTime,
    /// Permissions granted while the window is open.
    pub permissions: Permissions,
}

impl AccessPolicy {
    /// Build a policy, validating everything locally before it can reach
    /// the network.
    pub fn new(
        id: impl Into<String>,
        starts_on: DateTime,
        expires_on: DateTime,
        permissions: Permissions,
    ) -> Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        if expires_on <= starts_on {
            return Err(Error::validation(format!(
                "policy window is empty: expires_on {expires_on} <= starts_on {starts_on}"
            )));
        }
        if expires_on <= now() {
            return Err(Error::validation(format!(
                "policy window is already over: expires_on {expires_on}"
            )));
        }
        if permissions.is_empty() {
            return Err(Error::validation("policy permission set is empty"));
        }

        Ok(Self {
            id,
            starts_on,
            expires_on,
            permissions,
        })
    }
}

/// Identifier constraints imposed by the backend: non-empty, at most 64
/// chars, alphanumeric.
pub(crate) fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation("policy identifier is empty"));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::validation(format!(
            "policy identifier exceeds {MAX_IDENTIFIER_LEN} chars: {id}"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::validation(format!(
            "policy identifier must be alphanumeric: {id}"
        )));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename = "SignedIdentifiers")]
struct SignedIdentifiersXml {
    #[serde(rename = "SignedIdentifier")]
    items: Vec<SignedIdentifierXml>,
}

#[derive(Serialize)]
struct SignedIdentifierXml {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "AccessPolicy")]
    access_policy: AccessPolicyXml,
}

#[derive(Serialize)]
struct AccessPolicyXml {
    #[serde(rename = "Start")]
    start: String,
    #[serde(rename = "Expiry")]
    expiry: String,
    #[serde(rename = "Permission")]
    permission: String,
}

/// Serialize the full policy list as the `Set Container ACL` request body.
pub(crate) fn to_signed_identifiers_xml(policies: &[AccessPolicy]) -> Result<String> {
    let body = SignedIdentifiersXml {
        items: policies
            .iter()
            .map(|p| SignedIdentifierXml {
                id: p.id.clone(),
                access_policy: AccessPolicyXml {
                    start: format_rfc3339(p.starts_on),
                    expiry: format_rfc3339(p.expires_on),
                    permission: p.permissions.to_string(),
                },
            })
            .collect(),
    };

    let xml = quick_xml::se::to_string(&body)
        .map_err(|e| Error::unexpected("failed to serialize signed identifiers").with_source(e))?;
    Ok(format!(r#"<?xml version="1.0" encoding="utf-8"?>{xml}"#))
}
