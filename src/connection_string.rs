//! Parser for [Azure storage connection strings][1].
//!
//! Only the blob-service fields matter here: account name, account key,
//! a pre-issued SAS, the blob endpoint, and the Azurite development
//! storage shortcut.
//!
//! [1]: https://learn.microsoft.com/en-us/azure/storage/common/storage-configure-connection-string

use std::collections::HashMap;

use crate::{Error, Result};

/// The fields of a connection string this crate cares about.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ParsedConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub endpoint: Option<String>,
}

// Azurite defaults.
const AZURITE_ACCOUNT_NAME: &str = "devstoreaccount1";
const AZURITE_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const AZURITE_BLOB_URI: &str = "http://127.0.0.1:10000";

pub(crate) fn parse(conn_str: &str) -> Result<ParsedConnectionString> {
    let fields = split_fields(conn_str)?;

    if fields.get("UseDevelopmentStorage").map(String::as_str) == Some("true") {
        return Ok(development_storage(&fields));
    }

    let account_name = fields.get("AccountName").cloned();
    let mut parsed = ParsedConnectionString {
        endpoint: resolve_endpoint(&fields, account_name.as_deref())?,
        account_name,
        ..Default::default()
    };

    // A pre-issued SAS takes precedence over the account key; AAD style
    // credentials are never passed through connection strings.
    if let Some(token) = fields.get("SharedAccessSignature") {
        parsed.sas_token = Some(token.clone());
    } else if let Some(key) = fields.get("AccountKey") {
        parsed.account_key = Some(key.clone());
    }

    Ok(parsed)
}

fn split_fields(conn_str: &str) -> Result<HashMap<String, String>> {
    conn_str
        .trim()
        .replace('\n', "")
        .split(';')
        .filter(|field| !field.is_empty())
        .map(|field| {
            let (key, value) = field.trim().split_once('=').ok_or_else(|| {
                Error::config_invalid(format!(
                    "invalid connection string, expected '=' in field: {field}"
                ))
            })?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Local Azurite emulator, with the documented well-known account unless
/// overridden.
fn development_storage(fields: &HashMap<String, String>) -> ParsedConnectionString {
    let account_name = fields
        .get("AccountName")
        .cloned()
        .unwrap_or_else(|| AZURITE_ACCOUNT_NAME.to_string());
    let account_key = fields
        .get("AccountKey")
        .cloned()
        .unwrap_or_else(|| AZURITE_ACCOUNT_KEY.to_string());
    let proxy_uri = fields
        .get("DevelopmentStorageProxyUri")
        .cloned()
        .unwrap_or_else(|| AZURITE_BLOB_URI.to_string());

    ParsedConnectionString {
        endpoint: Some(format!("{proxy_uri}/{account_name}")),
        account_name: Some(account_name),
        account_key: Some(account_key),
        sas_token: None,
    }
}

/// Prefer an explicit `BlobEndpoint`; otherwise assemble one from
/// `AccountName` + `EndpointSuffix` (+ optional protocol).
fn resolve_endpoint(
    fields: &HashMap<String, String>,
    account_name: Option<&str>,
) -> Result<Option<String>> {
    if let Some(endpoint) = fields.get("BlobEndpoint") {
        return Ok(Some(endpoint.clone()));
    }

    let (Some(account_name), Some(suffix)) = (account_name, fields.get("EndpointSuffix")) else {
        return Ok(None);
    };

    let protocol = fields
        .get("DefaultEndpointsProtocol")
        .map(String::as_str)
        .unwrap_or("https");
    if protocol != "http" && protocol != "https" {
        return Err(Error::config_invalid(format!(
            "invalid DefaultEndpointsProtocol: {protocol}"
        )));
    }

    Ok(Some(format!("{protocol}://{account_name}.blob.{suffix}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pcs(
        account_name: Option<&str>,
        account_key: Option<&str>,
        sas_token: Option<&str>,
        endpoint: Option<&str>,
    ) -> ParsedConnectionString {
        ParsedConnectionString {
            account_name: account_name.map(Into::into),
            account_key: account_key.map(Into::into),
            sas_token: sas_token.map(Into::into),
            endpoint: endpoint.map(Into::into),
        }
    }

    #[test]
    fn test_parse() {
        let cases = vec![
            (
                "endpoint only",
                "BlobEndpoint=https://testaccount.blob.core.windows.net/",
                Some(pcs(None, None, None, Some("https://testaccount.blob.core.windows.net/"))),
            ),
            (
                "creds and blob endpoint",
                "AccountName=testaccount;AccountKey=testkey;BlobEndpoint=https://testaccount.blob.core.windows.net/",
                Some(pcs(
                    Some("testaccount"),
                    Some("testkey"),
                    None,
                    Some("https://testaccount.blob.core.windows.net/"),
                )),
            ),
            (
                "sas token",
                "SharedAccessSignature=sv=2022-11-02&sig=abc",
                Some(pcs(None, None, Some("sv=2022-11-02&sig=abc"), None)),
            ),
            (
                "sas preferred over key",
                "AccountName=testaccount;AccountKey=testkey;SharedAccessSignature=tok",
                Some(pcs(Some("testaccount"), None, Some("tok"), None)),
            ),
            (
                "endpoint from parts",
                "AccountName=testaccount;EndpointSuffix=core.windows.net;DefaultEndpointsProtocol=https",
                Some(pcs(
                    Some("testaccount"),
                    None,
                    None,
                    Some("https://testaccount.blob.core.windows.net"),
                )),
            ),
            (
                "endpoint from parts defaults to https",
                "AccountName=testaccount;EndpointSuffix=core.windows.net",
                Some(pcs(
                    Some("testaccount"),
                    None,
                    None,
                    Some("https://testaccount.blob.core.windows.net"),
                )),
            ),
            (
                "development storage",
                "UseDevelopmentStorage=true",
                Some(pcs(
                    Some("devstoreaccount1"),
                    Some(AZURITE_ACCOUNT_KEY),
                    None,
                    Some("http://127.0.0.1:10000/devstoreaccount1"),
                )),
            ),
            (
                "development storage with custom proxy",
                "UseDevelopmentStorage=true;DevelopmentStorageProxyUri=http://127.0.0.1:12345",
                Some(pcs(
                    Some("devstoreaccount1"),
                    Some(AZURITE_ACCOUNT_KEY),
                    None,
                    Some("http://127.0.0.1:12345/devstoreaccount1"),
                )),
            ),
            (
                "unknown keys ignored",
                "SomeUnknownKey=123;AccountName=testaccount",
                Some(pcs(Some("testaccount"), None, None, None)),
            ),
            (
                "leading and trailing separators",
                ";AccountName=testaccount;",
                Some(pcs(Some("testaccount"), None, None, None)),
            ),
            (
                "line breaks",
                "\n AccountName=testaccount;\n AccountKey=testkey;\n EndpointSuffix=core.windows.net",
                Some(pcs(
                    Some("testaccount"),
                    Some("testkey"),
                    None,
                    Some("https://testaccount.blob.core.windows.net"),
                )),
            ),
            (
                "missing equals",
                "AccountNametestaccount;AccountKey=testkey",
                None,
            ),
            (
                "invalid protocol",
                "DefaultEndpointsProtocol=ftp;AccountName=testaccount;EndpointSuffix=core.windows.net",
                None,
            ),
        ];

        for (name, input, expected) in cases {
            let actual = parse(input);
            match expected {
                Some(expected) => {
                    assert_eq!(actual.unwrap(), expected, "failed for case: {name}");
                }
                None => assert!(actual.is_err(), "expected error for case: {name}"),
            }
        }
    }
}
