use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Access tokens count as expired this long before their recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// OAuth client settings read from the downloaded client secret file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_endpoint_url: String,
    pub token_endpoint_url: String,
    pub redirect_target: String,
    pub requested_scope: String,
}

/// Shape of the provider's credential download: a single `installed` or `web` section.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

pub fn load_client_config(path: impl AsRef<Path>, scope: &str) -> Result<ClientConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| Error::ConfigNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    parse_client_config(&raw, scope).map_err(|reason| Error::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse_client_config(raw: &str, scope: &str) -> Result<ClientConfig, String> {
    let file: ClientSecretFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let secret = file
        .installed
        .or(file.web)
        .ok_or_else(|| "no `installed` or `web` credentials found".to_string())?;
    let redirect_target = secret
        .redirect_uris
        .into_iter()
        .next()
        .ok_or_else(|| "missing redirect URL in `redirect_uris`".to_string())?;

    Ok(ClientConfig {
        client_id: secret.client_id,
        client_secret: secret.client_secret,
        auth_endpoint_url: secret.auth_uri,
        token_endpoint_url: secret.token_uri,
        redirect_target,
        requested_scope: scope.to_string(),
    })
}

/// OAuth token as cached in the token file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `None` means the access token does not expire.
    #[serde(
        default,
        deserialize_with = "zero_time_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,
}

/// Some writers record "no expiry" as the zero time `0001-01-01T00:00:00Z`.
fn zero_time_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let expiry = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(expiry.filter(|expiry| expiry.year() > 1))
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_MARGIN_SECS) <= now,
            None => false,
        }
    }

    /// Without a refresh token the record dies with its access token.
    pub fn is_renewable(&self) -> bool {
        self.refresh_token.is_some()
    }
}

pub fn load_token(path: impl AsRef<Path>) -> Result<TokenRecord> {
    let path = path.as_ref();
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Err(Error::TokenNotFound(path.to_path_buf())),
    };
    serde_json::from_str(&raw).map_err(|source| Error::TokenParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the token file as a whole: an owner-only (0600) temp file in the
/// same directory is renamed over the target.
pub fn save_token(path: impl AsRef<Path>, record: &TokenRecord) -> Result<()> {
    let path = path.as_ref();
    println!("Saving credential file to: {}", path.display());

    let write_error = |reason: String| Error::TokenWrite {
        path: path.to_path_buf(),
        reason,
    };
    let body = serde_json::to_vec_pretty(record).map_err(|e| write_error(e.to_string()))?;

    let mut file =
        tempfile::NamedTempFile::new_in(parent_dir(path)).map_err(|e| write_error(e.to_string()))?;
    file.write_all(&body)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| write_error(e.to_string()))?;
    file.persist(path)
        .map_err(|e| write_error(e.error.to_string()))?;

    tracing::debug!(path = %path.display(), "token cache written");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const READONLY: &str = "https://www.googleapis.com/auth/tasks.readonly";

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn sample_token() -> TokenRecord {
        TokenRecord {
            access_token: "ya29.access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Some(Utc.with_ymd_and_hms(2030, 5, 17, 8, 30, 0).unwrap()),
        }
    }

    #[test]
    fn loads_installed_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "credentials.json",
            r#"{"installed":{
                "client_id":"123.apps.googleusercontent.com",
                "project_id":"tasks-demo",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "client_secret":"s3cr3t",
                "redirect_uris":["http://localhost","urn:ietf:wg:oauth:2.0:oob"]
            }}"#,
        );

        let config = load_client_config(&path, READONLY).unwrap();

        assert_eq!(
            config,
            ClientConfig {
                client_id: "123.apps.googleusercontent.com".to_string(),
                client_secret: "s3cr3t".to_string(),
                auth_endpoint_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
                token_endpoint_url: "https://oauth2.googleapis.com/token".to_string(),
                redirect_target: "http://localhost".to_string(),
                requested_scope: READONLY.to_string(),
            }
        );
    }

    #[test]
    fn loads_web_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "credentials.json",
            r#"{"web":{"client_id":"web-id","client_secret":"web-secret",
                "auth_uri":"https://auth.example/authorize","token_uri":"https://auth.example/token",
                "redirect_uris":["https://app.example/callback"]}}"#,
        );

        let config = load_client_config(&path, READONLY).unwrap();
        assert_eq!(config.client_id, "web-id");
        assert_eq!(config.redirect_target, "https://app.example/callback");
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "credentials.json",
            r#"{"installed":{"client_id":"id","auth_uri":"a","token_uri":"t","redirect_uris":["r"]}}"#,
        );

        let err = load_client_config(&path, READONLY).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { ref reason, .. } if reason.contains("client_secret")));
    }

    #[test]
    fn missing_section_or_redirect_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let no_section = write_file(&dir, "a.json", r#"{"other":{}}"#);
        let no_redirect = write_file(
            &dir,
            "b.json",
            r#"{"installed":{"client_id":"i","client_secret":"s","auth_uri":"a","token_uri":"t"}}"#,
        );

        assert!(matches!(
            load_client_config(&no_section, READONLY),
            Err(Error::ConfigParse { .. })
        ));
        assert!(matches!(
            load_client_config(&no_redirect, READONLY),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn missing_client_secret_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_client_config(dir.path().join("nope.json"), READONLY).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn saved_token_loads_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token = sample_token();

        save_token(&path, &token).unwrap();
        assert_eq!(load_token(&path).unwrap(), token);

        let without_refresh = TokenRecord {
            refresh_token: None,
            expiry: None,
            ..token
        };
        save_token(&path, &without_refresh).unwrap();
        assert_eq!(load_token(&path).unwrap(), without_refresh);
    }

    #[test]
    fn token_file_uses_wire_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        save_token(&path, &sample_token()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["access_token"], "ya29.access");
        assert_eq!(value["token_type"], "Bearer");
        assert_eq!(value["refresh_token"], "1//refresh");
        assert_eq!(value["expiry"], "2030-05-17T08:30:00Z");
    }

    #[test]
    fn reads_token_with_offset_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "token.json",
            r#"{"access_token":"a","token_type":"Bearer","refresh_token":"r",
                "expiry":"2030-05-17T10:30:00.123456+02:00"}"#,
        );

        let token = load_token(&path).unwrap();
        assert_eq!(
            token.expiry.unwrap().timestamp(),
            Utc.with_ymd_and_hms(2030, 5, 17, 8, 30, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn zero_expiry_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "token.json",
            r#"{"access_token":"a","token_type":"Bearer","expiry":"0001-01-01T00:00:00Z"}"#,
        );

        let token = load_token(&path).unwrap();
        assert_eq!(token.expiry, None);
        assert!(!token.is_expired());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "token.json", "{}");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save_token(&path, &sample_token()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_or_garbled_token_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_token(dir.path().join("token.json")),
            Err(Error::TokenNotFound(_))
        ));

        let garbled = write_file(&dir, "token.json", "not json");
        assert!(matches!(load_token(&garbled), Err(Error::TokenParse { .. })));
    }

    #[test]
    fn expiry_respects_margin() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let mut token = sample_token();

        token.expiry = Some(now + Duration::hours(1));
        assert!(!token.is_expired_at(now));

        token.expiry = Some(now + Duration::seconds(5));
        assert!(token.is_expired_at(now));

        token.expiry = Some(now - Duration::minutes(1));
        assert!(token.is_expired_at(now));

        token.expiry = None;
        assert!(!token.is_expired_at(now));
    }
}
