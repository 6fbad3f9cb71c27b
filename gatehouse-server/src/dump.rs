//! Raw response dumps for debugging the OAuth2 flow.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use http::StatusCode;

use rand::distr::{Alphanumeric, SampleString as _};

use serde_json::{Value, json};

/// Keys that are blanked out before a body touches the disk.
const REDACTED_KEYS: [&str; 2] = ["access_token", "refresh_token"];

/// Length of the random part of dump file names.
const SUFFIX_LENGTH: usize = 6;

/// A directory Discord responses are written to.
#[derive(Clone, Debug)]
pub struct Dump {
    dir: Arc<PathBuf>,
}

impl Dump {
    /// Opens a dump directory, creating it if it doesn't exist.
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Dump> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        Ok(Dump { dir: Arc::new(dir) })
    }

    /// The directory dumps are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a response to `{label}-{unix millis}-{suffix}.json`.
    ///
    /// The suffix is random, so dumps written in the same millisecond don't
    /// overwrite each other.
    ///
    /// Failing to write is logged and otherwise ignored.
    pub async fn write(&self, label: &str, status: StatusCode, body: &[u8]) {
        let mut body = serde_json::from_slice::<Value>(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        redact(&mut body);

        let document = json!({
            "status": status.as_u16(),
            "body": body,
        });

        let path = self.dir.join(format!(
            "{}-{}-{}.json",
            label,
            Utc::now().timestamp_millis(),
            Alphanumeric.sample_string(&mut rand::rng(), SUFFIX_LENGTH),
        ));

        let contents = match serde_json::to_vec_pretty(&document) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(%err, "failed to serialize dump");
                return;
            }
        };

        match tokio::fs::write(&path, contents).await {
            Ok(()) => tracing::debug!(path = %path.display(), "dumped response"),
            Err(err) => tracing::warn!(path = %path.display(), %err, "failed to write dump"),
        }
    }
}

/// Blanks out credentials in a response body.
pub fn redact(body: &mut Value) {
    if let Some(object) = body.as_object_mut() {
        for key in REDACTED_KEYS {
            if let Some(value) = object.get_mut(key) {
                *value = Value::String("[redacted]".into());
            }
        }
    }
}
