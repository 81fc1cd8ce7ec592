//! Export of the reviewed flow as a single JSON delivery package.
//!
//! The package is serialized once by [`serialize_delivery_package`] and the
//! same string is handed to whichever channel delivers it, so a native save
//! and a download of the same state are byte-identical.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ExportError;
use crate::flow::model::{
    AnalyticsEventPayload, ConsistencyCheckResult, ContentMatrix, ExperimentRecord,
    IdentityModelCard, LaunchKit, MonetizationMap, MvpFlowState, OnboardingProfile,
    PersonaConstitution,
};

/// Literal schema tag written into every package.
pub const DELIVERY_SCHEMA_VERSION: &str = "1.1.0";

pub const DELIVERY_MIME_TYPE: &str = "application/json";

/// `bss-identity-review-{unix millis}.json`
pub fn delivery_file_name(at: DateTime<Utc>) -> String {
    format!("bss-identity-review-{}.json", at.timestamp_millis())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPackage {
    #[serde(rename = "schema_version")]
    pub schema_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<OnboardingProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_identity: Option<IdentityModelCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_identity: Option<IdentityModelCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constitution: Option<PersonaConstitution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_kit: Option<LaunchKit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_check: Option<ConsistencyCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_matrix: Option<ContentMatrix>,
    pub experiments: Vec<ExperimentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetization_map: Option<MonetizationMap>,
    pub events: Vec<AnalyticsEventPayload>,
}

impl DeliveryPackage {
    pub fn from_state(state: &MvpFlowState) -> Self {
        Self {
            schema_version: DELIVERY_SCHEMA_VERSION,
            profile: state.profile.clone(),
            primary_identity: state.selected_primary_model().cloned(),
            backup_identity: state.selected_backup_model().cloned(),
            constitution: state.persona.clone(),
            launch_kit: state.launch_kit.clone(),
            consistency_check: state.consistency_check.clone(),
            content_matrix: state.content_matrix.clone(),
            experiments: state.experiments.clone(),
            monetization_map: state.monetization_map.clone(),
            events: state.events.clone(),
        }
    }
}

/// Pretty JSON with two-space indentation.
pub fn serialize_delivery_package(package: &DeliveryPackage) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(package)?)
}

/// A privileged save dialog: the user picks a path, then text is written.
#[async_trait]
pub trait NativeSaveApi: Send + Sync {
    /// `None` means the user cancelled.
    async fn pick_save_path(&self, default_file_name: &str) -> Result<Option<PathBuf>, ExportError>;

    async fn write_text(&self, path: &Path, contents: &str) -> Result<(), ExportError>;
}

/// Fallback delivery of a named blob.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, file_name: &str, mime_type: &str, bytes: &[u8])
    -> Result<(), ExportError>;
}

/// Native save that always "picks" a preset path, or cancels when unset.
#[derive(Debug, Clone, Default)]
pub struct PresetPathSave {
    path: Option<PathBuf>,
}

impl PresetPathSave {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl NativeSaveApi for PresetPathSave {
    async fn pick_save_path(&self, _default_file_name: &str) -> Result<Option<PathBuf>, ExportError> {
        Ok(self.path.clone())
    }

    async fn write_text(&self, path: &Path, contents: &str) -> Result<(), ExportError> {
        write_file(path, contents.as_bytes()).await
    }
}

/// Download sink writing files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for DirectoryDownload {
    async fn deliver(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<(), ExportError> {
        let path = self.dir.join(file_name);
        tracing::debug!(path = %path.display(), mime_type, "Writing download");
        write_file(&path, bytes).await
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let wrap = |source| ExportError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
    }
    tokio::fs::write(path, bytes).await.map_err(wrap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Saved,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportChannel {
    Native,
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub status: ExportStatus,
    pub channel: ExportChannel,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

/// Caller choices for one export.
#[derive(Clone, Default)]
pub struct ExportOptions {
    /// Overrides [`delivery_file_name`].
    pub file_name: Option<String>,
    /// Preferred when present.
    pub native: Option<Arc<dyn NativeSaveApi>>,
    /// Download fallback; the caller's default sink is used when unset.
    pub download: Option<Arc<dyn DownloadSink>>,
}

/// Where a package goes.
pub enum DeliveryChannel<'a> {
    Native(&'a dyn NativeSaveApi),
    Download(&'a dyn DownloadSink),
}

/// Serialize `package` and deliver it through `channel`. Without a
/// `file_name` the current time names the file; it never enters the payload.
pub async fn export_delivery_package(
    package: &DeliveryPackage,
    file_name: Option<String>,
    channel: DeliveryChannel<'_>,
) -> Result<ExportOutcome, ExportError> {
    let file_name = file_name.unwrap_or_else(|| delivery_file_name(Utc::now()));
    let serialized = serialize_delivery_package(package)?;

    match channel {
        DeliveryChannel::Native(native) => {
            let Some(path) = native.pick_save_path(&file_name).await? else {
                tracing::info!(file = %file_name, "Export cancelled");
                return Ok(ExportOutcome {
                    status: ExportStatus::Cancelled,
                    channel: ExportChannel::Native,
                    file_name,
                    file_path: None,
                });
            };
            native.write_text(&path, &serialized).await?;
            tracing::info!(path = %path.display(), "Exported delivery package");
            Ok(ExportOutcome {
                status: ExportStatus::Saved,
                channel: ExportChannel::Native,
                file_name,
                file_path: Some(path),
            })
        }
        DeliveryChannel::Download(sink) => {
            sink.deliver(&file_name, DELIVERY_MIME_TYPE, serialized.as_bytes())
                .await?;
            tracing::info!(file = %file_name, "Delivered package as download");
            Ok(ExportOutcome {
                status: ExportStatus::Saved,
                channel: ExportChannel::Web,
                file_name,
                file_path: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::{AnalyticsEventName, IdentityModelCard};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl DownloadSink for RecordingSink {
        async fn deliver(
            &self,
            file_name: &str,
            mime_type: &str,
            bytes: &[u8],
        ) -> Result<(), ExportError> {
            self.delivered.lock().unwrap().push((
                file_name.to_string(),
                mime_type.to_string(),
                bytes.to_vec(),
            ));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNative {
        written: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl NativeSaveApi for RecordingNative {
        async fn pick_save_path(&self, default_file_name: &str) -> Result<Option<PathBuf>, ExportError> {
            Ok(Some(PathBuf::from("/exports").join(default_file_name)))
        }

        async fn write_text(&self, path: &Path, contents: &str) -> Result<(), ExportError> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), contents.to_string()));
            Ok(())
        }
    }

    fn sample_state() -> MvpFlowState {
        let mut state = MvpFlowState::default();
        state.identity_models = vec![IdentityModelCard {
            id: "identity_1".into(),
            title: "Model 1".into(),
            ..Default::default()
        }];
        state.selected_primary_id = Some("identity_1".into());
        state.events.push(AnalyticsEventPayload {
            event_name: AnalyticsEventName::IdentitySelected,
            user_id: "user_1".into(),
            timestamp: Utc::now(),
            identity_id: Some("identity_1".into()),
            metadata: None,
        });
        state
    }

    #[tokio::test]
    async fn native_and_download_are_byte_identical() {
        let package = DeliveryPackage::from_state(&sample_state());
        let native = RecordingNative::default();
        let sink = RecordingSink::default();
        let name = delivery_file_name(Utc::now());

        let saved = export_delivery_package(
            &package,
            Some(name.clone()),
            DeliveryChannel::Native(&native),
        )
        .await
        .unwrap();
        let downloaded = export_delivery_package(
            &package,
            Some(name.clone()),
            DeliveryChannel::Download(&sink),
        )
        .await
        .unwrap();

        assert_eq!(saved.status, ExportStatus::Saved);
        assert_eq!(saved.channel, ExportChannel::Native);
        assert_eq!(downloaded.channel, ExportChannel::Web);
        assert_eq!(saved.file_name, downloaded.file_name);

        let native_text = native.written.lock().unwrap()[0].1.clone();
        let (file_name, mime, bytes) = sink.delivered.lock().unwrap()[0].clone();
        assert_eq!(native_text.as_bytes(), bytes.as_slice());
        assert_eq!(mime, DELIVERY_MIME_TYPE);
        assert_eq!(file_name, name);
    }

    #[test]
    fn package_shape() {
        let package = DeliveryPackage::from_state(&sample_state());
        let text = serialize_delivery_package(&package).unwrap();
        assert!(text.starts_with("{\n  \"schema_version\": \"1.1.0\""));
        assert!(!text.contains("exportedAt"));
        assert!(text.contains("\"primaryIdentity\""));
        assert!(!text.contains("\"backupIdentity\""));
    }

    #[tokio::test]
    async fn cancelled_native_save_writes_nothing() {
        let package = DeliveryPackage::from_state(&MvpFlowState::default());
        let outcome = export_delivery_package(
            &package,
            Some("custom.json".into()),
            DeliveryChannel::Native(&PresetPathSave::new(None)),
        )
        .await
        .unwrap();
        assert_eq!(outcome.status, ExportStatus::Cancelled);
        assert_eq!(outcome.file_name, "custom.json");
        assert!(outcome.file_path.is_none());
    }

    #[tokio::test]
    async fn directory_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDownload::new(dir.path().join("exports"));
        let package = DeliveryPackage::from_state(&sample_state());
        let outcome = export_delivery_package(&package, None, DeliveryChannel::Download(&sink))
            .await
            .unwrap();

        let written = std::fs::read_to_string(sink.dir().join(&outcome.file_name)).unwrap();
        assert_eq!(written, serialize_delivery_package(&package).unwrap());
    }

    #[test]
    fn file_name_uses_millis() {
        let at = DateTime::from_timestamp_millis(1_771_804_800_123).unwrap();
        assert_eq!(delivery_file_name(at), "bss-identity-review-1771804800123.json");
    }
}
