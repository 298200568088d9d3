//! Upload of observation records to a GeoNature server.
//!
//! A record goes up in two phases: its header first, which yields the server
//! id, then each of its taxa against that id. [`OcctaxApi`] is the raw
//! endpoint seam; [`RemoteClient`] enforces the protocol around it.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::record::{ObservationRecord, Status, TaxonRecord};
use crate::settings::DateSettings;

mod http;
mod retry;

pub use http::HttpOcctaxApi;
pub use retry::{is_transient, retry, RetryConfig};

/// Endpoints of the Occtax module used by the synchronization.
#[async_trait]
pub trait OcctaxApi: Send + Sync {
    /// Creates the record header and returns its server id.
    async fn create_record(&self, payload: serde_json::Value) -> Result<i64>;

    /// Attaches one taxon occurrence to an existing record.
    async fn create_occurrence(&self, record_id: i64, payload: serde_json::Value) -> Result<()>;

    async fn delete_record(&self, record_id: i64) -> Result<()>;

    /// Uploads a local file and returns its media id.
    async fn upload_media(&self, path: &Path) -> Result<i64>;

    async fn delete_media(&self, media_id: i64) -> Result<()>;
}

pub struct RemoteClient<A> {
    api: A,
    dates: DateSettings,
}

impl<A: OcctaxApi> RemoteClient<A> {
    pub fn new(api: A, dates: DateSettings) -> Self {
        RemoteClient { api, dates }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Sends the record header. Only records marked for synchronization are
    /// accepted. Returns the record carrying its server id.
    pub async fn send_observation_record(
        &self,
        record: &ObservationRecord,
    ) -> Result<ObservationRecord> {
        if record.status != Status::ToSync {
            return Err(Error::InvalidStatus {
                id: record.internal_id,
                status: record.status,
            });
        }

        let payload = codec::header_payload(record, &self.dates)?;
        let id = self
            .api
            .create_record(payload)
            .await
            .map_err(|e| Error::synchronize(record.internal_id, e.to_string()))?;

        debug!(internal_id = record.internal_id, id, "record header sent");

        let mut sent = record.clone();
        sent.id = Some(id);
        Ok(sent)
    }

    /// Sends every taxon of a record whose header is already on the server.
    /// Stops at the first failing taxon, after removing the media uploaded
    /// for it.
    pub async fn send_taxa(&self, record: &ObservationRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| {
            Error::synchronize(record.internal_id, "record has no server id, send it first")
        })?;

        for taxon in record.taxa() {
            let media_ids = self.sync_media(record.internal_id, taxon).await?;

            let sent = async {
                let payload = codec::taxon_payload(taxon, &media_ids)?;
                self.api.create_occurrence(id, payload).await
            };

            if let Err(e) = sent.await {
                self.delete_media(media_ids.values().copied()).await;

                return Err(Error::synchronize(
                    record.internal_id,
                    format!("taxon {}: {e}", taxon.taxon().id),
                ));
            }

            debug!(internal_id = record.internal_id, id, cd_nom = taxon.taxon().id, "taxon sent");
        }

        Ok(())
    }

    /// Removes a record from the server, used to undo a partial upload.
    pub async fn delete_observation_record(&self, record: &ObservationRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| {
            Error::synchronize(record.internal_id, "record has no server id, nothing to delete")
        })?;

        self.api
            .delete_record(id)
            .await
            .map_err(|e| Error::synchronize(record.internal_id, e.to_string()))
    }

    /// Uploads the media files of a taxon's countings. Files gone from the
    /// disk since they were attached are dropped.
    async fn sync_media(
        &self,
        internal_id: i64,
        taxon: &TaxonRecord,
    ) -> Result<BTreeMap<String, i64>> {
        let mut media_ids = BTreeMap::new();

        for file in taxon.counting().iter().flat_map(|c| c.medias()) {
            if media_ids.contains_key(file) {
                continue;
            }

            if !tokio::fs::try_exists(file).await.unwrap_or(false) {
                warn!(internal_id, file = %file, "media no longer exists, dropping it");
                continue;
            }

            match self.api.upload_media(Path::new(file)).await {
                Ok(media_id) => {
                    media_ids.insert(file.clone(), media_id);
                }
                Err(e) => {
                    self.delete_media(media_ids.values().copied()).await;

                    return Err(Error::synchronize(
                        internal_id,
                        format!("media {file}: {e}"),
                    ));
                }
            }
        }

        Ok(media_ids)
    }

    async fn delete_media(&self, media_ids: impl Iterator<Item = i64>) {
        for media_id in media_ids {
            if let Err(e) = self.api.delete_media(media_id).await {
                warn!(media_id, error = %e, "failed to delete uploaded media");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    #![allow(clippy::unwrap_used)]

    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::OcctaxApi;
    use crate::error::{Error, Result};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        CreateRecord(serde_json::Value),
        CreateOccurrence(i64, serde_json::Value),
        DeleteRecord(i64),
        UploadMedia(String),
        DeleteMedia(i64),
    }

    /// In-memory server recording every call it receives.
    #[derive(Default)]
    pub struct FakeApi {
        pub calls: Mutex<Vec<Call>>,
        pub next_id: Mutex<i64>,
        /// Taxon ids whose occurrence creation fails.
        pub failing_taxa: Vec<i64>,
        pub failing_headers: bool,
        /// When set, header creation signals `entered` then waits on `gate`.
        pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeApi {
        pub fn new() -> Self {
            FakeApi {
                next_id: Mutex::new(100),
                ..FakeApi::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn next_id(&self) -> i64 {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            *next_id
        }

        fn refused() -> Error {
            Error::Io(std::io::Error::other("refused by fake server"))
        }
    }

    #[async_trait]
    impl OcctaxApi for FakeApi {
        async fn create_record(&self, payload: serde_json::Value) -> Result<i64> {
            if let Some((entered, gate)) = &self.gate {
                entered.notify_one();
                gate.notified().await;
            }

            self.record(Call::CreateRecord(payload));

            if self.failing_headers {
                return Err(Self::refused());
            }

            Ok(self.next_id())
        }

        async fn create_occurrence(&self, record_id: i64, payload: serde_json::Value) -> Result<()> {
            let cd_nom = payload["cd_nom"].as_i64().unwrap_or_default();
            self.record(Call::CreateOccurrence(record_id, payload));

            if self.failing_taxa.contains(&cd_nom) {
                return Err(Self::refused());
            }

            Ok(())
        }

        async fn delete_record(&self, record_id: i64) -> Result<()> {
            self.record(Call::DeleteRecord(record_id));
            Ok(())
        }

        async fn upload_media(&self, path: &Path) -> Result<i64> {
            self.record(Call::UploadMedia(path.display().to_string()));
            Ok(self.next_id())
        }

        async fn delete_media(&self, media_id: i64) -> Result<()> {
            self.record(Call::DeleteMedia(media_id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;
    use tempfile::TempDir;

    use super::fake::{Call, FakeApi};
    use super::*;
    use crate::record::{Taxon, Taxonomy};

    fn to_sync() -> ObservationRecord {
        let mut record = ObservationRecord::with_internal_id(1234);
        record.status = Status::ToSync;
        record.add_taxon(Taxon::new(8, "Ablette", Taxonomy::new("Animalia", None)));
        record
    }

    fn client(api: FakeApi) -> RemoteClient<FakeApi> {
        RemoteClient::new(api, DateSettings::default())
    }

    #[tokio::test]
    async fn test_send_header_requires_to_sync() {
        let client = client(FakeApi::new());
        let mut draft = to_sync();
        draft.status = Status::Draft;

        let error = client.send_observation_record(&draft).await.unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidStatus {
                id: 1234,
                status: Status::Draft
            }
        ));
        assert!(client.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_header_returns_server_id() {
        let client = client(FakeApi::new());

        let sent = client.send_observation_record(&to_sync()).await.unwrap();

        assert_eq!(sent.id, Some(101));
        assert_eq!(sent.internal_id, 1234);

        let calls = client.api().calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::CreateRecord(payload)
            if payload["properties"].get("t_occurrences_occtax").is_none()));
    }

    #[tokio::test]
    async fn test_send_taxa_requires_server_id() {
        let client = client(FakeApi::new());

        let error = client.send_taxa(&to_sync()).await.unwrap_err();

        assert!(matches!(error, Error::Synchronize { id: 1234, .. }));
        assert!(client.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_taxa_posts_one_occurrence_per_taxon() {
        let client = client(FakeApi::new());
        let mut record = to_sync();
        record.add_taxon(Taxon::new(79306, "Ophrys abeille", Taxonomy::new("Plantae", None)));
        record.id = Some(42);

        client.send_taxa(&record).await.unwrap();

        let calls = client.api().calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Call::CreateOccurrence(42, p) if p["cd_nom"] == json!(8)));
        assert!(matches!(&calls[1], Call::CreateOccurrence(42, p) if p["cd_nom"] == json!(79306)));
    }

    #[tokio::test]
    async fn test_media_are_uploaded_and_cleaned_up_on_failure() {
        let dir = TempDir::new().unwrap();
        let picture = dir.path().join("ablette.jpg");
        std::fs::write(&picture, b"jpeg").unwrap();
        let picture = picture.display().to_string();
        let gone = dir.path().join("gone.jpg").display().to_string();

        let mut record = to_sync();
        record.id = Some(42);
        let taxon = record.taxon_mut(8).unwrap();
        let mut counting = taxon.create_counting();
        counting.set_medias(vec![picture.clone(), gone]);
        taxon.add_or_update_counting(counting);

        let client = client(FakeApi {
            failing_taxa: vec![8],
            ..FakeApi::new()
        });

        let error = client.send_taxa(&record).await.unwrap_err();
        assert!(matches!(error, Error::Synchronize { id: 1234, .. }));

        let calls = client.api().calls();
        assert_eq!(calls[0], Call::UploadMedia(picture));
        assert!(
            matches!(&calls[1], Call::CreateOccurrence(42, p)
                if p["cor_counting_occtax"][0]["medias"] == json!([{"id_media": 101}]))
        );
        assert_eq!(calls[2], Call::DeleteMedia(101));
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_requires_server_id() {
        let client = client(FakeApi::new());
        let mut record = to_sync();

        assert!(client.delete_observation_record(&record).await.is_err());

        record.id = Some(42);
        client.delete_observation_record(&record).await.unwrap();

        assert_eq!(client.api().calls(), vec![Call::DeleteRecord(42)]);
    }
}
