use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::Notify;

use ipns_inspector::api::StateValue;
use ipns_inspector::machine::Stage;
use ipns_inspector::record::{codec, signer, RecordVersion};
use ipns_inspector::{
    name, spawn, Ed25519KeyManager, Event, FetchError, Fetcher, FormField, Machine,
    MachineConfig, MachineHandle, MemoryFetcher, Mode, ParsedName, Snapshot, ValidationError,
};

/// Holds every fetch until released, then answers from an inner store.
#[derive(Default)]
struct GatedFetcher {
    gate: Notify,
    store: MemoryFetcher,
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, name: &ParsedName) -> Result<Vec<u8>, FetchError> {
        self.gate.notified().await;
        self.store.fetch(name).await
    }
}

fn handle_with<F: Fetcher>(fetcher: Arc<F>, config: MachineConfig) -> MachineHandle {
    spawn(Machine::new(fetcher, Ed25519KeyManager, config))
}

async fn fill_form(handle: &MachineHandle, value: &str, ttl: &str, validity: &str, sequence: &str) {
    for &(field, v) in &[
        (FormField::Value, value),
        (FormField::Ttl, ttl),
        (FormField::Validity, validity),
        (FormField::Sequence, sequence),
    ] {
        handle
            .dispatch(Event::UpdateForm {
                field: field,
                value: v.into(),
            })
            .await
            .unwrap();
    }
}

/// Create a record on `handle` and return its name and wire bytes.
async fn create(handle: &MachineHandle, value: &str) -> (ParsedName, Vec<u8>) {
    fill_form(handle, value, "60", "3600", "0").await;
    let snapshot = handle.dispatch(Event::Create).await.unwrap();
    assert!(snapshot.error.is_none(), "{:?}", snapshot.error);

    let name = name::validate(&snapshot.name_inspecting.unwrap()).unwrap();
    let bytes = BASE64.decode(snapshot.record.unwrap().encoded.unwrap()).unwrap();
    (name, bytes)
}

async fn inspect(handle: &MachineHandle, name: &str) -> Snapshot {
    handle
        .dispatch(Event::UpdateName { value: name.into() })
        .await
        .unwrap();
    let started = handle.dispatch(Event::InspectName).await.unwrap();
    assert!(started.fetching_record);
    handle.wait_until(|s| !s.fetching_record).await.unwrap()
}

#[tokio::test]
async fn name_validation_scenarios() {
    let handle = handle_with(Arc::new(MemoryFetcher::new()), MachineConfig::default());

    let snapshot = handle
        .dispatch(Event::UpdateName {
            value: "k51qzi5uqu5dlvj2baxnqndepeb86cbk3ng7n3i46uzyxzyqj2xjonzllnv0v8".into(),
        })
        .await
        .unwrap();
    assert_eq!(snapshot.name_validation_error, None);

    let snapshot = handle
        .dispatch(Event::UpdateName { value: "".into() })
        .await
        .unwrap();
    assert_eq!(snapshot.name_validation_error, Some(ValidationError::EmptyInput));

    let snapshot = handle
        .dispatch(Event::UpdateName {
            value: "QmPVGjYFugq4XUyBfoTHG6c3qxfBS26jEdaFM1gdAVuMZ2".into(),
        })
        .await
        .unwrap();
    assert_eq!(snapshot.name_validation_error, Some(ValidationError::WrongKeyType));
}

#[tokio::test]
async fn create_then_inspect() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let handle = handle_with(fetcher.clone(), MachineConfig::default());

    handle
        .dispatch(Event::UpdateMode { value: Mode::Create })
        .await
        .unwrap();
    let (name, bytes) = create(
        &handle,
        "/ipfs/bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
    )
    .await;

    let record = codec::decode(&bytes).unwrap();
    assert_eq!(record.ttl, 60_000_000_000);
    assert_eq!(record.sequence, 0);
    assert!(signer::verify(&record, name.public_key()).is_ok());

    // A second machine sees the same record through the fetcher
    fetcher.publish(&name, bytes.clone());
    let reader = handle_with(fetcher, MachineConfig::default());
    let snapshot = inspect(&reader, name.as_str()).await;

    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.state, StateValue::Inspect);
    assert_eq!(snapshot.name_inspecting.as_deref(), Some(name.as_str()));

    let view = snapshot.record.unwrap();
    assert_eq!(view.version, RecordVersion::V2);
    assert_eq!(view.ttl, "60 seconds");
    assert_eq!(view.sequence, 0);
    assert!(!view.expired);
    assert_eq!(view.encoded, Some(BASE64.encode(&bytes)));
}

#[tokio::test]
async fn create_rejects_long_validity() {
    let handle = handle_with(Arc::new(MemoryFetcher::new()), MachineConfig::default());
    let before = handle.snapshot().keypair;

    fill_form(&handle, "/ipfs/bafy", "60", "40000000", "0").await;
    let snapshot = handle.dispatch(Event::Create).await.unwrap();

    assert!(snapshot.record.is_none());
    let err = snapshot.error.unwrap();
    assert_eq!(err.stage, Stage::Create);
    assert!(err.message.contains("invalid form data"), "{}", err.message);
    assert_eq!(snapshot.keypair, before);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let writer = handle_with(Arc::new(MemoryFetcher::new()), MachineConfig::default());
    let (name, bytes) = create(&writer, "/ipfs/bafy").await;

    let mut record = codec::decode(&bytes).unwrap();
    let last = record.signature_v2.len() - 1;
    record.signature_v2[last] ^= 0x80;
    fetcher.publish(&name, codec::encode(&record).unwrap());

    let reader = handle_with(fetcher, MachineConfig::default());
    let snapshot = inspect(&reader, name.as_str()).await;

    assert!(snapshot.record.is_none());
    let err = snapshot.error.unwrap();
    assert_eq!(err.stage, Stage::Verify);
    assert!(err.message.contains("signature mismatch"), "{}", err.message);
}

#[tokio::test]
async fn v1_compatible_records_verify() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let config = MachineConfig {
        v1_compatible: true,
        ..MachineConfig::default()
    };
    let writer = handle_with(Arc::new(MemoryFetcher::new()), config);
    let (name, bytes) = create(&writer, "/ipfs/bafy").await;
    fetcher.publish(&name, bytes);

    let reader = handle_with(fetcher, MachineConfig::default());
    let snapshot = inspect(&reader, name.as_str()).await;

    assert!(snapshot.error.is_none());
    let view = snapshot.record.unwrap();
    assert_eq!(view.version, RecordVersion::V1V2);
    assert!(view.signature_v1.is_some());
}

#[tokio::test]
async fn inspect_while_fetching_is_noop() {
    let fetcher = Arc::new(GatedFetcher::default());
    let name = ParsedName::from_public_key([4u8; 32]);
    let handle = handle_with(fetcher.clone(), MachineConfig::default());

    handle
        .dispatch(Event::UpdateName { value: name.to_string() })
        .await
        .unwrap();
    let first = handle.dispatch(Event::InspectName).await.unwrap();
    assert!(first.fetching_record);

    let second = handle.dispatch(Event::InspectName).await.unwrap();
    assert_eq!(second, first);

    fetcher.gate.notify_one();
    let done = handle.wait_until(|s| !s.fetching_record).await.unwrap();
    assert_eq!(done.error.unwrap().stage, Stage::Fetch);
}

#[tokio::test]
async fn late_reply_for_edited_name_is_discarded() {
    let fetcher = Arc::new(GatedFetcher::default());
    let writer = handle_with(Arc::new(MemoryFetcher::new()), MachineConfig::default());
    let (name, bytes) = create(&writer, "/ipfs/bafy").await;
    fetcher.store.publish(&name, bytes);

    let handle = handle_with(fetcher.clone(), MachineConfig::default());
    handle
        .dispatch(Event::UpdateName { value: name.to_string() })
        .await
        .unwrap();
    handle.dispatch(Event::InspectName).await.unwrap();

    // Edit the input while the reply is held back
    handle
        .dispatch(Event::UpdateName { value: "k51qzi5uqu5d".into() })
        .await
        .unwrap();
    fetcher.gate.notify_one();

    let done = handle.wait_until(|s| !s.fetching_record).await.unwrap();
    assert!(done.record.is_none());
    assert!(done.name_inspecting.is_none());
    assert!(done.error.is_none());
    assert_eq!(done.name_validation_error, Some(ValidationError::InvalidEncoding));
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let fetcher = Arc::new(MemoryFetcher::with_delay(Duration::from_secs(120)));
    let config = MachineConfig::from_json_str(r#"{ "fetch_timeout_secs": 2 }"#).unwrap();
    let handle = handle_with(fetcher, config);

    let name = ParsedName::from_public_key([8u8; 32]);
    let snapshot = inspect(&handle, name.as_str()).await;

    let err = snapshot.error.unwrap();
    assert_eq!(err.stage, Stage::Fetch);
    assert!(err.message.contains("timed out"), "{}", err.message);
}

#[tokio::test]
async fn machine_stops_with_last_handle() {
    let handle = handle_with(Arc::new(MemoryFetcher::new()), MachineConfig::default());
    let mut rx = handle.subscribe();
    drop(handle);

    // The sender side goes away once the task exits
    assert!(rx.changed().await.is_err());
}
