//! The record lifecycle state machine.
//!
//! A [`Machine`] owns all inspector state and is driven one [`Event`] at a
//! time. Everything is synchronous except `INSPECT_NAME`, which hands back a
//! [`PendingFetch`] for the caller to run; its [`FetchOutcome`] comes back in
//! through [`Machine::settle`]. Outcomes are tagged with the generation and
//! name they were dispatched for, so a reply for a name the user has since
//! edited away from is dropped instead of being shown under the new input.

use std::fmt;
use std::sync::Arc;

use crate::api::types::{ErrorView, KeypairView, RecordView, Snapshot, StateValue};
use crate::config::MachineConfig;
use crate::errors::*;
use crate::fetcher::{FetchError, Fetcher};
use crate::key_types::{KeyManager, Keypair};
use crate::name::{self, ValidationError};
use crate::record::{codec, signer, Record};

mod form;
mod pending;

pub use self::form::{FormData, FormField, ValidForm, MAX_VALIDITY, MIN_SEQUENCE, MIN_TTL, MIN_VALIDITY};
pub use self::pending::{FetchFuture, FetchOutcome, FetchTicket, PendingFetch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Inspect,
    Create,
}

/// Everything the presentation layer can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    UpdateMode { value: Mode },
    UpdateName { value: String },
    InspectName,
    GenerateNewKey,
    UpdateForm { field: FormField, value: String },
    Create,
}

impl Event {
    fn needs_ready(&self) -> bool {
        match *self {
            Event::InspectName | Event::GenerateNewKey | Event::Create => true,
            _ => false,
        }
    }
}

/// Which step of an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Decode,
    Verify,
    KeyGeneration,
    Create,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Verify => "verify",
            Stage::KeyGeneration => "key generation",
            Stage::Create => "create",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct OperationError {
    pub stage: Stage,
    pub error: Error,
}

impl OperationError {
    pub fn kind(&self) -> &ErrorKind {
        self.error.kind()
    }
}

/// All state owned by a machine.
#[derive(Debug)]
pub struct Context {
    pub form_data: FormData,
    pub keypair: Option<Keypair>,
    pub record: Option<Record>,
    /// Wire bytes of `record`
    pub record_bytes: Option<Vec<u8>>,
    pub name_to_inspect: String,
    /// The name `record` belongs to; lags `name_to_inspect` while the user types.
    pub name_inspecting: Option<String>,
    pub name_validation_error: Option<ValidationError>,
    pub fetching_record: bool,
    pub error: Option<OperationError>,
}

pub struct Machine<F, K> {
    fetcher: Arc<F>,
    key_manager: K,
    config: MachineConfig,
    ready: bool,
    mode: Mode,
    ctx: Context,
    generation: u64,
    in_flight: Option<u64>,
}

impl<F: Fetcher, K: KeyManager> Machine<F, K> {
    /// A machine in the `Init` state. Call `init` before use.
    pub fn new(fetcher: Arc<F>, key_manager: K, config: MachineConfig) -> Self {
        Machine {
            fetcher: fetcher,
            key_manager: key_manager,
            ctx: Context {
                form_data: FormData::from_config(&config),
                keypair: None,
                record: None,
                record_bytes: None,
                name_to_inspect: String::new(),
                name_inspecting: None,
                name_validation_error: None,
                fetching_record: false,
                error: None,
            },
            config: config,
            ready: false,
            mode: Mode::Inspect,
            generation: 0,
            in_flight: None,
        }
    }

    /// Generate the first key and become ready. A failed key generation is
    /// reported but not fatal; `CREATE` will try again.
    pub fn init(&mut self) {
        if self.ready {
            return;
        }

        match self.key_manager.generate() {
            Ok(kp) => self.ctx.keypair = Some(kp),
            Err(e) => self.fail(Stage::KeyGeneration, e),
        }

        self.ready = true;
        info!(mode = ?self.mode, "machine ready");
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Apply one event. Returns the fetch to run when `INSPECT_NAME` is accepted.
    pub fn send(&mut self, event: Event) -> Option<PendingFetch> {
        if !self.ready && event.needs_ready() {
            warn!(?event, "ignoring event before init");
            return None;
        }
        debug!(?event, "event");

        match event {
            Event::UpdateMode { value } => self.update_mode(value),
            Event::UpdateName { value } => self.update_name(value),
            Event::UpdateForm { field, value } => self.ctx.form_data.set(field, &value),
            Event::GenerateNewKey => self.generate_new_key(),
            Event::Create => self.create(),
            Event::InspectName => return self.inspect_name(),
        }

        None
    }

    /// Fold a finished fetch back into the machine.
    pub fn settle(&mut self, outcome: FetchOutcome) {
        let FetchOutcome { ticket, result } = outcome;

        if self.in_flight != Some(ticket.generation) {
            warn!(generation = ticket.generation, "ignoring reply for a fetch no longer in flight");
            return;
        }
        self.in_flight = None;
        self.ctx.fetching_record = false;

        if ticket.name != self.ctx.name_to_inspect {
            warn!(
                fetched = %ticket.name,
                current = %self.ctx.name_to_inspect,
                "discarding reply for a superseded name"
            );
            return;
        }

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(Stage::Fetch, ErrorKind::Fetch(e).into()),
        };

        let record = match codec::decode(&bytes) {
            Ok(record) => record,
            Err(e) => return self.fail(Stage::Decode, e),
        };

        if let Err(e) = signer::verify(&record, ticket.parsed.public_key()) {
            return self.fail(Stage::Verify, e);
        }

        info!(name = %ticket.name, sequence = record.sequence, "record verified");
        self.ctx.record = Some(record);
        self.ctx.record_bytes = Some(bytes);
        self.ctx.name_inspecting = Some(ticket.name);
        self.ctx.error = None;
    }

    /// Read-only view for the presentation layer.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: if self.ready {
                StateValue::from(self.mode)
            } else {
                StateValue::Init
            },
            form_data: self.ctx.form_data.clone(),
            keypair: self.ctx.keypair.as_ref().map(KeypairView::from),
            record: self
                .ctx
                .record
                .as_ref()
                .map(|record| RecordView::new(record, self.ctx.record_bytes.as_ref().map(|b| &b[..]))),
            name_to_inspect: self.ctx.name_to_inspect.clone(),
            name_inspecting: self.ctx.name_inspecting.clone(),
            name_validation_error: self.ctx.name_validation_error,
            fetching_record: self.ctx.fetching_record,
            error: self.ctx.error.as_ref().map(ErrorView::from),
        }
    }

    fn update_mode(&mut self, mode: Mode) {
        if self.ctx.fetching_record {
            warn!(?mode, "ignoring mode change while a fetch is in flight");
            return;
        }
        self.mode = mode;
    }

    fn update_name(&mut self, value: String) {
        self.ctx.name_validation_error = name::validate(&value).err();
        self.ctx.name_to_inspect = value;
    }

    fn inspect_name(&mut self) -> Option<PendingFetch> {
        if self.ctx.fetching_record
            || self.ctx.name_validation_error.is_some()
            || self.ctx.name_to_inspect.is_empty()
        {
            warn!(
                fetching = self.ctx.fetching_record,
                invalid = self.ctx.name_validation_error.is_some(),
                "ignoring inspect request"
            );
            return None;
        }

        let parsed = name::validate(&self.ctx.name_to_inspect).ok()?;

        self.generation += 1;
        self.in_flight = Some(self.generation);
        self.ctx.fetching_record = true;
        self.ctx.error = None;

        let ticket = FetchTicket {
            generation: self.generation,
            name: self.ctx.name_to_inspect.clone(),
            parsed: parsed.clone(),
        };
        info!(name = %ticket.name, generation = ticket.generation, "fetching record");

        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.config.fetch_timeout();
        let future: FetchFuture = Box::pin(async move {
            match tokio::time::timeout(timeout, fetcher.fetch(&parsed)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            }
        });

        Some(PendingFetch::new(ticket, future))
    }

    fn generate_new_key(&mut self) {
        match self.key_manager.generate() {
            Ok(kp) => {
                self.ctx.keypair = Some(kp);
                if let Some(Stage::KeyGeneration) = self.ctx.error.as_ref().map(|e| e.stage) {
                    self.ctx.error = None;
                }
            }
            Err(e) => self.fail(Stage::KeyGeneration, e),
        }
    }

    fn create(&mut self) {
        if self.ctx.fetching_record {
            warn!("ignoring create while a fetch is in flight");
            return;
        }

        let valid = match self.ctx.form_data.validate() {
            Ok(valid) => valid,
            Err(e) => return self.fail(Stage::Create, e),
        };

        if self.ctx.keypair.is_none() {
            match self.key_manager.generate() {
                Ok(kp) => self.ctx.keypair = Some(kp),
                Err(e) => return self.fail(Stage::KeyGeneration, e),
            }
        }

        let built = match self.ctx.keypair {
            Some(ref keypair) => build_record(valid, keypair, self.config.v1_compatible)
                .map(|(record, bytes)| (record, bytes, self.key_manager.public_identifier(keypair))),
            None => return,
        };

        match built {
            Ok((record, bytes, name)) => {
                info!(name = %name, sequence = record.sequence, validity = %record.validity, "record created");
                self.ctx.record = Some(record);
                self.ctx.record_bytes = Some(bytes);
                self.ctx.name_inspecting = Some(name.to_string());
                self.ctx.error = None;
            }
            Err(e) => self.fail(Stage::Create, e),
        }
    }

    fn fail(&mut self, stage: Stage, error: Error) {
        warn!(%stage, error = %render_chain(&error), "operation failed");
        self.ctx.error = Some(OperationError {
            stage: stage,
            error: error,
        });
    }
}

fn build_record(valid: ValidForm, keypair: &Keypair, v1_compatible: bool) -> Result<(Record, Vec<u8>)> {
    let fields = valid.into_fields()?;
    let record = signer::seal(fields, keypair, v1_compatible)?;
    let bytes = codec::encode(&record)?;
    Ok((record, bytes))
}
