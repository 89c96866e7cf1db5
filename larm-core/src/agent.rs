//! ## larm-core::agent
//! **The reporting context object**
//!
//! ### Expectations:
//! - All buffers are sized and allocated once, at construction
//! - Construction succeeds only with a consistent configuration
//! - A persisted opt-out brings the agent up disabled, not failed

use larm_config::{
    DeliveryStrategy, LarmConfig, LimitsConfig, SessionIdStrategy, StorageStrategy,
};
use larm_entry::{
    align8, encoded_len, RecordLayout, ALERT_RECORD_VERSION, PAYLOAD_DESCRIPTION_WIDTH,
    PAYLOAD_HEADER_LEN,
};
use larm_telemetry::MetricsRecorder;
use tracing::{debug, info};

use crate::alert::{AlertDraft, AlertSlot, ATTACHMENT_CAP, DESCRIPTION_CAP, SYMPTOM_CAP};
use crate::codes::StatusCode;
use crate::dispatch::EndTypes;
use crate::error::Error;
use crate::ports::Ports;
use crate::session::{Session, DEVICE_NAME_CAP};

/// Largest firmware version any configuration may ask for.
pub const FIRMWARE_VERSION_CAP: usize = 240;

/// Capacities and field widths derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_symptoms: usize,
    pub max_attachments: usize,
    pub max_chunk_size: usize,
    pub description_max_len: usize,
    /// Alert entry description section, room for the text plus a NUL.
    pub description_width: usize,
    pub device_name_max_len: usize,
    pub device_name_width: usize,
    pub firmware_version_max_len: usize,
    pub firmware_version_width: usize,
}

impl Limits {
    pub fn from_config(config: &LimitsConfig) -> Result<Self, Error> {
        within("max_symptoms", config.max_symptoms, SYMPTOM_CAP)?;
        within("max_attachments", config.max_attachments, ATTACHMENT_CAP)?;
        within("max_chunk_size", config.max_chunk_size, usize::from(u16::MAX))?;
        within("description_max_len", config.description_max_len, DESCRIPTION_CAP)?;
        within("device_name_max_len", config.device_name_max_len, DEVICE_NAME_CAP)?;
        within(
            "firmware_version_max_len",
            config.firmware_version_max_len,
            FIRMWARE_VERSION_CAP,
        )?;

        Ok(Self {
            max_symptoms: config.max_symptoms,
            max_attachments: config.max_attachments,
            max_chunk_size: config.max_chunk_size,
            description_max_len: config.description_max_len,
            description_width: align8(config.description_max_len + 1),
            device_name_max_len: config.device_name_max_len,
            device_name_width: align8(config.device_name_max_len),
            firmware_version_max_len: config.firmware_version_max_len,
            firmware_version_width: align8(config.firmware_version_max_len + 1),
        })
    }

    pub fn record_layout(&self) -> RecordLayout {
        // Every value was bounded by `from_config` to fit a byte.
        RecordLayout {
            max_symptoms: self.max_symptoms as u8,
            firmware_version_width: self.firmware_version_width as u8,
            description_width: self.description_width as u8,
        }
    }

    pub fn alert_entry_len(&self) -> usize {
        encoded_len(
            self.device_name_width,
            self.description_width,
            self.record_layout().encoded_len(),
        )
    }

    pub fn chunk_entry_len(&self) -> usize {
        encoded_len(
            self.device_name_width,
            PAYLOAD_DESCRIPTION_WIDTH,
            self.max_chunk_size.max(PAYLOAD_HEADER_LEN),
        )
    }

    /// Smallest scratch buffer that holds any entry this agent frames.
    pub fn scratch_len(&self) -> usize {
        self.alert_entry_len().max(self.chunk_entry_len())
    }
}

fn within(field: &str, value: usize, max: usize) -> Result<(), Error> {
    if value == 0 || value > max {
        return Err(Error::Config(format!(
            "limits.{field} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}

/// One reporting agent: session state, the open alert slot, the scratch
/// buffer and the ports it delivers through.
pub struct Agent {
    pub(crate) limits: Limits,
    pub(crate) product_id: u32,
    pub(crate) firmware_version: Vec<u8>,
    pub(crate) plan: EndTypes,
    pub(crate) session: Session,
    pub(crate) alert: AlertSlot,
    pub(crate) scratch: Vec<u8>,
    pub(crate) record: Vec<u8>,
    pub(crate) ports: Ports,
    pub(crate) metrics: Option<MetricsRecorder>,
}

impl Agent {
    /// Initializes an agent and enables it unless a persisted opt-out says
    /// otherwise.
    pub fn new(config: &LarmConfig, ports: Ports) -> Result<Self, Error> {
        let limits = Limits::from_config(&config.limits)?;
        let firmware_version = config.session.firmware_version.as_bytes();
        if firmware_version.is_empty() || firmware_version.len() > limits.firmware_version_max_len {
            return Err(Error::Config(format!(
                "session.firmware_version must be 1 to {} bytes",
                limits.firmware_version_max_len
            )));
        }

        let scratch_len = match config.limits.scratch_buffer_size {
            Some(size) if size < limits.scratch_len() => {
                return Err(Error::Config(format!(
                    "limits.scratch_buffer_size {size} is below the {} bytes the largest entry needs",
                    limits.scratch_len()
                )))
            }
            Some(size) => size,
            None => limits.scratch_len(),
        };

        let mut agent = Self {
            limits,
            product_id: config.session.product_id,
            firmware_version: firmware_version.to_vec(),
            plan: EndTypes::from_config(&config.delivery),
            session: Session::new(&config.session, limits.device_name_max_len),
            alert: AlertSlot::default(),
            scratch: vec![0; scratch_len],
            record: vec![0; limits.record_layout().encoded_len()],
            ports,
            metrics: None,
        };

        if config.session.session_id_strategy == SessionIdStrategy::OnStartup {
            agent.session.resolve_session_id(&mut *agent.ports.identity)?;
        }

        if let Err(err) = agent.enable(false) {
            info!(error = %err, "Agent starts disabled");
        }

        info!(
            product_id = agent.product_id,
            firmware_version = %config.session.firmware_version,
            scratch_len,
            record_version = ALERT_RECORD_VERSION,
            "Agent initialized"
        );
        Ok(agent)
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&MetricsRecorder> {
        self.metrics.as_ref()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn enable(&mut self, override_disabled: bool) -> Result<(), Error> {
        self.session.enable(override_disabled, &mut *self.ports.storage)
    }

    pub fn disable(&mut self, remember: bool) -> Result<(), Error> {
        self.session.disable(remember, &mut *self.ports.storage)
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_enabled()
    }

    pub fn status(&self) -> StatusCode {
        self.session.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.session.set_status(status);
    }

    /// Id of the most recently started alert.
    pub fn alert_id(&self) -> u32 {
        self.session.alert_id()
    }

    pub fn unique_session_id(&mut self) -> Result<&[u8], Error> {
        self.session.resolve_session_id(&mut *self.ports.identity)
    }

    pub fn device_name(&mut self) -> Result<&[u8], Error> {
        self.session.resolve_device_name(&mut *self.ports.identity)
    }

    pub fn set_device_name(&mut self, name: &str) -> Result<(), Error> {
        self.session.set_device_name(name.as_bytes())
    }

    pub fn storage_strategy(&self) -> StorageStrategy {
        self.session.storage_strategy()
    }

    pub fn set_storage_strategy(&mut self, strategy: StorageStrategy) {
        self.session.set_storage_strategy(strategy);
    }

    pub fn delivery_strategy(&self) -> DeliveryStrategy {
        self.session.delivery_strategy()
    }

    pub fn set_delivery_strategy(&mut self, strategy: DeliveryStrategy) {
        self.session.set_delivery_strategy(strategy);
    }

    pub fn delivery_plan(&self) -> EndTypes {
        self.plan
    }

    pub fn set_delivery_plan(&mut self, plan: EndTypes) {
        self.plan = plan;
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    /// Opens a new alert. Any alert still open is discarded.
    pub fn begin<'d>(
        &mut self,
        alert_type: u32,
        description: &str,
    ) -> Result<AlertDraft<'_, 'd>, Error> {
        if !self.session.is_enabled() {
            return Err(Error::Disabled);
        }
        if description.is_empty() {
            return Err(Error::InvalidArgument("alert description is empty"));
        }

        let alert_id = self.session.generate_alert_id();
        let mut len = description.len().min(self.limits.description_max_len);
        while !description.is_char_boundary(len) {
            len -= 1;
        }
        self.alert.open(alert_type, alert_id, &description.as_bytes()[..len]);

        debug!(alert_id, alert_type, "Alert begun");
        if let Some(metrics) = &self.metrics {
            metrics.inc_begun();
        }
        Ok(AlertDraft::new(self))
    }

    pub(crate) fn record_parts(&mut self) -> (&mut AlertSlot, &mut [u8], u32, &[u8]) {
        (
            &mut self.alert,
            self.record.as_mut_slice(),
            self.product_id,
            self.firmware_version.as_slice(),
        )
    }

    #[cfg(test)]
    pub(crate) fn record_buffer(&self) -> &[u8] {
        &self.record
    }
}
