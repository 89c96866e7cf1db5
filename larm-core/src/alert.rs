//! ## larm-core::alert
//! **The alert under construction**
//!
//! ### Expectations:
//! - At most one alert is open per agent; it is an [`AlertDraft`] borrowing the agent
//! - Symptoms and attachment references live in fixed-capacity storage sized at build time
//! - Attachment bytes are borrowed until the draft is ended or dropped
//! - A capacity failure leaves the draft unchanged

use heapless::Vec;
use larm_entry::{encode_alert_record, record_checksum, AlertFields, RecordError, RecordLayout, Symptom};
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::codes::StatusCode;
use crate::dispatch::{Attempt, EndTypes};
use crate::error::Error;

/// Largest symptom capacity any configuration may ask for.
pub const SYMPTOM_CAP: usize = 32;
/// Largest attachment capacity any configuration may ask for.
pub const ATTACHMENT_CAP: usize = 16;
/// Largest description length any configuration may ask for.
pub const DESCRIPTION_CAP: usize = 240;

const CHECKSUM_LEN: usize = 4;

/// Alert fields owned by the agent between `begin` and delivery.
#[derive(Debug, Default)]
pub(crate) struct AlertSlot {
    pub(crate) alert_type: u32,
    pub(crate) alert_id: u32,
    pub(crate) description: Vec<u8, DESCRIPTION_CAP>,
    pub(crate) symptoms: Vec<Symptom, SYMPTOM_CAP>,
    pub(crate) checksum: u32,
}

impl AlertSlot {
    pub(crate) fn reset(&mut self) {
        self.alert_type = 0;
        self.alert_id = 0;
        self.description.clear();
        self.symptoms.clear();
        self.checksum = 0;
    }

    pub(crate) fn open(&mut self, alert_type: u32, alert_id: u32, description: &[u8]) {
        self.reset();
        self.alert_type = alert_type;
        self.alert_id = alert_id;
        let len = description.len().min(DESCRIPTION_CAP);
        // Cannot fail: the slice is clamped to the capacity.
        let _ = self.description.extend_from_slice(&description[..len]);
    }

    /// Writes the record into `out` with the current checksum.
    pub(crate) fn encode_record(
        &self,
        out: &mut [u8],
        layout: RecordLayout,
        product: u32,
        firmware_version: &[u8],
    ) -> Result<usize, RecordError> {
        encode_alert_record(
            out,
            layout,
            &AlertFields {
                product,
                alert_type: self.alert_type,
                symptoms: &self.symptoms,
                firmware_version,
                description: &self.description,
                checksum: self.checksum,
            },
        )
    }
}

/// A borrowed attachment: raw bytes plus a short name.
#[derive(Debug, Clone, Copy)]
pub struct Attachment<'d> {
    description: &'d str,
    data: &'d [u8],
}

impl<'d> Attachment<'d> {
    pub fn description(&self) -> &'d str {
        self.description
    }

    pub fn data(&self) -> &'d [u8] {
        self.data
    }

    /// Number of chunk entries needed at the given chunk size.
    pub fn chunk_count(&self, max_chunk_size: usize) -> usize {
        self.data.len().div_ceil(max_chunk_size.max(1))
    }
}

/// An open alert. Ending it hands the alert to the dispatch orchestrator;
/// dropping it discards the alert.
pub struct AlertDraft<'a, 'd> {
    agent: &'a mut Agent,
    attachments: Vec<Attachment<'d>, ATTACHMENT_CAP>,
}

impl<'a, 'd> AlertDraft<'a, 'd> {
    pub(crate) fn new(agent: &'a mut Agent) -> Self {
        Self {
            agent,
            attachments: Vec::new(),
        }
    }

    pub fn alert_id(&self) -> u32 {
        self.agent.alert.alert_id
    }

    pub fn alert_type(&self) -> u32 {
        self.agent.alert.alert_type
    }

    pub fn description(&self) -> &[u8] {
        &self.agent.alert.description
    }

    pub fn symptom_count(&self) -> usize {
        self.agent.alert.symptoms.len()
    }

    pub fn symptom(&self, index: usize) -> Option<Symptom> {
        self.agent.alert.symptoms.get(index).copied()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn attachment(&self, index: usize) -> Option<&Attachment<'d>> {
        self.attachments.get(index)
    }

    pub fn add_symptom(&mut self, id: u32, value: u32) -> Result<&mut Self, Error> {
        let max = self.agent.limits().max_symptoms;
        if self.agent.alert.symptoms.len() >= max {
            warn!(alert_id = self.alert_id(), max, "Symptom capacity reached");
            self.agent.session.set_status(StatusCode::MaxSymptomsExceeded);
            return Err(Error::SymptomsFull(max));
        }
        self.agent
            .alert
            .symptoms
            .push(Symptom { id, value })
            .map_err(|_| Error::SymptomsFull(max))?;
        Ok(self)
    }

    pub fn add_attachment(&mut self, description: &'d str, data: &'d [u8]) -> Result<&mut Self, Error> {
        let limits = *self.agent.limits();
        if self.attachments.len() >= limits.max_attachments {
            return Err(Error::AttachmentsFull(limits.max_attachments));
        }
        if description.is_empty() {
            return Err(Error::InvalidArgument("attachment description is empty"));
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument("attachment data is empty"));
        }
        if u32::try_from(data.len()).is_err() {
            return Err(Error::InvalidArgument("attachment is larger than 4 GiB"));
        }
        let attachment = Attachment { description, data };
        if u16::try_from(attachment.chunk_count(limits.max_chunk_size)).is_err() {
            return Err(Error::InvalidArgument("attachment needs too many chunks"));
        }

        self.attachments
            .push(attachment)
            .map_err(|_| Error::AttachmentsFull(limits.max_attachments))?;
        debug!(
            alert_id = self.alert_id(),
            description,
            size = data.len(),
            "Attachment added"
        );
        Ok(self)
    }

    /// Clears symptoms, attachments and description, keeping the alert id.
    pub fn reset(&mut self) {
        let alert = &mut self.agent.alert;
        alert.symptoms.clear();
        alert.description.clear();
        alert.checksum = 0;
        self.attachments.clear();
    }

    /// Encodes the alert record and stores its checksum.
    pub fn finalize_checksum(&mut self) -> Result<u32, Error> {
        self.agent.seal_record()?;
        Ok(self.agent.alert.checksum)
    }

    /// Delivers through the configured plan.
    pub fn end(self) -> Result<Attempt, Error> {
        let plan = self.agent.delivery_plan();
        self.end_with(plan)
    }

    /// Delivers through the configured plan without the cloud.
    pub fn end_offline(self) -> Result<Attempt, Error> {
        let plan = self.agent.delivery_plan() - EndTypes::SEND;
        self.end_with(plan)
    }

    pub fn end_with(mut self, plan: EndTypes) -> Result<Attempt, Error> {
        let outcome = self.agent.deliver(&self.attachments, plan);
        self.attachments.clear();
        outcome
    }
}

impl Drop for AlertDraft<'_, '_> {
    fn drop(&mut self) {
        self.agent.alert.reset();
    }
}

impl Agent {
    /// Encodes the open alert into the record buffer, computing the
    /// checksum over everything before it. Returns the record length.
    pub(crate) fn seal_record(&mut self) -> Result<usize, Error> {
        let layout = self.limits().record_layout();
        let (alert, record, product, firmware_version) = self.record_parts();

        alert.checksum = 0;
        let len = alert.encode_record(record, layout, product, firmware_version)?;
        alert.checksum = record_checksum(&record[..len - CHECKSUM_LEN]);
        alert.encode_record(record, layout, product, firmware_version)?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use larm_entry::AlertRecord;

    use super::*;
    use crate::codes::{alert_type, symptom};
    use crate::testing::{config, ports, Journal};

    fn agent() -> Agent {
        Agent::new(&config(), ports(&Journal::shared())).unwrap()
    }

    #[test]
    fn begin_assigns_increasing_ids() {
        let mut agent = agent();
        let first = agent.begin(alert_type::ASSERT_FAILED, "first").unwrap().alert_id();
        let second = agent.begin(alert_type::ASSERT_FAILED, "second").unwrap().alert_id();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn begin_requires_description() {
        let mut agent = agent();
        assert!(matches!(
            agent.begin(alert_type::ASSERT_FAILED, ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn begin_requires_enabled_agent() {
        let mut agent = agent();
        agent.disable(false).unwrap();
        assert!(matches!(
            agent.begin(alert_type::ASSERT_FAILED, "nope"),
            Err(Error::Disabled)
        ));
    }

    #[test]
    fn description_is_truncated() {
        let mut cfg = config();
        cfg.limits.description_max_len = 8;
        let mut agent = Agent::new(&cfg, ports(&Journal::shared())).unwrap();
        let draft = agent.begin(alert_type::OVERLOAD, "queue overflowed").unwrap();
        assert_eq!(draft.description(), b"queue ov");
    }

    #[test]
    fn symptom_capacity_is_exact() {
        let mut agent = agent();
        {
            let mut draft = agent.begin(alert_type::MANUAL_TRACE, "trace").unwrap();
            for i in 0..4 {
                draft.add_symptom(symptom::LINE, i).unwrap();
            }
            assert_eq!(draft.add_symptom(symptom::LINE, 99).err(), Some(Error::SymptomsFull(4)));
            assert_eq!(draft.symptom_count(), 4);
            assert_eq!(draft.symptom(3), Some(Symptom { id: symptom::LINE, value: 3 }));
            assert_eq!(draft.symptom(4), None);
        }
        assert_eq!(agent.status(), StatusCode::MaxSymptomsExceeded);
    }

    #[test]
    fn attachment_rules() {
        let mut agent = agent();
        let data = [7u8; 10];
        let mut draft = agent.begin(alert_type::BAD_MESSAGE, "bad frame").unwrap();

        assert!(draft.add_attachment("", &data).is_err());
        assert!(draft.add_attachment("frame", &[]).is_err());
        draft.add_attachment("frame", &data).unwrap();
        draft.add_attachment("frame2", &data[..3]).unwrap();
        assert_eq!(
            draft.add_attachment("frame3", &data).err(),
            Some(Error::AttachmentsFull(2))
        );
        assert_eq!(draft.attachment_count(), 2);
        assert_eq!(draft.attachment(1).map(|a| a.data().len()), Some(3));
    }

    #[test]
    fn reset_clears_contents() {
        let mut agent = agent();
        let data = [1u8; 4];
        let mut draft = agent.begin(alert_type::HEARTBEAT, "beat").unwrap();
        draft.add_symptom(symptom::PC, 0x0800_1234).unwrap();
        draft.add_attachment("blob", &data).unwrap();
        draft.reset();
        assert_eq!(draft.symptom_count(), 0);
        assert_eq!(draft.attachment_count(), 0);
        assert!(draft.description().is_empty());
        assert_eq!(draft.alert_id(), 1);
    }

    #[test]
    fn dropping_a_draft_discards_it() {
        let mut agent = agent();
        {
            let mut draft = agent.begin(alert_type::HEARTBEAT, "beat").unwrap();
            draft.add_symptom(symptom::PC, 1).unwrap();
        }
        assert!(agent.alert.symptoms.is_empty());
        assert!(agent.alert.description.is_empty());
    }

    #[test]
    fn finalized_record_decodes() {
        let mut agent = agent();
        let mut draft = agent.begin(alert_type::HARDFAULT, "boom").unwrap();
        draft.add_symptom(symptom::STACKPTR, 0x2000_0100).unwrap();
        assert_eq!(draft.finalize_checksum().unwrap(), 0);
        drop(draft);

        let layout = agent.limits().record_layout();
        let record = AlertRecord::decode(&agent.record_buffer()[..layout.encoded_len()]).unwrap();
        assert_eq!(record.alert_type, alert_type::HARDFAULT);
        assert_eq!(record.description(), b"boom");
        assert_eq!(record.firmware_version(), b"0.1.0");
        assert_eq!(
            record.symptoms().collect::<std::vec::Vec<_>>(),
            vec![Symptom { id: symptom::STACKPTR, value: 0x2000_0100 }]
        );
    }
}
