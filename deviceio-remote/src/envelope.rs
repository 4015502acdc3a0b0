use std::fmt::{self, Display, Write};

use quick_xml::escape::escape;
use thiserror::Error;

use crate::model::{Ack, Alert, Measurement, Param};
use crate::sequence::SequenceGenerator;
use crate::util::types::ProxyId;

/// Protocol version announced on every envelope
pub const ENVELOPE_VERSION: u32 = 2;

/// Records that cannot be put on the wire. These are caller mistakes, the
/// server would reject the envelope anyway.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("proxy id cannot be empty")]
    EmptyProxyId,

    #[error("{0} record without a device id")]
    MissingDeviceId(&'static str),

    #[error("{record} for device {device_id} has a param without a name")]
    UnnamedParam {
        record: &'static str,
        device_id: String,
    },

    #[error("alert for device {0} has no type")]
    MissingAlertType(String),
}

/// The records carried by one envelope. An envelope holds a single kind of
/// record.
#[derive(Debug, Clone, Copy)]
pub enum Records<'a> {
    Measurements(&'a [Measurement]),
    Alerts(&'a [Alert]),
    Acks(&'a [Ack]),
}

impl Records<'_> {
    pub fn len(&self) -> usize {
        match self {
            Records::Measurements(m) => m.len(),
            Records::Alerts(a) => a.len(),
            Records::Acks(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the record kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Records::Measurements(_) => "measurement",
            Records::Alerts(_) => "alert",
            Records::Acks(_) => "ack",
        }
    }

    fn validate(&self) -> Result<(), EnvelopeError> {
        match self {
            Records::Measurements(measurements) => {
                for m in measurements.iter() {
                    if m.device_id().is_empty() {
                        return Err(EnvelopeError::MissingDeviceId("measurement"));
                    }
                    check_params("measurement", m.device_id(), m.params())?;
                }
            }
            Records::Alerts(alerts) => {
                for a in alerts.iter() {
                    if a.device_id().is_empty() {
                        return Err(EnvelopeError::MissingDeviceId("alert"));
                    }
                    if a.kind().is_empty() {
                        return Err(EnvelopeError::MissingAlertType(a.device_id().to_string()));
                    }
                    check_params("alert", a.device_id(), a.params())?;
                }
            }
            // acks carry no free-form text
            Records::Acks(_) => {}
        }
        Ok(())
    }
}

fn check_params(record: &'static str, device_id: &str, params: &[Param]) -> Result<(), EnvelopeError> {
    if params.iter().any(|p| p.name().is_empty()) {
        return Err(EnvelopeError::UnnamedParam {
            record,
            device_id: device_id.to_owned(),
        });
    }
    Ok(())
}

/// A rendered outbound document, ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    seq: u64,
    xml: String,
}

impl Envelope {
    /// Validate `records` and render them under the next sequence number.
    ///
    /// The sequence is only consumed if the records are valid.
    pub fn build(
        proxy_id: &ProxyId,
        records: Records<'_>,
        sequence: &SequenceGenerator,
    ) -> Result<Self, EnvelopeError> {
        if proxy_id.is_empty() {
            return Err(EnvelopeError::EmptyProxyId);
        }
        records.validate()?;

        let seq = sequence.next();
        let xml = Document {
            proxy_id,
            seq,
            records,
        }
        .to_string();

        Ok(Self { seq, xml })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Encoded size in bytes, as sent in `Content-Length`
    pub fn len(&self) -> usize {
        self.xml.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xml.is_empty()
    }

    pub fn into_string(self) -> String {
        self.xml
    }
}

impl Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

struct Document<'a> {
    proxy_id: &'a ProxyId,
    seq: u64,
    records: Records<'a>,
}

impl Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        write!(
            f,
            r#"<h2s ver="{ENVELOPE_VERSION}" proxyId="{}" seq="{}">"#,
            escape(self.proxy_id.as_str()),
            self.seq
        )?;

        match self.records {
            Records::Measurements(measurements) => {
                for m in measurements {
                    write!(
                        f,
                        r#"<measure deviceId="{}" timestamp="{}">"#,
                        escape(m.device_id().as_str()),
                        escape(m.timestamp().as_str())
                    )?;
                    write_params(f, m.params())?;
                    f.write_str("</measure>")?;
                }
            }
            Records::Alerts(alerts) => {
                for a in alerts {
                    write!(
                        f,
                        r#"<alert deviceId="{}" type="{}">"#,
                        escape(a.device_id().as_str()),
                        escape(a.kind())
                    )?;
                    write_params(f, a.params())?;
                    f.write_str("</alert>")?;
                }
            }
            Records::Acks(acks) => {
                for ack in acks {
                    write!(
                        f,
                        r#"<response cmdId="{}" result="{}"/>"#,
                        ack.command_id,
                        ack.result.code()
                    )?;
                }
            }
        }

        f.write_str("</h2s>\n")
    }
}

fn write_params(f: &mut impl Write, params: &[Param]) -> fmt::Result {
    for p in params {
        write!(
            f,
            r#"<param name="{}">{}</param>"#,
            escape(p.name()),
            escape(p.value())
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceResult, Timestamp};

    const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

    fn proxy() -> ProxyId {
        ProxyId::from("0A1B2C3D4E5F")
    }

    fn timestamp() -> Timestamp {
        Timestamp::try_from("2012-05-11T14:03:09-07:00").unwrap()
    }

    #[test]
    fn it_renders_measurements() {
        let sequence = SequenceGenerator::new();
        let measurements = [Measurement::at("outlet-1", timestamp())
            .with_param(("outletStatus", "ON"))
            .with_param(("power", "12.5"))];

        let envelope =
            Envelope::build(&proxy(), Records::Measurements(&measurements), &sequence).unwrap();

        assert_eq!(envelope.seq(), 1);
        assert_eq!(
            envelope.as_str(),
            format!(
                "{HEADER}{}{}{}{}\n",
                r#"<h2s ver="2" proxyId="0A1B2C3D4E5F" seq="1">"#,
                r#"<measure deviceId="outlet-1" timestamp="2012-05-11T14:03:09-07:00">"#,
                r#"<param name="outletStatus">ON</param><param name="power">12.5</param></measure>"#,
                "</h2s>"
            )
        );
        assert_eq!(envelope.len(), envelope.as_str().len());
    }

    #[test]
    fn it_renders_acks_in_order() {
        let sequence = SequenceGenerator::new();
        let acks = [
            Ack::new(5, DeviceResult::Received),
            Ack::new(6, DeviceResult::Success),
        ];

        let envelope = Envelope::build(&proxy(), Records::Acks(&acks), &sequence).unwrap();

        assert_eq!(
            envelope.into_string(),
            format!(
                "{HEADER}{}\n",
                r#"<h2s ver="2" proxyId="0A1B2C3D4E5F" seq="1"><response cmdId="5" result="0"/><response cmdId="6" result="1"/></h2s>"#
            )
        );
    }

    #[test]
    fn it_renders_alerts() {
        let sequence = SequenceGenerator::new();
        let alerts = [Alert::new("motion-1", "MOTION_DETECTED").with_param(("zone", "kitchen"))];

        let envelope = Envelope::build(&proxy(), Records::Alerts(&alerts), &sequence).unwrap();

        assert!(envelope.as_str().contains(
            r#"<alert deviceId="motion-1" type="MOTION_DETECTED"><param name="zone">kitchen</param></alert>"#
        ));
    }

    #[test]
    fn it_escapes_text() {
        let sequence = SequenceGenerator::new();
        let measurements =
            [Measurement::at("a\"b", timestamp()).with_param(("note", "<1 & 2>"))];

        let envelope =
            Envelope::build(&proxy(), Records::Measurements(&measurements), &sequence).unwrap();

        assert!(envelope.as_str().contains(r#"deviceId="a&quot;b""#));
        assert!(
            envelope
                .as_str()
                .contains(r#"<param name="note">&lt;1 &amp; 2&gt;</param>"#)
        );
    }

    #[test]
    fn each_envelope_takes_the_next_sequence() {
        let sequence = SequenceGenerator::new();
        let acks = [Ack::new(1, DeviceResult::Received)];

        let first = Envelope::build(&proxy(), Records::Acks(&acks), &sequence).unwrap();
        sequence.next();
        let second = Envelope::build(&proxy(), Records::Acks(&acks), &sequence).unwrap();

        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 3);
        assert!(second.as_str().contains(r#"seq="3""#));
    }

    #[test]
    fn invalid_records_do_not_consume_a_sequence() {
        let sequence = SequenceGenerator::new();

        let unnamed = [Measurement::at("outlet-1", timestamp()).with_param(("", "x"))];
        assert_eq!(
            Envelope::build(&proxy(), Records::Measurements(&unnamed), &sequence),
            Err(EnvelopeError::UnnamedParam {
                record: "measurement",
                device_id: "outlet-1".into()
            })
        );

        let anonymous = [Measurement::at("", timestamp())];
        assert_eq!(
            Envelope::build(&proxy(), Records::Measurements(&anonymous), &sequence),
            Err(EnvelopeError::MissingDeviceId("measurement"))
        );

        let untyped = [Alert::new("motion-1", "")];
        assert_eq!(
            Envelope::build(&proxy(), Records::Alerts(&untyped), &sequence),
            Err(EnvelopeError::MissingAlertType("motion-1".into()))
        );

        let acks = [Ack::new(1, DeviceResult::Received)];
        assert_eq!(
            Envelope::build(&ProxyId::from(""), Records::Acks(&acks), &sequence),
            Err(EnvelopeError::EmptyProxyId)
        );

        assert_eq!(sequence.last(), 0);
    }

    #[test]
    fn the_envelope_is_well_formed_xml() {
        let sequence = SequenceGenerator::new();
        let measurements = [Measurement::at("x<y", timestamp()).with_param(("a&b", "</param>"))];
        let envelope =
            Envelope::build(&proxy(), Records::Measurements(&measurements), &sequence).unwrap();

        let mut reader = quick_xml::Reader::from_str(envelope.as_str());
        let mut values = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                quick_xml::events::Event::Text(t) => {
                    let text = t.unescape().unwrap();
                    if !text.trim().is_empty() {
                        values.push(text.into_owned());
                    }
                }
                quick_xml::events::Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(values, vec!["</param>".to_string()]);
    }
}
