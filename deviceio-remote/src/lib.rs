/*
This module is home to everything that talks to the device API on behalf
of a proxy.

Devices receive instant commands over a long-poll channel, acknowledge them,
and upload measurements and alerts in sequenced XML envelopes. All uploads
from one proxy draw their sequence number from the same generator so the
server can order them.
*/

mod ack;
mod config;
mod envelope;
mod link;
mod listener;
mod measure;
mod outbox;
mod parser;
mod poll;
mod request;
mod sequence;

pub use ack::AckSender;
pub use config::{DEFAULT_API_ENDPOINT, RemoteConfig, RequestConfig};
pub use envelope::{ENVELOPE_VERSION, Envelope, EnvelopeError, Records};
pub use link::DeviceLink;
pub use listener::{CommandListener, ListenerError, ListenerRegistry};
pub use measure::MeasurementSender;
pub use outbox::{Delivery, Outbox};
pub use parser::{ParseError, parse, parse_commands};
pub use poll::{ChannelError, ChannelState, LongPollChannel};
pub use request::{Poll, Post, RequestError, RequestMetrics};
pub use sequence::SequenceGenerator;

use deviceio_model as model;
use deviceio_util as util;
