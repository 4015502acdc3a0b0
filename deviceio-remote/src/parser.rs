//! Decoding of the command payloads pushed by the server.
//!
//! A payload carries zero or more `<command>` elements, each with optional
//! `<param>` children:
//!
//! ```xml
//! <command cmdId="11" deviceId="outlet-1" type="set">
//!   <param name="outletStatus">ON</param>
//! </command>
//! ```
//!
//! Commands may sit at the top level or inside any wrapper element. Element
//! and attribute names match without regard to case.

use std::borrow::Cow;
use std::collections::HashSet;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::{trace, warn};

use crate::model::{Command, CommandId, Param};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(String),

    #[error("<command> is missing the {0} attribute")]
    MissingAttribute(&'static str),

    #[error("invalid cmdId '{0}'")]
    InvalidCommandId(String),

    #[error("<param> is missing the name attribute")]
    MissingParamName,

    #[error("<param> outside of a <command>")]
    OrphanParam,

    #[error("nested <{0}> element")]
    Nested(&'static str),

    #[error("duplicate cmdId {0}")]
    DuplicateCommandId(CommandId),

    #[error("payload ended inside <{0}>")]
    Unterminated(&'static str),
}

fn xml_error(err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml(err.to_string())
}

/// Parse a command payload.
///
/// The payload is all-or-nothing: any structural problem, a command missing
/// one of its required attributes, or two commands sharing a `cmdId` makes
/// the whole payload invalid.
pub fn parse_commands(raw: &str) -> Result<Vec<Command>, ParseError> {
    let mut reader = Reader::from_str(raw);
    let mut decoder = Decoder::default();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(tag) => decoder.open(&tag, false)?,
            Event::Empty(tag) => decoder.open(&tag, true)?,
            Event::End(tag) => decoder.close(tag.name().as_ref())?,
            Event::Text(text) => decoder.text(text.unescape().map_err(xml_error)?),
            Event::CData(data) => decoder.text(String::from_utf8_lossy(&data)),
            Event::Eof => break,
            _ => {}
        }
    }

    decoder.finish()
}

/// Parse a command payload, treating an invalid one as empty.
///
/// This is what the long-poll channel uses: a payload that cannot be
/// trusted produces no commands, and therefore no acknowledgments either.
pub fn parse(raw: &str) -> Vec<Command> {
    match parse_commands(raw) {
        Ok(commands) => {
            trace!(count = commands.len(), "parsed commands");
            commands
        }
        Err(e) => {
            warn!("discarding command payload: {e}");
            Vec::new()
        }
    }
}

#[derive(Default)]
struct Decoder {
    commands: Vec<Command>,
    seen: HashSet<CommandId>,
    command: Option<Command>,
    param: Option<Param>,
}

impl Decoder {
    fn open(&mut self, tag: &BytesStart, empty: bool) -> Result<(), ParseError> {
        let name = tag.name();
        if is(name.as_ref(), "command") {
            if self.command.is_some() {
                return Err(ParseError::Nested("command"));
            }
            self.command = Some(read_command(tag)?);
            if empty {
                self.close(b"command")?;
            }
        } else if is(name.as_ref(), "param") {
            if self.param.is_some() {
                return Err(ParseError::Nested("param"));
            }
            if self.command.is_none() {
                return Err(ParseError::OrphanParam);
            }
            self.param = Some(read_param(tag)?);
            if empty {
                self.close(b"param")?;
            }
        } else if self.param.is_some() {
            return Err(ParseError::Xml(format!(
                "unexpected <{}> inside <param>",
                String::from_utf8_lossy(name.as_ref())
            )));
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), ParseError> {
        if is(name, "param") {
            if let Some(param) = self.param.take()
                && let Some(command) = self.command.as_mut()
            {
                command.params.push(param);
            }
        } else if is(name, "command")
            && let Some(command) = self.command.take()
        {
            if !self.seen.insert(command.command_id) {
                return Err(ParseError::DuplicateCommandId(command.command_id));
            }
            self.commands.push(command);
        }
        Ok(())
    }

    fn text(&mut self, text: Cow<'_, str>) {
        // text anywhere but inside a param carries no meaning
        if let Some(param) = self.param.take() {
            let value = format!("{}{}", param.value(), text);
            self.param = Some(Param::new(param.name(), value));
        }
    }

    fn finish(self) -> Result<Vec<Command>, ParseError> {
        if self.param.is_some() {
            return Err(ParseError::Unterminated("param"));
        }
        if self.command.is_some() {
            return Err(ParseError::Unterminated("command"));
        }
        Ok(self.commands)
    }
}

fn is(name: &[u8], expected: &str) -> bool {
    name.eq_ignore_ascii_case(expected.as_bytes())
}

/// Collect the named attributes of `tag`, in the order given by `names`
fn attributes<const N: usize>(
    tag: &BytesStart,
    names: [&str; N],
) -> Result<[Option<String>; N], ParseError> {
    let mut values = [const { None }; N];
    for attr in tag.attributes() {
        let attr = attr.map_err(xml_error)?;
        if let Some(pos) = names.iter().position(|n| is(attr.key.as_ref(), n)) {
            values[pos] = Some(attr.unescape_value().map_err(xml_error)?.into_owned());
        }
    }
    Ok(values)
}

fn read_command(tag: &BytesStart) -> Result<Command, ParseError> {
    let [id, device_id, kind] = attributes(tag, ["cmdId", "deviceId", "type"])?;

    let id = id.ok_or(ParseError::MissingAttribute("cmdId"))?;
    let device_id = device_id.ok_or(ParseError::MissingAttribute("deviceId"))?;
    let kind = kind.ok_or(ParseError::MissingAttribute("type"))?;

    let command_id = id
        .trim()
        .parse::<CommandId>()
        .map_err(|_| ParseError::InvalidCommandId(id.clone()))?;

    Ok(Command::new(device_id, command_id, kind))
}

fn read_param(tag: &BytesStart) -> Result<Param, ParseError> {
    let [name] = attributes(tag, ["name"])?;
    let name = name.ok_or(ParseError::MissingParamName)?;
    Ok(Param::new(name, ""))
}
