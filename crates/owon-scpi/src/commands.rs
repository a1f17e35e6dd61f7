//! The HDS200 command table and path resolution.
//!
//! Commands are kept as a flat list of canonical paths. Each path segment is a
//! [`Keyword`] carrying its precomputed short form, so resolving a typed token
//! is a keyword-by-keyword walk over the candidates of the same depth.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScpiError};
use crate::mnemonic::Keyword;
use crate::params::{CodecContext, DiscreteSet, ParameterType, ParameterValue};
use crate::scales::{COUPLINGS, TIMEBASE_SCALES};
use crate::units::UnitClass;

/// Input channel of the oscilloscope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Channel 1
    Ch1,
    /// Channel 2
    Ch2,
}

impl Channel {
    /// Both channels in order.
    pub const ALL: [Channel; 2] = [Channel::Ch1, Channel::Ch2];

    /// Channel from its 1-based index.
    pub fn from_index(index: u8) -> Result<Channel> {
        match index {
            1 => Ok(Channel::Ch1),
            2 => Ok(Channel::Ch2),
            other => Err(ScpiError::InvalidChannel(other)),
        }
    }

    /// 1-based index.
    pub fn index(&self) -> u8 {
        match self {
            Channel::Ch1 => 1,
            Channel::Ch2 => 2,
        }
    }

    /// Position in zero-based arrays such as the header's channel list.
    pub fn position(&self) -> usize {
        self.index() as usize - 1
    }

    /// Path keyword (`CH1`).
    pub fn keyword(&self) -> &'static str {
        match self {
            Channel::Ch1 => "CH1",
            Channel::Ch2 => "CH2",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Shape of the reply a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The command never replies.
    None,
    /// A text line completed by quiescence.
    Text,
    /// A length-prefixed binary frame of raw bytes.
    Binary,
    /// A length-prefixed binary frame carrying a JSON document.
    Json,
}

impl ReplyKind {
    /// Whether the reply arrives as a length-prefixed frame.
    pub fn is_framed(&self) -> bool {
        matches!(self, ReplyKind::Binary | ReplyKind::Json)
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ReplyKind::None => "no reply",
            ReplyKind::Text => "text",
            ReplyKind::Binary => "binary",
            ReplyKind::Json => "json",
        }
    }
}

/// One registered command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    /// Canonical path, root first.
    pub path: Vec<Keyword>,
    /// Parameter taken when set, and returned when queried.
    pub parameter: ParameterType,
    /// Whether `?` may be appended.
    pub queryable: bool,
    /// Whether the command may be sent without `?` (setting or action).
    pub settable: bool,
    /// Reply produced by the query form.
    pub reply: ReplyKind,
    /// Channel addressed by this command, if any.
    pub channel: Option<Channel>,
}

impl CommandDescriptor {
    fn new(path: &[&str], parameter: ParameterType) -> Self {
        CommandDescriptor {
            path: path.iter().map(|word| Keyword::new(word)).collect(),
            parameter,
            queryable: true,
            settable: true,
            reply: ReplyKind::Text,
            channel: None,
        }
    }

    fn action(path: &[&str]) -> Self {
        CommandDescriptor {
            queryable: false,
            reply: ReplyKind::None,
            ..CommandDescriptor::new(path, ParameterType::None)
        }
    }

    fn query_only(path: &[&str], reply: ReplyKind) -> Self {
        CommandDescriptor {
            settable: false,
            reply,
            ..CommandDescriptor::new(path, ParameterType::None)
        }
    }

    fn on(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Canonical wire path (`:HORIZONTAL:SCALE`, `*IDN`).
    pub fn wire_path(&self) -> String {
        let mut out = String::new();
        for (i, keyword) in self.path.iter().enumerate() {
            if i > 0 || !keyword.long().starts_with('*') {
                out.push(':');
            }
            out.push_str(keyword.long());
        }
        out
    }

    /// Short-form path (`:HOR:SCAL`).
    pub fn short_path(&self) -> String {
        let mut out = String::new();
        for (i, keyword) in self.path.iter().enumerate() {
            if i > 0 || !keyword.short().starts_with('*') {
                out.push(':');
            }
            out.push_str(keyword.short());
        }
        out
    }

    /// Whether the parameter's allowed set depends on the channel's probe.
    pub fn depends_on_probe(&self) -> bool {
        matches!(self.parameter, ParameterType::Discrete(set) if set.depends_on_probe())
    }

    /// Build the newline-terminated query line.
    pub fn query_line(&self) -> Result<String> {
        if !self.queryable {
            return Err(ScpiError::NotQueryable(self.wire_path()));
        }
        Ok(format!("{}?\n", self.wire_path()))
    }

    /// Build the newline-terminated line for a setting or action.
    ///
    /// The value is validated before anything is produced.
    pub fn setting_line(
        &self,
        value: Option<&ParameterValue>,
        context: &CodecContext,
    ) -> Result<String> {
        if !self.settable {
            return Err(ScpiError::NotSettable(self.wire_path()));
        }
        match (&self.parameter, value) {
            (ParameterType::None, None) => Ok(format!("{}\n", self.wire_path())),
            (ParameterType::None, Some(value)) => Err(ScpiError::ParameterMismatch {
                expected: self.parameter.describe(),
                found: format!("'{}'", value),
            }),
            (ty, None) => Err(ScpiError::ParameterMismatch {
                expected: ty.describe(),
                found: "no value".to_string(),
            }),
            (ty, Some(value)) => {
                let text = ty.encode(value, context)?;
                Ok(format!("{} {}\n", self.wire_path(), text))
            }
        }
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_path())
    }
}

/// Read-only table of every known command.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    /// Build a registry from descriptors.
    pub fn new(commands: Vec<CommandDescriptor>) -> Self {
        CommandRegistry { commands }
    }

    /// The HDS200 table, built on first use.
    pub fn standard() -> &'static CommandRegistry {
        static REGISTRY: OnceLock<CommandRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| CommandRegistry::new(hds200_commands()))
    }

    /// All registered commands.
    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    /// Resolve a typed path (any case, full or abbreviated keywords).
    ///
    /// A leading `:` and a trailing `?` are ignored.
    pub fn resolve(&self, token: &str) -> Result<&CommandDescriptor> {
        let path = token.trim();
        let body = path.strip_suffix('?').unwrap_or(path);
        let body = body.strip_prefix(':').unwrap_or(body);
        let segments: Vec<&str> = body.split(':').collect();

        let unknown = |segment: &str| ScpiError::UnknownMnemonic {
            path: path.to_string(),
            segment: segment.to_string(),
        };

        let mut candidates: Vec<&CommandDescriptor> = self.commands.iter().collect();
        for (depth, segment) in segments.iter().enumerate() {
            candidates.retain(|c| c.path.get(depth).is_some_and(|k| k.matches(segment)));
            if candidates.is_empty() {
                return Err(unknown(segment));
            }
        }
        // Segments may all match the start of a longer path (`:FUNCTION` vs
        // `:FUNCTION:FREQUENCY`); only an exact depth counts.
        candidates
            .into_iter()
            .find(|c| c.path.len() == segments.len())
            .ok_or_else(|| unknown(segments.last().copied().unwrap_or_default()))
    }

    /// Resolve a channel-scoped command by its channel-relative tail.
    pub fn channel_command(&self, channel: Channel, tail: &str) -> Result<&CommandDescriptor> {
        self.resolve(&format!(":{}:{}", channel.keyword(), tail))
    }
}

const ON_OFF: ParameterType = ParameterType::Bool { numeric: false };

fn tags(tags: &'static [&'static str]) -> ParameterType {
    ParameterType::Discrete(DiscreteSet::Tags(tags))
}

fn hds200_commands() -> Vec<CommandDescriptor> {
    let mut commands = vec![
        CommandDescriptor::query_only(&["*IDN"], ReplyKind::Text),
        CommandDescriptor::action(&["*RST"]),
        CommandDescriptor::action(&["AUTOSET"]),
        CommandDescriptor::new(&["RUNNING"], tags(&["RUN", "STOP"])),
        CommandDescriptor::new(&["ACQUIRE", "MODE"], tags(&["SAMPLE", "PEAK"])),
        CommandDescriptor::new(&["ACQUIRE", "DEPMEM"], tags(&["4K", "8K"])),
        CommandDescriptor::new(
            &["HORIZONTAL", "SCALE"],
            ParameterType::Discrete(DiscreteSet::Quantities(&TIMEBASE_SCALES)),
        ),
        CommandDescriptor::new(
            &["HORIZONTAL", "OFFSET"],
            ParameterType::Integer {
                min: -1000,
                max: 1000,
            },
        ),
        CommandDescriptor::new(&["TRIGGER", "SINGLE", "EDGE", "SOURCE"], tags(&["CH1", "CH2"])),
        CommandDescriptor::new(
            &["TRIGGER", "SINGLE", "EDGE", "LEVEL"],
            ParameterType::FloatWithUnit(UnitClass::Volt),
        ),
        CommandDescriptor::new(&["TRIGGER", "SINGLE", "EDGE", "SLOPE"], tags(&["RISE", "FALL"])),
        CommandDescriptor::new(&["FUNCTION"], tags(&["SINE", "SQUARE", "RAMP", "PULSE"])),
        CommandDescriptor::new(
            &["FUNCTION", "FREQUENCY"],
            ParameterType::FloatWithUnit(UnitClass::Hertz),
        ),
        CommandDescriptor::new(
            &["FUNCTION", "AMPLITUDE"],
            ParameterType::FloatWithUnit(UnitClass::Volt),
        ),
        CommandDescriptor::new(
            &["FUNCTION", "DUTY"],
            ParameterType::FloatWithUnit(UnitClass::Percent),
        ),
        CommandDescriptor::new(&["CHANNEL"], ON_OFF),
        CommandDescriptor::new(
            &["DMM", "CONFIGURE"],
            tags(&["DCV", "ACV", "DCA", "ACA", "RES", "DIOD", "CONT", "CAP"]),
        ),
        CommandDescriptor::action(&["DMM", "RANGE", "STEP"]),
        CommandDescriptor::query_only(&["DATA", "WAVE", "SCREEN", "HEAD"], ReplyKind::Json),
    ];

    for channel in Channel::ALL {
        let ch = channel.keyword();
        commands.extend(
            [
                CommandDescriptor::new(&[ch, "DISPLAY"], ParameterType::Bool { numeric: true }),
                CommandDescriptor::new(&[ch, "COUPLING"], tags(&COUPLINGS)),
                CommandDescriptor::new(&[ch, "PROBE"], ParameterType::Discrete(DiscreteSet::PROBE)),
                CommandDescriptor::new(
                    &[ch, "SCALE"],
                    ParameterType::Discrete(DiscreteSet::VerticalScale),
                ),
                CommandDescriptor::new(
                    &[ch, "OFFSET"],
                    ParameterType::Integer { min: -200, max: 200 },
                ),
                CommandDescriptor::query_only(&["DATA", "WAVE", "SCREEN", ch], ReplyKind::Binary),
            ]
            .map(|descriptor| descriptor.on(channel)),
        );
    }
    commands
}
