//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Telnet protocol bytes and the inbound filter
//!
//! The console only negotiates two options: it offers to echo and to
//! suppress go-ahead. Everything else the client sends in the command
//! space is stripped from the data stream by [`TelnetFilter`].

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

/// Interpret As Command
pub const IAC: u8 = 0xFF;
pub const WILL: u8 = 0xFB;
pub const WONT: u8 = 0xFC;
pub const DO: u8 = 0xFD;
pub const DONT: u8 = 0xFE;
/// Subnegotiation begin
pub const SB: u8 = 0xFA;
/// Subnegotiation end
pub const SE: u8 = 0xF0;
/// Echo option
pub const ECHO: u8 = 0x01;
/// Suppress go-ahead option
pub const SGA: u8 = 0x03;

/// Sent once to every client on connect
pub const NEGOTIATION_REQUEST: [u8; 7] = [IAC, WILL, ECHO, IAC, WILL, SGA, b'\n'];

/// Client reply that switches the connection to character mode
pub const NEGOTIATION_ACK: [u8; 6] = [IAC, DO, ECHO, IAC, DO, SGA];

/// Option negotiation verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetCommand {
    Will,
    Wont,
    Do,
    Dont,
}

impl TelnetCommand {
    pub const ALL: [TelnetCommand; 4] = [
        TelnetCommand::Will,
        TelnetCommand::Wont,
        TelnetCommand::Do,
        TelnetCommand::Dont,
    ];

    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            WILL => Some(Self::Will),
            WONT => Some(Self::Wont),
            DO => Some(Self::Do),
            DONT => Some(Self::Dont),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Will => WILL,
            Self::Wont => WONT,
            Self::Do => DO,
            Self::Dont => DONT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Will => "WILL",
            Self::Wont => "WONT",
            Self::Do => "DO",
            Self::Dont => "DONT",
        }
    }
}

impl fmt::Display for TelnetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One item of filtered client input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetInput {
    /// Application bytes with `IAC IAC` unescaped
    Data(BytesMut),
    /// `IAC <verb> <option>`
    Negotiation { command: TelnetCommand, option: u8 },
    /// `IAC SB <option> ... IAC SE`
    Subnegotiation { option: u8, data: Vec<u8> },
    /// Any other two-byte `IAC <command>`
    Command(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    NormalData,
    InterpretAsCommand,
    Negotiate(TelnetCommand),
    Subnegotiate,
    SubnegotiateArgument(u8),
    SubnegotiateArgumentIac(u8),
}

/// Stateful decoder separating telnet commands from application data.
///
/// Partial sequences are carried across reads.
#[derive(Debug)]
pub struct TelnetFilter {
    state: FilterState,
    subnegotiation: Vec<u8>,
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self {
            state: FilterState::NormalData,
            subnegotiation: Vec::new(),
        }
    }
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for TelnetFilter {
    type Item = TelnetInput;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TelnetInput>, Self::Error> {
        let mut data = BytesMut::new();
        while src.has_remaining() {
            let byte = src.get_u8();
            match (self.state, byte) {
                (FilterState::NormalData, IAC) => {
                    self.state = FilterState::InterpretAsCommand;
                    if !data.is_empty() {
                        return Ok(Some(TelnetInput::Data(data)));
                    }
                }
                (FilterState::NormalData, _) => data.put_u8(byte),
                (FilterState::InterpretAsCommand, IAC) => {
                    self.state = FilterState::NormalData;
                    data.put_u8(IAC);
                }
                (FilterState::InterpretAsCommand, SB) => {
                    self.state = FilterState::Subnegotiate;
                }
                (FilterState::InterpretAsCommand, _) => match TelnetCommand::from_u8(byte) {
                    Some(command) => self.state = FilterState::Negotiate(command),
                    None => {
                        self.state = FilterState::NormalData;
                        trace!(command = byte, "Stripping telnet command");
                        return Ok(Some(TelnetInput::Command(byte)));
                    }
                },
                (FilterState::Negotiate(command), option) => {
                    self.state = FilterState::NormalData;
                    return Ok(Some(TelnetInput::Negotiation { command, option }));
                }
                (FilterState::Subnegotiate, option) => {
                    self.subnegotiation.clear();
                    self.state = FilterState::SubnegotiateArgument(option);
                }
                (FilterState::SubnegotiateArgument(option), IAC) => {
                    self.state = FilterState::SubnegotiateArgumentIac(option);
                }
                (FilterState::SubnegotiateArgument(_), _) => self.subnegotiation.push(byte),
                (FilterState::SubnegotiateArgumentIac(option), IAC) => {
                    self.subnegotiation.push(IAC);
                    self.state = FilterState::SubnegotiateArgument(option);
                }
                (FilterState::SubnegotiateArgumentIac(option), SE) => {
                    self.state = FilterState::NormalData;
                    return Ok(Some(TelnetInput::Subnegotiation {
                        option,
                        data: std::mem::take(&mut self.subnegotiation),
                    }));
                }
                (FilterState::SubnegotiateArgumentIac(option), _) => {
                    warn!(
                        option,
                        command = byte,
                        "Invalid command inside subnegotiation, discarding"
                    );
                    self.subnegotiation.clear();
                    self.state = FilterState::NormalData;
                }
            }
        }
        Ok((!data.is_empty()).then_some(TelnetInput::Data(data)))
    }
}

/// Tracks the client's answers to [`NEGOTIATION_REQUEST`]
#[derive(Debug, Default, Clone, Copy)]
pub struct NegotiationState {
    echo: bool,
    suppress_go_ahead: bool,
    acknowledged: bool,
}

impl NegotiationState {
    /// Record a negotiation. Returns true exactly once, when both offered
    /// options have been accepted.
    pub fn accept(&mut self, command: TelnetCommand, option: u8) -> bool {
        if command == TelnetCommand::Do {
            match option {
                ECHO => self.echo = true,
                SGA => self.suppress_go_ahead = true,
                _ => {}
            }
        }
        if !self.acknowledged && self.echo && self.suppress_go_ahead {
            self.acknowledged = true;
            return true;
        }
        false
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(filter: &mut TelnetFilter, bytes: &[u8]) -> Vec<TelnetInput> {
        let mut src = BytesMut::from(bytes);
        let mut items = Vec::new();
        while let Some(item) = filter.decode(&mut src).unwrap() {
            items.push(item);
        }
        items
    }

    fn data(bytes: &[u8]) -> TelnetInput {
        TelnetInput::Data(BytesMut::from(bytes))
    }

    #[test]
    fn test_command_table_complete() {
        for command in TelnetCommand::ALL {
            assert_eq!(TelnetCommand::from_u8(command.as_u8()), Some(command));
            assert!(!command.name().is_empty());
        }
        assert_eq!(TelnetCommand::from_u8(SB), None);
    }

    #[test]
    fn test_plain_data() {
        let mut filter = TelnetFilter::new();
        assert_eq!(decode_all(&mut filter, b"help\r\n"), vec![data(b"help\r\n")]);
    }

    #[test]
    fn test_ack_is_two_negotiations() {
        let mut filter = TelnetFilter::new();
        let items = decode_all(&mut filter, &NEGOTIATION_ACK);
        assert_eq!(
            items,
            vec![
                TelnetInput::Negotiation {
                    command: TelnetCommand::Do,
                    option: ECHO
                },
                TelnetInput::Negotiation {
                    command: TelnetCommand::Do,
                    option: SGA
                },
            ]
        );
        let mut state = NegotiationState::default();
        let acks: Vec<bool> = items
            .into_iter()
            .map(|item| match item {
                TelnetInput::Negotiation { command, option } => state.accept(command, option),
                _ => false,
            })
            .collect();
        assert_eq!(acks, vec![false, true]);
        assert!(state.is_acknowledged());
        assert!(!state.accept(TelnetCommand::Do, ECHO));
    }

    #[test]
    fn test_negotiation_split_across_reads() {
        let mut filter = TelnetFilter::new();
        assert_eq!(decode_all(&mut filter, &[b'a', IAC]), vec![data(b"a")]);
        assert!(decode_all(&mut filter, &[DO]).is_empty());
        assert_eq!(
            decode_all(&mut filter, &[ECHO, b'b']),
            vec![
                TelnetInput::Negotiation {
                    command: TelnetCommand::Do,
                    option: ECHO
                },
                data(b"b"),
            ]
        );
    }

    #[test]
    fn test_escaped_iac_and_subnegotiation() {
        let mut filter = TelnetFilter::new();
        let items = decode_all(
            &mut filter,
            &[b'x', IAC, IAC, b'y', IAC, SB, 31, 0, 80, IAC, IAC, IAC, SE, b'z'],
        );
        assert_eq!(
            items,
            vec![
                data(&[b'x']),
                data(&[IAC, b'y']),
                TelnetInput::Subnegotiation {
                    option: 31,
                    data: vec![0, 80, IAC]
                },
                data(b"z"),
            ]
        );
    }

    #[test]
    fn test_other_commands_stripped() {
        let mut filter = TelnetFilter::new();
        // IAC NOP
        assert_eq!(
            decode_all(&mut filter, &[IAC, 0xF1, b'q']),
            vec![TelnetInput::Command(0xF1), data(b"q")]
        );
    }
}
