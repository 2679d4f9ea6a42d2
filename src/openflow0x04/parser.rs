//! Token scanner and the flow text parser.
//!
//! Flow text is a comma (or whitespace) separated list of `name` / `name=value` /
//! `name(value)` tokens. Tokens up to the first `@` instruction describe the fixed
//! fields and the match; from then on `@` tokens open instructions and plain tokens
//! are actions of the most recent `@apply` or `@write`.

use crate::error::EncodeError;

use super::action::Action;
use super::flow::FlowRule;
use super::instruction::Instruction;
use super::oxm::unhex;
use super::{parse_group, parse_port, parse_uint, Codecs, FlowModFlags};

/// Split off the `name=value` tokens at the front of `text` whose names are in
/// `names`, returning them and the text that follows.
pub(crate) fn leading_fields<'a>(
    text: &'a str,
    names: &[&str],
) -> Result<(Vec<(&'a str, &'a str)>, &'a str), EncodeError> {
    let mut scanner = Scanner::new(text);
    let mut fields = vec![];
    let mut rest = text.len();
    while let Some(token) = scanner.next_token()? {
        match token.arg {
            Some(arg) if names.contains(&token.name) => fields.push((token.name, arg)),
            _ => {
                rest = token.start;
                break;
            }
        }
    }
    Ok((fields, &text[rest..]))
}

/// One scanned token, with byte offsets into the scanned text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub name: &'a str,
    pub arg: Option<&'a str>,
    /// The argument was given as `name(arg)`.
    pub call: bool,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    /// The token as written.
    pub fn text(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

fn is_sep(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

/// Splits text into tokens; collaborators consuming more than one token may
/// reposition it with [`Scanner::seek`].
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Scanner<'a> {
        Scanner { text, pos: 0 }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Continue scanning at byte `pos` of the text.
    pub fn seek(&mut self, pos: usize) -> Result<(), EncodeError> {
        if !self.text.is_char_boundary(pos) {
            return Err(EncodeError::Syntax {
                token: self.text.to_string(),
                reason: "consumed length is not a character boundary of the text",
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, EncodeError> {
        let rest = &self.text[self.pos..];
        let start = self.pos + (rest.len() - rest.trim_start_matches(is_sep).len());
        if start == self.text.len() {
            self.pos = start;
            return Ok(None);
        }
        let rest = &self.text[start..];
        let name_len = rest
            .find(|c: char| is_sep(c) || c == '=' || c == '(')
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        let after = &rest[name_len..];
        let (arg, len, call) = if let Some(arg) = after.strip_prefix('=') {
            let arg_len = arg.find(is_sep).unwrap_or(arg.len());
            (Some(&arg[..arg_len]), name_len + 1 + arg_len, false)
        } else if let Some(arg) = after.strip_prefix('(') {
            match arg.find(')') {
                Some(close) => (Some(&arg[..close]), name_len + close + 2, true),
                None => {
                    return Err(EncodeError::Syntax {
                        token: rest.to_string(),
                        reason: "unclosed parenthesis",
                    })
                }
            }
        } else {
            (None, name_len, false)
        };
        if name.is_empty() {
            return Err(EncodeError::Syntax {
                token: rest[..len].to_string(),
                reason: "missing name",
            });
        }
        self.pos = start + len;
        Ok(Some(Token {
            name,
            arg,
            call,
            start,
            end: start + len,
        }))
    }
}

/// Which instruction an open action list belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ActionList {
    Apply,
    Write,
}

/// Parser state. The only transition is `Match` to `Instructions`, taken on the
/// first `@` token.
#[derive(Debug)]
enum Phase {
    /// Collecting fixed fields and match TLVs.
    Match { matches: Vec<u8> },
    /// Collecting instructions, and the actions of an open `@apply`/`@write`.
    Instructions {
        insts: Vec<Instruction>,
        open: Option<(ActionList, Vec<Action>)>,
    },
}

/// Builds a [`FlowRule`] from flow text, starting from a set of defaults.
pub(crate) struct FlowParser<'c> {
    codecs: &'c Codecs<'c>,
    rule: FlowRule,
    phase: Phase,
}

impl<'c> FlowParser<'c> {
    pub(crate) fn new(defaults: FlowRule, codecs: &'c Codecs<'c>) -> FlowParser<'c> {
        FlowParser {
            codecs,
            rule: defaults,
            phase: Phase::Match { matches: vec![] },
        }
    }

    pub(crate) fn parse(mut self, text: &str) -> Result<FlowRule, EncodeError> {
        let mut scanner = Scanner::new(text);
        while let Some(token) = scanner.next_token()? {
            self.step(token, &mut scanner)?;
        }
        Ok(self.finish())
    }

    fn step<'a>(&mut self, token: Token<'a>, scanner: &mut Scanner<'a>) -> Result<(), EncodeError> {
        if token.name.starts_with('@') {
            let phase = std::mem::replace(&mut self.phase, Phase::Match { matches: vec![] });
            let (mut insts, open) = match phase {
                Phase::Match { matches } => {
                    self.rule.matches.extend(matches);
                    (vec![], None)
                }
                Phase::Instructions { insts, open } => (insts, open),
            };
            close(&mut insts, open);
            let open = self.instruction(token, scanner.text(), &mut insts)?;
            self.phase = Phase::Instructions { insts, open };
            return Ok(());
        }
        match self.phase {
            Phase::Match { ref mut matches } => {
                match_token(&mut self.rule, matches, token, scanner, self.codecs)
            }
            Phase::Instructions {
                open: Some((_, ref mut actions)),
                ..
            } => {
                actions.push(Action::parse_text(token, scanner, self.codecs)?);
                Ok(())
            }
            Phase::Instructions { open: None, .. } => Err(EncodeError::Syntax {
                token: token.text(scanner.text()).to_string(),
                reason: "actions must follow @apply or @write",
            }),
        }
    }

    /// Handle an `@` token; returns the action list it opens, if any.
    fn instruction(
        &self,
        token: Token,
        source: &str,
        insts: &mut Vec<Instruction>,
    ) -> Result<Option<(ActionList, Vec<Action>)>, EncodeError> {
        let arg = |field: &'static str| {
            token.arg.ok_or_else(|| EncodeError::InvalidValue {
                field,
                value: String::new(),
            })
        };
        let no_arg = || match token.arg {
            None => Ok(()),
            Some(_) => Err(EncodeError::Syntax {
                token: token.text(source).to_string(),
                reason: "instruction takes no argument",
            }),
        };
        match token.name {
            "@goto" | "@goto_table" => {
                let table = parse_uint("goto_table", arg("goto_table")?, 0xff)?;
                insts.push(Instruction::GotoTable(table as u8));
            }
            "@metadata" | "@write_metadata" => {
                let arg = arg("metadata")?;
                let (metadata, mask) = match arg.split_once('/') {
                    Some((value, mask)) => (value, Some(mask)),
                    None => (arg, None),
                };
                insts.push(Instruction::WriteMetadata {
                    metadata: parse_uint("metadata", metadata, u64::MAX)?,
                    mask: match mask {
                        Some(mask) => parse_uint("metadata mask", mask, u64::MAX)?,
                        None => 0,
                    },
                });
            }
            "@apply" | "@apply_actions" => {
                no_arg()?;
                return Ok(Some((ActionList::Apply, vec![])));
            }
            "@write" | "@write_actions" => {
                no_arg()?;
                return Ok(Some((ActionList::Write, vec![])));
            }
            "@clear" | "@clear_actions" => {
                no_arg()?;
                insts.push(Instruction::ClearActions);
            }
            "@meter" => {
                let id = parse_uint("meter", arg("meter")?, u32::MAX as u64)?;
                insts.push(Instruction::Meter(id as u32));
            }
            "@unknown" => {
                let arg = arg("unknown instruction")?;
                let (typ, data) = arg.split_once(':').unwrap_or((arg, ""));
                let typ = parse_uint("unknown instruction", typ, 0xffff)? as u16;
                let data = unhex(data).ok_or_else(|| EncodeError::InvalidValue {
                    field: "unknown instruction",
                    value: arg.to_string(),
                })?;
                insts.push(Instruction::Unknown { typ, data });
            }
            _ => {
                return Err(EncodeError::UnknownToken {
                    token: token.text(source).to_string(),
                })
            }
        }
        Ok(None)
    }

    fn finish(mut self) -> FlowRule {
        match self.phase {
            Phase::Match { matches } => self.rule.matches.extend(matches),
            Phase::Instructions { mut insts, open } => {
                close(&mut insts, open);
                self.rule.instructions = insts;
            }
        }
        self.rule
    }
}

fn close(insts: &mut Vec<Instruction>, open: Option<(ActionList, Vec<Action>)>) {
    match open {
        Some((ActionList::Apply, actions)) => insts.push(Instruction::ApplyActions(actions)),
        Some((ActionList::Write, actions)) => insts.push(Instruction::WriteActions(actions)),
        None => (),
    }
}

fn match_token<'a>(
    rule: &mut FlowRule,
    matches: &mut Vec<u8>,
    token: Token<'a>,
    scanner: &mut Scanner<'a>,
    codecs: &Codecs,
) -> Result<(), EncodeError> {
    let source = scanner.text();
    let arg = |field: &'static str| {
        token.arg.ok_or_else(|| EncodeError::InvalidValue {
            field,
            value: String::new(),
        })
    };
    match token.name {
        "table" => rule.table = parse_uint("table", arg("table")?, 0xff)? as u8,
        "priority" => rule.priority = parse_uint("priority", arg("priority")?, 0xffff)? as u16,
        "idle_timeout" => {
            rule.idle_timeout = parse_uint("idle_timeout", arg("idle_timeout")?, 0xffff)? as u16
        }
        "hard_timeout" => {
            rule.hard_timeout = parse_uint("hard_timeout", arg("hard_timeout")?, 0xffff)? as u16
        }
        "buffer" => rule.buffer_id = parse_uint("buffer", arg("buffer")?, u32::MAX as u64)? as u32,
        "out_port" => rule.out_port = parse_port("out_port", arg("out_port")?)?,
        "out_group" => rule.out_group = parse_group("out_group", arg("out_group")?)?,
        "flags" => {
            let bits = parse_uint("flags", arg("flags")?, 0xffff)? as u16;
            rule.flags |= FlowModFlags::from_bits_retain(bits);
        }
        "cookie" => {
            let arg = arg("cookie")?;
            match arg.split_once('/') {
                Some((cookie, mask)) => {
                    rule.cookie = parse_uint("cookie", cookie, u64::MAX)?;
                    rule.cookie_mask = parse_uint("cookie_mask", mask, u64::MAX)?;
                }
                None => rule.cookie = parse_uint("cookie", arg, u64::MAX)?,
            }
        }
        name => {
            if let Some(flag) = FlowModFlags::by_name(name) {
                if token.arg.is_some() {
                    return Err(EncodeError::Syntax {
                        token: token.text(source).to_string(),
                        reason: "flags take no value",
                    });
                }
                rule.flags |= flag;
                return Ok(());
            }
            let (tlv, used) = codecs.matcher.encode_match(&source[token.start..])?;
            if used == 0 {
                return Err(EncodeError::UnknownToken {
                    token: token.text(source).to_string(),
                });
            }
            matches.extend(tlv);
            scanner.seek(token.start + used)?;
        }
    }
    Ok(())
}
