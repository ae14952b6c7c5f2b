//! Command adapter
//!
//! Turns decoded request arguments into keyspace calls and structured
//! [`Reply`] values. Every failure path ends in a reply; nothing here can take
//! the server down.

use crate::reply::Reply;
use sortkv::enumerate::EnumerateOptions;
use sortkv::{CancellationToken, Direction, KeyType, Keyspace, KeyspaceError, ScanCount};
use tracing::{error, trace, warn};

const KEYS_UNSUPPORTED: &str =
    "ERR keys is not supported, use 'keysearch [prefix] [count] [withtype]' instead";
const COUNT_RANGE: &str = "ERR count range: 1 <= count <= 10000";
const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Supported commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Keys,
    KeyNext,
    KeyPrev,
    KeySearch,
    RawKeySearch,
    RawGet,
    RawSet,
    RawSetNoReply,
    Expire,
    Del,
    Type,
    Set,
    Get,
    HSet,
    HGet,
    HDel,
    HGetAll,
    Quit,
}

impl Command {
    /// Case-insensitive command lookup
    pub fn parse(name: &[u8]) -> Option<Self> {
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        let cmd = match name.as_str() {
            "PING" => Command::Ping,
            "KEYS" => Command::Keys,
            "KEYNEXT" => Command::KeyNext,
            "KEYPREV" => Command::KeyPrev,
            "KEYSEARCH" => Command::KeySearch,
            "RAW_KEYSEARCH" => Command::RawKeySearch,
            "RAW_GET" => Command::RawGet,
            "RAW_SET" => Command::RawSet,
            "RAW_SET_NOREPLY" => Command::RawSetNoReply,
            "EXPIRE" => Command::Expire,
            "DEL" => Command::Del,
            "TYPE" => Command::Type,
            "SET" => Command::Set,
            "GET" => Command::Get,
            "HSET" => Command::HSet,
            "HGET" => Command::HGet,
            "HDEL" => Command::HDel,
            "HGETALL" => Command::HGetAll,
            "QUIT" => Command::Quit,
            _ => return None,
        };
        Some(cmd)
    }

    /// Lowercase name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Keys => "keys",
            Command::KeyNext => "keynext",
            Command::KeyPrev => "keyprev",
            Command::KeySearch => "keysearch",
            Command::RawKeySearch => "raw_keysearch",
            Command::RawGet => "raw_get",
            Command::RawSet => "raw_set",
            Command::RawSetNoReply => "raw_set_noreply",
            Command::Expire => "expire",
            Command::Del => "del",
            Command::Type => "type",
            Command::Set => "set",
            Command::Get => "get",
            Command::HSet => "hset",
            Command::HGet => "hget",
            Command::HDel => "hdel",
            Command::HGetAll => "hgetall",
            Command::Quit => "quit",
        }
    }
}

impl From<KeyspaceError> for Reply {
    fn from(err: KeyspaceError) -> Self {
        match err {
            KeyspaceError::EmptyKey => Reply::error("ERR empty key"),
            KeyspaceError::KeyTooLong(_) => Reply::error("ERR key too long"),
            KeyspaceError::InvalidCount(_) => Reply::error(COUNT_RANGE),
            KeyspaceError::WrongType { .. } => Reply::error(WRONG_TYPE),
            KeyspaceError::Cancelled => Reply::error("ERR scan cancelled"),
            other @ KeyspaceError::CorruptTypeTag(_) | other @ KeyspaceError::Storage(_) => {
                error!("Keyspace failure: {}", other);
                Reply::error(format!("ERR {}", other))
            }
        }
    }
}

/// Handlers return `Err` with the reply to send when they stop early
type CmdResult = Result<Reply, Reply>;

fn wrong_args(cmd: Command) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd.name()
    ))
}

fn require_args(cmd: Command, args: &[Vec<u8>], min: usize, max: Option<usize>) -> Result<(), Reply> {
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(wrong_args(cmd));
    }
    Ok(())
}

fn parse_int(arg: &[u8]) -> Result<i64, Reply> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Reply::error(NOT_AN_INTEGER))
}

/// Optional count at `index`, defaulting to 1
fn parse_count(args: &[Vec<u8>], index: usize) -> Result<ScanCount, Reply> {
    match args.get(index) {
        Some(arg) => Ok(ScanCount::new(parse_int(arg)?)?),
        None => Ok(ScanCount::default()),
    }
}

/// Optional flag at `index`. Unknown tokens count as "not set"
fn flag(args: &[Vec<u8>], index: usize, name: &str) -> bool {
    args.get(index)
        .is_some_and(|arg| arg.eq_ignore_ascii_case(name.as_bytes()))
}

/// Dispatch one request
///
/// Returns `None` only for commands that never reply. `QUIT` is answered here
/// but closing the connection is the caller's job.
pub fn dispatch(keyspace: &Keyspace, args: &[Vec<u8>], cancel: &CancellationToken) -> Option<Reply> {
    let Some(name) = args.first() else {
        return Some(Reply::error("ERR empty command"));
    };
    let Some(cmd) = Command::parse(name) else {
        return Some(Reply::error(format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(name)
        )));
    };
    trace!(command = cmd.name(), args = args.len() - 1, "Dispatching");

    let result = match cmd {
        Command::RawSetNoReply => {
            if let Err(reply) = cmd_raw_set(keyspace, cmd, args) {
                warn!("RAW_SET_NOREPLY failed: {:?}", reply);
            }
            return None;
        }
        Command::Ping => cmd_ping(cmd, args),
        Command::Keys => Err(Reply::error(KEYS_UNSUPPORTED)),
        Command::KeyNext => cmd_enumerate(keyspace, cmd, args, Direction::Forward, cancel),
        Command::KeyPrev => cmd_enumerate(keyspace, cmd, args, Direction::Backward, cancel),
        Command::KeySearch => cmd_keysearch(keyspace, cmd, args, cancel),
        Command::RawKeySearch => cmd_raw_keysearch(keyspace, cmd, args, cancel),
        Command::RawGet => cmd_raw_get(keyspace, cmd, args),
        Command::RawSet => cmd_raw_set(keyspace, cmd, args),
        Command::Expire => cmd_expire(cmd, args),
        Command::Del => cmd_del(keyspace, cmd, args),
        Command::Type => cmd_type(keyspace, cmd, args),
        Command::Set => cmd_set(keyspace, cmd, args),
        Command::Get => cmd_get(keyspace, cmd, args),
        Command::HSet => cmd_hset(keyspace, cmd, args),
        Command::HGet => cmd_hget(keyspace, cmd, args),
        Command::HDel => cmd_hdel(keyspace, cmd, args),
        Command::HGetAll => cmd_hgetall(keyspace, cmd, args, cancel),
        Command::Quit => Ok(Reply::ok()),
    };
    Some(result.unwrap_or_else(|reply| reply))
}

fn cmd_ping(cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 1, Some(2))?;
    match args.get(1) {
        Some(message) => Ok(Reply::bulk(message.clone())),
        None => Ok(Reply::status("PONG")),
    }
}

// keynext|keyprev seek [count] [withtype] [withvalue]
fn cmd_enumerate(
    keyspace: &Keyspace,
    cmd: Command,
    args: &[Vec<u8>],
    direction: Direction,
    cancel: &CancellationToken,
) -> CmdResult {
    require_args(cmd, args, 2, None)?;
    let count = parse_count(args, 2)?;
    let with_type = flag(args, 3, "WITHTYPE");
    let with_value = with_type && flag(args, 4, "WITHVALUE");
    let options = EnumerateOptions::new(direction, count)
        .with_type(with_type)
        .with_value(with_value);

    let entries = keyspace.enumerate(&args[1], options, cancel)?;
    Ok(Reply::fields(entries.into_iter().flat_map(|e| e.into_fields())))
}

// keysearch prefix [count] [withtype]
fn cmd_keysearch(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>], cancel: &CancellationToken) -> CmdResult {
    require_args(cmd, args, 2, None)?;
    let count = parse_count(args, 2)?;
    let with_type = flag(args, 3, "WITHTYPE");

    let entries = keyspace.search(&args[1], count, with_type, cancel)?;
    Ok(Reply::fields(entries.into_iter().flat_map(|e| e.into_fields())))
}

// raw_keysearch prefix [count]
fn cmd_raw_keysearch(
    keyspace: &Keyspace,
    cmd: Command,
    args: &[Vec<u8>],
    cancel: &CancellationToken,
) -> CmdResult {
    require_args(cmd, args, 2, None)?;
    let count = parse_count(args, 2)?;
    let keys = keyspace.raw_search(&args[1], count, cancel)?;
    Ok(Reply::fields(keys))
}

fn cmd_raw_get(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 2, Some(2))?;
    Ok(Reply::Bulk(keyspace.raw_get(&args[1])?))
}

fn cmd_raw_set(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 3, Some(3))?;
    keyspace.raw_set(&args[1], &args[2])?;
    Ok(Reply::ok())
}

// Expiry is not supported: report "timeout not set" for every key
fn cmd_expire(cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 3, Some(3))?;
    Ok(Reply::Integer(0))
}

fn cmd_del(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 2, None)?;
    let removed = keyspace.delete(&args[1..])?;
    Ok(Reply::Integer(removed as i64))
}

fn cmd_type(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 2, Some(2))?;
    let key_type = keyspace.type_of(&args[1])?;
    Ok(Reply::status(KeyType::label(key_type)))
}

fn cmd_set(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 3, Some(3))?;
    keyspace.set_string(&args[1], &args[2])?;
    Ok(Reply::ok())
}

fn cmd_get(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 2, Some(2))?;
    Ok(Reply::Bulk(keyspace.get_string(&args[1])?))
}

fn cmd_hset(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(wrong_args(cmd));
    }
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = args[2..]
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let added = keyspace.hset(&args[1], &pairs)?;
    Ok(Reply::Integer(added as i64))
}

fn cmd_hget(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 3, Some(3))?;
    Ok(Reply::Bulk(keyspace.hget(&args[1], &args[2])?))
}

fn cmd_hdel(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>]) -> CmdResult {
    require_args(cmd, args, 3, None)?;
    let removed = keyspace.hdel(&args[1], &args[2..])?;
    Ok(Reply::Integer(removed as i64))
}

fn cmd_hgetall(keyspace: &Keyspace, cmd: Command, args: &[Vec<u8>], cancel: &CancellationToken) -> CmdResult {
    require_args(cmd, args, 2, Some(2))?;
    let pairs = keyspace.hgetall(&args[1], cancel)?;
    Ok(Reply::fields(pairs.into_iter().flat_map(|(field, value)| [field, value])))
}
