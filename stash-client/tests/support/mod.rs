//! In-process Redis stand-ins for integration tests.
//!
//! `spawn_server` answers a fixed script on a single connection so tests can
//! assert the exact commands on the wire. `FakeRedis` keeps real state
//! (strings, hashes, expiry) and accepts any number of connections.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub type Command = Vec<Vec<u8>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Accepts one connection and feeds `expected_commands` commands to `handler`.
pub fn spawn_server(expected_commands: usize, handler: fn(usize, Command, &mut TcpStream)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = match read_command(&mut reader) {
                Ok(Some(args)) => args,
                _ => return,
            };
            handler(idx, args, &mut stream);
        }
    });

    addr
}

/// Address of a port with nothing listening on it.
pub fn closed_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    drop(listener);
    addr
}

pub fn read_command<R: BufRead>(reader: &mut R) -> std::io::Result<Option<Command>> {
    let mut line = Vec::new();
    if !read_line(reader, &mut line)? {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        if !read_line(reader, &mut line)? {
            return Err(invalid("eof inside command"));
        }
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(Some(args))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(true)
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("bad length"))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

/// Builds the argument list of a command from text parts.
pub fn cmd(parts: &[&str]) -> Command {
    parts.iter().map(|part| part.as_bytes().to_vec()).collect()
}

pub fn simple(msg: &str) -> Vec<u8> {
    format!("+{msg}\r\n").into_bytes()
}

pub fn error(msg: &str) -> Vec<u8> {
    format!("-{msg}\r\n").into_bytes()
}

pub fn integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn nil() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

pub fn write_reply(stream: &mut TcpStream, reply: &[u8]) {
    let _ = stream.write_all(reply);
    let _ = stream.flush();
}

enum Data {
    Str(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
}

struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Keyspace {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Keyspace {
    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if Instant::now() >= *at
        );
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// Stateful single-node Redis stand-in.
pub struct FakeRedis {
    addr: String,
    accepted: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<Command>>>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
}

impl FakeRedis {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let streams = Arc::new(Mutex::new(Vec::new()));
        let keyspace = Arc::new(Mutex::new(Keyspace::default()));

        {
            let accepted = accepted.clone();
            let commands = commands.clone();
            let streams = streams.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { continue };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    if let Ok(clone) = stream.try_clone() {
                        streams.lock().unwrap().push(clone);
                    }
                    let commands = commands.clone();
                    let keyspace = keyspace.clone();
                    thread::spawn(move || serve(stream, commands, keyspace));
                }
            });
        }

        FakeRedis {
            addr,
            accepted,
            commands,
            streams,
        }
    }

    pub fn addr(&self) -> String {
        self.addr.clone()
    }

    /// Number of connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Every command received, in arrival order.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands other than the PING liveness probe.
    pub fn data_commands(&self) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|cmd| !cmd[0].eq_ignore_ascii_case(b"PING"))
            .collect()
    }

    /// Hangs up on every open client connection.
    pub fn drop_connections(&self) {
        for stream in self.streams.lock().unwrap().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn serve(stream: TcpStream, commands: Arc<Mutex<Vec<Command>>>, keyspace: Arc<Mutex<Keyspace>>) {
    let Ok(mut writer) = stream.try_clone() else { return };
    let mut reader = BufReader::new(stream);
    while let Ok(Some(args)) = read_command(&mut reader) {
        commands.lock().unwrap().push(args.clone());
        let reply = dispatch(&args, &mut keyspace.lock().unwrap());
        if writer.write_all(&reply).and_then(|_| writer.flush()).is_err() {
            return;
        }
    }
}

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

fn dispatch(args: &[Vec<u8>], keyspace: &mut Keyspace) -> Vec<u8> {
    let Some((cmd, rest)) = args.split_first() else {
        return error("ERR empty command");
    };
    let cmd = String::from_utf8_lossy(cmd).to_ascii_uppercase();

    match (cmd.as_str(), rest) {
        ("PING", []) => simple("PONG"),
        ("GET", [key]) => match keyspace.live(key) {
            None => nil(),
            Some(Entry { data: Data::Str(value), .. }) => bulk(value),
            Some(_) => error(WRONGTYPE),
        },
        ("SET", [key, value, options @ ..]) => {
            let expires_at = match options {
                [] => None,
                [unit, amount] => {
                    let Some(amount) = std::str::from_utf8(amount)
                        .ok()
                        .and_then(|text| text.parse::<u64>().ok())
                        .filter(|amount| *amount > 0)
                    else {
                        return error("ERR invalid expire time in 'set' command");
                    };
                    match unit.to_ascii_uppercase().as_slice() {
                        b"EX" => Some(Instant::now() + Duration::from_secs(amount)),
                        b"PX" => Some(Instant::now() + Duration::from_millis(amount)),
                        _ => return error("ERR syntax error"),
                    }
                }
                _ => return error("ERR syntax error"),
            };
            keyspace.entries.insert(
                key.clone(),
                Entry {
                    data: Data::Str(value.clone()),
                    expires_at,
                },
            );
            simple("OK")
        }
        ("HSET", [key, field, value]) => {
            if keyspace.live(key).is_none() {
                keyspace.entries.insert(
                    key.clone(),
                    Entry {
                        data: Data::Hash(HashMap::new()),
                        expires_at: None,
                    },
                );
            }
            match keyspace.live(key) {
                Some(Entry { data: Data::Hash(fields), .. }) => {
                    let added = fields.insert(field.clone(), value.clone()).is_none();
                    integer(added as i64)
                }
                _ => error(WRONGTYPE),
            }
        }
        ("HGET", [key, field]) => match keyspace.live(key) {
            None => nil(),
            Some(Entry { data: Data::Hash(fields), .. }) => match fields.get(field) {
                Some(value) => bulk(value),
                None => nil(),
            },
            Some(_) => error(WRONGTYPE),
        },
        ("DEL", keys) if !keys.is_empty() => {
            let mut removed = 0;
            for key in keys {
                if keyspace.live(key).is_some() {
                    keyspace.entries.remove(key);
                    removed += 1;
                }
            }
            integer(removed)
        }
        ("HDEL", [key, field]) => {
            let (removed, now_empty) = match keyspace.live(key) {
                None => (false, false),
                Some(Entry { data: Data::Hash(fields), .. }) => {
                    let removed = fields.remove(field).is_some();
                    (removed, fields.is_empty())
                }
                Some(_) => return error(WRONGTYPE),
            };
            if now_empty {
                keyspace.entries.remove(key);
            }
            integer(removed as i64)
        }
        _ => error("ERR unknown command or wrong number of arguments"),
    }
}
