// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// In-process memcached stand-in that understands `set` and records values
pub struct FakeMemcached {
    address: String,
    store: Arc<Mutex<HashMap<String, String>>>,
    sets: Arc<Mutex<usize>>,
}

impl FakeMemcached {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake memcached");
        let address = listener.local_addr().unwrap().to_string();
        let store = Arc::new(Mutex::new(HashMap::new()));
        let sets = Arc::new(Mutex::new(0));

        let (server_store, server_sets) = (Arc::clone(&store), Arc::clone(&sets));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let store = Arc::clone(&server_store);
                let sets = Arc::clone(&server_sets);
                thread::spawn(move || serve(stream, store, sets));
            }
        });

        Self {
            address,
            store,
            sets,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.store.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn set_count(&self) -> usize {
        *self.sets.lock().unwrap()
    }
}

fn serve(stream: TcpStream, store: Arc<Mutex<HashMap<String, String>>>, sets: Arc<Mutex<usize>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 5 || parts[0] != "set" {
            let _ = writer.write_all(b"ERROR\r\n");
            continue;
        }
        let len: usize = parts[4].parse().unwrap();
        let mut data = vec![0u8; len + 2];
        if reader.read_exact(&mut data).is_err() {
            return;
        }
        data.truncate(len);

        store
            .lock()
            .unwrap()
            .insert(parts[1].to_string(), String::from_utf8(data).unwrap());
        *sets.lock().unwrap() += 1;
        if writer.write_all(b"STORED\r\n").is_err() {
            return;
        }
    }
}

/// Four fake backends in shard order (idfa, gaid, adid, dvid)
pub fn start_shards() -> Vec<FakeMemcached> {
    (0..4).map(|_| FakeMemcached::start()).collect()
}

/// Address of a port nobody listens on
pub fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// Write `content` gzip-compressed to `dir/name`
pub fn write_gz(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(
        File::create(&path).expect("Failed to create input file"),
        Compression::default(),
    );
    encoder
        .write_all(content.as_bytes())
        .expect("Failed to write input file");
    encoder.finish().expect("Failed to finish gzip stream");
    path
}

/// Backend flags pointing at the given shards
pub fn shard_args(shards: &[FakeMemcached]) -> Vec<String> {
    ["--idfa", "--gaid", "--adid", "--dvid"]
        .iter()
        .zip(shards)
        .flat_map(|(flag, shard)| [flag.to_string(), shard.address().to_string()])
        .collect()
}

/// Helper function to run memload with the given arguments
pub fn run_memload(args: &[String]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_memload"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute memload");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// `--pattern` argument matching every `.tsv.gz` file in `dir`
pub fn pattern_args(dir: &Path) -> Vec<String> {
    vec![
        "--pattern".to_string(),
        format!("{}/*.tsv.gz", dir.display()),
    ]
}
