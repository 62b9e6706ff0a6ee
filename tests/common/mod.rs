#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MartRegistry>
  <MartURLLocation database="ensembl_mart_110" default="1" displayName="Ensembl Genes 110" host="www.ensembl.org" name="ENSEMBL_MART_ENSEMBL" path="/biomart/martservice" port="80" serverVirtualSchema="default" visible="1" />
</MartRegistry>
"#;

const DATASETS: &str = "\nTableSet\thsapiens_gene_ensembl\tHuman genes (GRCh38.p14)\t1\tGRCh38.p14\t200\t50000\tdefault\t2023-05-24 15:33:02\n\n";

/// Minimal BioMart stand-in serving the registry, the dataset listing and
/// gene name queries over plain HTTP on a local port. Query answers hold one
/// row per known ID, sorted by ID, like the real service.
pub struct MockMart {
    host: String,
    queries: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockMart {
    pub fn start(genes: &[(&str, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock mart");
        let host = format!("http://{}", listener.local_addr().expect("local addr"));
        let genes: BTreeMap<String, String> = genes
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&queries);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &genes, &recorded);
            }
        });
        Self { host, queries }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// IDs sent with each gene name query, in arrival order.
    pub fn queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().expect("query log").clone()
    }
}

fn serve(stream: TcpStream, genes: &BTreeMap<String, String>, queries: &Mutex<Vec<Vec<String>>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => continue,
            Err(_) => return,
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let body = if target.contains("type=registry") {
        REGISTRY.to_string()
    } else if target.contains("type=datasets") {
        DATASETS.to_string()
    } else if target.contains("query=") {
        let ids = requested_ids(target);
        let mut body = String::from("Gene stable ID\tGene name\n");
        let mut matched = ids
            .iter()
            .filter_map(|id| genes.get(id).map(|name| (id.clone(), name.clone())))
            .collect::<Vec<_>>();
        matched.sort();
        matched.dedup();
        for (id, name) in matched {
            body.push_str(&format!("{id}\t{name}\n"));
        }
        body.push_str("[success]\n");
        queries.lock().expect("query log").push(ids);
        body
    } else {
        String::new()
    };

    let mut stream = stream;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Pulls the gene IDs out of an encoded query; IDs survive URL encoding
/// unchanged because they only hold letters, digits and dots.
fn requested_ids(target: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = target;
    while let Some(start) = rest.find("ENSG") {
        let candidate = &rest[start..];
        let end = candidate
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '.')
            .unwrap_or(candidate.len());
        ids.push(candidate[..end].to_string());
        rest = &candidate[end..];
    }
    ids
}

/// A port with nothing listening on it.
pub fn unreachable_host() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
