use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};

use crate::api::dto::{CommandReq, CorePathDto, LoadParams, LoadSummary, MethodParams, TreeParams};
use crate::application::ForestPipeline;
use crate::config::ForestConfig;
use crate::domain::forest::Forest;
use crate::domain::model::CodeGraph;
use crate::domain::query::TreeQueryService;
use crate::domain::store::{DiskForestStore, ForestStore};
use crate::infrastructure::JsonInventorySource;
use crate::ports::InventorySource;

struct LoadedForest {
    graph: CodeGraph,
    forest: Forest,
}

/// Query server state, shared by every connection.
#[derive(Clone)]
pub struct ForestServer {
    config: Arc<ForestConfig>,
    loaded: Arc<RwLock<Option<LoadedForest>>>,
    stopping: Arc<AtomicBool>,
}

impl ForestServer {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config: Arc::new(config),
            loaded: Arc::new(RwLock::new(None)),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start serving an already built forest.
    pub fn with_forest(config: ForestConfig, graph: CodeGraph, forest: Forest) -> Self {
        let server = Self::new(config);
        if let Ok(mut slot) = server.loaded.write() {
            *slot = Some(LoadedForest { graph, forest });
        }
        server
    }

    /// Handle one request line, returning the `data` payload.
    pub fn process_command(&self, json_str: &str) -> Result<serde_json::Value> {
        let req: CommandReq = serde_json::from_str(json_str).context("Invalid JSON format")?;

        match req.command.as_str() {
            "PING" => Ok(json!("PONG")),
            "LOAD" => self.handle_load(req.params),
            "TREES" => {
                let p: MethodParams = params(req.params, "TREES")?;
                self.with_queries(|q, _| Ok(serde_json::to_value(q.trees_containing(&p.method))?))
            }
            "PATHS" => {
                let p: MethodParams = params(req.params, "PATHS")?;
                self.with_queries(|q, graph| {
                    let paths: Vec<CorePathDto> = q
                        .core_paths_of(&p.method)
                        .iter()
                        .map(|view| CorePathDto::from_view(view, graph))
                        .collect();
                    Ok(serde_json::to_value(paths)?)
                })
            }
            "STRUCTURE" => {
                let p: TreeParams = params(req.params, "STRUCTURE")?;
                self.with_queries(|q, _| {
                    let structure = q
                        .structure_of(&p.tree)
                        .ok_or_else(|| anyhow::anyhow!("Unknown tree: {}", p.tree))?;
                    Ok(serde_json::to_value(structure)?)
                })
            }
            "OVERVIEW" => self.with_queries(|q, _| Ok(serde_json::to_value(q.forest_overview())?)),
            "SHUTDOWN" => {
                self.stopping.store(true, Ordering::SeqCst);
                Ok(json!("Shutting down..."))
            }
            _ => anyhow::bail!("Unknown command: {}", req.command),
        }
    }

    fn with_queries<F>(&self, f: F) -> Result<serde_json::Value>
    where
        F: FnOnce(&TreeQueryService<'_>, &CodeGraph) -> Result<serde_json::Value>,
    {
        let guard = self
            .loaded
            .read()
            .map_err(|_| anyhow::anyhow!("Forest state is poisoned"))?;
        let loaded = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No forest loaded; send LOAD first"))?;
        let queries = TreeQueryService::new(&loaded.graph, &loaded.forest);
        f(&queries, &loaded.graph)
    }

    fn handle_load(&self, raw: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let p: LoadParams = params(raw, "LOAD")?;

        let (source, graph, forest) = match (&p.inventory, &p.snapshot) {
            (Some(path), None) => {
                info!("[API] Building forest from {}", path);
                let inventory = JsonInventorySource::new(path)
                    .load_inventory()
                    .with_context(|| format!("Failed to load inventory {}", path))?;
                let analysis = ForestPipeline::new((*self.config).clone()).run(&inventory)?;
                (path.clone(), analysis.graph, analysis.forest)
            }
            (None, Some(name)) => {
                let store_path = p
                    .store
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Missing 'store' param for snapshot"))?;
                let store = DiskForestStore::open(store_path)
                    .with_context(|| format!("Failed to open store {}", store_path))?;
                let snapshot = store
                    .load(name)?
                    .ok_or_else(|| anyhow::anyhow!("Snapshot not found: {}", name))?;
                let (graph, forest) = snapshot.restore();
                (format!("{}#{}", store_path, name), graph, forest)
            }
            _ => anyhow::bail!("LOAD needs exactly one of 'inventory' or 'snapshot'"),
        };

        let summary = LoadSummary {
            source,
            class_count: graph.class_count(),
            method_count: graph.method_count(),
            tree_count: forest.trees.len(),
            relation_count: forest.relations.len(),
        };
        let mut slot = self
            .loaded
            .write()
            .map_err(|_| anyhow::anyhow!("Forest state is poisoned"))?;
        *slot = Some(LoadedForest { graph, forest });
        Ok(serde_json::to_value(summary)?)
    }

    /// Set once a client sent SHUTDOWN.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Accept connections until a client sends SHUTDOWN.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        for stream in listener.incoming() {
            if self.is_stopping() {
                break;
            }
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream) {
                            warn!("[API] Connection error: {}", e);
                        }
                    });
                }
                Err(e) => error!("[API] Accept error: {}", e),
            }
        }
        info!("[API] Query server stopped.");
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let reader = BufReader::new(stream.try_clone()?);

        for line in reader.lines() {
            let line = line?;
            let request = line.trim();
            if request.is_empty() {
                continue;
            }

            let response = match self.process_command(request) {
                Ok(data) => json!({ "status": "success", "data": data }),
                Err(e) => json!({ "status": "error", "message": format!("{:#}", e) }),
            };
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            stream.write_all(&encoded)?;

            if self.is_stopping() {
                info!("[API] Shutdown requested.");
                // The accept loop only re-checks the flag when a connection arrives.
                let _ = TcpStream::connect(stream.local_addr()?);
                break;
            }
        }
        Ok(())
    }
}

fn params<T: serde::de::DeserializeOwned>(
    raw: Option<serde_json::Value>,
    command: &str,
) -> Result<T> {
    let raw = raw.ok_or_else(|| anyhow::anyhow!("Missing params for {}", command))?;
    serde_json::from_value(raw).with_context(|| format!("Invalid params for {}", command))
}

pub fn start_server(port: u16, server: ForestServer) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("[API] Query server listening on {}", address);
    server.serve(listener)
}
