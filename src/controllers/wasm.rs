//! The WASM controller: delegates the four controller operations to a
//! sandboxed external program, instantiated fresh per call with a WASI
//! preview-1 interface. No network, no ambient filesystem or environment —
//! only the explicit mount the caller passes in. Grounded on
//! `pkg/controllers/wasm/controller.go`, which achieves the same isolation
//! with the Go `wazero` runtime; this is wasmtime's equivalent shape.

use std::path::Path;

use wasmtime::{Engine, Linker, Module, Store};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use super::{Controller, DeleteRequest, GetRequest, ListRequest, PutRequest, Request};
use crate::core::Resource;
use crate::error::{RcpError, RcpResult};

/// Exit code the sandboxed program uses to signal a missing resource.
const EXIT_NOT_FOUND: i32 = 2;

pub struct WasmController {
    engine: Engine,
    module: Module,
}

impl WasmController {
    pub fn new(wasm_bytes: &[u8]) -> RcpResult<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, wasm_bytes)
            .map_err(|e| RcpError::Config(format!("compiling wasm module: {e}")))?;

        Ok(Self { engine, module })
    }

    /// Instantiates a fresh module and runs it to completion with the given
    /// argv (verb first) and I/O wiring. Each call gets its own `Store` —
    /// instantiation is deliberately per-call, matching spec.md §4.3.2.
    fn exec(
        &self,
        argv: &[&str],
        stdin: Vec<u8>,
        mount: Mount<'_>,
    ) -> RcpResult<Vec<u8>> {
        let stdout = wasmtime_wasi::pipe::MemoryOutputPipe::new(64 * 1024);
        let stderr = wasmtime_wasi::pipe::MemoryOutputPipe::new(64 * 1024);

        let mut builder = WasiCtxBuilder::new();
        builder
            .args(argv)
            .stdin(wasmtime_wasi::pipe::MemoryInputPipe::new(stdin))
            .stdout(stdout.clone())
            .stderr(stderr.clone());

        match mount {
            Mount::ReadOnly(dir) => {
                builder
                    .preopened_dir(dir, "/", DirPerms::READ, FilePerms::READ)
                    .map_err(|e| RcpError::Controller(format!("mounting read-only dir: {e}")))?;
            }
            Mount::ReadWrite(dir) => {
                builder
                    .preopened_dir(dir, "/", DirPerms::all(), FilePerms::all())
                    .map_err(|e| RcpError::Controller(format!("mounting writable dir: {e}")))?;
            }
        }

        let wasi = builder.build_p1();

        let mut linker: Linker<WasiP1Ctx> = Linker::new(&self.engine);
        preview1::add_to_linker_sync(&mut linker, |ctx| ctx)
            .map_err(|e| RcpError::Controller(format!("linking wasi: {e}")))?;

        let mut store = Store::new(&self.engine, wasi);

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| RcpError::Controller(format!("instantiating module: {e}")))?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| RcpError::Controller(format!("missing _start export: {e}")))?;

        match start.call(&mut store, ()) {
            Ok(()) => {}
            Err(trap) => {
                if let Some(exit) = trap.downcast_ref::<I32Exit>() {
                    if exit.0 == 0 {
                        // fallthrough to stdout below
                    } else if exit.0 == EXIT_NOT_FOUND {
                        return Err(RcpError::NotFound(format!("{}: exec", argv.join(" "))));
                    } else {
                        let stderr_text = String::from_utf8_lossy(&stderr.contents()).into_owned();
                        return Err(RcpError::Controller(format!(
                            "non-zero exit code {}: {stderr_text}",
                            exit.0
                        )));
                    }
                } else {
                    return Err(RcpError::Controller(format!("{}: {trap}", argv[0])));
                }
            }
        }

        Ok(stdout.contents().to_vec())
    }
}

enum Mount<'a> {
    ReadOnly(&'a Path),
    ReadWrite(&'a Path),
}

impl Controller for WasmController {
    fn get(&self, req: GetRequest<'_>) -> RcpResult<Resource> {
        let dir = req
            .fs
            .host_dir()
            .ok_or_else(|| RcpError::Controller("get: requires a host directory mount".into()))?;

        let out = self
            .exec(
                &["get", &req.request.kind, &req.request.namespace, &req.name],
                Vec::new(),
                Mount::ReadOnly(&dir),
            )
            .map_err(|e| e.wrap(&format!("wasm.get: {}/{}", req.request, req.name)))?;

        serde_json::from_slice(&out)
            .map_err(|e| RcpError::Controller(format!("wasm.get: decoding response: {e}")))
    }

    fn list(&self, req: ListRequest<'_>) -> RcpResult<Vec<Resource>> {
        let dir = req
            .fs
            .host_dir()
            .ok_or_else(|| RcpError::Controller("list: requires a host directory mount".into()))?;

        let out = self
            .exec(
                &["list", &req.request.kind, &req.request.namespace],
                Vec::new(),
                Mount::ReadOnly(&dir),
            )
            .map_err(|e| e.wrap(&format!("wasm.list: {}", req.request)))?;

        let mut resources = Vec::new();
        for line in out.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }

            let resource: Resource = serde_json::from_slice(line)
                .map_err(|e| RcpError::Controller(format!("wasm.list: decoding response: {e}")))?;

            if resource.matches_labels(&req.labels) {
                resources.push(resource);
            }
        }

        Ok(resources)
    }

    fn put(&self, req: PutRequest<'_>) -> RcpResult<()> {
        let dir = req.fs_config.host_dir().ok_or_else(|| {
            RcpError::Controller("put: request directory not appropriate".to_string())
        })?;

        let body = serde_json::to_vec(&req.resource)?;

        self.exec(
            &["put", &req.request.kind, &req.request.namespace, &req.name],
            body,
            Mount::ReadWrite(&dir),
        )
        .map(|_| ())
        .map_err(|e| e.wrap(&format!("wasm.put: {}/{}", req.request, req.name)))
    }

    fn delete(&self, req: DeleteRequest<'_>) -> RcpResult<()> {
        let dir = req.fs_config.host_dir().ok_or_else(|| {
            RcpError::Controller("delete: request directory not appropriate".to_string())
        })?;

        self.exec(
            &["delete", &req.request.kind, &req.request.namespace, &req.name],
            Vec::new(),
            Mount::ReadWrite(&dir),
        )
        .map(|_| ())
        .map_err(|e| e.wrap(&format!("wasm.delete: {}/{}", req.request, req.name)))
    }
}
