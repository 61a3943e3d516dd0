//! The controller contract: the pluggable strategy that translates between
//! `Resource`s and their on-disk representation. See spec.md §4.3.

pub mod template;
pub mod wasm;

use crate::core::Resource;
use crate::error::RcpResult;
use crate::fs::FsConfig;

/// Fields common to every controller request: the resolved
/// `(group, version, kind, namespace)` the route was bound to.
#[derive(Debug, Clone)]
pub struct Request {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.group, self.version, self.kind, self.namespace
        )
    }
}

pub struct GetRequest<'a> {
    pub request: Request,
    pub fs: &'a dyn crate::fs::ReadonlyFs,
    pub name: String,
}

pub struct ListRequest<'a> {
    pub request: Request,
    pub fs: &'a dyn crate::fs::ReadonlyFs,
    pub labels: Vec<(String, String)>,
}

pub struct PutRequest<'a> {
    pub request: Request,
    pub fs_config: &'a FsConfig,
    pub name: String,
    pub resource: Resource,
}

pub struct DeleteRequest<'a> {
    pub request: Request,
    pub fs_config: &'a FsConfig,
    pub name: String,
}

/// The controller contract. Kept synchronous — neither implementation
/// performs true asynchronous I/O (the template controller is plain
/// `std::fs`-shaped reads/writes through the `ReadonlyFs`/`FsConfig`
/// abstraction, and the WASM controller's `wasmtime` invocation is a
/// blocking call by construction). The router invokes controllers from
/// inside a `Source::view`/`update` closure, which is itself synchronous —
/// see `src/source/mod.rs`. `Send + Sync` lets the router hold a
/// heterogeneous set of controller bindings behind `Arc<dyn Controller>`.
pub trait Controller: Send + Sync {
    fn get(&self, req: GetRequest<'_>) -> RcpResult<Resource>;
    fn list(&self, req: ListRequest<'_>) -> RcpResult<Vec<Resource>>;
    fn put(&self, req: PutRequest<'_>) -> RcpResult<()>;
    fn delete(&self, req: DeleteRequest<'_>) -> RcpResult<()>;
}
