//! Ambient configuration and the configuration-directory loader.
//!
//! `Configuration` is the typed structure the core is handed by its caller —
//! per spec.md §1, the core never parses CLI flags or files itself. The
//! loader (`Registry::load`) walks a directory of `*.json` documents and
//! builds the immutable route registry, grounded on `pkg/api/config/config.go`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::api::middleware::IdentityProvider;
use crate::api::schema::CompiledSchema;
use crate::containers::MapStore;
use crate::controllers::template::TemplateController;
use crate::controllers::wasm::WasmController;
use crate::controllers::Controller;
use crate::core::{
    decode_controller, Binding, Controller as ControllerDoc, DecodedController, ResourceDefinition,
    API_VERSION, BINDING_KIND, CONTROLLER_KIND, RESOURCE_DEFINITION_KIND,
};
use crate::error::{RcpError, RcpResult};
use crate::source::git::GitCredentials;
use crate::source::scm::github::GitHubScm;
use crate::source::scm::mem::MemScm;
use crate::source::scm::Scm;
use crate::source::{git::GitSource, local::LocalSource, Source};

/// The one typed input the core needs from its caller: where the
/// configuration directory lives, and which `Source` backs it.
#[derive(Clone)]
pub struct Configuration {
    pub config_dir: PathBuf,
    pub source: SourceConfig,
    /// The revision every `View`/`Update` transaction runs against.
    /// spec.md's HTTP contract has no per-request revision parameter — S5
    /// describes the Git source as "starting from revision main", so RCP
    /// resolves every request against one configured base revision rather
    /// than exposing revision selection over HTTP. Ignored by the local
    /// source. Recorded as an Open-Question resolution in DESIGN.md.
    pub default_revision: String,
    /// An optional transport-layer identity provider. When set, every
    /// request's resolved `WhoIs` is attached to its tracing span — it has
    /// no authorization effect in the core (spec.md §1/§6).
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            source: SourceConfig::Local {
                path: PathBuf::from("data"),
            },
            default_revision: "main".to_string(),
            identity_provider: None,
        }
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("config_dir", &self.config_dir)
            .field("source", &self.source)
            .field("default_revision", &self.default_revision)
            .field("identity_provider", &self.identity_provider.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SourceConfig {
    Local {
        path: PathBuf,
    },
    Git {
        url: String,
        auth: Option<GitCredentials>,
        poll_interval: Duration,
        scm: ScmConfig,
    },
}

#[derive(Debug, Clone)]
pub enum ScmConfig {
    GitHub {
        token: String,
        owner: String,
        repo: String,
    },
    /// Used by tests and demos that exercise the branch-per-proposal
    /// protocol without a real provider.
    Mem,
}

impl Configuration {
    /// Builds the `Source` named by `self.source`. Fallible — a Git clone or
    /// a GitHub client construction can fail at startup, per spec.md §7
    /// ("registry mis-configuration is refused at startup, never at
    /// runtime").
    pub fn build_source(&self) -> RcpResult<Arc<dyn Source>> {
        match &self.source {
            SourceConfig::Local { path } => Ok(Arc::new(LocalSource::new(path.clone()))),
            SourceConfig::Git {
                url,
                auth,
                poll_interval,
                scm,
            } => {
                let scm: Arc<dyn Scm> = match scm {
                    ScmConfig::GitHub {
                        token,
                        owner,
                        repo,
                    } => {
                        let client = octocrab::Octocrab::builder()
                            .personal_token(token.clone())
                            .build()
                            .map_err(|e| RcpError::Config(format!("building github client: {e}")))?;
                        Arc::new(GitHubScm::new(client, owner.clone(), repo.clone()))
                    }
                    ScmConfig::Mem => Arc::new(MemScm::new()),
                };

                let source = GitSource::with_poll_interval(
                    url.clone(),
                    auth.clone(),
                    scm,
                    *poll_interval,
                )?;
                Ok(Arc::new(source))
            }
        }
    }
}

/// One resolved route: a `(group, version, plural)` triple bound to a
/// controller instance and its compiled schema.
pub struct Route {
    pub group: String,
    pub version: String,
    pub plural: String,
    pub kind: String,
    pub controller: Arc<dyn Controller>,
    pub schema: Arc<CompiledSchema>,
    pub definition: ResourceDefinition,
}

/// The immutable registry built at server construction. Never mutated
/// after `load` returns — per spec.md §9, "avoid runtime monkey-patching or
/// registry mutation after startup."
pub struct Registry {
    pub definitions: MapStore<String, ResourceDefinition>,
    pub routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
}

impl Registry {
    pub fn load(config_dir: &Path) -> RcpResult<Self> {
        let mut definitions: MapStore<String, ResourceDefinition> = MapStore::new();
        let mut controller_docs: MapStore<String, ControllerDoc> = MapStore::new();
        let mut bindings: Vec<Binding> = Vec::new();

        for entry in WalkDir::new(config_dir) {
            let entry = entry.map_err(|e| RcpError::Config(format!("walking {config_dir:?}: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = std::fs::read(entry.path())?;
            let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| {
                RcpError::Config(format!("{}: decoding envelope: {e}", entry.path().display()))
            })?;

            if envelope.api_version != API_VERSION {
                return Err(RcpError::Config(format!(
                    "{}: unsupported apiVersion {:?}",
                    entry.path().display(),
                    envelope.api_version
                )));
            }

            match envelope.kind.as_str() {
                RESOURCE_DEFINITION_KIND => {
                    let doc: ResourceDefinition = serde_json::from_slice(&bytes)?;
                    definitions.insert(doc.metadata.name.clone(), doc);
                }
                CONTROLLER_KIND => {
                    let doc: ControllerDoc = serde_json::from_slice(&bytes)?;
                    controller_docs.insert(doc.metadata.name.clone(), doc);
                }
                BINDING_KIND => {
                    let doc: Binding = serde_json::from_slice(&bytes)?;
                    bindings.push(doc);
                }
                other => {
                    return Err(RcpError::Config(format!(
                        "{}: unrecognized kind {other:?}",
                        entry.path().display()
                    )))
                }
            }
        }

        let mut controllers: BTreeMap<String, Arc<dyn Controller>> = BTreeMap::new();
        for doc in controller_docs.values() {
            let controller: Arc<dyn Controller> = match decode_controller(doc)? {
                DecodedController::Template { spec, .. } => Arc::new(
                    TemplateController::with_templates(spec.list_template, spec.resource_template),
                ),
                DecodedController::Wasm { spec, .. } => {
                    let wasm_path = config_dir.join(&spec.path);
                    let bytes = std::fs::read(&wasm_path).map_err(|e| {
                        RcpError::Config(format!("reading wasm module {wasm_path:?}: {e}"))
                    })?;
                    Arc::new(WasmController::new(&bytes)?)
                }
            };
            controllers.insert(doc.metadata.name.clone(), controller);
        }

        let mut routes = Vec::new();
        let mut seen_triples: HashSet<(String, String, String)> = HashSet::new();

        for binding in &bindings {
            let controller = controllers.get(&binding.spec.controller).cloned().ok_or_else(|| {
                RcpError::Config(format!(
                    "binding {:?}: unresolved controller {:?}",
                    binding.metadata.name, binding.spec.controller
                ))
            })?;

            for resource_key in &binding.spec.resources {
                let definition = definitions.get(resource_key).map_err(|_| {
                    RcpError::Config(format!(
                        "binding {:?}: unresolved resource definition {:?}",
                        binding.metadata.name, resource_key
                    ))
                })?;

                for (version, schema_value) in &definition.spec.versions {
                    let triple = (
                        definition.spec.group.clone(),
                        version.clone(),
                        definition.names.plural.clone(),
                    );
                    if !seen_triples.insert(triple.clone()) {
                        return Err(RcpError::Config(format!(
                            "duplicate route for (group, version, plural) = {triple:?}"
                        )));
                    }

                    routes.push(Route {
                        group: definition.spec.group.clone(),
                        version: version.clone(),
                        plural: definition.names.plural.clone(),
                        kind: definition.names.kind.clone(),
                        controller: Arc::clone(&controller),
                        schema: Arc::new(CompiledSchema::compile(schema_value)?),
                        definition: definition.clone(),
                    });
                }
            }
        }

        Ok(Self {
            definitions,
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn loads_definition_controller_and_binding_into_one_route() {
        let dir = tempfile::tempdir().unwrap();

        write(
            dir.path(),
            "definition.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "ResourceDefinition",
                "metadata": {"name": "widgets"},
                "names": {"kind": "Widget", "singular": "widget", "plural": "widgets"},
                "spec": {
                    "group": "test.cup.flipt.io",
                    "versions": {"v1alpha1": {"type": "object"}},
                },
            }),
        );

        write(
            dir.path(),
            "controller.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "Controller",
                "metadata": {"name": "fs"},
                "spec": {"type": "template", "spec": {}},
            }),
        );

        write(
            dir.path(),
            "binding.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "Binding",
                "metadata": {"name": "default"},
                "spec": {"resources": ["widgets"], "controller": "fs"},
            }),
        );

        let registry = Registry::load(dir.path()).unwrap();
        assert_eq!(registry.routes.len(), 1);
        assert_eq!(registry.routes[0].plural, "widgets");
    }

    #[test]
    fn unresolved_controller_fails_construction() {
        let dir = tempfile::tempdir().unwrap();

        write(
            dir.path(),
            "definition.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "ResourceDefinition",
                "metadata": {"name": "widgets"},
                "names": {"kind": "Widget", "singular": "widget", "plural": "widgets"},
                "spec": {"group": "test.cup.flipt.io", "versions": {"v1alpha1": {}}},
            }),
        );

        write(
            dir.path(),
            "binding.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "Binding",
                "metadata": {"name": "default"},
                "spec": {"resources": ["widgets"], "controller": "missing"},
            }),
        );

        let err = Registry::load(dir.path()).unwrap_err();
        assert!(matches!(err, RcpError::Config(_)));
    }
}
