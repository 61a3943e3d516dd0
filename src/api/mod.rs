//! The HTTP router: a table of route-specs built once at startup from the
//! `Registry` and bound to closures that capture their matched controller
//! and compiled schema. No route is ever added, removed, or rebound after
//! `Server::new` returns — see spec.md §9 ("avoid runtime monkey-patching or
//! registry mutation after startup").

pub mod middleware;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;

use crate::api::middleware::IdentityProvider;
use crate::config::{Configuration, Registry, Route};
use crate::controllers::{DeleteRequest, GetRequest, ListRequest, PutRequest, Request as CtrlRequest};
use crate::core::{Resource, ResourceDefinition};
use crate::encoding;
use crate::error::{RcpError, RcpResult};
use crate::fs::FsConfig;
use crate::source::Source;

const CONTENT_TYPE_JSON: &str = "application/json";

/// Per-route captured state, scoped to one `web::resource` via
/// `app_data` — the mechanism this router uses to bind a distinct
/// controller/schema pair to each `(group, version, plural)` path without
/// any shared mutable registry lookup at request time.
#[derive(Clone)]
struct RouteContext {
    controller: Arc<dyn crate::controllers::Controller>,
    source: Arc<dyn Source>,
    schema: Arc<schema::CompiledSchema>,
    group: String,
    version: String,
    kind: String,
    plural: String,
    default_revision: String,
}

pub struct Server {
    registry: Registry,
    source: Arc<dyn Source>,
    default_revision: String,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl Server {
    pub fn new(config: &Configuration) -> RcpResult<Self> {
        let registry = Registry::load(&config.config_dir)?;
        let source = config.build_source()?;

        Ok(Self {
            registry,
            source,
            default_revision: config.default_revision.clone(),
            identity_provider: config.identity_provider.clone(),
        })
    }

    /// Wires every discovered route plus the `/apis` discovery endpoint into
    /// an `actix-web` service configuration. Intended to be passed to
    /// `App::configure`.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        let definitions: BTreeMap<String, ResourceDefinition> = self
            .registry
            .routes
            .iter()
            .map(|r| {
                (
                    format!("{}/{}/{}", r.group, r.version, r.plural),
                    r.definition.clone(),
                )
            })
            .collect();

        cfg.app_data(web::Data::new(definitions))
            .route("/apis", web::get().to(discover));

        for route in &self.registry.routes {
            register_route(cfg, route, &self.source, &self.default_revision);
        }
    }

    pub async fn run(self, bind: impl std::net::ToSocketAddrs) -> std::io::Result<()> {
        let server = Arc::new(self);

        HttpServer::new(move || {
            let server = Arc::clone(&server);
            let identity_provider = server.identity_provider.clone();

            App::new()
                .wrap(middleware::request_logger())
                .wrap(middleware::permissive_cors())
                .wrap(actix_web::middleware::from_fn(move |req, next| {
                    let identity_provider = identity_provider.clone();
                    async move { identity_middleware(identity_provider, req, next).await }
                }))
                .configure(move |cfg| server.configure(cfg))
        })
        .bind(bind)?
        .run()
        .await
    }
}

/// Records the resolved `WhoIs` identity (if an `IdentityProvider` is
/// configured) on the request's tracing span before continuing the chain.
async fn identity_middleware(
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    req: actix_web::dev::ServiceRequest,
    next: actix_web::middleware::Next<impl actix_web::body::MessageBody>,
) -> Result<actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>, actix_web::Error> {
    middleware::record_identity(identity_provider.as_deref(), req.request());
    next.call(req).await
}

fn register_route(
    cfg: &mut web::ServiceConfig,
    route: &Route,
    source: &Arc<dyn Source>,
    default_revision: &str,
) {
    let ctx = RouteContext {
        controller: Arc::clone(&route.controller),
        source: Arc::clone(source),
        schema: Arc::clone(&route.schema),
        group: route.group.clone(),
        version: route.version.clone(),
        kind: route.kind.clone(),
        plural: route.plural.clone(),
        default_revision: default_revision.to_string(),
    };

    let list_path = format!(
        "/apis/{}/{}/namespaces/{{namespace}}/{}",
        route.group, route.version, route.plural
    );
    let item_path = format!("{list_path}/{{name}}");

    cfg.service(
        web::resource(list_path)
            .app_data(web::Data::new(ctx.clone()))
            .route(web::get().to(list_handler)),
    )
    .service(
        web::resource(item_path)
            .app_data(web::Data::new(ctx))
            .route(web::get().to(get_handler))
            .route(web::put().to(put_handler))
            .route(web::delete().to(delete_handler)),
    );
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default, rename = "labelSelector")]
    label_selector: Option<String>,
}

fn parse_label_selector(selector: Option<&str>) -> Vec<(String, String)> {
    let Some(selector) = selector else {
        return Vec::new();
    };

    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

async fn discover(definitions: web::Data<BTreeMap<String, ResourceDefinition>>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(CONTENT_TYPE_JSON)
        .json(definitions.as_ref())
}

async fn list_handler(
    ctx: web::Data<RouteContext>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, RcpError> {
    let namespace = path.into_inner();
    let labels = parse_label_selector(query.label_selector.as_deref());

    let req = CtrlRequest {
        group: ctx.group.clone(),
        version: ctx.version.clone(),
        kind: ctx.kind.clone(),
        namespace,
    };

    let controller = Arc::clone(&ctx.controller);
    let labels_for_closure = labels.clone();
    let resources: Arc<std::sync::Mutex<Option<Vec<Resource>>>> = Arc::new(std::sync::Mutex::new(None));
    let slot = Arc::clone(&resources);

    ctx.source
        .view(
            &ctx.default_revision,
            Box::new(move |fs| {
                let result = controller.list(ListRequest {
                    request: req,
                    fs,
                    labels: labels_for_closure,
                })?;
                *slot.lock().expect("result slot poisoned") = Some(result);
                Ok(())
            }),
        )
        .await?;

    let resources = resources
        .lock()
        .expect("result slot poisoned")
        .take()
        .unwrap_or_default();

    let mut body = Vec::new();
    encoding::write_json_lines(&mut body, &resources)?;

    Ok(HttpResponse::Ok().content_type(CONTENT_TYPE_JSON).body(body))
}

async fn get_handler(
    ctx: web::Data<RouteContext>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, RcpError> {
    let (namespace, name) = path.into_inner();

    let req = CtrlRequest {
        group: ctx.group.clone(),
        version: ctx.version.clone(),
        kind: ctx.kind.clone(),
        namespace,
    };

    let controller = Arc::clone(&ctx.controller);
    let name_for_closure = name.clone();
    let slot: Arc<std::sync::Mutex<Option<Resource>>> = Arc::new(std::sync::Mutex::new(None));
    let slot_for_closure = Arc::clone(&slot);

    ctx.source
        .view(
            &ctx.default_revision,
            Box::new(move |fs| {
                let resource = controller.get(GetRequest {
                    request: req,
                    fs,
                    name: name_for_closure,
                })?;
                *slot_for_closure.lock().expect("result slot poisoned") = Some(resource);
                Ok(())
            }),
        )
        .await?;

    let resource = slot
        .lock()
        .expect("result slot poisoned")
        .take()
        .ok_or_else(|| RcpError::NotFound(format!("{name}: not found")))?;

    Ok(HttpResponse::Ok().content_type(CONTENT_TYPE_JSON).json(resource))
}

async fn put_handler(
    ctx: web::Data<RouteContext>,
    path: web::Path<(String, String)>,
    body: web::Json<Resource>,
) -> Result<HttpResponse, RcpError> {
    let (namespace, name) = path.into_inner();
    let resource = body.into_inner();

    if resource.metadata.namespace != namespace || resource.metadata.name != name {
        return Err(RcpError::InvalidInput(format!(
            "body metadata {}/{} does not match path {}/{}",
            resource.metadata.namespace, resource.metadata.name, namespace, name
        )));
    }

    resource.validate()?;

    let schema_errors = ctx.schema.validate(&resource.spec);
    if !schema_errors.is_empty() {
        return Err(RcpError::Schema(schema_errors));
    }

    let req = CtrlRequest {
        group: ctx.group.clone(),
        version: ctx.version.clone(),
        kind: ctx.kind.clone(),
        namespace: namespace.clone(),
    };

    let message = format!(
        "feat: update {}/{} {}/{}",
        resource.api_version, resource.kind, namespace, name
    );

    let controller = Arc::clone(&ctx.controller);
    let name_for_closure = name.clone();
    let resource_for_closure = resource.clone();

    let result = ctx
        .source
        .update(
            &ctx.default_revision,
            &message,
            Box::new(move |fs_config: &FsConfig| {
                controller.put(PutRequest {
                    request: req,
                    fs_config,
                    name: name_for_closure,
                    resource: resource_for_closure,
                })
            }),
        )
        .await?;

    Ok(HttpResponse::Ok().content_type(CONTENT_TYPE_JSON).json(result))
}

async fn delete_handler(
    ctx: web::Data<RouteContext>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, RcpError> {
    let (namespace, name) = path.into_inner();

    let req = CtrlRequest {
        group: ctx.group.clone(),
        version: ctx.version.clone(),
        kind: ctx.kind.clone(),
        namespace: namespace.clone(),
    };

    let message = format!(
        "feat: delete {}/{}/{} {}/{}",
        ctx.group, ctx.version, ctx.plural, namespace, name
    );

    let controller = Arc::clone(&ctx.controller);
    let name_for_closure = name.clone();

    let result = ctx
        .source
        .update(
            &ctx.default_revision,
            &message,
            Box::new(move |fs_config: &FsConfig| {
                controller.delete(DeleteRequest {
                    request: req,
                    fs_config,
                    name: name_for_closure,
                })
            }),
        )
        .await?;

    Ok(HttpResponse::Ok().content_type(CONTENT_TYPE_JSON).json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    const API_VERSION: &str = "cup.flipt.io/v1alpha1";

    fn write_doc(dir: &std::path::Path, name: &str, value: Value) {
        std::fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    /// Lays out a config directory with one `ResourceDefinition` (schema
    /// requires `spec.foo: string`), a template `Controller`, and a
    /// `Binding` linking the two — the fixture every S1-S6 scenario in
    /// spec.md §8 runs against.
    fn build_server() -> (Server, tempfile::TempDir, tempfile::TempDir) {
        let config_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();

        write_doc(
            config_dir.path(),
            "definition.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "ResourceDefinition",
                "metadata": {"name": "resources"},
                "names": {"kind": "Resource", "singular": "resource", "plural": "resources"},
                "spec": {
                    "group": "test.cup.flipt.io",
                    "versions": {
                        "v1alpha1": {
                            "type": "object",
                            "required": ["foo"],
                            "properties": {"foo": {"type": "string"}},
                        },
                    },
                },
            }),
        );

        write_doc(
            config_dir.path(),
            "controller.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "Controller",
                "metadata": {"name": "fs"},
                "spec": {"type": "template", "spec": {}},
            }),
        );

        write_doc(
            config_dir.path(),
            "binding.json",
            json!({
                "apiVersion": API_VERSION,
                "kind": "Binding",
                "metadata": {"name": "default"},
                "spec": {"resources": ["resources"], "controller": "fs"},
            }),
        );

        let configuration = Configuration {
            config_dir: config_dir.path().to_path_buf(),
            source: crate::config::SourceConfig::Local {
                path: data_dir.path().to_path_buf(),
            },
            default_revision: "main".to_string(),
            identity_provider: None,
        };

        let server = Server::new(&configuration).unwrap();
        (server, config_dir, data_dir)
    }

    fn resource(name: &str, foo: &str) -> Value {
        json!({
            "apiVersion": "test.cup.flipt.io/v1alpha1",
            "kind": "Resource",
            "metadata": {"namespace": "default", "name": name, "labels": {}, "annotations": {}},
            "spec": {"foo": foo},
        })
    }

    /// S1/S2: PUT then GET returns the same resource; list returns it alone.
    #[actix_web::test]
    async fn put_then_get_round_trips() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        let put_req = test::TestRequest::put()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .set_json(resource("foo", "bar"))
            .to_request();
        let put_resp = test::call_service(&app, put_req).await;
        assert!(put_resp.status().is_success());

        let result: Value = test::read_body_json(put_resp).await;
        assert_eq!(result["id"], "00000000000000000000000000");
        assert!(result.get("proposal").is_none());

        let get_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .to_request();
        let got: Value = test::call_and_read_body_json(&app, get_req).await;
        assert_eq!(got["spec"]["foo"], "bar");
        assert_eq!(got["metadata"]["name"], "foo");

        let list_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources")
            .to_request();
        let list_resp = test::call_service(&app, list_req).await;
        let body = test::read_body(list_resp).await;
        let lines: Vec<&[u8]> = body.split(|b| *b == b'\n').filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 1);
    }

    /// S3: a second PUT makes list return both in lexicographic path order.
    #[actix_web::test]
    async fn list_orders_lexicographically_by_path() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        for name in ["foo", "bar"] {
            let req = test::TestRequest::put()
                .uri(&format!(
                    "/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/{name}"
                ))
                .set_json(resource(name, "x"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let list_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources")
            .to_request();
        let body = test::call_and_read_body(&app, list_req).await;
        let names: Vec<Value> = body
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();

        assert_eq!(names[0]["metadata"]["name"], "bar");
        assert_eq!(names[1]["metadata"]["name"], "foo");
    }

    /// S4: a spec violating the schema is rejected with 400 and no file is
    /// written to the source.
    #[actix_web::test]
    async fn schema_violation_rejected_without_writing() {
        let (server, _config_dir, data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        let bad = json!({
            "apiVersion": "test.cup.flipt.io/v1alpha1",
            "kind": "Resource",
            "metadata": {"namespace": "default", "name": "foo", "labels": {}, "annotations": {}},
            "spec": {"foo": 42},
        });

        let req = test::TestRequest::put()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .set_json(bad)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        assert!(!data_dir
            .path()
            .join("default/test.cup.flipt.io-v1alpha1-Resource-foo.json")
            .exists());
    }

    /// Path-authoritative mismatch between the URL `{name}` and the PUT
    /// body's `metadata.name` is rejected with 400 (spec.md §9 open
    /// question, resolved path-authoritative).
    #[actix_web::test]
    async fn name_mismatch_between_path_and_body_is_rejected() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        let req = test::TestRequest::put()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .set_json(resource("not-foo", "bar"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    /// S6: delete removes the file; a second delete does not produce an
    /// empty file and list excludes the deleted resource.
    #[actix_web::test]
    async fn delete_then_delete_again_is_not_found_not_empty_file() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        let put_req = test::TestRequest::put()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .set_json(resource("foo", "bar"))
            .to_request();
        assert!(test::call_service(&app, put_req).await.status().is_success());

        let del_req = test::TestRequest::delete()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .to_request();
        let del_resp = test::call_service(&app, del_req).await;
        assert!(del_resp.status().is_success());

        let get_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .to_request();
        let get_resp = test::call_service(&app, get_req).await;
        assert!(get_resp.status().is_server_error() || get_resp.status() == actix_web::http::StatusCode::NOT_FOUND);

        let del_again_req = test::TestRequest::delete()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/foo")
            .to_request();
        let del_again_resp = test::call_service(&app, del_again_req).await;
        assert!(!del_again_resp.status().is_success());

        let list_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources")
            .to_request();
        let body = test::call_and_read_body(&app, list_req).await;
        assert!(body.is_empty());
    }

    /// Label selector: `env=prod` matches only the subset tagged
    /// accordingly (spec.md §8 property 5).
    #[actix_web::test]
    async fn label_selector_filters_to_matching_subset() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        for (name, env) in [("prod-res", "prod"), ("dev-res", "dev")] {
            let mut body = resource(name, "x");
            body["metadata"]["labels"] = json!({"env": env});

            let req = test::TestRequest::put()
                .uri(&format!(
                    "/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources/{name}"
                ))
                .set_json(body)
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
        }

        let list_req = test::TestRequest::get()
            .uri("/apis/test.cup.flipt.io/v1alpha1/namespaces/default/resources?labelSelector=env%3Dprod")
            .to_request();
        let body = test::call_and_read_body(&app, list_req).await;
        let resources: Vec<Value> = body
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["metadata"]["name"], "prod-res");
    }

    /// Discovery completeness: `GET /apis` returns the bound
    /// `(group, version, plural)` triple.
    #[actix_web::test]
    async fn discovery_lists_bound_definitions() {
        let (server, _config_dir, _data_dir) = build_server();
        let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/apis").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.get("test.cup.flipt.io/v1alpha1/resources").is_some());
    }
}
