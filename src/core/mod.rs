//! The wire data model: resources, resource definitions, controller
//! configuration objects and bindings. These are the typed shapes decoded
//! from the configuration directory and exchanged over HTTP.

mod binding;
mod controller;
mod object;
mod resource;

pub use binding::{Binding, BindingSpec};
pub use controller::{
    decode_controller, Controller, ControllerSpecType, DecodedController, TemplateControllerSpec,
    WasmControllerSpec,
};
pub use object::{Metadata, NamespacedMetadata, Object};
pub use resource::{Names, Resource, ResourceDefinition, ResourceDefinitionSpec};

/// The only `apiVersion` accepted for configuration documents
/// (`ResourceDefinition`, `Controller`, `Binding`).
pub const API_VERSION: &str = "cup.flipt.io/v1alpha1";

pub const RESOURCE_DEFINITION_KIND: &str = "ResourceDefinition";
pub const CONTROLLER_KIND: &str = "Controller";
pub const BINDING_KIND: &str = "Binding";
