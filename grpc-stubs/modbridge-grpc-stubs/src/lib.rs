//! Generated gRPC stubs for ResourceProvider
//!
//! This crate contains only the generated protobuf types and gRPC client/server stubs
//! for the ResourceProvider service. It does not contain any business logic.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Generated protobuf types for ResourceProvider
pub mod pb {
    tonic::include_proto!("modbridge.provider.v1");
}

pub use pb::resource_provider_client::ResourceProviderClient;
pub use pb::resource_provider_server::{ResourceProvider, ResourceProviderServer};
pub use pb::{
    AttachRequest, CheckConfigRequest, CheckConfigResponse, CheckRequest, CheckResponse,
    ConfigureRequest, ConfigureResponse, ConstructRequest, ConstructResponse, CreateRequest,
    CreateResponse, DeleteRequest, DiffRequest, DiffResponse, Empty, GetSchemaRequest,
    GetSchemaResponse, HandshakeRequest, HandshakeResponse, ParameterizeRequest,
    ParameterizeResponse, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
