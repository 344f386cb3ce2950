//! Binds the generated `ResourceProvider` gRPC trait to the library's
//! Dispatch, Module Handler, and Child Handler.

use std::path::PathBuf;
use std::sync::Arc;

use modbridge::dispatch::{self, ParameterizeArgs, ProviderState};
use modbridge::handlers::{ChildHandler, ChildInputs, ModuleHandler, ModuleInputs};
use modbridge::model::{classify_type_token, ModuleReference, ModuleState, PropertyValue, TypeTokenKind};
use modbridge::propbridge::{from_wire_json, to_wire_json};
use modbridge::store::{DriftSet, PlanStateStore};
use parking_lot::RwLock;
use serde_json::Value as Json;
use tonic::{Request, Response, Status};

use modbridge_grpc_stubs::{
    AttachRequest, CheckConfigRequest, CheckConfigResponse, CheckRequest, CheckResponse,
    ConfigureRequest, ConfigureResponse, ConstructRequest, ConstructResponse, CreateRequest,
    CreateResponse, DeleteRequest, DiffRequest, DiffResponse, Empty, GetSchemaRequest,
    GetSchemaResponse, HandshakeRequest, HandshakeResponse, ParameterizeRequest,
    ParameterizeResponse, ReadRequest, ReadResponse, ResourceProvider, UpdateRequest,
    UpdateResponse,
};

/// Everything fixed at Parameterize time: the resolved module + package
/// identity, the executor binary, and the shared provider-wide state the
/// handlers read from.
struct Session {
    module: ModuleReference,
    tf_name: String,
    executor: PathBuf,
    provider_state: ProviderState,
}

pub struct ProviderService {
    session: RwLock<Option<Session>>,
}

impl ProviderService {
    pub fn new() -> Self {
        Self { session: RwLock::new(None) }
    }

    fn require_session(&self) -> Result<(), Status> {
        if self.session.read().is_none() {
            return Err(Status::failed_precondition("GetSchema/RPC called before Parameterize"));
        }
        Ok(())
    }

    fn module_handler(&self) -> ModuleHandler {
        let guard = self.session.read();
        let session = guard.as_ref().expect("require_session checked above");
        ModuleHandler::new(
            session.provider_state.store.clone(),
            session.provider_state.package.name.clone(),
            session.executor.clone(),
        )
    }

    fn child_handler(&self) -> ChildHandler {
        let guard = self.session.read();
        let session = guard.as_ref().expect("require_session checked above");
        ChildHandler::new(session.provider_state.store.clone())
    }

    fn module_inputs(&self, urn: &str, news_json: &str, tf_name: &str, module: &ModuleReference) -> ModuleInputs {
        let news: Json = serde_json::from_str(news_json).unwrap_or(Json::Null);
        let inputs = json_object_to_properties(&news);
        let prior_state = extract_module_state(&news);
        let output_names = news
            .get("__outputNames")
            .and_then(Json::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        ModuleInputs {
            urn: urn.to_string(),
            tf_name: tf_name.to_string(),
            module: module.clone(),
            inputs,
            output_names,
            prior_state,
        }
    }
}

fn json_object_to_properties(value: &Json) -> std::collections::BTreeMap<String, PropertyValue> {
    value
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), from_wire_json(v))).collect())
        .unwrap_or_default()
}

fn properties_to_json(props: &std::collections::BTreeMap<String, PropertyValue>) -> Json {
    Json::Object(props.iter().map(|(k, v)| (k.clone(), to_wire_json(v))).collect())
}

fn extract_module_state(news: &Json) -> Option<ModuleState> {
    let state = news.get("__state")?.as_str()?;
    let lock = news.get("__lock").and_then(Json::as_str).unwrap_or_default();
    let version = news.get("__version").and_then(Json::as_str).unwrap_or_default();
    Some(ModuleState {
        state: hex_decode(state),
        lock: hex_decode(lock),
        version: version.to_string(),
    })
}

fn hex_decode(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .filter_map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

#[tonic::async_trait]
impl ResourceProvider for ProviderService {
    async fn handshake(&self, request: Request<HandshakeRequest>) -> Result<Response<HandshakeResponse>, Status> {
        let req = request.into_inner();
        if req.supports_view_steps {
            Ok(Response::new(HandshakeResponse { accepted: true, rejection_reason: String::new() }))
        } else {
            Ok(Response::new(HandshakeResponse {
                accepted: false,
                rejection_reason: "host does not support the view-step feature".to_string(),
            }))
        }
    }

    async fn attach(&self, _request: Request<AttachRequest>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }

    async fn parameterize(
        &self,
        request: Request<ParameterizeRequest>,
    ) -> Result<Response<ParameterizeResponse>, Status> {
        let req = request.into_inner();
        let args = if !req.json_value.is_empty() {
            ParameterizeArgs::from_positional(&[req.json_value])
        } else {
            ParameterizeArgs::from_positional(&req.args)
        }
        .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let (module, package) = args.resolve();
        let tf_name = package.name.clone();
        let executor = resolve_executor();

        let schema_cache = dispatch::SchemaCache::default();
        dispatch::parameterize(
            executor.clone(),
            module.clone(),
            &tf_name,
            &schema_cache,
            args.raw_config(),
        )
        .await
        .map_err(|e| Status::internal(e.to_string()))?;

        let provider_state = ProviderState {
            schema_cache,
            store: PlanStateStore::new(),
            drift: DriftSet::new(),
            package: package.clone(),
        };

        *self.session.write() = Some(Session { module, tf_name, executor, provider_state });

        Ok(Response::new(ParameterizeResponse {
            package_name: package.name,
            package_version: package.version,
        }))
    }

    async fn get_schema(&self, _request: Request<GetSchemaRequest>) -> Result<Response<GetSchemaResponse>, Status> {
        self.require_session()?;
        let guard = self.session.read();
        let session = guard.as_ref().unwrap();
        let schema = session
            .provider_state
            .schema_cache
            .get()
            .ok_or_else(|| Status::failed_precondition("schema not yet inferred"))?;
        let schema_json = serde_json::to_string(&schema).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(GetSchemaResponse { schema_json }))
    }

    async fn configure(&self, request: Request<ConfigureRequest>) -> Result<Response<ConfigureResponse>, Status> {
        let req = request.into_inner();
        let raw: Json = serde_json::from_str(&req.config_json).unwrap_or(Json::Null);
        let _sanitized = dispatch::sanitize_provider_config(&raw);
        Ok(Response::new(ConfigureResponse { accept_secrets: true, accept_resources: true }))
    }

    async fn check_config(
        &self,
        request: Request<CheckConfigRequest>,
    ) -> Result<Response<CheckConfigResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(CheckConfigResponse { inputs_json: req.news_json, failures: vec![] }))
    }

    async fn check(&self, request: Request<CheckRequest>) -> Result<Response<CheckResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(CheckResponse { inputs_json: req.news_json, failures: vec![] }))
    }

    async fn diff(&self, request: Request<DiffRequest>) -> Result<Response<DiffResponse>, Status> {
        self.require_session()?;
        let req = request.into_inner();
        match classify_type_token(&req.type_token) {
            Some(TypeTokenKind::Module) => {
                let (tf_name, module, drift) = {
                    let guard = self.session.read();
                    let s = guard.as_ref().unwrap();
                    (s.tf_name.clone(), s.module.clone(), s.provider_state.drift.clone())
                };
                let old: Json = serde_json::from_str(&req.olds_json).unwrap_or(Json::Null);
                let old_inputs = json_object_to_properties(&old);
                let request_model = self.module_inputs(&req.urn, &req.news_json, &tf_name, &module);
                let drift_recorded = drift.take(&request_model.urn);
                let result = self
                    .module_handler()
                    .diff(&request_model, &old_inputs, drift_recorded)
                    .await
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(Response::new(DiffResponse { has_changes: result.has_changes, delete_before_replace: false }))
            }
            Some(TypeTokenKind::Child) => {
                let inputs = child_inputs_from_json(&req.news_json)?;
                let result = self.child_handler().diff(&inputs).map_err(|e| Status::internal(e.to_string()))?;
                Ok(Response::new(DiffResponse {
                    has_changes: result.has_changes,
                    delete_before_replace: result.delete_before_replace,
                }))
            }
            None => Err(Status::invalid_argument("unrecognized type token")),
        }
    }

    async fn create(&self, request: Request<CreateRequest>) -> Result<Response<CreateResponse>, Status> {
        self.require_session()?;
        let req = request.into_inner();
        match classify_type_token(&req.type_token) {
            Some(TypeTokenKind::Module) => {
                let (tf_name, module) = {
                    let guard = self.session.read();
                    let s = guard.as_ref().unwrap();
                    (s.tf_name.clone(), s.module.clone())
                };
                let request_model = self.module_inputs(&req.urn, &req.properties_json, &tf_name, &module);
                let outputs = self
                    .module_handler()
                    .create_or_update(&request_model, req.preview)
                    .await
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(Response::new(CreateResponse {
                    id: req.urn,
                    properties_json: properties_to_json(&outputs.values).to_string(),
                }))
            }
            Some(TypeTokenKind::Child) => {
                let inputs = child_inputs_from_json(&req.properties_json)?;
                let id = self.child_handler().create(&inputs, req.preview);
                Ok(Response::new(CreateResponse {
                    id: id.map(|a| a.to_string()).unwrap_or_default(),
                    properties_json: "{}".to_string(),
                }))
            }
            None => Err(Status::invalid_argument("unrecognized type token")),
        }
    }

    async fn update(&self, request: Request<UpdateRequest>) -> Result<Response<UpdateResponse>, Status> {
        self.require_session()?;
        let req = request.into_inner();
        match classify_type_token(&req.type_token) {
            Some(TypeTokenKind::Module) => {
                let (tf_name, module) = {
                    let guard = self.session.read();
                    let s = guard.as_ref().unwrap();
                    (s.tf_name.clone(), s.module.clone())
                };
                let request_model = self.module_inputs(&req.urn, &req.news_json, &tf_name, &module);
                let outputs = self
                    .module_handler()
                    .create_or_update(&request_model, req.preview)
                    .await
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(Response::new(UpdateResponse { properties_json: properties_to_json(&outputs.values).to_string() }))
            }
            Some(TypeTokenKind::Child) => {
                let inputs = child_inputs_from_json(&req.news_json)?;
                let value = self.child_handler().update(&inputs, req.preview).unwrap_or(PropertyValue::Null);
                Ok(Response::new(UpdateResponse { properties_json: to_wire_json(&value).to_string() }))
            }
            None => Err(Status::invalid_argument("unrecognized type token")),
        }
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<Empty>, Status> {
        self.require_session()?;
        let req = request.into_inner();
        match classify_type_token(&req.type_token) {
            Some(TypeTokenKind::Module) => {
                let (tf_name, module) = {
                    let guard = self.session.read();
                    let s = guard.as_ref().unwrap();
                    (s.tf_name.clone(), s.module.clone())
                };
                let request_model = self.module_inputs(&req.urn, &req.properties_json, &tf_name, &module);
                self.module_handler()
                    .delete(&request_model)
                    .await
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(Response::new(Empty {}))
            }
            Some(TypeTokenKind::Child) => {
                let inputs = child_inputs_from_json(&req.properties_json)?;
                let _ = self.child_handler().delete(&inputs);
                Ok(Response::new(Empty {}))
            }
            None => Err(Status::invalid_argument("unrecognized type token")),
        }
    }

    async fn read(&self, request: Request<ReadRequest>) -> Result<Response<ReadResponse>, Status> {
        self.require_session()?;
        let req = request.into_inner();
        match classify_type_token(&req.type_token) {
            Some(TypeTokenKind::Module) => {
                let (tf_name, module, drift) = {
                    let guard = self.session.read();
                    let s = guard.as_ref().unwrap();
                    (s.tf_name.clone(), s.module.clone(), s.provider_state.drift.clone())
                };
                let request_model = self.module_inputs(&req.urn, &req.properties_json, &tf_name, &module);
                let (outputs, drift_detected) = self
                    .module_handler()
                    .read(&request_model)
                    .await
                    .map_err(|e| Status::internal(e.to_string()))?;
                if drift_detected {
                    drift.record(&request_model.urn);
                }
                Ok(Response::new(ReadResponse {
                    id: req.id,
                    properties_json: properties_to_json(&outputs.values).to_string(),
                }))
            }
            Some(TypeTokenKind::Child) => Ok(Response::new(ReadResponse { id: req.id, properties_json: "{}".to_string() })),
            None => Err(Status::invalid_argument("unrecognized type token")),
        }
    }

    async fn construct(&self, _request: Request<ConstructRequest>) -> Result<Response<ConstructResponse>, Status> {
        Err(Status::unimplemented("Construct is not supported by this provider"))
    }

    async fn cancel(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }
}

fn child_inputs_from_json(raw: &str) -> Result<ChildInputs, Status> {
    let value: Json = serde_json::from_str(raw).map_err(|e| Status::invalid_argument(e.to_string()))?;
    let address = value
        .get("__address")
        .and_then(Json::as_str)
        .ok_or_else(|| Status::invalid_argument("missing __address"))?;
    let module = value
        .get("__module")
        .and_then(Json::as_str)
        .ok_or_else(|| Status::invalid_argument("missing __module"))?;
    Ok(ChildInputs {
        address: modbridge::model::ResourceAddress::new(address),
        module: module.to_string(),
    })
}

/// Resolve the executor binary: `MODBRIDGE_EXECUTOR` env var, defaulting
/// to a bare name resolved against `PATH`.
fn resolve_executor() -> PathBuf {
    std::env::var("MODBRIDGE_EXECUTOR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("tofu"))
}
