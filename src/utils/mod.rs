/// Json patch engine
pub mod patch;
/// Generated resource names
pub mod name;

#[cfg(test)]
pub mod tests {
  use std::collections::HashMap;
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;
  use ntex::web::*;
  use ntex::http::Method;
  use ntex::http::client::ClientRequest;

  use crate::context::RequestContext;
  use crate::controllers::Controllers;
  use crate::errors::MagnumError;
  use crate::models::DaemonConfig;
  use crate::policy::PolicyEnforcer;
  use crate::repositories::Store;
  use crate::services::conductor::{ConductorApi, ConductorMessage, ConductorReply};
  use crate::services::openstack::{Flavor, Image, Inventory, Keypair, Network};
  use crate::state::ApiState;

  pub use ntex::web::test::TestServer;

  pub type TestReturn = Result<(), Box<dyn std::error::Error + 'static>>;

  type Config = fn(&mut ServiceConfig);

  pub const PROJECT_ID: &str = "p1";
  pub const USER_ID: &str = "u1";

  pub fn before() {
    // Build a test env logger
    let _ = env_logger::builder().is_test(true).try_init();
  }

  /// Conductor keeping every message it receives
  #[derive(Debug, Clone, Default)]
  pub struct RecordingConductor {
    messages: Arc<Mutex<Vec<ConductorMessage>>>,
  }

  impl RecordingConductor {
    pub fn messages(&self) -> Vec<ConductorMessage> {
      self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<ConductorMessage> {
      self.messages().pop()
    }

    fn record(&self, message: ConductorMessage) -> Result<(), MagnumError> {
      self
        .messages
        .lock()
        .map_err(|err| MagnumError::internal(err.to_string()))?
        .push(message);
      Ok(())
    }
  }

  #[async_trait(?Send)]
  impl ConductorApi for RecordingConductor {
    async fn cast(
      &self,
      _ctx: &RequestContext,
      message: ConductorMessage,
    ) -> Result<(), MagnumError> {
      self.record(message)
    }

    async fn call(
      &self,
      _ctx: &RequestContext,
      message: ConductorMessage,
    ) -> Result<ConductorReply, MagnumError> {
      let reply = match &message {
        ConductorMessage::GetCaCertificate { .. }
        | ConductorMessage::SignCertificate { .. } => ConductorReply::Certificate(
          String::from("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----"),
        ),
        _ => ConductorReply::Done,
      };
      self.record(message)?;
      Ok(reply)
    }
  }

  /// Catalogue of the cloud services seen by the tests
  pub fn inventory() -> Inventory {
    Inventory {
      images: vec![
        Image {
          id: String::from("8d5e4a23-3e0b-4d4b-9f5c-4b3e3a7c9f10"),
          name: String::from("Fedora-k8s"),
          os_distro: Some(String::from("fedora-atomic")),
          ..Default::default()
        },
        Image {
          id: String::from("0b7e5d2c-6f4a-4c8e-8a51-2f1d9e6b7a33"),
          name: String::from("no-distro"),
          ..Default::default()
        },
      ],
      flavors: vec![Flavor {
        id: String::from("1"),
        name: String::from("m1.small"),
      }],
      networks: vec![Network {
        id: String::from("9b3c1c52-34b5-4a8c-8f44-6a3f0e6f2d11"),
        name: String::from("public"),
        external: true,
      }],
      keypairs: vec![Keypair {
        name: String::from("k1"),
        user_id: None,
      }],
      stack_resources: Vec::new(),
    }
  }

  /// Api state with an in-memory store and a recording conductor.
  ///
  /// `rules` overrides the default policy rules.
  pub fn generate_state(rules: &[(&str, &str)]) -> (ApiState, RecordingConductor) {
    let overrides = rules
      .iter()
      .map(|(rule, check)| (rule.to_string(), check.to_string()))
      .collect::<HashMap<String, String>>();
    let config = DaemonConfig {
      hosts: vec![String::from("tcp://127.0.0.1:9511")],
      api: crate::models::ApiSection {
        max_limit: 1000,
        host_url: Some(String::from("http://magnum")),
      },
      inventory: inventory(),
      ..Default::default()
    };
    let conductor = RecordingConductor::default();
    let state = ApiState {
      clients: Arc::new(config.inventory.clone()),
      config,
      store: Store::new(),
      conductor: Arc::new(conductor.clone()),
      policy: PolicyEnforcer::new(&overrides, None).unwrap(),
      controllers: Arc::new(Controllers::new().unwrap()),
    };
    (state, conductor)
  }

  pub async fn generate_server(config: Config) -> TestServer {
    let (state, _) = generate_state(&[]);
    generate_server_with(config, state).await
  }

  pub async fn generate_server_with(config: Config, state: ApiState) -> TestServer {
    before();
    test::server(move || App::new().state(state.clone()).configure(config))
  }

  /// Request of a member of the test project at `version`
  pub fn request(
    srv: &TestServer,
    method: Method,
    path: &str,
    version: &str,
  ) -> ClientRequest {
    srv
      .request(method, srv.url(path))
      .header("X-Project-Id", PROJECT_ID)
      .header("X-User-Id", USER_ID)
      .header("X-Roles", "member")
      .header("OpenStack-API-Version", format!("container-infra {}", version))
  }

  /// Same as [`request`] with the admin role
  pub fn admin_request(
    srv: &TestServer,
    method: Method,
    path: &str,
    version: &str,
  ) -> ClientRequest {
    srv
      .request(method, srv.url(path))
      .header("X-Project-Id", "admin")
      .header("X-User-Id", "admin")
      .header("X-Roles", "admin")
      .header("OpenStack-API-Version", format!("container-infra {}", version))
  }
}
