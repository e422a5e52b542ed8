//! Cloud services consulted while validating requests
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::context::RequestContext;
use crate::errors::MagnumError;

fn default_visibility() -> String {
  String::from("public")
}

/// Image with the metadata the api reads
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
  pub(crate) id: String,
  pub(crate) name: String,
  #[serde(default)]
  pub(crate) os_distro: Option<String>,
  #[serde(default)]
  pub(crate) magnum_driver: Option<String>,
  #[serde(default)]
  pub(crate) owner: Option<String>,
  #[serde(default = "default_visibility")]
  pub(crate) visibility: String,
}

impl Image {
  /// Private images of another project may not be used
  pub fn is_accessible_by(&self, ctx: &RequestContext) -> bool {
    self.visibility != "private"
      || ctx.is_admin
      || self.owner.as_deref() == ctx.project_id.as_deref()
  }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
  pub(crate) id: String,
  pub(crate) name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
  pub(crate) id: String,
  pub(crate) name: String,
  #[serde(default)]
  pub(crate) external: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypair {
  pub(crate) name: String,
  #[serde(default)]
  pub(crate) user_id: Option<String>,
}

/// Resource of an orchestration stack
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackResource {
  pub(crate) stack_id: String,
  pub(crate) resource_name: String,
  pub(crate) resource_status: String,
  #[serde(default)]
  pub(crate) resource_status_reason: String,
}

/// Capabilities of the cloud client bundle
#[async_trait(?Send)]
pub trait OpenStackClients: Send + Sync {
  /// Images visible to the caller
  async fn list_images(
    &self,
    ctx: &RequestContext,
  ) -> Result<Vec<Image>, MagnumError>;

  async fn get_image(
    &self,
    ctx: &RequestContext,
    id: &str,
  ) -> Result<Image, MagnumError>;

  async fn list_flavors(
    &self,
    ctx: &RequestContext,
  ) -> Result<Vec<Flavor>, MagnumError>;

  async fn list_networks(
    &self,
    ctx: &RequestContext,
  ) -> Result<Vec<Network>, MagnumError>;

  async fn get_keypair(
    &self,
    ctx: &RequestContext,
    name: &str,
  ) -> Result<Keypair, MagnumError>;

  /// Resources of `stack_id`, `status` matches the end of the resource status
  async fn list_stack_resources(
    &self,
    ctx: &RequestContext,
    stack_id: &str,
    status: Option<&str>,
  ) -> Result<Vec<StackResource>, MagnumError>;
}

/// Static catalogue read from the configuration file
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Inventory {
  #[serde(default)]
  pub(crate) images: Vec<Image>,
  #[serde(default)]
  pub(crate) flavors: Vec<Flavor>,
  #[serde(default)]
  pub(crate) networks: Vec<Network>,
  #[serde(default)]
  pub(crate) keypairs: Vec<Keypair>,
  #[serde(default)]
  pub(crate) stack_resources: Vec<StackResource>,
}

#[async_trait(?Send)]
impl OpenStackClients for Inventory {
  async fn list_images(
    &self,
    ctx: &RequestContext,
  ) -> Result<Vec<Image>, MagnumError> {
    Ok(
      self
        .images
        .iter()
        .filter(|image| image.is_accessible_by(ctx))
        .cloned()
        .collect(),
    )
  }

  async fn get_image(
    &self,
    ctx: &RequestContext,
    id: &str,
  ) -> Result<Image, MagnumError> {
    let image = self
      .images
      .iter()
      .find(|image| image.id == id)
      .ok_or_else(|| MagnumError::not_found("Image", id))?;
    if !image.is_accessible_by(ctx) {
      return Err(MagnumError::ImageNotAuthorized(id.to_owned()));
    }
    Ok(image.clone())
  }

  async fn list_flavors(
    &self,
    _ctx: &RequestContext,
  ) -> Result<Vec<Flavor>, MagnumError> {
    Ok(self.flavors.clone())
  }

  async fn list_networks(
    &self,
    _ctx: &RequestContext,
  ) -> Result<Vec<Network>, MagnumError> {
    Ok(self.networks.clone())
  }

  async fn get_keypair(
    &self,
    ctx: &RequestContext,
    name: &str,
  ) -> Result<Keypair, MagnumError> {
    self
      .keypairs
      .iter()
      .find(|keypair| {
        keypair.name == name
          && (keypair.user_id.is_none()
            || keypair.user_id.as_deref() == ctx.user_id.as_deref())
      })
      .cloned()
      .ok_or_else(|| MagnumError::not_found("Keypair", name))
  }

  async fn list_stack_resources(
    &self,
    _ctx: &RequestContext,
    stack_id: &str,
    status: Option<&str>,
  ) -> Result<Vec<StackResource>, MagnumError> {
    let resources = self
      .stack_resources
      .iter()
      .filter(|resource| resource.stack_id == stack_id)
      .collect::<Vec<_>>();
    if resources.is_empty() {
      return Err(MagnumError::not_found("Stack", stack_id));
    }
    Ok(
      resources
        .into_iter()
        .filter(|resource| {
          status.map_or(true, |status| resource.resource_status.ends_with(status))
        })
        .cloned()
        .collect(),
    )
  }
}
