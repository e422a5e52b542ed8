//! File to export services
/// Cloud services client bundle
pub mod openstack;
/// Cluster driver table
pub mod driver;
/// Attribute validators
pub mod validation;
/// Conductor message contract
pub mod conductor;
