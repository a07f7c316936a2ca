#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

pub use self::labels::Selector;
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, ReplicaSet},
        core::v1::{Pod, Service},
        networking::v1::Ingress,
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
};
pub use kube::core::{ObjectMeta, ResourceExt};
