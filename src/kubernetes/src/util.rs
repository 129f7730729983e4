use kube::{Resource, ResourceExt};

use super::error::Error;

pub fn get_namespace<T: Resource<DynamicType = ()>>(resource: &T) -> Result<String, Error> {
    resource
        .namespace()
        .ok_or_else(|| Error::MissingNamespace(resource.name_any()))
}

pub fn get_namespaced_name<T: Resource<DynamicType = ()>>(resource: &T) -> String {
    match resource.namespace() {
        Some(ns) => format!("{ns}/{}", resource.name_any()),
        None => resource.name_any(),
    }
}
