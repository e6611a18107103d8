use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions as semcov;
use std::collections::HashMap;

/// Cloud role and cloud role instance of this process, derived from the resource the same way
/// the Application Insights exporter derives the `ai.cloud.role` and `ai.cloud.roleInstance`
/// tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CloudRole {
    pub(crate) role_name: String,
    pub(crate) instance: String,
}

pub(crate) fn get_cloud_role(resource: &Resource, machine_name: &str) -> CloudRole {
    let attrs: HashMap<&str, String> = resource
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str().into_owned()))
        .collect();

    let role_name = match attrs.get(semcov::resource::SERVICE_NAME) {
        Some(service_name) => match attrs.get(semcov::resource::SERVICE_NAMESPACE) {
            Some(service_namespace) => format!("{}.{}", service_namespace, service_name),
            None => service_name.clone(),
        },
        None => String::new(),
    };

    let instance = attrs
        .get(semcov::resource::SERVICE_INSTANCE_ID)
        .cloned()
        .unwrap_or_else(|| machine_name.to_string());

    CloudRole {
        role_name,
        instance,
    }
}
