//! Names for per-test resources.

use serde_json::Value;

/// Kubernetes object names (DNS-1123 labels) are at most this long.
pub const MAX_NAME_LEN: usize = 63;

/// Model name used when no `model-*` config names one.
pub const DEFAULT_MODEL_NAME: &str = "default-model";

const UID_LEN: usize = 8;

/// Derive a unique service name from a test name and the configs it composes.
///
/// `test_llm_inference_service[cpu]` with refs `["router-managed", "model-a"]` becomes
/// `llm-inference-service-model-a-router-managed-<8 hex chars>`, truncated so the whole name fits
/// in [`MAX_NAME_LEN`].
pub fn service_name<S: AsRef<str>>(test_name: &str, base_refs: &[S]) -> String {
    let uid = uuid::Uuid::new_v4().simple().to_string();
    service_name_with_uid(test_name, base_refs, &uid[..UID_LEN])
}

fn service_name_with_uid<S: AsRef<str>>(test_name: &str, base_refs: &[S], uid: &str) -> String {
    let base = test_name.split('[').next().unwrap_or(test_name);
    let base = base.replace("test_", "").replace('_', "-");

    let mut refs: Vec<&str> = base_refs.iter().map(AsRef::as_ref).collect();
    refs.sort_unstable();
    let stem = format!("{}-{}", base, refs.join("-")).to_lowercase();

    let budget = MAX_NAME_LEN - 1 - uid.len();
    let stem: String = stem.chars().take(budget).collect();
    format!("{}-{}", stem.trim_end_matches('-'), uid)
}

/// `model.name` of the first `model-*` config among `config_names`, looked up in `configs`.
///
/// Falls back to [`DEFAULT_MODEL_NAME`].
pub fn model_name_from_configs<S: AsRef<str>>(configs: &Value, config_names: &[S]) -> String {
    config_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| name.starts_with("model-"))
        .find_map(|name| configs.get(name)?.get("model")?.get("name")?.as_str())
        .unwrap_or(DEFAULT_MODEL_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_params_and_prefix_and_sorts_refs() {
        let name = service_name_with_uid(
            "test_llm_inference_service[router-managed-model]",
            &["router-managed", "model-fb-opt-125m"],
            "deadbeef",
        );
        assert_eq!(name, "llm-inference-service-model-fb-opt-125m-router-managed-deadbeef");
    }

    #[test]
    fn truncates_to_dns_label_length_without_dangling_dash() {
        let refs = ["router-managed", "workload-single-cpu", "model-fb-opt-125m"];
        let name = service_name_with_uid("test_llm_inference_service", &refs, "0123abcd");
        assert!(name.len() <= MAX_NAME_LEN, "{} is {} chars", name, name.len());
        assert!(name.ends_with("-0123abcd"));
        assert!(!name.contains("--"));
    }

    #[test]
    fn random_suffix_is_eight_hex_chars() {
        let name = service_name("test_Upper_Case", &["B", "a"]);
        let (stem, uid) = name.rsplit_once('-').unwrap();
        assert_eq!(stem, "upper-case-b-a");
        assert_eq!(uid.len(), 8);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, service_name("test_Upper_Case", &["B", "a"]));
    }

    #[test]
    fn model_name_comes_from_first_model_config() {
        let configs = json!({
            "model-fb-opt-125m": { "model": { "uri": "hf://facebook/opt-125m", "name": "facebook/opt-125m" } },
            "model-unnamed": { "model": { "uri": "hf://x" } },
            "router-managed": { "router": {} }
        });
        assert_eq!(
            model_name_from_configs(&configs, &["router-managed", "model-fb-opt-125m"]),
            "facebook/opt-125m"
        );
        assert_eq!(model_name_from_configs(&configs, &["model-unnamed"]), DEFAULT_MODEL_NAME);
        assert_eq!(model_name_from_configs(&configs, &["router-managed"]), DEFAULT_MODEL_NAME);
    }
}
