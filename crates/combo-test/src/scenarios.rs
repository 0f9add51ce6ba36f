//! Scenario builders
//!
//! Field layouts used across tests and benchmarks:
//! - geography: country -> state -> city, each enabled and cleared by its parent,
//!   or with state only enabled by country
//! - hosting account: a client, a server filtered by client and an account
//!   login whose search is filtered by both and whose selection fills them in

use std::sync::Arc;

use serde_json::json;

use combo_core::{
    AffectKeys, AffectRule, ComboResult, Condition, ConfigRegistry, FieldConfig, FieldOptions,
    FieldType, FilterSpec, FilterTerm, Record, RemoteQuery,
};
use combo_state::{ComboForm, MemoryWidget};
use combo_transport::{RemoteLookup, StaticLookup};

pub const CLIENT: &str = "client/client";
pub const SERVER: &str = "server/server";
pub const ACCOUNT: &str = "hosting/account";

/// Registry plus the registration order of its field types
pub struct Scenario {
    pub registry: Arc<ConfigRegistry>,
    pub types: Vec<FieldType>,
}

impl Scenario {
    pub fn new(configs: Vec<FieldConfig>) -> ComboResult<Self> {
        let registry = ConfigRegistry::new();
        let mut types = Vec::with_capacity(configs.len());
        for config in configs {
            types.push(config.field_type.clone());
            registry.register_config(config)?;
        }
        Ok(Scenario {
            registry: Arc::new(registry),
            types,
        })
    }

    /// Register every field with default options
    pub fn form(&self, lookup: Arc<dyn RemoteLookup>) -> ComboResult<ComboForm> {
        self.form_with(lookup, |_| FieldOptions::new())
    }

    /// Register every field, asking `options` for each type's overrides
    pub fn form_with<F>(&self, lookup: Arc<dyn RemoteLookup>, options: F) -> ComboResult<ComboForm>
    where
        F: Fn(&FieldType) -> FieldOptions,
    {
        let mut form = ComboForm::new(Arc::clone(&self.registry), lookup);
        for field_type in &self.types {
            form.register(field_type.clone(), options(field_type), MemoryWidget::new().boxed())?;
        }
        Ok(form)
    }
}

pub fn geo_configs() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new("country", "country").with_data(vec![
            Record::new("us", "United States"),
            Record::new("ca", "Canada"),
        ]),
        FieldConfig::new("state", "state")
            .with_active_when(Condition::fields(["country"]))
            .with_clear_when(Condition::fields(["country"])),
        FieldConfig::new("city", "city")
            .with_active_when(Condition::fields(["state"]))
            .with_clear_when(Condition::fields(["state"])),
    ]
}

/// Geography where `state` is only gated by `country` and keeps its value
/// when `country` changes; `city` is gated and cleared by `state`
pub fn geo_configs_sticky_state() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new("country", "country"),
        FieldConfig::new("state", "state").with_active_when(Condition::fields(["country"])),
        FieldConfig::new("city", "city")
            .with_active_when(Condition::fields(["state"]))
            .with_clear_when(Condition::fields(["state"])),
    ]
}

/// Chain of `len` fields, each enabled and cleared by its predecessor
pub fn chain_configs(len: usize) -> Vec<FieldConfig> {
    (0..len)
        .map(|i| {
            let config = FieldConfig::new(format!("link{}", i), format!("link{}", i));
            if i == 0 {
                config
            } else {
                let parent = format!("link{}", i - 1);
                config
                    .with_active_when(Condition::fields([parent.clone()]))
                    .with_clear_when(Condition::fields([parent]))
            }
        })
        .collect()
}

pub fn account_configs() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new("client", CLIENT).with_remote(RemoteQuery::new("/client/client/search")),
        FieldConfig::new("server", SERVER)
            .with_remote(RemoteQuery::new("/server/server/search").with_filter(
                FilterSpec::new().with("client_id", FilterTerm::id_of(CLIENT)),
            ))
            .with_active_when(Condition::fields([CLIENT]))
            .with_clear_when(Condition::fields([CLIENT])),
        FieldConfig::new("login", ACCOUNT)
            .with_remote(RemoteQuery::new("/hosting/account/search").with_filter(
                FilterSpec::new()
                    .with("client_id", FilterTerm::id_of(CLIENT))
                    .with("server_id", FilterTerm::id_of(SERVER)),
            ))
            .with_affects(CLIENT, AffectRule::Convention("client".to_string()))
            .with_affects(
                SERVER,
                AffectRule::Keys(AffectKeys {
                    id: Some("device_id".to_string()),
                    value: "device".to_string(),
                }),
            ),
    ]
}

/// Tables behind the hosting account endpoints
pub fn account_lookup() -> StaticLookup {
    StaticLookup::new()
        .with_json_table(
            "/client/client/search",
            json!([
                {"id": 7, "client": "acme"},
                {"id": 9, "client": "globex"}
            ]),
        )
        .with_json_table(
            "/server/server/search",
            json!([
                {"id": 1, "server": "web1", "client_id": 7},
                {"id": 2, "server": "web2", "client_id": 9}
            ]),
        )
        .with_json_table(
            "/hosting/account/search",
            json!([
                {"id": 11, "login": "root", "client_id": 7, "client": "acme", "device_id": 1, "device": "web1", "server_id": 1},
                {"id": 12, "login": "admin", "client_id": 7, "client": "acme", "device_id": 1, "device": "web1", "server_id": 1},
                {"id": 13, "login": "rooster", "client_id": 9, "client": "globex", "device_id": 2, "device": "web2", "server_id": 2}
            ]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_tracing;
    use combo_core::FieldValue;
    use combo_transport::{ChannelLookup, LookupRequest, NoLookup};

    fn ty(name: &str) -> FieldType {
        FieldType::new(name)
    }

    #[test]
    fn test_geo_scenario() {
        init_tracing();
        let scenario = Scenario::new(geo_configs()).unwrap();
        let mut form = scenario.form(Arc::new(NoLookup)).unwrap();

        form.select(&ty("country"), FieldValue::single(Record::new("us", "United States")))
            .unwrap();
        form.select(&ty("state"), FieldValue::single(Record::new("wa", "Washington")))
            .unwrap();
        form.select(&ty("city"), FieldValue::single(Record::new("sea", "Seattle")))
            .unwrap();

        let report = form
            .select(&ty("country"), FieldValue::single(Record::new("ca", "Canada")))
            .unwrap();

        assert_eq!(report.cleared, 2);
        assert!(form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
        assert!(form.is_empty(&ty("city")));
    }

    #[test]
    fn test_sticky_state_scenario() {
        let scenario = Scenario::new(geo_configs_sticky_state()).unwrap();
        let mut form = scenario.form(Arc::new(NoLookup)).unwrap();
        let pick = |id: &str| FieldValue::single(Record::new(id, id));

        form.select(&ty("country"), pick("us")).unwrap();
        assert!(form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
        assert!(form.is_empty(&ty("city")));

        form.select(&ty("state"), pick("wa")).unwrap();
        assert!(form.is_enabled(&ty("city")));
        form.select(&ty("city"), pick("sea")).unwrap();

        let report = form.clear(&ty("state")).unwrap();
        assert_eq!(report.disabled, 1);
        assert_eq!(report.cleared, 1);
        assert!(form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
        assert!(form.is_empty(&ty("city")));

        // Without a clear condition, state survives a country change.
        form.select(&ty("state"), pick("bc")).unwrap();
        let report = form.select(&ty("country"), pick("ca")).unwrap();
        assert_eq!(report.cleared, 0);
        assert_eq!(form.get_id(&ty("state")), "bc");
        assert!(form.is_enabled(&ty("city")));
    }

    #[test]
    fn test_restored_values_survive_registration() {
        let scenario = Scenario::new(geo_configs()).unwrap();
        let form = scenario
            .form_with(Arc::new(NoLookup), |field_type| match field_type.as_str() {
                "country" => FieldOptions::new().with_value("ca"),
                "state" => FieldOptions::new().with_value("qc").with_init_text("Quebec"),
                _ => FieldOptions::new(),
            })
            .unwrap();

        assert_eq!(form.get_text(&ty("country")), "Canada");
        assert_eq!(form.get_text(&ty("state")), "Quebec");
        assert!(form.is_enabled(&ty("state")));
        assert!(form.is_enabled(&ty("city")));
    }

    #[test]
    fn test_chain_collapses_on_root_clear() {
        let scenario = Scenario::new(chain_configs(6)).unwrap();
        let mut form = scenario.form(Arc::new(NoLookup)).unwrap();
        for i in 0..6 {
            let field_type = ty(&format!("link{}", i));
            form.select(&field_type, FieldValue::single(Record::new("x", "x")))
                .unwrap();
        }
        assert!(form.is_enabled(&ty("link5")));

        let report = form.clear(&ty("link0")).unwrap();

        assert_eq!(report.cleared, 5);
        assert_eq!(report.disabled, 5);
        assert!((1..6).all(|i| form.is_empty(&ty(&format!("link{}", i)))));
    }

    #[tokio::test]
    async fn test_account_scenario_over_channel() {
        init_tracing();
        let tables = Arc::new(account_lookup());
        let responder = Arc::clone(&tables);
        let lookup = ChannelLookup::spawn(8, move |request: LookupRequest| {
            let tables = Arc::clone(&responder);
            async move { tables.lookup(request).await }
        });

        let scenario = Scenario::new(account_configs()).unwrap();
        let mut form = scenario
            .form_with(Arc::new(lookup), |field_type| {
                if field_type.as_str() == CLIENT {
                    FieldOptions::new().with_value("7")
                } else {
                    FieldOptions::new()
                }
            })
            .unwrap();

        assert_eq!(form.resolve_pending().await.unwrap(), 1);
        assert_eq!(form.get_text(&ty(CLIENT)), "acme");
        assert!(form.is_enabled(&ty(SERVER)));

        let found = form.search(&ty(ACCOUNT), "roo").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "root");

        let picked = json!({
            "id": 13, "text": "rooster", "client_id": 9, "client": "globex",
            "device_id": 2, "device": "web2"
        });
        let report = form
            .select_remote(&ty(ACCOUNT), picked.as_object().unwrap())
            .unwrap();

        assert_eq!(report.propagated, 2);
        assert_eq!(form.get_data(&ty(CLIENT)), Some(&FieldValue::single(Record::new("9", "globex"))));
        assert_eq!(form.get_data(&ty(SERVER)), Some(&FieldValue::single(Record::new("2", "web2"))));
        assert_eq!(form.pending_count(), 0);
    }

    #[test]
    fn test_account_search_filters_by_client() {
        let scenario = Scenario::new(account_configs()).unwrap();
        let mut form = scenario.form(Arc::new(NoLookup)).unwrap();
        form.set_value(&ty(CLIENT), FieldValue::single(Record::new("7", "acme")))
            .unwrap();

        let request = form.search_request(&ty(ACCOUNT), "ro").unwrap();

        assert_eq!(
            serde_json::to_value(&request.body).unwrap(),
            json!({
                "return": ["id"],
                "rename": {"text": "login"},
                "client_id": "7",
                "login_like": "ro"
            })
        );
    }
}
